use std::fmt;

use clownfish_sys::{cfish_err_get_mess, cfish_err_new, CfErr};

use crate::error::BridgeError;
use crate::handle::Handle;
use crate::string::{from_host_text, to_host_text};

/// Host value for a native `Clownfish::Err`.
///
/// This is the payload carried by a host unwind that started at a native
/// throw, and the error half of [`crate::try_run`].
#[derive(Clone)]
pub struct NativeError {
    handle: Handle<CfErr>,
}

impl NativeError {
    /// Creates a fresh native error carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        let mess = from_host_text(message).into_raw();
        // SAFETY: `cfish_err_new` takes over the string's credit and never
        // returns null.
        let handle = unsafe { Handle::adopt(cfish_err_new(mess)) };
        NativeError { handle }
    }

    /// Wraps an error whose credit the caller hands over.
    ///
    /// # Safety
    /// See [`Handle::from_raw`].
    pub unsafe fn from_raw(err: *mut CfErr) -> Result<Self, BridgeError> {
        Ok(NativeError {
            handle: Handle::from_raw(err)?,
        })
    }

    /// Wraps a borrowed error, taking a credit of its own.
    ///
    /// # Safety
    /// See [`Handle::from_borrowed`].
    pub unsafe fn from_borrowed(err: *mut CfErr) -> Result<Self, BridgeError> {
        Ok(NativeError {
            handle: Handle::from_borrowed(err)?,
        })
    }

    pub fn message(&self) -> String {
        // SAFETY: the message is borrowed from an error our handle keeps
        // alive; a released handle yields null and so the empty string.
        unsafe { to_host_text(cfish_err_get_mess(self.handle.as_ptr()).cast()) }
    }

    pub fn handle(&self) -> &Handle<CfErr> {
        &self.handle
    }

    pub fn into_handle(self) -> Handle<CfErr> {
        self.handle
    }

    /// Hands this error's credit to the caller.
    pub fn into_raw(self) -> *mut CfErr {
        self.handle.into_raw()
    }

    /// Raises this error on the host side, exactly as if native code had
    /// thrown it.
    pub fn throw(self) -> ! {
        crate::panic::raise(self)
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl fmt::Debug for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeError").field("message", &self.message()).finish()
    }
}

impl std::error::Error for NativeError {}
