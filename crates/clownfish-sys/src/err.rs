//! Native error objects and the throw/trap convention.
//!
//! Native code reports failure by *throwing* an error: it never returns
//! normally from the failing call. The mechanism that makes this work lives in
//! the host, which fills the two callback slots below at startup. A host must
//! let its unwinding pass through the `extern "C-unwind"` frames of this crate;
//! every native frame that owns a credit holds it in a guard that gives it back
//! while the unwind passes.

use std::ffi::c_void;
use std::ptr;

use once_cell::sync::OnceCell;

use crate::class::ERR;
use crate::collections::string::{new_string, CfString};
use crate::object::{cfish_dec_refcount, cfish_inc_refcount, into_native, CfObj, NativeKind, Owned};

/// An error carrying a message string.
#[repr(C)]
#[derive(Debug)]
pub struct CfErr {
    header: CfObj,
    mess: *mut CfString,
}

unsafe impl NativeKind for CfErr {
    fn class() -> &'static crate::class::CfClass {
        &ERR
    }
}

impl CfErr {
    /// The message. Borrowed from the error.
    pub fn message(&self) -> &CfString {
        // SAFETY: `mess` is set at construction and owned until drop.
        unsafe { &*self.mess }
    }
}

impl Drop for CfErr {
    fn drop(&mut self) {
        // SAFETY: the error owns one credit on its message.
        unsafe {
            cfish_dec_refcount(self.mess.cast());
        }
    }
}

/// Routine run under a trap: `routine(context)`.
pub type AttemptFn = unsafe extern "C-unwind" fn(context: *mut c_void);

/// Raises `err` in the host. Must not return. `err` is borrowed.
pub type DoThrowFn = unsafe extern "C-unwind" fn(err: *mut CfErr) -> !;

/// Runs `routine(context)`; returns the captured error (one credit owned by the
/// caller) or null on success.
pub type TrapFn = unsafe extern "C-unwind" fn(routine: AttemptFn, context: *mut c_void) -> *mut CfErr;

/// Host functions backing the throw/trap convention.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct CallbackSlots {
    pub do_throw: DoThrowFn,
    pub trap: TrapFn,
}

/// A native "attempt" call described as data.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct TrapContext {
    pub routine: AttemptFn,
    pub context: *mut c_void,
}

impl TrapContext {
    /// # Safety
    /// `routine` must accept `context` for the duration of one call.
    pub unsafe fn call(self) {
        (self.routine)(self.context)
    }
}

static CALLBACKS: OnceCell<CallbackSlots> = OnceCell::new();

/// FFI: Fills the callback slots. Succeeds once per process; every later call
/// returns false and leaves the slots untouched.
#[no_mangle]
pub unsafe extern "C" fn cfish_install_callbacks(slots: *const CallbackSlots) -> bool {
    if slots.is_null() {
        return false;
    }
    let installed = CALLBACKS.set(*slots).is_ok();
    if installed {
        log::debug!("clownfish callback slots installed");
    }
    installed
}

/// FFI: Whether [`cfish_install_callbacks`] has succeeded.
#[no_mangle]
pub extern "C" fn cfish_callbacks_installed() -> bool {
    CALLBACKS.get().is_some()
}

/// FFI: New error taking over the caller's credit on `mess`. A null message
/// becomes the empty string.
#[no_mangle]
pub unsafe extern "C" fn cfish_err_new(mess: *mut CfString) -> *mut CfErr {
    let mess = if mess.is_null() { new_string("") } else { mess };
    into_native(CfErr {
        header: CfObj::header(&ERR),
        mess,
    })
}

/// FFI: The error's message, borrowed.
#[no_mangle]
pub unsafe extern "C" fn cfish_err_get_mess(err: *const CfErr) -> *mut CfString {
    if err.is_null() {
        return ptr::null_mut();
    }
    (*err).mess
}

/// FFI: Throws `err`, which stays owned by the caller.
///
/// Without an installed host the message goes to stderr and the process
/// exits with a failure status.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_err_do_throw(err: *mut CfErr) -> ! {
    match CALLBACKS.get() {
        Some(slots) => (slots.do_throw)(err),
        None => {
            let message = if err.is_null() {
                String::new()
            } else {
                String::from_utf8_lossy((*err).message().as_bytes()).into_owned()
            };
            log::error!("error thrown with no host installed: {}", message);
            eprintln!("{}", message);
            std::process::exit(1)
        }
    }
}

/// FFI: Creates an error around `mess` (taking over its credit) and throws it.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_err_throw_mess(mess: *mut CfString) -> ! {
    let err = Owned::new(cfish_err_new(mess));
    let err_ptr = err.as_ref().map_or(ptr::null_mut(), Owned::as_ptr);
    cfish_err_do_throw(err_ptr)
}

/// Throws a new error with `message`.
pub fn throw(message: impl AsRef<str>) -> ! {
    // SAFETY: `new_string` hands over a fresh credit which the error takes.
    unsafe { cfish_err_throw_mess(new_string(message.as_ref())) }
}

/// FFI: Runs `routine(context)` and returns any error it throws (one credit,
/// owned by the caller), or null on success. Aborts if no host is installed.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_err_trap(routine: AttemptFn, context: *mut c_void) -> *mut CfErr {
    match CALLBACKS.get() {
        Some(slots) => (slots.trap)(routine, context),
        None => {
            log::error!("cfish_err_trap called before the host installed its callbacks");
            eprintln!("clownfish: trap used before bootstrap");
            std::process::abort()
        }
    }
}

/// An error's string form is its message.
pub(crate) unsafe extern "C-unwind" fn err_to_string(obj: *mut CfObj) -> *mut CfString {
    let err = obj.cast::<CfErr>();
    cfish_inc_refcount((*err).mess.cast()).cast()
}

#[cfg(test)]
pub(crate) mod tests {
    //! A minimal host used by this crate's own tests: throw unwinds with the
    //! error pointer as payload, trap catches it.

    use super::*;
    use crate::object::cfish_get_refcount;
    use std::panic::{self, AssertUnwindSafe};

    struct Thrown(*mut CfErr);
    unsafe impl Send for Thrown {}

    unsafe extern "C-unwind" fn test_do_throw(err: *mut CfErr) -> ! {
        cfish_inc_refcount(err.cast());
        panic::resume_unwind(Box::new(Thrown(err)))
    }

    unsafe extern "C-unwind" fn test_trap(routine: AttemptFn, context: *mut c_void) -> *mut CfErr {
        match panic::catch_unwind(AssertUnwindSafe(|| routine(context))) {
            Ok(()) => ptr::null_mut(),
            Err(payload) => match payload.downcast::<Thrown>() {
                Ok(thrown) => thrown.0,
                Err(other) => panic::resume_unwind(other),
            },
        }
    }

    pub(crate) fn install_test_host() {
        let slots = CallbackSlots {
            do_throw: test_do_throw,
            trap: test_trap,
        };
        unsafe {
            cfish_install_callbacks(&slots);
        }
    }

    /// Runs `f` under `cfish_err_trap`.
    pub(crate) fn trap<F: FnMut()>(mut f: F) -> *mut CfErr {
        unsafe extern "C-unwind" fn call<F: FnMut()>(context: *mut c_void) {
            (*context.cast::<F>())()
        }
        install_test_host();
        unsafe { cfish_err_trap(call::<F>, (&mut f as *mut F).cast()) }
    }

    #[test]
    fn second_install_is_rejected() {
        install_test_host();
        assert!(cfish_callbacks_installed());
        let slots = CallbackSlots {
            do_throw: test_do_throw,
            trap: test_trap,
        };
        assert!(!unsafe { cfish_install_callbacks(&slots) });
    }

    #[test]
    fn thrower_credit_is_released_while_unwinding() {
        let err = trap(|| throw("boom"));
        assert!(!err.is_null());
        unsafe {
            assert_eq!((*err).message().as_bytes(), b"boom");
            // Only the trap's credit is left; the throwing frame gave its own back.
            assert_eq!(cfish_get_refcount(err.cast()), 1);
            cfish_dec_refcount(err.cast());
        }
    }

    #[test]
    fn trap_returns_null_on_success() {
        let mut ran = false;
        let err = trap(|| ran = true);
        assert!(err.is_null());
        assert!(ran);
    }

    #[test]
    fn invalid_utf8_throws() {
        let bytes = [0x66u8, 0xff, 0x6f];
        let err = trap(|| unsafe {
            crate::collections::string::cfish_str_new_from_utf8(bytes.as_ptr(), bytes.len());
        });
        assert!(!err.is_null());
        unsafe {
            let message = String::from_utf8_lossy((*err).message().as_bytes()).into_owned();
            assert!(message.starts_with("Invalid UTF-8"), "{message}");
            cfish_dec_refcount(err.cast());
        }
    }
}
