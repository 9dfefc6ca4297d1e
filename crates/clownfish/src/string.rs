use std::slice;

use clownfish_sys::{
    cfish_obj_is_a, cfish_obj_to_string, cfish_str_equals, cfish_str_get_ptr8, cfish_str_get_size,
    cfish_str_new_steal_trusted_utf8, CfObj, CfString, NativeKind, STRING,
};

use crate::handle::Handle;
use crate::runtime::bootstrap;

/// Moves host text into a new native string without copying.
///
/// The text's buffer is handed to the native side, which frees it when the
/// string is destroyed.
pub fn from_host_text(text: impl Into<String>) -> Handle<CfString> {
    bootstrap();
    let bytes = text.into().into_boxed_str().into_boxed_bytes();
    let size = bytes.len();
    let ptr = Box::into_raw(bytes).cast::<u8>();
    // SAFETY: the boxed slice is handed over whole and is valid UTF-8; the
    // constructor never returns null.
    unsafe { Handle::adopt(cfish_str_new_steal_trusted_utf8(ptr, size)) }
}

/// Copies the text form of any native object into host memory.
///
/// Null yields the empty string. Strings are copied directly; anything else
/// goes through its class's string conversion, which may throw.
///
/// # Safety
/// `obj` must be null or point at a live native object.
pub unsafe fn to_host_text(obj: *mut CfObj) -> String {
    if obj.is_null() {
        return String::new();
    }
    if cfish_obj_is_a(obj, &STRING) {
        return copy_out(obj.cast());
    }
    // Released on every path, including an unwind out of the copy.
    let converted = Handle::adopt(cfish_obj_to_string(obj));
    copy_out(converted.as_ptr())
}

unsafe fn copy_out(string: *const CfString) -> String {
    let ptr = cfish_str_get_ptr8(string);
    let size = cfish_str_get_size(string);
    if size == 0 {
        return String::new();
    }
    let bytes = slice::from_raw_parts(ptr, size);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(err) => {
            // Only reachable through a trusted constructor fed bad bytes.
            debug_assert!(false, "native string holds invalid UTF-8: {}", err);
            log::warn!("Native string holds invalid UTF-8 ({}); replacing bad sequences", err);
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

impl<T: NativeKind> Handle<T> {
    /// Text form of the wrapped object; empty once released.
    pub fn to_host_text(&self) -> String {
        // SAFETY: null or a live object kept alive by our credit.
        unsafe { to_host_text(self.as_obj_ptr()) }
    }
}

impl Handle<CfString> {
    /// Size in bytes; 0 once released.
    pub fn len(&self) -> usize {
        // SAFETY: as above.
        unsafe { cfish_str_get_size(self.as_ptr()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Handle<CfString> {
    fn eq(&self, other: &Self) -> bool {
        // SAFETY: both null or live.
        unsafe { cfish_str_equals(self.as_ptr(), other.as_ptr()) }
    }
}

impl From<String> for Handle<CfString> {
    fn from(text: String) -> Self {
        from_host_text(text)
    }
}

impl From<&str> for Handle<CfString> {
    fn from(text: &str) -> Self {
        from_host_text(text)
    }
}
