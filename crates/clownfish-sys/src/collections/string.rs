use std::ptr;
use std::slice;

use crate::class::STRING;
use crate::err::throw;
use crate::object::{cfish_inc_refcount, into_native, CfObj, NativeKind};

/// Immutable UTF-8 string. Owns its byte buffer.
#[repr(C)]
#[derive(Debug)]
pub struct CfString {
    header: CfObj,
    ptr: *mut u8,
    size: usize,
}

unsafe impl NativeKind for CfString {
    fn class() -> &'static crate::class::CfClass {
        &STRING
    }
}

impl CfString {
    fn from_boxed(bytes: Box<[u8]>) -> Self {
        let size = bytes.len();
        let ptr = Box::into_raw(bytes).cast::<u8>();
        CfString {
            header: CfObj::header(&STRING),
            ptr,
            size,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `ptr`/`size` come from a boxed slice owned by `self`.
        unsafe { slice::from_raw_parts(self.ptr, self.size) }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Drop for CfString {
    fn drop(&mut self) {
        // SAFETY: reconstructs the boxed slice handed over in `from_boxed`.
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(self.ptr, self.size)));
        }
    }
}

/// Borrowed view of a raw byte range. Null is accepted for empty input.
pub(crate) unsafe fn bytes_from_raw<'a>(ptr: *const u8, size: usize) -> &'a [u8] {
    if ptr.is_null() || size == 0 {
        &[]
    } else {
        slice::from_raw_parts(ptr, size)
    }
}

/// Rebuilds a boxed slice previously leaked by the caller.
unsafe fn boxed_from_raw(ptr: *mut u8, size: usize) -> Box<[u8]> {
    if ptr.is_null() {
        return Box::default();
    }
    Box::from_raw(ptr::slice_from_raw_parts_mut(ptr, size))
}

/// Copies `text` into a new native string (refcount 1).
pub fn new_string(text: &str) -> *mut CfString {
    into_native(CfString::from_boxed(text.as_bytes().into()))
}

/// FFI: Copies and validates `size` bytes. Throws on invalid UTF-8.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_str_new_from_utf8(ptr: *const u8, size: usize) -> *mut CfString {
    let bytes = bytes_from_raw(ptr, size);
    if let Err(e) = std::str::from_utf8(bytes) {
        throw(format!("Invalid UTF-8 at byte {}", e.valid_up_to()));
    }
    into_native(CfString::from_boxed(bytes.into()))
}

/// FFI: Copies `size` bytes the caller guarantees are valid UTF-8.
#[no_mangle]
pub unsafe extern "C" fn cfish_str_new_from_trusted_utf8(ptr: *const u8, size: usize) -> *mut CfString {
    into_native(CfString::from_boxed(bytes_from_raw(ptr, size).into()))
}

/// FFI: Takes ownership of a boxed byte slice (`Box<[u8]>` leaked by the
/// caller) after validating it. On invalid UTF-8 the buffer is freed and an
/// error is thrown.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_str_new_steal_utf8(ptr: *mut u8, size: usize) -> *mut CfString {
    let bytes = boxed_from_raw(ptr, size);
    if let Err(e) = std::str::from_utf8(&bytes) {
        drop(bytes);
        throw(format!("Invalid UTF-8 at byte {}", e.valid_up_to()));
    }
    into_native(CfString::from_boxed(bytes))
}

/// FFI: Takes ownership of a boxed byte slice without validation.
#[no_mangle]
pub unsafe extern "C" fn cfish_str_new_steal_trusted_utf8(ptr: *mut u8, size: usize) -> *mut CfString {
    into_native(CfString::from_boxed(boxed_from_raw(ptr, size)))
}

/// FFI: Start of the string's bytes. Valid while the string lives.
#[no_mangle]
pub unsafe extern "C" fn cfish_str_get_ptr8(string: *const CfString) -> *const u8 {
    if string.is_null() {
        return ptr::null();
    }
    (*string).ptr
}

/// FFI: Length in bytes.
#[no_mangle]
pub unsafe extern "C" fn cfish_str_get_size(string: *const CfString) -> usize {
    if string.is_null() {
        return 0;
    }
    (*string).size
}

/// FFI: Byte-wise equality.
#[no_mangle]
pub unsafe extern "C" fn cfish_str_equals(a: *const CfString, b: *const CfString) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => true,
        (false, false) => (*a).as_bytes() == (*b).as_bytes(),
        _ => false,
    }
}

/// FFI: New string holding `a` followed by `b`.
#[no_mangle]
pub unsafe extern "C" fn cfish_str_cat(a: *const CfString, b: *const CfString) -> *mut CfString {
    let mut joined = Vec::with_capacity(cfish_str_get_size(a) + cfish_str_get_size(b));
    for part in [a, b] {
        if !part.is_null() {
            joined.extend_from_slice((*part).as_bytes());
        }
    }
    into_native(CfString::from_boxed(joined.into_boxed_slice()))
}

/// A string is its own string form; hands out another credit.
pub(crate) unsafe extern "C-unwind" fn str_to_string(obj: *mut CfObj) -> *mut CfString {
    cfish_inc_refcount(obj).cast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{cfish_dec_refcount, cfish_get_refcount};
    use memoffset::offset_of;

    #[test]
    fn header_is_first_field() {
        assert_eq!(offset_of!(CfString, header), 0);
    }

    #[test]
    fn trusted_copy_keeps_bytes() {
        let text = "héllo";
        unsafe {
            let s = cfish_str_new_from_trusted_utf8(text.as_ptr(), text.len());
            assert_eq!(cfish_str_get_size(s), 6);
            assert_eq!((*s).as_bytes(), text.as_bytes());
            assert_eq!(cfish_dec_refcount(s.cast()), 0);
        }
    }

    #[test]
    fn steal_takes_the_buffer_without_copying() {
        let boxed: Box<[u8]> = b"stolen".to_vec().into_boxed_slice();
        let original = boxed.as_ptr();
        let len = boxed.len();
        unsafe {
            let s = cfish_str_new_steal_trusted_utf8(Box::into_raw(boxed).cast(), len);
            assert_eq!(cfish_str_get_ptr8(s), original);
            cfish_dec_refcount(s.cast());
        }
    }

    #[test]
    fn empty_and_null_inputs() {
        unsafe {
            let a = cfish_str_new_from_trusted_utf8(ptr::null(), 0);
            let b = cfish_str_new_steal_trusted_utf8(ptr::null_mut(), 0);
            assert!((*a).is_empty());
            assert!(cfish_str_equals(a, b));
            cfish_dec_refcount(a.cast());
            cfish_dec_refcount(b.cast());
        }
    }

    #[test]
    fn cat_and_self_to_string() {
        unsafe {
            let a = new_string("foo");
            let b = new_string("bar");
            let joined = cfish_str_cat(a, b);
            assert_eq!((*joined).as_bytes(), b"foobar");

            let same = str_to_string(a.cast());
            assert_eq!(same, a);
            assert_eq!(cfish_get_refcount(a.cast()), 2);

            for s in [a, a, b, joined] {
                cfish_dec_refcount(s.cast());
            }
        }
    }
}
