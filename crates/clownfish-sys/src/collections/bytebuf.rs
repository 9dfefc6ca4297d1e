use std::ptr;
use std::slice;

use crate::class::BYTEBUF;
use crate::collections::string::{bytes_from_raw, cfish_str_new_from_utf8, CfString};
use crate::object::{into_native, CfObj, NativeKind};

/// Growable-in-principle byte buffer; arbitrary bytes.
#[repr(C)]
#[derive(Debug)]
pub struct CfByteBuf {
    header: CfObj,
    buf: *mut u8,
    size: usize,
}

unsafe impl NativeKind for CfByteBuf {
    fn class() -> &'static crate::class::CfClass {
        &BYTEBUF
    }
}

impl CfByteBuf {
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `buf`/`size` describe a boxed slice owned by `self`.
        unsafe { slice::from_raw_parts(self.buf, self.size) }
    }
}

impl Drop for CfByteBuf {
    fn drop(&mut self) {
        // SAFETY: reconstructs the boxed slice leaked in `cfish_bb_new`.
        unsafe {
            drop(Box::from_raw(ptr::slice_from_raw_parts_mut(self.buf, self.size)));
        }
    }
}

/// FFI: Copies `size` bytes into a new buffer.
#[no_mangle]
pub unsafe extern "C" fn cfish_bb_new(bytes: *const u8, size: usize) -> *mut CfByteBuf {
    let boxed: Box<[u8]> = bytes_from_raw(bytes, size).into();
    let size = boxed.len();
    into_native(CfByteBuf {
        header: CfObj::header(&BYTEBUF),
        buf: Box::into_raw(boxed).cast(),
        size,
    })
}

#[no_mangle]
pub unsafe extern "C" fn cfish_bb_get_buf(bb: *const CfByteBuf) -> *const u8 {
    if bb.is_null() {
        return ptr::null();
    }
    (*bb).buf
}

#[no_mangle]
pub unsafe extern "C" fn cfish_bb_get_size(bb: *const CfByteBuf) -> usize {
    if bb.is_null() {
        return 0;
    }
    (*bb).size
}

/// Decodes the buffer as UTF-8; throws if it is not.
pub(crate) unsafe extern "C-unwind" fn bb_to_string(obj: *mut CfObj) -> *mut CfString {
    let bb = obj.cast::<CfByteBuf>();
    cfish_str_new_from_utf8((*bb).buf, (*bb).size)
}
