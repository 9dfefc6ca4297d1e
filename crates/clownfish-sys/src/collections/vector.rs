use std::ffi::c_void;
use std::ptr;

use parking_lot::Mutex;

use crate::class::VECTOR;
use crate::collections::string::{new_string, CfString};
use crate::object::{cfish_dec_refcount, cfish_obj_to_string, into_native, CfObj, NativeKind, Owned};

/// Ordered list of owned elements. Null elements are allowed.
///
/// Elements are only ever appended, so a fetched element stays alive for as
/// long as the vector does.
#[repr(C)]
#[derive(Debug)]
pub struct CfVector {
    header: CfObj,
    elems: Mutex<Vec<*mut CfObj>>,
}

unsafe impl NativeKind for CfVector {
    fn class() -> &'static crate::class::CfClass {
        &VECTOR
    }
}

impl CfVector {
    pub fn len(&self) -> usize {
        self.elems.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.lock().is_empty()
    }

    fn get(&self, tick: usize) -> *mut CfObj {
        self.elems.lock().get(tick).copied().unwrap_or(ptr::null_mut())
    }

    /// Every element with a credit of its own, taken under the lock.
    unsafe fn snapshot(&self) -> Vec<Option<Owned<CfObj>>> {
        self.elems.lock().iter().map(|elem| Owned::retain(*elem)).collect()
    }
}

impl Drop for CfVector {
    fn drop(&mut self) {
        // SAFETY: each element carries one credit owned by the vector.
        unsafe {
            for elem in self.elems.get_mut().drain(..) {
                cfish_dec_refcount(elem);
            }
        }
    }
}

/// Host visitor for [`cfish_vec_for_each`]: `visit(context, elem, tick)`.
/// `elem` is borrowed for the duration of the call.
pub type VisitFn = unsafe extern "C-unwind" fn(context: *mut c_void, elem: *mut CfObj, tick: usize);

#[no_mangle]
pub extern "C" fn cfish_vec_new(capacity: usize) -> *mut CfVector {
    into_native(CfVector {
        header: CfObj::header(&VECTOR),
        elems: Mutex::new(Vec::with_capacity(capacity)),
    })
}

/// FFI: Appends `elem`, taking over the caller's credit.
#[no_mangle]
pub unsafe extern "C" fn cfish_vec_push(vec: *mut CfVector, elem: *mut CfObj) {
    (*vec).elems.lock().push(elem);
}

/// FFI: Element at `tick`, borrowed; null when out of range.
#[no_mangle]
pub unsafe extern "C" fn cfish_vec_fetch(vec: *const CfVector, tick: usize) -> *mut CfObj {
    (*vec).get(tick)
}

#[no_mangle]
pub unsafe extern "C" fn cfish_vec_get_size(vec: *const CfVector) -> usize {
    if vec.is_null() {
        return 0;
    }
    (*vec).len()
}

/// FFI: Calls `visit` once per element, in order. The visitor may throw; the
/// vector and the element being visited stay alive until the call returns or
/// the unwind has passed this frame. The lock is not held during `visit`, so
/// the visitor may push onto the same vector.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_vec_for_each(vec: *mut CfVector, visit: VisitFn, context: *mut c_void) {
    let Some(vec) = Owned::retain(vec) else {
        return;
    };
    let mut tick = 0;
    while tick < (*vec.as_ptr()).len() {
        let elem = (*vec.as_ptr()).get(tick);
        let held = Owned::<CfObj>::retain(elem);
        visit(context, elem, tick);
        drop(held);
        tick += 1;
    }
}

/// `[a, b, ...]` built from each element's string form.
pub(crate) unsafe extern "C-unwind" fn vec_to_string(obj: *mut CfObj) -> *mut CfString {
    let vec = obj.cast::<CfVector>();
    // Converted outside the lock: an element's conversion may reach this
    // vector again.
    let elems = (*vec).snapshot();
    let mut out = String::from("[");
    for (tick, elem) in elems.iter().enumerate() {
        if tick > 0 {
            out.push_str(", ");
        }
        let elem = elem.as_ref().map_or(ptr::null_mut(), Owned::as_obj);
        let part = Owned::new(cfish_obj_to_string(elem));
        if let Some(part) = &part {
            out.push_str(&String::from_utf8_lossy((*part.as_ptr()).as_bytes()));
        }
    }
    out.push(']');
    new_string(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::bytebuf::cfish_bb_new;
    use crate::err::tests::trap;
    use crate::object::cfish_get_refcount;

    #[test]
    fn to_string_joins_elements() {
        unsafe {
            let vec = cfish_vec_new(2);
            cfish_vec_push(vec, new_string("a").cast());
            cfish_vec_push(vec, new_string("b").cast());
            cfish_vec_push(vec, ptr::null_mut());
            let s = cfish_obj_to_string(vec.cast());
            assert_eq!((*s).as_bytes(), b"[a, b, NULL]");
            cfish_dec_refcount(s.cast());
            cfish_dec_refcount(vec.cast());
        }
    }

    #[test]
    fn failing_element_conversion_releases_temporaries() {
        let bad = [0xc3u8];
        unsafe {
            let vec = cfish_vec_new(2);
            let first = new_string("ok");
            cfish_vec_push(vec, crate::object::cfish_inc_refcount(first.cast()));
            cfish_vec_push(vec, cfish_bb_new(bad.as_ptr(), bad.len()).cast());

            let err = trap(|| {
                cfish_obj_to_string(vec.cast());
            });
            assert!(!err.is_null());
            assert_eq!(cfish_get_refcount(first.cast()), 2);
            assert_eq!(cfish_get_refcount(vec.cast()), 1);

            cfish_dec_refcount(err.cast());
            cfish_dec_refcount(vec.cast());
            assert_eq!(cfish_get_refcount(first.cast()), 1);
            cfish_dec_refcount(first.cast());
        }
    }
}
