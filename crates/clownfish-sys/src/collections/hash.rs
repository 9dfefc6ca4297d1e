use std::ptr;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::class::HASH;
use crate::collections::string::bytes_from_raw;
use crate::err::throw;
use crate::object::{cfish_dec_refcount, cfish_inc_refcount, into_native, CfObj, NativeKind, Owned};

/// String-keyed map owning its values.
#[repr(C)]
#[derive(Debug)]
pub struct CfHash {
    header: CfObj,
    map: RwLock<FxHashMap<Box<str>, *mut CfObj>>,
}

unsafe impl NativeKind for CfHash {
    fn class() -> &'static crate::class::CfClass {
        &HASH
    }
}

impl CfHash {
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Drop for CfHash {
    fn drop(&mut self) {
        // SAFETY: every value carries one credit owned by the hash.
        unsafe {
            for (_, value) in self.map.get_mut().drain() {
                cfish_dec_refcount(value);
            }
        }
    }
}

/// Validates a raw key, throwing on invalid UTF-8.
unsafe fn key_from_raw<'a>(key: *const u8, key_len: usize) -> &'a str {
    match std::str::from_utf8(bytes_from_raw(key, key_len)) {
        Ok(key) => key,
        Err(_) => throw("Invalid UTF-8 in hash key"),
    }
}

#[no_mangle]
pub extern "C" fn cfish_hash_new(capacity: usize) -> *mut CfHash {
    let map = FxHashMap::with_capacity_and_hasher(capacity, Default::default());
    into_native(CfHash {
        header: CfObj::header(&HASH),
        map: RwLock::new(map),
    })
}

/// FFI: Stores `value` under `key`, taking over the caller's credit. A
/// previous value is released. Throws on an invalid key, in which case
/// `value` is released too.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_hash_store_utf8(
    hash: *mut CfHash,
    key: *const u8,
    key_len: usize,
    value: *mut CfObj,
) {
    let value = Owned::new(value);
    let key = key_from_raw(key, key_len);
    let value = value.map_or(ptr::null_mut(), Owned::into_raw);
    let old = (*hash).map.write().insert(key.into(), value);
    if let Some(old) = old {
        cfish_dec_refcount(old);
    }
}

/// FFI: Value under `key`, borrowed; null when absent.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_hash_fetch_utf8(
    hash: *const CfHash,
    key: *const u8,
    key_len: usize,
) -> *mut CfObj {
    let key = key_from_raw(key, key_len);
    (*hash).map.read().get(key).copied().unwrap_or(ptr::null_mut())
}

/// FFI: Value under `key` with a new credit owned by the caller, taken while
/// the map is locked; null when absent.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_hash_fetch_retained_utf8(
    hash: *const CfHash,
    key: *const u8,
    key_len: usize,
) -> *mut CfObj {
    let key = key_from_raw(key, key_len);
    let map = (*hash).map.read();
    let value = map.get(key).copied().unwrap_or(ptr::null_mut());
    cfish_inc_refcount(value)
}

/// FFI: Removes `key` and returns its value with the hash's credit handed to
/// the caller; null when absent.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_hash_delete_utf8(
    hash: *mut CfHash,
    key: *const u8,
    key_len: usize,
) -> *mut CfObj {
    let key = key_from_raw(key, key_len);
    (*hash).map.write().remove(key).unwrap_or(ptr::null_mut())
}

#[no_mangle]
pub unsafe extern "C" fn cfish_hash_get_size(hash: *const CfHash) -> usize {
    if hash.is_null() {
        return 0;
    }
    (*hash).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::string::new_string;
    use crate::err::tests::trap;
    use crate::object::{cfish_get_refcount, cfish_inc_refcount};

    #[test]
    fn store_replace_delete() {
        unsafe {
            let hash = cfish_hash_new(0);
            let value = new_string("v1").cast::<CfObj>();
            cfish_hash_store_utf8(hash, b"k".as_ptr(), 1, cfish_inc_refcount(value));
            assert_eq!(cfish_get_refcount(value), 2);
            assert_eq!(cfish_hash_fetch_utf8(hash, b"k".as_ptr(), 1), value);

            cfish_hash_store_utf8(hash, b"k".as_ptr(), 1, new_string("v2").cast());
            assert_eq!(cfish_get_refcount(value), 1);
            assert_eq!(cfish_hash_get_size(hash), 1);

            let removed = cfish_hash_delete_utf8(hash, b"k".as_ptr(), 1);
            assert!(!removed.is_null());
            assert_eq!(cfish_hash_get_size(hash), 0);
            assert!(cfish_hash_fetch_utf8(hash, b"k".as_ptr(), 1).is_null());

            for obj in [removed, value, hash.cast()] {
                cfish_dec_refcount(obj);
            }
        }
    }

    #[test]
    fn bad_key_releases_value() {
        unsafe {
            let hash = cfish_hash_new(0);
            let value = new_string("v").cast::<CfObj>();
            let bad = [0xffu8];
            let err = trap(|| {
                cfish_hash_store_utf8(hash, bad.as_ptr(), bad.len(), cfish_inc_refcount(value));
            });
            assert!(!err.is_null());
            assert_eq!(cfish_get_refcount(value), 1);
            assert_eq!(cfish_hash_get_size(hash), 0);
            for obj in [err.cast(), value, hash.cast()] {
                cfish_dec_refcount(obj);
            }
        }
    }

    #[test]
    fn retained_fetch_outlives_replacement() {
        unsafe {
            let hash = cfish_hash_new(0);
            cfish_hash_store_utf8(hash, b"k".as_ptr(), 1, new_string("v1").cast());
            let held = cfish_hash_fetch_retained_utf8(hash, b"k".as_ptr(), 1);
            assert_eq!(cfish_get_refcount(held), 2);

            cfish_hash_store_utf8(hash, b"k".as_ptr(), 1, new_string("v2").cast());
            assert_eq!(cfish_get_refcount(held), 1);
            assert_eq!((*held.cast::<crate::collections::string::CfString>()).as_bytes(), b"v1");
            assert!(cfish_hash_fetch_retained_utf8(hash, b"x".as_ptr(), 1).is_null());

            cfish_dec_refcount(held);
            cfish_dec_refcount(hash.cast());
        }
    }
}
