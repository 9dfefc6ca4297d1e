use std::ffi::c_void;
use std::slice;

use clownfish_sys::{
    cfish_bb_get_buf, cfish_bb_get_size, cfish_bb_new, cfish_hash_delete_utf8, cfish_hash_fetch_retained_utf8,
    cfish_hash_get_size, cfish_hash_new, cfish_hash_store_utf8, cfish_vec_fetch, cfish_vec_for_each,
    cfish_vec_get_size, cfish_vec_new, cfish_vec_push, CfByteBuf, CfHash, CfObj, CfVector, NativeKind,
};

use crate::handle::Handle;
use crate::runtime::bootstrap;

impl Handle<CfByteBuf> {
    /// Copies `bytes` into a new native buffer.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        bootstrap();
        // SAFETY: `bytes` is valid for reads; the constructor never returns null.
        unsafe { Handle::adopt(cfish_bb_new(bytes.as_ptr(), bytes.len())) }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let ptr = self.live();
        // SAFETY: the buffer lives as long as our credit.
        unsafe {
            let size = cfish_bb_get_size(ptr);
            if size == 0 {
                return Vec::new();
            }
            slice::from_raw_parts(cfish_bb_get_buf(ptr), size).to_vec()
        }
    }
}

impl Handle<CfVector> {
    pub fn new_vector(capacity: usize) -> Self {
        bootstrap();
        // SAFETY: fresh object with one credit.
        unsafe { Handle::adopt(cfish_vec_new(capacity)) }
    }

    /// Appends `elem`, moving its credit into the vector.
    pub fn push<U: NativeKind>(&mut self, elem: Handle<U>) {
        // SAFETY: `elem`'s credit is handed over; null stores a null slot.
        unsafe { cfish_vec_push(self.live(), elem.into_raw().cast()) }
    }

    /// Element at `tick` with a credit of its own; `None` when out of range
    /// or the slot is null.
    pub fn fetch(&self, tick: usize) -> Option<Handle<CfObj>> {
        // SAFETY: the element is borrowed from a vector we keep alive.
        unsafe { Handle::from_borrowed(cfish_vec_fetch(self.live(), tick)).ok() }
    }

    pub fn len(&self) -> usize {
        // SAFETY: null or live.
        unsafe { cfish_vec_get_size(self.as_ptr()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every element through the native iterator. `visit` may raise;
    /// the native frames between here and the raise release what they hold.
    pub fn for_each<F: FnMut(usize, Option<Handle<CfObj>>)>(&self, mut visit: F) {
        unsafe extern "C-unwind" fn call<F: FnMut(usize, Option<Handle<CfObj>>)>(
            context: *mut c_void,
            elem: *mut CfObj,
            tick: usize,
        ) {
            let visit = &mut *context.cast::<F>();
            visit(tick, Handle::from_borrowed(elem).ok());
        }

        // SAFETY: `visit` outlives the call and `call::<F>` matches its type.
        unsafe { cfish_vec_for_each(self.live(), call::<F>, (&mut visit as *mut F).cast()) }
    }
}

impl Handle<CfHash> {
    pub fn new_hash(capacity: usize) -> Self {
        bootstrap();
        // SAFETY: fresh object with one credit.
        unsafe { Handle::adopt(cfish_hash_new(capacity)) }
    }

    /// Stores `value` under `key`, moving its credit into the hash.
    pub fn store<U: NativeKind>(&mut self, key: &str, value: Handle<U>) {
        // SAFETY: `key` is valid UTF-8 so the store cannot throw.
        unsafe { cfish_hash_store_utf8(self.live(), key.as_ptr(), key.len(), value.into_raw().cast()) }
    }

    /// Value under `key` with a credit of its own. The credit is taken under
    /// the hash's lock, so a concurrent `store` through another handle cannot
    /// free the value first.
    pub fn fetch(&self, key: &str) -> Option<Handle<CfObj>> {
        // SAFETY: the retained fetch hands us one credit.
        unsafe { Handle::from_raw(cfish_hash_fetch_retained_utf8(self.live(), key.as_ptr(), key.len())).ok() }
    }

    /// Removes `key`, handing its value's credit to the caller.
    pub fn delete(&mut self, key: &str) -> Option<Handle<CfObj>> {
        // SAFETY: a removed value carries the hash's former credit.
        unsafe { Handle::from_raw(cfish_hash_delete_utf8(self.live(), key.as_ptr(), key.len())).ok() }
    }

    pub fn len(&self) -> usize {
        // SAFETY: null or live.
        unsafe { cfish_hash_get_size(self.as_ptr()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use clownfish_sys::CfString;

    use super::*;

    #[test]
    fn vector_holds_credits() {
        let elem = Handle::<CfString>::from("elem");
        let mut vec = Handle::<CfVector>::new_vector(2);
        vec.push(elem.clone());
        vec.push(Handle::<CfByteBuf>::from_bytes(b"raw"));
        assert_eq!(vec.len(), 2);
        assert_eq!(elem.refcount(), 2);

        let fetched = vec.fetch(0).unwrap();
        assert_eq!(fetched.as_obj_ptr(), elem.as_obj_ptr());
        assert_eq!(elem.refcount(), 3);
        assert!(vec.fetch(9).is_none());
        assert_eq!(vec.to_host_text(), "[elem, raw]");

        drop(fetched);
        drop(vec);
        assert_eq!(elem.refcount(), 1);
    }

    #[test]
    fn for_each_visits_in_order() {
        let mut vec = Handle::<CfVector>::new_vector(0);
        for text in ["a", "b", "c"] {
            vec.push(Handle::<CfString>::from(text));
        }
        let mut seen = Vec::new();
        vec.for_each(|tick, elem| seen.push((tick, elem.map(|e| e.to_host_text()))));
        assert_eq!(
            seen,
            vec![(0, Some("a".to_string())), (1, Some("b".to_string())), (2, Some("c".to_string()))]
        );
    }

    #[test]
    fn hash_store_fetch_delete() {
        let mut hash = Handle::<CfHash>::new_hash(4);
        hash.store("answer", Handle::<CfString>::from("42"));
        assert_eq!(hash.len(), 1);
        assert_eq!(hash.fetch("answer").unwrap().to_host_text(), "42");
        assert!(hash.fetch("missing").is_none());

        let removed = hash.delete("answer").unwrap();
        assert_eq!(removed.refcount(), 1);
        assert!(hash.is_empty());
        assert!(hash.delete("answer").is_none());
    }

    #[test]
    fn bytebuf_copies_bytes() {
        let bb = Handle::<CfByteBuf>::from_bytes(&[0, 1, 2, 255]);
        assert_eq!(bb.to_vec(), vec![0, 1, 2, 255]);
        assert!(Handle::<CfByteBuf>::from_bytes(&[]).to_vec().is_empty());
    }
}
