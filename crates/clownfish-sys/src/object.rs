use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, Ordering};

use crate::class::{CfClass, OBJ};
use crate::collections::string::{new_string, CfString};

/// Header placed at offset zero of every native allocation.
///
/// The host never looks inside; it only passes `*mut CfObj` values back
/// through the exported functions.
#[repr(C)]
#[derive(Debug)]
pub struct CfObj {
    pub(crate) refcount: AtomicU32,
    pub(crate) klass: *const CfClass,
}

impl CfObj {
    /// Fresh header owned by the creator (refcount 1).
    pub(crate) fn header(klass: &'static CfClass) -> Self {
        CfObj {
            refcount: AtomicU32::new(1),
            klass,
        }
    }

    pub fn klass(&self) -> &'static CfClass {
        // SAFETY: `klass` always points at one of the static class singletons.
        unsafe { &*self.klass }
    }
}

/// Implemented by every `#[repr(C)]` native kind whose first field is a
/// [`CfObj`] header, so a `*mut Self` may be reinterpreted as `*mut CfObj`.
///
/// # Safety
/// The implementing type must be `#[repr(C)]` with a `CfObj` as its first
/// field, and must only ever be allocated through [`into_native`].
pub unsafe trait NativeKind {
    fn class() -> &'static CfClass;
}

unsafe impl NativeKind for CfObj {
    fn class() -> &'static CfClass {
        &OBJ
    }
}

/// Moves a freshly built object onto the heap and hands out its only credit.
pub(crate) fn into_native<T: NativeKind>(value: T) -> *mut T {
    Box::into_raw(Box::new(value))
}

/// Destroy routine stored in each class: frees an allocation made by
/// [`into_native`].
pub(crate) unsafe fn destroy<T: NativeKind>(obj: *mut CfObj) {
    drop(Box::from_raw(obj.cast::<T>()));
}

/// Owning reference used by native frames.
///
/// Dropping it gives the credit back, which also happens while a host
/// unwind passes through the frame holding it.
pub(crate) struct Owned<T: NativeKind>(NonNull<T>);

impl<T: NativeKind> Owned<T> {
    /// Takes over the caller's credit. Returns `None` for null.
    pub(crate) unsafe fn new(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(Owned)
    }

    /// Takes a new credit on a borrowed object.
    pub(crate) unsafe fn retain(ptr: *mut T) -> Option<Self> {
        let owned = NonNull::new(ptr).map(Owned)?;
        cfish_inc_refcount(owned.as_obj());
        Some(owned)
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.0.as_ptr()
    }

    pub(crate) fn as_obj(&self) -> *mut CfObj {
        self.0.as_ptr().cast()
    }

    /// Gives up the guard without releasing the credit.
    pub(crate) fn into_raw(self) -> *mut T {
        let ptr = self.0.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

impl<T: NativeKind> Drop for Owned<T> {
    fn drop(&mut self) {
        // SAFETY: the guard holds exactly one credit on a live object.
        unsafe {
            cfish_dec_refcount(self.as_obj());
        }
    }
}

/// FFI: Takes an additional credit. Returns `obj` for chaining.
#[no_mangle]
pub unsafe extern "C" fn cfish_inc_refcount(obj: *mut CfObj) -> *mut CfObj {
    if !obj.is_null() {
        (*obj).refcount.fetch_add(1, Ordering::Relaxed);
    }
    obj
}

/// FFI: Gives one credit back and returns the remaining count. The object is
/// destroyed when the count reaches zero. Null is ignored.
#[no_mangle]
pub unsafe extern "C" fn cfish_dec_refcount(obj: *mut CfObj) -> u32 {
    if obj.is_null() {
        return 0;
    }
    let prev = (*obj).refcount.fetch_sub(1, Ordering::Release);
    debug_assert!(prev > 0, "refcount underflow on {:p}", obj);
    if prev == 1 {
        // Pairs with the Release above so every prior write is visible to destroy.
        fence(Ordering::Acquire);
        let klass = (*obj).klass();
        log::trace!("destroying {} at {:p}", klass.name(), obj);
        (klass.destroy)(obj);
    }
    prev.wrapping_sub(1)
}

/// FFI: Current refcount, or 0 for null.
#[no_mangle]
pub unsafe extern "C" fn cfish_get_refcount(obj: *const CfObj) -> u32 {
    if obj.is_null() {
        return 0;
    }
    (*obj).refcount.load(Ordering::Acquire)
}

/// FFI: Class of `obj`, or null for null.
#[no_mangle]
pub unsafe extern "C" fn cfish_obj_get_class(obj: *const CfObj) -> *const CfClass {
    if obj.is_null() {
        return ptr::null();
    }
    (*obj).klass
}

/// FFI: Whether `obj` is an instance of `klass` or one of its subclasses.
#[no_mangle]
pub unsafe extern "C" fn cfish_obj_is_a(obj: *const CfObj, klass: *const CfClass) -> bool {
    if obj.is_null() || klass.is_null() {
        return false;
    }
    (*obj).klass().is_subclass_of(&*klass)
}

/// FFI: Normalizing conversion to a new string (refcount 1, owned by the
/// caller). May throw, depending on the class.
#[no_mangle]
pub unsafe extern "C-unwind" fn cfish_obj_to_string(obj: *mut CfObj) -> *mut CfString {
    if obj.is_null() {
        return new_string("NULL");
    }
    ((*obj).klass().to_string)(obj)
}

/// Default `to_string`: `<class name>@<address>`.
pub(crate) unsafe extern "C-unwind" fn obj_to_string(obj: *mut CfObj) -> *mut CfString {
    let klass = (*obj).klass();
    new_string(&format!("{}@{:p}", klass.name(), obj))
}
