use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use clownfish_sys::{cfish_dec_refcount, cfish_get_refcount, cfish_inc_refcount, CfClass, CfObj, NativeKind};

use crate::error::BridgeError;

/// Host proxy owning one refcount credit on a native object.
///
/// The credit is given back exactly once: by [`Handle::release`], by
/// [`Handle::into_raw`] handing it on, or by `Drop`. After release the handle
/// holds null and every pointer-taking operation reports
/// [`BridgeError::Released`].
pub struct Handle<T: NativeKind> {
    ptr: AtomicPtr<T>,
    _kind: PhantomData<T>,
}

// SAFETY: refcount updates are atomic and the pointer swap is atomic. Clones
// share the native object, so every native kind with mutable storage
// (vectors, hashes) guards it behind its own lock.
unsafe impl<T: NativeKind> Send for Handle<T> {}
unsafe impl<T: NativeKind> Sync for Handle<T> {}

impl<T: NativeKind> Handle<T> {
    /// Wraps a pointer whose credit the caller hands over.
    ///
    /// # Safety
    /// `ptr` must be null or point at a live `T` carrying one credit that
    /// the caller gives up.
    pub unsafe fn from_raw(ptr: *mut T) -> Result<Self, BridgeError> {
        if ptr.is_null() {
            return Err(BridgeError::NullPointer);
        }
        Ok(Self::adopt(ptr))
    }

    /// Wraps a borrowed pointer, taking a new credit on it.
    ///
    /// # Safety
    /// `ptr` must be null or point at a live `T`.
    pub unsafe fn from_borrowed(ptr: *mut T) -> Result<Self, BridgeError> {
        if ptr.is_null() {
            return Err(BridgeError::NullPointer);
        }
        cfish_inc_refcount(ptr.cast());
        Ok(Self::adopt(ptr))
    }

    /// Wraps a freshly returned pointer without a null check. A null pointer
    /// yields an already-released handle.
    pub(crate) unsafe fn adopt(ptr: *mut T) -> Self {
        Handle {
            ptr: AtomicPtr::new(ptr),
            _kind: PhantomData,
        }
    }

    /// Raw pointer, or null once released. The handle keeps its credit.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.load(Ordering::Acquire)
    }

    pub fn as_obj_ptr(&self) -> *mut CfObj {
        self.as_ptr().cast()
    }

    /// Raw pointer for passing to native code, or an error once released.
    pub fn to_ptr(&self) -> Result<NonNull<T>, BridgeError> {
        NonNull::new(self.as_ptr()).ok_or(BridgeError::Released)
    }

    /// Pointer for the typed wrappers; use after release is a host bug.
    pub(crate) fn live(&self) -> *mut T {
        match self.to_ptr() {
            Ok(ptr) => ptr.as_ptr(),
            Err(err) => panic!("{}", err),
        }
    }

    pub fn is_released(&self) -> bool {
        self.as_ptr().is_null()
    }

    /// Gives the credit back now. Returns `false` if it was already given
    /// back; repeated calls never decrement twice.
    pub fn release(&mut self) -> bool {
        let ptr = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            return false;
        }
        log::trace!("Releasing {} at {:p}", T::class().name(), ptr);
        // SAFETY: the swap took sole ownership of the credit.
        unsafe {
            cfish_dec_refcount(ptr.cast());
        }
        true
    }

    /// Hands the credit to the caller. Null if already released.
    pub fn into_raw(self) -> *mut T {
        let ptr = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        std::mem::forget(self);
        ptr
    }

    /// Current refcount of the wrapped object, 0 once released.
    pub fn refcount(&self) -> u32 {
        // SAFETY: null or a live object kept alive by our credit.
        unsafe { cfish_get_refcount(self.as_obj_ptr()) }
    }

    /// Dynamic class of the wrapped object.
    pub fn class(&self) -> Result<&'static CfClass, BridgeError> {
        let ptr = self.to_ptr()?;
        // SAFETY: every native kind starts with a `CfObj` header.
        Ok(unsafe { ptr.cast::<CfObj>().as_ref() }.klass())
    }

    pub fn is_a(&self, klass: &CfClass) -> bool {
        self.class().map_or(false, |own| own.is_subclass_of(klass))
    }

    /// Forgets the static kind, keeping the credit.
    pub fn upcast(self) -> Handle<CfObj> {
        // SAFETY: `T: NativeKind` guarantees the header at offset zero.
        unsafe { Handle::adopt(self.into_raw().cast()) }
    }

    /// A new handle (and credit) typed as `U`, if the object is one.
    pub fn downcast<U: NativeKind>(&self) -> Result<Handle<U>, BridgeError> {
        let klass = self.class()?;
        if !klass.is_subclass_of(U::class()) {
            return Err(BridgeError::ClassMismatch {
                expected: U::class().name(),
                found: klass.name(),
            });
        }
        // SAFETY: class check above; the object is alive while we hold it.
        unsafe { Handle::from_borrowed(self.live().cast()) }
    }
}

impl<T: NativeKind> Clone for Handle<T> {
    fn clone(&self) -> Self {
        // SAFETY: null or a live object kept alive by our credit.
        unsafe {
            let ptr = self.as_ptr();
            cfish_inc_refcount(ptr.cast());
            Handle::adopt(ptr)
        }
    }
}

impl<T: NativeKind> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: NativeKind> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class() {
            Ok(klass) => write!(f, "Handle<{}>({:p})", klass.name(), self.as_ptr()),
            Err(_) => write!(f, "Handle<{}>(released)", T::class().name()),
        }
    }
}
