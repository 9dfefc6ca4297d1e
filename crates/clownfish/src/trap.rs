use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use clownfish_sys::{cfish_err_trap, AttemptFn, CfErr, TrapContext};

use crate::err::NativeError;
use crate::panic::TrapScope;
use crate::runtime::bootstrap;

/// Runs `routine`, catching any native error raised inside it.
///
/// Only native errors are caught. Any other panic keeps unwinding past this
/// frame untouched.
pub fn try_run<R, F: FnOnce() -> R>(routine: F) -> Result<R, NativeError> {
    bootstrap();
    let scope = TrapScope::enter();
    let result = panic::catch_unwind(AssertUnwindSafe(routine));
    drop(scope);

    match result {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<NativeError>() {
            Ok(error) => {
                log::debug!("Trapped native error: {}", error);
                Err(*error)
            }
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Runs a native routine under a trap. Returns null on success, otherwise
/// the thrown error with one credit handed to the caller.
///
/// # Safety
/// `context.routine` must be safe to call with `context.context`.
pub unsafe fn attempt_trap(context: TrapContext) -> *mut CfErr {
    match try_run(|| context.call()) {
        Ok(()) => ptr::null_mut(),
        Err(error) => error.into_raw(),
    }
}

/// Host implementation of the native trap slot.
pub(crate) unsafe extern "C-unwind" fn host_trap(routine: AttemptFn, context: *mut c_void) -> *mut CfErr {
    attempt_trap(TrapContext { routine, context })
}

/// Runs `routine` through the native `cfish_err_trap` entry point, the same
/// path native code takes when it traps host callbacks.
pub fn native_trap<F: FnOnce()>(routine: F) -> Result<(), NativeError> {
    unsafe extern "C-unwind" fn call<F: FnOnce()>(context: *mut c_void) {
        if let Some(routine) = (*context.cast::<Option<F>>()).take() {
            routine();
        }
    }

    bootstrap();
    let mut routine = Some(routine);
    // SAFETY: `routine` outlives the call; `call::<F>` matches its type.
    let err = unsafe { cfish_err_trap(call::<F>, (&mut routine as *mut Option<F>).cast()) };
    // SAFETY: null means the routine finished; anything else carries one
    // credit for us.
    match unsafe { NativeError::from_raw(err) } {
        Ok(error) => Err(error),
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panic::trap_active;

    #[test]
    fn trap_depth_is_restored() {
        assert!(!trap_active());
        let nested = try_run(|| {
            assert!(trap_active());
            try_run(|| crate::throw("inner")).unwrap_err()
        })
        .unwrap();
        assert_eq!(nested.message(), "inner");
        assert!(!trap_active());
    }

    #[test]
    fn other_panics_pass_through() {
        let outer = panic::catch_unwind(|| try_run(|| panic!("not native")));
        let payload = outer.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"not native"));
        assert!(!trap_active());
    }

    #[test]
    fn attempt_trap_transfers_one_credit() {
        unsafe extern "C-unwind" fn fails(_: *mut c_void) {
            clownfish_sys::throw("native failure");
        }
        unsafe extern "C-unwind" fn succeeds(_: *mut c_void) {}

        bootstrap();
        unsafe {
            let ok = attempt_trap(TrapContext {
                routine: succeeds,
                context: ptr::null_mut(),
            });
            assert!(ok.is_null());

            let err = attempt_trap(TrapContext {
                routine: fails,
                context: ptr::null_mut(),
            });
            assert_eq!(clownfish_sys::cfish_get_refcount(err.cast()), 1);
            let error = NativeError::from_raw(err).unwrap();
            assert_eq!(error.message(), "native failure");
        }
    }

    #[test]
    fn native_trap_round_trips_a_host_raise() {
        let err = native_trap(|| crate::throw("through native")).unwrap_err();
        assert_eq!(err.to_string(), "through native");
        assert_eq!(err.handle().refcount(), 1);
        assert!(native_trap(|| ()).is_ok());
    }
}
