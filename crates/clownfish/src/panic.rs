use std::cell::Cell;
use std::panic;

use clownfish_sys::CfErr;

use crate::err::NativeError;
use crate::runtime::bootstrap;

thread_local! {
    static TRAP_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as being inside a trap for as long as it lives.
pub(crate) struct TrapScope(());

impl TrapScope {
    pub(crate) fn enter() -> Self {
        TRAP_DEPTH.with(|depth| depth.set(depth.get() + 1));
        TrapScope(())
    }
}

impl Drop for TrapScope {
    fn drop(&mut self) {
        TRAP_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Whether a trap on this thread would catch a raise right now.
pub fn trap_active() -> bool {
    TRAP_DEPTH.with(|depth| depth.get() > 0)
}

/// Starts a host unwind carrying `error` towards the nearest trap.
///
/// With no trap active the error is uncatchable: its message is written to
/// stderr and the process exits with the configured status.
pub fn raise(error: NativeError) -> ! {
    if !trap_active() {
        uncaught(&error)
    }
    log::trace!("Raising native error: {}", error);
    panic::resume_unwind(Box::new(error))
}

/// Throws a new native error carrying `message`.
pub fn throw(message: impl Into<String>) -> ! {
    raise(NativeError::new(message))
}

fn uncaught(error: &NativeError) -> ! {
    let message = error.message();
    log::error!("Uncaught clownfish error: {}", message);
    eprintln!("{}", message);
    std::process::exit(bootstrap().config().uncaught_exit_code)
}

/// Host implementation of the native throw slot.
///
/// The thrown error stays owned by the native thrower, whose frame gives
/// its credit back as the unwind passes through it; the payload holds a
/// credit of its own.
pub(crate) unsafe extern "C-unwind" fn host_do_throw(err: *mut CfErr) -> ! {
    let error = match NativeError::from_borrowed(err) {
        Ok(error) => error,
        Err(_) => NativeError::new("null error thrown"),
    };
    raise(error)
}
