//! Host bridge for the Clownfish native object system.
//!
//! Native objects are reached through [`Handle`]s, each owning one refcount
//! credit. Native errors surface as host unwinds carrying a [`NativeError`]
//! and are caught with [`try_run`]. Native code trapping host callbacks goes
//! the other way through the trap slot installed by [`bootstrap`].

pub mod collections;
pub mod config;
pub mod err;
pub mod error;
pub mod finalizer;
pub mod handle;
pub mod panic;
pub mod runtime;
pub mod string;
pub mod trap;

/// Raw native entry points. These skip the lazy bootstrap the safe API
/// performs: call [`bootstrap`] (or [`bootstrap_with`]) before using any of
/// them, or a native throw finds no host callbacks and aborts.
pub use clownfish_sys as sys;
pub use clownfish_sys::{CfByteBuf, CfClass, CfErr, CfHash, CfObj, CfString, CfVector, NativeKind};

pub use config::Config;
pub use err::NativeError;
pub use error::BridgeError;
pub use finalizer::{collect, Finalizer, ReleaseQueue};
pub use handle::Handle;
pub use panic::{raise, throw, trap_active};
pub use runtime::{bootstrap, bootstrap_with, Parcel};
pub use string::{from_host_text, to_host_text};
pub use trap::{attempt_trap, native_trap, try_run};
