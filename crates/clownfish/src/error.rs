use thiserror::Error;

/// Errors raised by the bridge itself, as opposed to errors thrown by native
/// code (which arrive as [`crate::NativeError`]).
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("null pointer where a native object was expected")]
    NullPointer,

    #[error("native object used after its handle was released")]
    Released,

    #[error("expected an instance of {expected}, found {found}")]
    ClassMismatch {
        expected: &'static str,
        found: &'static str,
    },
}
