use clownfish::{BridgeError, NativeError};
use miette::Diagnostic;
use thiserror::Error;

/// CLI-specific error type that provides rich diagnostics
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Native error: {message}")]
    #[diagnostic(code(clownfish::cli::native_error))]
    Native {
        message: String,
        #[source]
        source: NativeError,
    },

    #[error("Bridge error: {0}")]
    #[diagnostic(code(clownfish::cli::bridge_error))]
    Bridge(#[from] BridgeError),

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(clownfish::cli::invalid_argument), help("run `cfish --help` for usage"))]
    InvalidArgument(String),
}

impl From<NativeError> for CliError {
    fn from(error: NativeError) -> Self {
        CliError::Native {
            message: error.message(),
            source: error,
        }
    }
}
