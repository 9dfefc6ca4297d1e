use clownfish::{native_trap, try_run};

use crate::error::CliError;

/// Throws `message` under a trap and reports what was caught.
pub fn handle_trap(message: &str, via_native: bool) -> Result<(), CliError> {
    let caught = if via_native {
        native_trap(|| clownfish::sys::throw(message))
    } else {
        try_run(|| clownfish::throw(message))
    };

    match caught {
        Ok(()) => Err(CliError::InvalidArgument(format!("nothing was thrown for {:?}", message))),
        Err(error) => {
            println!("caught: {}", error);
            Ok(())
        }
    }
}
