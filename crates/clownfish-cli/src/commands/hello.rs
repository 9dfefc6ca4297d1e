use clownfish::sys::cfish_str_cat;
use clownfish::{CfString, Handle};

use crate::error::CliError;

pub fn handle_hello(name: &str) -> Result<(), CliError> {
    let greeting = Handle::<CfString>::from("Hello, ");
    let name = Handle::<CfString>::from(name);
    // SAFETY: both strings are kept alive by their handles; the result is a
    // fresh string owned by us.
    let joined = unsafe {
        let raw = cfish_str_cat(greeting.to_ptr()?.as_ptr(), name.to_ptr()?.as_ptr());
        Handle::<CfString>::from_raw(raw)?
    };
    log::debug!("Built greeting of {} bytes", joined.len());
    println!("{}!", joined.to_host_text());
    Ok(())
}
