use clownfish::{try_run, CfByteBuf, CfString, CfVector, Handle};

use crate::error::CliError;

/// Collects the arguments into a native vector and prints its string form.
///
/// With `hex`, each argument is decoded into a byte buffer first, so invalid
/// UTF-8 surfaces as a native error during conversion.
pub fn handle_echo(args: &[String], hex: bool) -> Result<(), CliError> {
    let mut vec = Handle::<CfVector>::new_vector(args.len());
    for arg in args {
        if hex {
            vec.push(Handle::<CfByteBuf>::from_bytes(&decode_hex(arg)?));
        } else {
            vec.push(Handle::<CfString>::from(arg.as_str()));
        }
    }

    let text = try_run(|| vec.to_host_text())?;
    println!("{}", text);

    vec.release_later();
    log::debug!("Collected {} deferred releases", clownfish::collect());
    Ok(())
}

fn decode_hex(arg: &str) -> Result<Vec<u8>, CliError> {
    let invalid = || CliError::InvalidArgument(format!("not a hex byte string: {:?}", arg));
    if arg.len() % 2 != 0 {
        return Err(invalid());
    }
    (0..arg.len())
        .step_by(2)
        .map(|i| arg.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()).ok_or_else(invalid))
        .collect()
}
