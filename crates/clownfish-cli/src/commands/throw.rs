/// Throws with no trap in place; the process ends with the uncaught-error
/// exit status.
pub fn handle_throw(message: &str) -> ! {
    log::warn!("Throwing {:?} with no trap active", message);
    clownfish::throw(message)
}
