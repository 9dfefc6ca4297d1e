use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the test logger and bootstraps the bridge once per test binary.
pub fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        clownfish::bootstrap();
    });
}
