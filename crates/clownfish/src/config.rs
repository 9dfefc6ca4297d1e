use std::time::Duration;

/// Bridge settings, fixed at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// When set, a background finalizer drains the deferred release queue on
    /// this period. Without it, deferred releases wait for [`crate::collect`].
    pub finalizer_interval: Option<Duration>,
    /// Process exit status used when a native error is thrown with no trap
    /// active on the throwing thread.
    pub uncaught_exit_code: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            finalizer_interval: None,
            uncaught_exit_code: 1,
        }
    }
}

impl Config {
    pub fn with_finalizer(mut self, interval: Duration) -> Self {
        self.finalizer_interval = Some(interval);
        self
    }

    pub fn with_uncaught_exit_code(mut self, code: i32) -> Self {
        self.uncaught_exit_code = code;
        self
    }
}
