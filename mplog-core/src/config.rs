use std::{sync::LazyLock, time::Duration};

use derive_from_env::FromEnv;

/// Process-wide settings read once from `MPLOG_*` environment variables.
#[derive(FromEnv)]
#[from_env(prefix = "MPLOG")]
#[allow(non_snake_case)]
pub struct MPLogConfig {
    /// How often an idle aggregator flushes its sinks.
    #[from_env(default = "100")]
    pub FLUSH_INTERVAL_MS: u64,
    /// Upper bound on how long `close` waits for the consumer, 0 waits forever.
    #[from_env(default = "0")]
    pub DRAIN_TIMEOUT_MS: u64,
}

impl Default for MPLogConfig {
    fn default() -> Self {
        Self {
            FLUSH_INTERVAL_MS: 100,
            DRAIN_TIMEOUT_MS: 0,
        }
    }
}

impl MPLogConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.FLUSH_INTERVAL_MS.max(1))
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        (self.DRAIN_TIMEOUT_MS > 0).then(|| Duration::from_millis(self.DRAIN_TIMEOUT_MS))
    }
}

pub static MPLOG_CONFIG: LazyLock<MPLogConfig> =
    LazyLock::new(|| MPLogConfig::from_env().unwrap_or_default());
