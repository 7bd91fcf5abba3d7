//! Watch session backoff with jitter.

use std::time::Duration;
use rand::Rng;

use crate::config::DatasourceConfig;

/// Delays between watch sessions.
///
/// A failed connection waits `reconnect`, a stream that simply ended
/// (normal server-side rotation) waits `resume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchBackoff {
    pub reconnect: Duration,
    pub resume: Duration,
}

impl WatchBackoff {
    pub fn new(reconnect: Duration, resume: Duration) -> Self {
        Self { reconnect, resume }
    }

    pub fn from_config(config: &DatasourceConfig) -> Self {
        Self::new(
            Duration::from_secs(config.reconnect_backoff_secs),
            Duration::from_secs(config.resume_backoff_secs),
        )
    }

    pub fn after_connect_failure(&self) -> Duration {
        with_jitter(self.reconnect)
    }

    pub fn after_stream_end(&self) -> Duration {
        with_jitter(self.resume)
    }
}

impl Default for WatchBackoff {
    fn default() -> Self {
        Self::from_config(&DatasourceConfig::default())
    }
}

/// Add 0 to 10% of `base` so restarted replicas do not reconnect in lockstep.
pub fn with_jitter(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let jitter_range = base_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(base_ms + jitter)
}
