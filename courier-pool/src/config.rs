use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sizing and wait limits for a [`Pool`](crate::Pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections opened at startup.
    ///
    /// Default: 4
    #[serde(default = "defaults::capacity")]
    pub capacity: usize,

    /// How long [`Pool::acquire`](crate::Pool::acquire) waits for an idle
    /// connection before giving up.
    ///
    /// Default: 5000 milliseconds
    #[serde(default = "defaults::acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::capacity(),
            acquire_timeout_ms: defaults::acquire_timeout_ms(),
        }
    }
}

mod defaults {
    pub const fn capacity() -> usize {
        4
    }

    pub const fn acquire_timeout_ms() -> u64 {
        5000
    }
}
