use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-queue settings. The name prefixes every storage key, so several
/// queues (for example a command queue and an event queue) can share one
/// database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub name: String,
    /// How long a polled message stays invisible before the reaper hands it
    /// out again.
    pub lease_duration_ms: u64,
}

impl QueueConfig {
    /// Default lease duration: one minute.
    pub const DEFAULT_LEASE_DURATION_MS: u64 = 60_000;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lease_duration_ms: Self::DEFAULT_LEASE_DURATION_MS,
        }
    }

    /// Set the lease duration. Rounded up to whole milliseconds, so a
    /// non-zero lease never becomes zero.
    pub fn with_lease_duration(mut self, lease: Duration) -> Self {
        self.lease_duration_ms =
            u64::try_from(lease.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        self
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_millis(self.lease_duration_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new("default")
    }
}
