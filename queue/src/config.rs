use serde::{Deserialize, Serialize};

use crate::QueueError;

/// `[queue]` section of the daemon config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How long a leased message stays invisible before redelivery.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Deliveries after which a message is dead-lettered instead.
    #[serde(default = "default_max_receive_count")]
    pub max_receive_count: u32,

    /// Receive long-poll duration.
    #[serde(default = "default_long_poll_secs")]
    pub long_poll_secs: u64,

    /// Worker sleep after an empty poll.
    #[serde(default = "default_idle_sleep_secs")]
    pub idle_sleep_secs: u64,

    /// Upper bound of the per-message redelivery jitter; 0 disables it.
    #[serde(default)]
    pub redelivery_jitter_secs: u64,

    /// LMDB map size of the queue environment, in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_max_receive_count() -> u32 {
    5
}

fn default_long_poll_secs() -> u64 {
    20
}

fn default_idle_sleep_secs() -> u64 {
    5
}

fn default_map_size() -> usize {
    256 * 1024 * 1024
}

impl QueueConfig {
    /// Reject settings under which no message could ever be delivered.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.max_receive_count == 0 {
            return Err(QueueError::InvalidConfig(
                "max_receive_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_receive_count: default_max_receive_count(),
            long_poll_secs: default_long_poll_secs(),
            idle_sleep_secs: default_idle_sleep_secs(),
            redelivery_jitter_secs: 0,
            map_size: default_map_size(),
        }
    }
}
