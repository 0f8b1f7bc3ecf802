use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// Configuration for the title resolution cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleCacheConfig {
    /// UIDs per `props=title` request in `resolve_many`
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How long a UID that failed to resolve is left alone
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// How long `title_async` waits before falling back to a placeholder
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Number of highest-ranked UIDs fetched one per request
    #[serde(default = "default_priority_individual")]
    pub priority_individual: usize,

    /// Batch size for the remainder of a prioritized resolution
    #[serde(default = "default_priority_batch_size")]
    pub priority_batch_size: usize,

    #[serde(default = "default_priority_individual_pause_ms")]
    pub priority_individual_pause_ms: u64,

    #[serde(default = "default_priority_batch_pause_ms")]
    pub priority_batch_pause_ms: u64,

    /// Snapshots older than this are discarded on load
    #[serde(default = "default_snapshot_expiry_hours")]
    pub snapshot_expiry_hours: u64,
}

fn default_batch_size() -> usize {
    50
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_priority_individual() -> usize {
    10
}

fn default_priority_batch_size() -> usize {
    10
}

fn default_priority_individual_pause_ms() -> u64 {
    5
}

fn default_priority_batch_pause_ms() -> u64 {
    20
}

fn default_snapshot_expiry_hours() -> u64 {
    24
}

impl Default for TitleCacheConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            cooldown_secs: default_cooldown_secs(),
            wait_timeout_ms: default_wait_timeout_ms(),
            priority_individual: default_priority_individual(),
            priority_batch_size: default_priority_batch_size(),
            priority_individual_pause_ms: default_priority_individual_pause_ms(),
            priority_batch_pause_ms: default_priority_batch_pause_ms(),
            snapshot_expiry_hours: default_snapshot_expiry_hours(),
        }
    }
}

impl TitleCacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be > 0".to_string());
        }
        if self.priority_batch_size == 0 {
            return Err("priority_batch_size must be > 0".to_string());
        }
        if self.wait_timeout_ms == 0 {
            return Err("wait_timeout_ms must be > 0".to_string());
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn snapshot_expiry(&self) -> Duration {
        Duration::from_secs(self.snapshot_expiry_hours * 60 * 60)
    }
}
