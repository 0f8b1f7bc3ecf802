use serde::Deserialize;
use serde::Serialize;

/// Configuration for event aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Number of event UIDs combined into one `action=get` request
    #[serde(default = "default_event_batch_size")]
    pub event_batch_size: usize,
}

fn default_event_batch_size() -> usize {
    300
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            event_batch_size: default_event_batch_size(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.event_batch_size == 0 {
            return Err("event_batch_size must be > 0".to_string());
        }
        Ok(())
    }
}
