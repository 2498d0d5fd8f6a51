use std::time::Duration;

use crate::throttle::DEFAULT_THROTTLE_INTERVAL;

/// Server used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8787";

/// Settings the streaming core needs from its embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub base_url: String,
    pub throttle_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle_interval: DEFAULT_THROTTLE_INTERVAL,
        }
    }
}
