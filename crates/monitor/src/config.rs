//! Monitor configuration

use drowsiness::DrowsinessConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// User whose stats the monitor accumulates
    pub user_id: String,

    /// Longest wait for one landmark frame (milliseconds)
    pub frame_timeout_ms: u64,

    /// Detection thresholds and landmark mapping
    pub detection: DrowsinessConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            user_id: "student".to_string(),
            frame_timeout_ms: 1_000,
            detection: DrowsinessConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms.max(1))
    }
}
