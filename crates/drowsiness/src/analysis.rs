//! Per-tick analysis results and incident events

use serde::{Deserialize, Serialize};

use crate::detector::OpennessReading;

/// A closure episode that outlasted the sustained-closure window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// When the closure episode began (milliseconds)
    pub closed_since_ms: u64,
    /// Tick that crossed the window (milliseconds)
    pub detected_at_ms: u64,
    /// Closed time at detection (seconds)
    pub duration_secs: f64,
}

impl IncidentEvent {
    pub(crate) fn new(closed_since_ms: u64, detected_at_ms: u64) -> Self {
        let elapsed_ms = detected_at_ms.saturating_sub(closed_since_ms);
        Self {
            closed_since_ms,
            detected_at_ms,
            duration_secs: elapsed_ms as f64 / 1000.0,
        }
    }
}

/// Outcome of feeding one observation through the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureAnalysis {
    /// Tick timestamp (milliseconds)
    pub timestamp_ms: u64,

    /// Openness reading for the tick
    pub reading: OpennessReading,

    /// Whether the eyes count as closed this tick
    pub eyes_closed: bool,

    /// How long the current closure episode has lasted (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_for_ms: Option<u64>,

    /// Whether the current episode already produced an incident
    pub alerted: bool,

    /// Incident fired on this tick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident: Option<IncidentEvent>,
}

impl ClosureAnalysis {
    pub fn has_incident(&self) -> bool {
        self.incident.is_some()
    }
}
