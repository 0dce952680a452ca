//! Closure timer and debounce state machine

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::IncidentEvent;
use crate::config::DrowsinessConfig;
use crate::detector::OpennessReading;

/// Closure tracking for one monitoring session
///
/// `alerted` is only ever set while `closed_since_ms` holds the start of the
/// episode it belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureState {
    closed_since_ms: Option<u64>,
    alerted: bool,
}

impl ClosureState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of the current closure episode
    pub fn closed_since_ms(&self) -> Option<u64> {
        self.closed_since_ms
    }

    /// Whether the current episode already fired
    pub fn alerted(&self) -> bool {
        self.alerted
    }

    /// Elapsed closure at `now_ms`, if an episode is in progress
    pub fn closed_for_ms(&self, now_ms: u64) -> Option<u64> {
        self.closed_since_ms.map(|since| now_ms.saturating_sub(since))
    }

    /// Forget any in-progress episode
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Advance the state machine by one tick
    ///
    /// Returns the next state and, at most once per closure episode, the
    /// incident that crossed the sustained-closure window. Losing the face
    /// resets the episode the same way open eyes do.
    pub fn step(
        self,
        reading: OpennessReading,
        now_ms: u64,
        config: &DrowsinessConfig,
    ) -> (ClosureState, Option<IncidentEvent>) {
        let closed = matches!(reading, OpennessReading::Sample(v) if v < config.openness_threshold);
        if !closed {
            if self.closed_since_ms.is_some() {
                debug!("Closure episode ended at {} ms", now_ms);
            }
            return (ClosureState::default(), None);
        }

        let Some(since) = self.closed_since_ms else {
            debug!("Closure episode started at {} ms", now_ms);
            return (
                ClosureState {
                    closed_since_ms: Some(now_ms),
                    alerted: false,
                },
                None,
            );
        };

        let elapsed_ms = now_ms.saturating_sub(since) as f64;
        if !self.alerted && elapsed_ms > config.sustained_closure_ms() {
            let event = IncidentEvent::new(since, now_ms);
            debug!("Sustained closure: {:.2}s", event.duration_secs);
            return (
                ClosureState {
                    closed_since_ms: Some(since),
                    alerted: true,
                },
                Some(event),
            );
        }

        (self, None)
    }

    /// In-place variant of [`ClosureState::step`]
    pub fn update(
        &mut self,
        reading: OpennessReading,
        now_ms: u64,
        config: &DrowsinessConfig,
    ) -> Option<IncidentEvent> {
        let (next, event) = self.step(reading, now_ms, config);
        *self = next;
        event
    }
}
