//! Drowsiness Detection
//!
//! Sleep-incident detection from facial landmarks:
//! - Eye openness estimation (lid gap normalized by eye span)
//! - Closure timer with a sustained-closure window
//! - One incident per continuous closure episode

pub mod analysis;
pub mod config;
pub mod detector;
pub mod state;

pub use analysis::{ClosureAnalysis, IncidentEvent};
pub use config::{DrowsinessConfig, EyeLandmarks, MEDIAPIPE_FACE_MESH};
pub use detector::{EyeGeometry, OpennessEstimator, OpennessReading};
pub use state::ClosureState;

use landmarks::Observation;
use thiserror::Error;
use tracing::info;

/// Drowsiness error types
#[derive(Error, Debug)]
pub enum DrowsinessError {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Openness estimator plus closure state for one monitoring session
pub struct DrowsinessDetector {
    config: DrowsinessConfig,
    estimator: OpennessEstimator,
    state: ClosureState,
}

impl DrowsinessDetector {
    /// Create a new detector with configuration
    pub fn new(config: DrowsinessConfig) -> Result<Self, DrowsinessError> {
        config.validate()?;
        info!(
            "Drowsiness detector: threshold {:.2}, sustained closure {:.1}s",
            config.openness_threshold, config.sustained_closure_secs
        );
        Ok(Self {
            estimator: OpennessEstimator::new(config.landmarks),
            state: ClosureState::default(),
            config,
        })
    }

    /// Analyze a single tick
    pub fn analyze(&mut self, observation: &Observation) -> ClosureAnalysis {
        let now_ms = observation.timestamp_ms;
        let reading = self.estimator.estimate(observation.face.as_ref());
        let incident = self.state.update(reading, now_ms, &self.config);

        ClosureAnalysis {
            timestamp_ms: now_ms,
            reading,
            eyes_closed: self.state.closed_since_ms().is_some(),
            closed_for_ms: self.state.closed_for_ms(now_ms),
            alerted: self.state.alerted(),
            incident,
        }
    }

    pub fn state(&self) -> ClosureState {
        self.state
    }

    pub fn config(&self) -> &DrowsinessConfig {
        &self.config
    }

    /// Reset closure tracking (session start/stop)
    pub fn reset_state(&mut self) {
        self.state.reset();
    }
}
