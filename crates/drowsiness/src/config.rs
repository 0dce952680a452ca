//! Drowsiness detection configuration

use serde::{Deserialize, Serialize};

use crate::DrowsinessError;

/// Landmark indices the openness estimator reads
///
/// Tied to the landmark model producing the frames; swapping models only
/// requires a different mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    /// Upper lid, first eye
    pub left_lid_top: u32,
    /// Lower lid, first eye
    pub left_lid_bottom: u32,
    /// Upper lid, second eye
    pub right_lid_top: u32,
    /// Lower lid, second eye
    pub right_lid_bottom: u32,
    /// Outer corner of the first eye (scale reference)
    pub left_corner: u32,
    /// Outer corner of the second eye (scale reference)
    pub right_corner: u32,
}

/// MediaPipe Face Mesh (468 landmarks) indices
pub const MEDIAPIPE_FACE_MESH: EyeLandmarks = EyeLandmarks {
    left_lid_top: 159,
    left_lid_bottom: 145,
    right_lid_top: 386,
    right_lid_bottom: 374,
    left_corner: 33,
    right_corner: 263,
};

impl Default for EyeLandmarks {
    fn default() -> Self {
        MEDIAPIPE_FACE_MESH
    }
}

impl EyeLandmarks {
    /// All indices a frame must carry
    pub fn required(&self) -> [u32; 6] {
        [
            self.left_lid_top,
            self.left_lid_bottom,
            self.right_lid_top,
            self.right_lid_bottom,
            self.left_corner,
            self.right_corner,
        ]
    }
}

/// Drowsiness detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrowsinessConfig {
    /// Openness strictly below this counts as closed
    pub openness_threshold: f32,

    /// Continuous closure required before an incident fires (seconds)
    pub sustained_closure_secs: f64,

    /// Landmark index mapping
    pub landmarks: EyeLandmarks,
}

impl Default for DrowsinessConfig {
    fn default() -> Self {
        Self {
            openness_threshold: 0.20,
            sustained_closure_secs: 5.0,
            landmarks: MEDIAPIPE_FACE_MESH,
        }
    }
}

impl DrowsinessConfig {
    /// Create strict config (shorter closures trigger)
    pub fn strict() -> Self {
        Self {
            sustained_closure_secs: 3.0,
            ..Default::default()
        }
    }

    /// Create lenient config (longer closures tolerated)
    pub fn lenient() -> Self {
        Self {
            openness_threshold: 0.18,
            sustained_closure_secs: 8.0,
            ..Default::default()
        }
    }

    /// Sustained closure window in milliseconds
    pub fn sustained_closure_ms(&self) -> f64 {
        self.sustained_closure_secs * 1000.0
    }

    /// Reject thresholds the state machine cannot work with
    pub fn validate(&self) -> Result<(), DrowsinessError> {
        if !self.openness_threshold.is_finite() || self.openness_threshold <= 0.0 {
            return Err(DrowsinessError::Config(format!(
                "openness_threshold must be a positive number, got {}",
                self.openness_threshold
            )));
        }
        if !self.sustained_closure_secs.is_finite() || self.sustained_closure_secs < 0.0 {
            return Err(DrowsinessError::Config(format!(
                "sustained_closure_secs must be >= 0, got {}",
                self.sustained_closure_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_face_mesh() {
        let config = DrowsinessConfig::default();
        assert_eq!(config.openness_threshold, 0.20);
        assert_eq!(config.sustained_closure_secs, 5.0);
        assert_eq!(config.landmarks.required(), [159, 145, 386, 374, 33, 263]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        assert!(DrowsinessConfig::strict().validate().is_ok());
        assert!(DrowsinessConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = DrowsinessConfig {
            openness_threshold: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DrowsinessError::Config(_))));

        let config = DrowsinessConfig {
            sustained_closure_secs: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
