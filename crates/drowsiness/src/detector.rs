//! Eye openness estimation from facial landmarks

use landmarks::{Landmark, LandmarkFrame};
use serde::{Deserialize, Serialize};

use crate::config::EyeLandmarks;

/// Scale references shorter than this are treated as a lost face
pub const MIN_EYE_SPAN: f32 = 1e-6;

/// Result of evaluating one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OpennessReading {
    /// No usable face this tick
    NoFace,
    /// Normalized eyelid gap
    Sample(f32),
}

impl OpennessReading {
    pub fn sample(&self) -> Option<f32> {
        match self {
            OpennessReading::NoFace => None,
            OpennessReading::Sample(v) => Some(*v),
        }
    }
}

/// Raw eye measurements for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeGeometry {
    /// Upper-to-lower lid distance, first eye
    pub left_gap: f32,
    /// Upper-to-lower lid distance, second eye
    pub right_gap: f32,
    /// Distance between the outer eye corners
    pub eye_span: f32,
}

impl EyeGeometry {
    /// Mean lid gap over face width
    pub fn openness(&self) -> f32 {
        (self.left_gap + self.right_gap) / 2.0 / self.eye_span
    }
}

/// Converts landmark frames into openness readings
#[derive(Debug, Clone, Default)]
pub struct OpennessEstimator {
    indices: EyeLandmarks,
}

impl OpennessEstimator {
    pub fn new(indices: EyeLandmarks) -> Self {
        Self { indices }
    }

    /// Measure lid gaps and eye span; `None` if any landmark is missing
    pub fn measure(&self, frame: &LandmarkFrame) -> Option<EyeGeometry> {
        let point = |index: u32| -> Option<&Landmark> { frame.get(index) };
        let ix = &self.indices;

        Some(EyeGeometry {
            left_gap: point(ix.left_lid_top)?.distance(point(ix.left_lid_bottom)?),
            right_gap: point(ix.right_lid_top)?.distance(point(ix.right_lid_bottom)?),
            eye_span: point(ix.left_corner)?.distance(point(ix.right_corner)?),
        })
    }

    /// Estimate openness for one tick
    ///
    /// Missing landmarks and a degenerate eye span both read as `NoFace`.
    pub fn estimate(&self, frame: Option<&LandmarkFrame>) -> OpennessReading {
        let Some(geometry) = frame.and_then(|f| self.measure(f)) else {
            return OpennessReading::NoFace;
        };

        if !geometry.eye_span.is_finite() || geometry.eye_span < MIN_EYE_SPAN {
            return OpennessReading::NoFace;
        }

        let openness = geometry.openness();
        if openness.is_finite() {
            OpennessReading::Sample(openness)
        } else {
            OpennessReading::NoFace
        }
    }
}
