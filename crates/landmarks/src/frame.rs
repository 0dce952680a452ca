//! Landmark frame types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Single facial landmark (image or model coordinates)
///
/// Serialized as `[x, y]` or `[x, y, z]`; planar points get `z = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    /// Create a planar landmark
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Create a landmark with depth
    pub fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another landmark
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl TryFrom<Vec<f32>> for Landmark {
    type Error = String;

    fn try_from(coords: Vec<f32>) -> Result<Self, Self::Error> {
        match coords.as_slice() {
            [x, y] => Ok(Self::new(*x, *y)),
            [x, y, z] => Ok(Self::with_depth(*x, *y, *z)),
            other => Err(format!(
                "landmark needs 2 or 3 coordinates, got {}",
                other.len()
            )),
        }
    }
}

impl From<Landmark> for Vec<f32> {
    fn from(lm: Landmark) -> Self {
        vec![lm.x, lm.y, lm.z]
    }
}

/// Landmarks of one detected face, keyed by the landmark model's index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    points: BTreeMap<u32, Landmark>,
}

impl LandmarkFrame {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a frame from a dense landmark list (index = position)
    pub fn from_dense<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Landmark>,
    {
        points
            .into_iter()
            .enumerate()
            .map(|(i, lm)| (i as u32, lm))
            .collect()
    }

    /// Add a landmark, builder style
    pub fn with(mut self, index: u32, landmark: Landmark) -> Self {
        self.points.insert(index, landmark);
        self
    }

    /// Look up a landmark by index
    pub fn get(&self, index: u32) -> Option<&Landmark> {
        self.points.get(&index)
    }

    /// Number of landmarks in the frame
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate landmarks in index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Landmark)> {
        self.points.iter().map(|(i, lm)| (*i, lm))
    }
}

impl FromIterator<(u32, Landmark)> for LandmarkFrame {
    fn from_iter<T: IntoIterator<Item = (u32, Landmark)>>(iter: T) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// One sampling tick from a landmark source
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Tick timestamp (milliseconds)
    pub timestamp_ms: u64,
    /// Landmarks of the tracked face, `None` when no face was found
    pub face: Option<LandmarkFrame>,
}

impl Observation {
    /// Tick with a detected face
    pub fn face(timestamp_ms: u64, frame: LandmarkFrame) -> Self {
        Self {
            timestamp_ms,
            face: Some(frame),
        }
    }

    /// Tick without a face
    pub fn no_face(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            face: None,
        }
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }
}

/// Wall-clock milliseconds since the Unix epoch
pub fn unix_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
