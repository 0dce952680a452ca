//! Facial Landmark Input
//!
//! Types and sources for the per-tick landmark stream:
//! - `LandmarkFrame`: landmark index -> 2-D/3-D point for one detected face
//! - `Observation`: a timestamped tick, with or without a face
//! - `LandmarkSource`: anything that can be polled for the next tick
//!
//! Camera capture and face-mesh inference live outside this workspace; a
//! face-mesh process can pipe its output through `JsonLinesSource`.

pub mod frame;
pub mod source;

pub use frame::{unix_millis, Landmark, LandmarkFrame, Observation};
pub use source::{JsonLinesSource, LandmarkSource, ScriptedSource};

use thiserror::Error;

/// Landmark source error types
#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("Landmark source exhausted")]
    SourceExhausted,

    #[error("Malformed observation on line {line}: {message}")]
    Decode { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
