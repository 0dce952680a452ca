//! Study Monitor
//!
//! Drives the sleep-incident pipeline for one user:
//! - Sequential monitoring loop over a landmark source
//! - Incident recording (alert + stats) with retry of failed writes
//! - Focus session timing bracketed by start/stop signals

pub mod clock;
pub mod config;
pub mod controller;
pub mod driver;
pub mod recorder;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MonitorConfig;
pub use controller::{
    shared_source, MonitorController, MonitorStatus, SessionReport, SharedSource,
};
pub use driver::{LoopExit, LoopSummary, MonitoringLoop};
pub use recorder::{IncidentRecorder, PendingIncidents};
pub use session::{SessionError, SessionTimer};

use drowsiness::DrowsinessError;
use storage::StorageError;
use thiserror::Error;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Stats not durably recorded for {user_id}: {source}")]
    StatsNotRecorded {
        user_id: String,
        #[source]
        source: StorageError,
    },

    #[error("Detector error: {0}")]
    Detector(#[from] DrowsinessError),

    #[error("Monitoring task failed: {0}")]
    Task(String),
}
