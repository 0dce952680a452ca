//! Storage Layer
//!
//! Per-user accumulation of sleep incidents, sleep time and focused time.
//! Every write is an "add to existing total" and writes to one user are
//! serialized by the store.

mod json_store;
mod repository;

pub use json_store::JsonFileStore;
pub use repository::MemoryStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),
}

/// Accumulated statistics for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    /// Number of sleep incidents
    pub sleep_incidents: u64,
    /// Total closed-eye time across incidents (seconds)
    pub total_sleep_time: f64,
    /// Total monitored study time (seconds)
    pub focused_time: f64,
}

/// Registration details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub age: String,
}

/// One user's persisted record
///
/// Field names are shared with existing `users.json` files. Fields this
/// crate does not manage are carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub sleep_incidents: u64,
    #[serde(default)]
    pub total_sleep_time: f64,
    #[serde(default, rename = "timer")]
    pub focused_time: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            name: profile.name,
            age: profile.age,
            ..Default::default()
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            sleep_incidents: self.sleep_incidents,
            total_sleep_time: self.total_sleep_time,
            focused_time: self.focused_time,
        }
    }

    pub(crate) fn add_sleep_incident(&mut self, duration_secs: f64) {
        self.sleep_incidents += 1;
        self.total_sleep_time += duration_secs;
    }

    pub(crate) fn add_focused_time(&mut self, duration_secs: f64) {
        self.focused_time += duration_secs;
    }
}

/// Persistence collaborator for the monitor
pub trait StatsStore: Send + Sync {
    /// Create a zeroed record; `false` if the user already exists
    fn register_user(&self, user_id: &str, profile: UserProfile) -> Result<bool, StorageError>;

    /// Count one incident and add its duration to the sleep total
    fn add_sleep_incident(
        &self,
        user_id: &str,
        duration_secs: f64,
    ) -> Result<UserStats, StorageError>;

    /// Add a finished session's duration to the focused-time total
    fn add_focused_time(
        &self,
        user_id: &str,
        duration_secs: f64,
    ) -> Result<UserStats, StorageError>;

    /// Current totals for display
    fn stats(&self, user_id: &str) -> Result<UserStats, StorageError>;
}

pub(crate) fn check_duration(duration_secs: f64) -> Result<f64, StorageError> {
    if duration_secs.is_finite() && duration_secs >= 0.0 {
        Ok(duration_secs)
    } else {
        Err(StorageError::InvalidDuration(duration_secs))
    }
}
