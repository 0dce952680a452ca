//! Alerting System
//!
//! Turns "alert now" into something the subject notices: a wake-up phrase
//! and a chime that repeats on a fixed schedule.

mod manager;

pub use manager::{AlarmNotifier, AlarmPolicy, AlarmState, Chime, TerminalBell, WAKE_UP_PHRASES};

use thiserror::Error;

/// Alerting errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("No async runtime available to drive the alarm")]
    NoRuntime,
    #[error("Alarm state lock poisoned")]
    Lock,
}

/// Receiver of sleep alerts
///
/// Fire-and-forget: implementations must return promptly and own any
/// follow-up timing themselves.
pub trait AlertSink: Send + Sync {
    fn raise_alert(&self, user_id: &str) -> Result<(), AlertError>;
}
