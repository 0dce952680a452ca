//! Focus session timer

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Misuse of the start/stop bracket
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Monitoring already running since {started_at_ms} ms")]
    AlreadyRunning { started_at_ms: u64 },
    #[error("Monitoring is not running")]
    NotRunning,
}

/// Start/stop bracket around one monitoring session
///
/// Invalid transitions leave the timer untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionTimer {
    started_at_ms: Option<u64>,
}

impl SessionTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.started_at_ms.is_some()
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Begin a session at `now_ms`
    pub fn start(&mut self, now_ms: u64) -> Result<(), SessionError> {
        if let Some(started_at_ms) = self.started_at_ms {
            return Err(SessionError::AlreadyRunning { started_at_ms });
        }
        self.started_at_ms = Some(now_ms);
        info!("Focus session started at {} ms", now_ms);
        Ok(())
    }

    /// End the session and return its length
    pub fn stop(&mut self, now_ms: u64) -> Result<Duration, SessionError> {
        let started = self.started_at_ms.take().ok_or(SessionError::NotRunning)?;
        let elapsed = Duration::from_millis(now_ms.saturating_sub(started));
        info!("Focus session ended after {:.2}s", elapsed.as_secs_f64());
        Ok(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let mut timer = SessionTimer::new();
        timer.start(1_000).unwrap();
        assert!(timer.is_running());

        let elapsed = timer.stop(61_500).unwrap();
        assert_eq!(elapsed, Duration::from_millis(60_500));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_stop_without_start() {
        let mut timer = SessionTimer::new();
        assert_eq!(timer.stop(10), Err(SessionError::NotRunning));
        assert!(!timer.is_running());
    }

    #[test]
    fn test_double_start_keeps_original() {
        let mut timer = SessionTimer::new();
        timer.start(100).unwrap();
        assert_eq!(
            timer.start(200),
            Err(SessionError::AlreadyRunning { started_at_ms: 100 })
        );
        assert_eq!(timer.stop(300).unwrap(), Duration::from_millis(200));
    }
}
