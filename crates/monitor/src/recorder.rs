//! Incident recording

use alerting::AlertSink;
use drowsiness::IncidentEvent;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use storage::{StatsStore, UserStats};
use tracing::{info, warn};

use crate::MonitorError;

/// Queue of incidents not yet written, shareable with observers
#[derive(Debug, Clone, Default)]
pub struct PendingIncidents(Arc<Mutex<VecDeque<IncidentEvent>>>);

impl PendingIncidents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    // A panic elsewhere never leaves the queue half-updated
    fn queue(&self) -> MutexGuard<'_, VecDeque<IncidentEvent>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Forwards incidents to the alert sink and the stats store
///
/// Each incident raises exactly one alert. Incidents the store fails to
/// record stay queued and are written, oldest first, on the next attempt.
pub struct IncidentRecorder {
    user_id: String,
    store: Arc<dyn StatsStore>,
    alerts: Arc<dyn AlertSink>,
    pending: PendingIncidents,
    recorded: u64,
}

impl IncidentRecorder {
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn StatsStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self::with_pending(user_id, store, alerts, PendingIncidents::new())
    }

    /// Recorder that drains an existing queue
    pub fn with_pending(
        user_id: impl Into<String>,
        store: Arc<dyn StatsStore>,
        alerts: Arc<dyn AlertSink>,
        pending: PendingIncidents,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            alerts,
            pending,
            recorded: 0,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Incidents still waiting for a successful write
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Handle to the queue of unwritten incidents
    pub fn pending_incidents(&self) -> PendingIncidents {
        self.pending.clone()
    }

    /// Incidents written since creation
    pub fn recorded(&self) -> u64 {
        self.recorded
    }

    /// Alert on and persist one incident
    pub fn record(&mut self, event: IncidentEvent) -> Result<Option<UserStats>, MonitorError> {
        info!(
            user_id = %self.user_id,
            "Sleep incident: eyes closed for {:.2}s",
            event.duration_secs
        );
        metrics::counter!("focusforge_sleep_incidents_total").increment(1);
        metrics::histogram!("focusforge_incident_duration_seconds").record(event.duration_secs);

        if let Err(e) = self.alerts.raise_alert(&self.user_id) {
            warn!("Alert for {} not delivered: {}", self.user_id, e);
        }

        self.pending.queue().push_back(event);
        self.flush_pending()
    }

    /// Retry queued writes; returns the latest stats if anything was written
    pub fn flush_pending(&mut self) -> Result<Option<UserStats>, MonitorError> {
        let mut queue = self.pending.queue();
        let mut latest = None;
        while let Some(event) = queue.front() {
            match self.store.add_sleep_incident(&self.user_id, event.duration_secs) {
                Ok(stats) => {
                    queue.pop_front();
                    self.recorded += 1;
                    latest = Some(stats);
                }
                Err(source) => {
                    warn!(
                        "Incident for {} not recorded ({} pending): {}",
                        self.user_id,
                        queue.len(),
                        source
                    );
                    return Err(MonitorError::StatsNotRecorded {
                        user_id: self.user_id.clone(),
                        source,
                    });
                }
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{event, FlakyStore, RecordingSink};
    use storage::{MemoryStore, UserProfile};

    fn memory_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.register_user("asha", UserProfile::default()).unwrap();
        store
    }

    #[test]
    fn test_records_and_alerts_once() {
        let store = memory_store();
        let sink = Arc::new(RecordingSink::default());
        let mut recorder = IncidentRecorder::new("asha", store.clone(), sink.clone());

        let stats = recorder.record(event(0, 5_200)).unwrap().unwrap();
        assert_eq!(stats.sleep_incidents, 1);
        assert!((stats.total_sleep_time - 5.2).abs() < 1e-9);
        assert_eq!(sink.count("asha"), 1);

        recorder.record(event(10_000, 16_000)).unwrap();
        let stats = store.stats("asha").unwrap();
        assert_eq!(stats.sleep_incidents, 2);
        assert!((stats.total_sleep_time - 11.2).abs() < 1e-9);
        assert_eq!(sink.count("asha"), 2);
        assert_eq!(recorder.recorded(), 2);
    }

    #[test]
    fn test_failed_write_is_kept_and_retried() {
        let store = Arc::new(FlakyStore::new("asha", 1));
        let sink = Arc::new(RecordingSink::default());
        let mut recorder = IncidentRecorder::new("asha", store.clone(), sink.clone());

        let err = recorder.record(event(0, 6_000)).unwrap_err();
        assert!(matches!(err, MonitorError::StatsNotRecorded { .. }));
        assert_eq!(recorder.pending(), 1);
        assert_eq!(sink.count("asha"), 1);

        let stats = recorder.record(event(20_000, 25_500)).unwrap().unwrap();
        assert_eq!(stats.sleep_incidents, 2);
        assert!((stats.total_sleep_time - 11.5).abs() < 1e-9);
        assert_eq!(recorder.pending(), 0);
        assert_eq!(sink.count("asha"), 2);
    }

    #[test]
    fn test_alert_failure_still_records() {
        let store = memory_store();
        let sink = Arc::new(RecordingSink::failing());
        let mut recorder = IncidentRecorder::new("asha", store.clone(), sink);

        assert!(recorder.record(event(0, 5_500)).is_ok());
        assert_eq!(store.stats("asha").unwrap().sleep_incidents, 1);
    }

    #[test]
    fn test_pending_handle_outlives_recorder() {
        let store = Arc::new(FlakyStore::new("asha", 1));
        let sink = Arc::new(RecordingSink::default());
        let mut recorder = IncidentRecorder::new("asha", store.clone(), sink.clone());
        let pending = recorder.pending_incidents();

        assert!(recorder.record(event(0, 5_100)).is_err());
        drop(recorder);
        assert_eq!(pending.len(), 1);

        let mut recorder =
            IncidentRecorder::with_pending("asha", store.clone(), sink, pending.clone());
        recorder.flush_pending().unwrap();
        assert!(pending.is_empty());
        assert_eq!(store.stats("asha").unwrap().sleep_incidents, 1);
    }
}
