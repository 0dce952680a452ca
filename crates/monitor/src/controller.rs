//! Start/stop control surface

use alerting::AlertSink;
use drowsiness::DrowsinessDetector;
use landmarks::LandmarkSource;
use serde::Serialize;
use std::sync::Arc;
use storage::{StatsStore, UserStats};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::driver::{LoopSummary, MonitoringLoop};
use crate::recorder::{IncidentRecorder, PendingIncidents};
use crate::session::{SessionError, SessionTimer};
use crate::MonitorError;

/// Landmark source shared by successive sessions
pub type SharedSource = Arc<Mutex<Box<dyn LandmarkSource>>>;

/// Wrap a source for use by a controller
pub fn shared_source<S: LandmarkSource + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(Box::new(source)))
}

/// Snapshot of the controller
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub user_id: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    /// Whether the loop is still consuming frames
    pub loop_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session: Option<LoopSummary>,
    pub unrecorded_incidents: usize,
    pub unrecorded_focus_secs: f64,
}

/// Result of a completed session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub focused_secs: f64,
    pub summary: LoopSummary,
    pub stats: UserStats,
}

struct ActiveSession {
    id: Uuid,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<(LoopSummary, IncidentRecorder)>,
}

struct ControllerState {
    timer: SessionTimer,
    active: Option<ActiveSession>,
    /// Parked between sessions; lent to the loop while it runs
    recorder: Option<IncidentRecorder>,
    pending_focus_secs: f64,
    last_summary: Option<LoopSummary>,
}

/// Owns the monitoring session for one user
pub struct MonitorController {
    config: MonitorConfig,
    store: Arc<dyn StatsStore>,
    alerts: Arc<dyn AlertSink>,
    source: SharedSource,
    clock: Arc<dyn Clock>,
    /// Survives the recorder, including a loop task that panics
    pending_incidents: PendingIncidents,
    state: Mutex<ControllerState>,
}

impl MonitorController {
    pub fn new(
        config: MonitorConfig,
        store: Arc<dyn StatsStore>,
        alerts: Arc<dyn AlertSink>,
        source: SharedSource,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MonitorError> {
        config.detection.validate()?;
        let pending_incidents = PendingIncidents::new();
        let recorder = IncidentRecorder::with_pending(
            config.user_id.clone(),
            Arc::clone(&store),
            Arc::clone(&alerts),
            pending_incidents.clone(),
        );
        Ok(Self {
            config,
            store,
            alerts,
            source,
            clock,
            pending_incidents,
            state: Mutex::new(ControllerState {
                timer: SessionTimer::new(),
                active: None,
                recorder: Some(recorder),
                pending_focus_secs: 0.0,
                last_summary: None,
            }),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.config.user_id
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        &self.store
    }

    /// Begin a monitoring session with fresh closure state
    pub async fn start_monitoring(&self) -> Result<Uuid, MonitorError> {
        let mut state = self.state.lock().await;
        if let Some(started_at_ms) = state.timer.started_at_ms() {
            return Err(SessionError::AlreadyRunning { started_at_ms }.into());
        }

        if let Err(e) = self.flush_locked(&mut state) {
            warn!("Starting with unrecorded stats: {}", e);
        }

        let detector = DrowsinessDetector::new(self.config.detection.clone())?;
        state.timer.start(self.clock.now_ms())?;

        let recorder = state.recorder.take().unwrap_or_else(|| self.new_recorder());

        let session_id = Uuid::new_v4();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut monitoring = MonitoringLoop::new(detector, recorder, self.config.frame_timeout());
        let source = Arc::clone(&self.source);
        let span = info_span!("monitoring", user_id = %self.config.user_id, %session_id);

        let task = tokio::spawn(
            async move {
                let mut source = source.lock().await;
                let summary = monitoring.run(&mut **source, stop_rx).await;
                (summary, monitoring.into_recorder())
            }
            .instrument(span),
        );

        metrics::gauge!("focusforge_monitoring_active").set(1.0);
        info!("Monitoring started for {} (session {})", self.config.user_id, session_id);
        state.active = Some(ActiveSession {
            id: session_id,
            stop_tx,
            task,
        });
        Ok(session_id)
    }

    /// End the session, wait for the loop and credit the focused time
    pub async fn stop_monitoring(&self) -> Result<SessionReport, MonitorError> {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock().await;
        let elapsed = state.timer.stop(now_ms)?;
        let focused_secs = elapsed.as_secs_f64();
        state.pending_focus_secs += focused_secs;
        metrics::gauge!("focusforge_monitoring_active").set(0.0);

        let ActiveSession { id, stop_tx, task } = state
            .active
            .take()
            .ok_or_else(|| MonitorError::Task("monitoring task missing".into()))?;

        let _ = stop_tx.send(true);
        let (summary, recorder) = match task.await {
            Ok(done) => done,
            Err(e) => {
                error!("Monitoring task for {} failed: {}", self.config.user_id, e);
                state.recorder = Some(self.new_recorder());
                if let Err(flush) = self.flush_locked(&mut state) {
                    warn!("Unrecorded stats kept for retry: {}", flush);
                }
                return Err(MonitorError::Task(e.to_string()));
            }
        };
        state.recorder = Some(recorder);
        state.last_summary = Some(summary.clone());

        self.flush_locked(&mut state)?;
        let stats = self
            .store
            .stats(&self.config.user_id)
            .map_err(|source| MonitorError::StatsNotRecorded {
                user_id: self.config.user_id.clone(),
                source,
            })?;

        info!(
            "Monitoring stopped for {}: session focused time {:.2}s",
            self.config.user_id, focused_secs
        );
        Ok(SessionReport {
            session_id: id,
            focused_secs,
            summary,
            stats,
        })
    }

    /// Retry any stats writes that failed earlier
    pub async fn flush_pending(&self) -> Result<(), MonitorError> {
        let mut state = self.state.lock().await;
        self.flush_locked(&mut state)
    }

    // Shares the controller's queue so nothing pending is dropped
    fn new_recorder(&self) -> IncidentRecorder {
        IncidentRecorder::with_pending(
            self.config.user_id.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.alerts),
            self.pending_incidents.clone(),
        )
    }

    fn flush_locked(&self, state: &mut ControllerState) -> Result<(), MonitorError> {
        if let Some(recorder) = state.recorder.as_mut() {
            recorder.flush_pending()?;
        }
        if state.pending_focus_secs > 0.0 {
            self.store
                .add_focused_time(&self.config.user_id, state.pending_focus_secs)
                .map_err(|source| MonitorError::StatsNotRecorded {
                    user_id: self.config.user_id.clone(),
                    source,
                })?;
            state.pending_focus_secs = 0.0;
        }
        Ok(())
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        MonitorStatus {
            user_id: self.config.user_id.clone(),
            active: state.timer.is_running(),
            session_id: state.active.as_ref().map(|a| a.id),
            started_at_ms: state.timer.started_at_ms(),
            loop_running: state.active.as_ref().is_some_and(|a| !a.task.is_finished()),
            last_session: state.last_summary.clone(),
            unrecorded_incidents: self.pending_incidents.len(),
            unrecorded_focus_secs: state.pending_focus_secs,
        }
    }
}
