//! Monitoring loop

use drowsiness::{ClosureAnalysis, DrowsinessDetector};
use landmarks::{LandmarkSource, Observation};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::recorder::IncidentRecorder;

/// Why the loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum LoopExit {
    /// Stop signal observed
    Stopped,
    /// Landmark source ended or failed
    SourceLost(String),
}

/// Totals for one run of the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub frames: u64,
    pub faces: u64,
    pub incidents: u64,
    /// Frame waits that hit the timeout
    pub idle_timeouts: u64,
    /// Incidents still waiting to be written when the loop ended
    pub unrecorded_incidents: usize,
    pub exit: LoopExit,
}

/// Single sequential driver: one tick at a time, never overlapping
pub struct MonitoringLoop {
    detector: DrowsinessDetector,
    recorder: IncidentRecorder,
    frame_timeout: Duration,
}

impl MonitoringLoop {
    pub fn new(
        detector: DrowsinessDetector,
        recorder: IncidentRecorder,
        frame_timeout: Duration,
    ) -> Self {
        Self {
            detector,
            recorder,
            frame_timeout,
        }
    }

    /// Evaluate one observation
    pub fn process(&mut self, observation: &Observation) -> ClosureAnalysis {
        let face = if observation.has_face() { "yes" } else { "no" };
        metrics::counter!("focusforge_frames_total", "face" => face).increment(1);

        let analysis = self.detector.analyze(observation);
        if let Some(event) = analysis.incident {
            if let Err(e) = self.recorder.record(event) {
                error!("{}", e);
            }
        }
        analysis
    }

    /// Run until `stop` flips to true or the source gives out
    ///
    /// The stop flag is checked before every tick and raced against the
    /// frame wait, which is itself bounded by the frame timeout.
    pub async fn run<S>(&mut self, source: &mut S, mut stop: watch::Receiver<bool>) -> LoopSummary
    where
        S: LandmarkSource + ?Sized,
    {
        info!("Starting monitoring loop for {}", self.recorder.user_id());
        self.detector.reset_state();

        let mut frames = 0u64;
        let mut faces = 0u64;
        let mut incidents = 0u64;
        let mut idle_timeouts = 0u64;
        // Warn once per idle stretch, not once per timeout
        let mut idle_warned = false;

        let exit = loop {
            let stopped = *stop.borrow();
            if stopped {
                break LoopExit::Stopped;
            }

            let next = tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break LoopExit::Stopped;
                    }
                    continue;
                }
                next = tokio::time::timeout(self.frame_timeout, source.next_frame()) => next,
            };

            let observation = match next {
                Ok(Ok(observation)) => observation,
                Ok(Err(e)) => {
                    error!("Landmark source lost: {}", e);
                    break LoopExit::SourceLost(e.to_string());
                }
                Err(_) => {
                    idle_timeouts += 1;
                    if idle_warned {
                        debug!("Still no landmark frame ({} timeouts)", idle_timeouts);
                    } else {
                        warn!("No landmark frame within {:?}", self.frame_timeout);
                        idle_warned = true;
                    }
                    continue;
                }
            };

            frames += 1;
            idle_warned = false;
            if observation.has_face() {
                faces += 1;
            }
            let analysis = self.process(&observation);
            if analysis.has_incident() {
                incidents += 1;
            }
            debug!(
                "tick {} ms: {:?} closed_for={:?}",
                analysis.timestamp_ms, analysis.reading, analysis.closed_for_ms
            );
        };

        self.detector.reset_state();
        if self.recorder.pending() > 0 {
            if let Err(e) = self.recorder.flush_pending() {
                warn!("Leaving loop with unrecorded incidents: {}", e);
            }
        }

        let summary = LoopSummary {
            frames,
            faces,
            incidents,
            idle_timeouts,
            unrecorded_incidents: self.recorder.pending(),
            exit,
        };
        info!(
            "Monitoring loop ended: {} frames, {} incidents ({:?})",
            summary.frames, summary.incidents, summary.exit
        );
        summary
    }

    /// Hand the recorder back (with any queued incidents)
    pub fn into_recorder(self) -> IncidentRecorder {
        self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{closed_face, open_face, FlakyStore, RecordingSink};
    use drowsiness::DrowsinessConfig;
    use landmarks::{JsonLinesSource, ScriptedSource};
    use std::sync::Arc;
    use storage::{MemoryStore, StatsStore, UserProfile};

    fn monitoring_loop(
        store: Arc<dyn StatsStore>,
        sink: Arc<RecordingSink>,
    ) -> MonitoringLoop {
        let detector = DrowsinessDetector::new(DrowsinessConfig::default()).unwrap();
        let recorder = IncidentRecorder::new("asha", store, sink);
        MonitoringLoop::new(detector, recorder, Duration::from_millis(200))
    }

    fn memory_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.register_user("asha", UserProfile::default()).unwrap();
        store
    }

    #[tokio::test]
    async fn test_one_incident_per_episode_end_to_end() {
        let store = memory_store();
        let sink = Arc::new(RecordingSink::default());
        let mut driver = monitoring_loop(store.clone(), sink.clone());

        // 10 fps: closed 0-30s, open, closed 31-38s
        let mut script: Vec<_> = (0..=300u64).map(|i| closed_face(i * 100)).collect();
        script.push(open_face(30_500));
        script.extend((310..=380u64).map(|i| closed_face(i * 100)));

        let (_tx, rx) = watch::channel(false);
        let summary = driver.run(&mut ScriptedSource::new(script), rx).await;

        assert_eq!(summary.exit, LoopExit::SourceLost("Landmark source exhausted".into()));
        assert_eq!(summary.frames, 373);
        assert_eq!(summary.idle_timeouts, 0);
        assert_eq!(summary.incidents, 2);
        assert_eq!(sink.count("asha"), 2);

        let stats = store.stats("asha").unwrap();
        assert_eq!(stats.sleep_incidents, 2);
        assert!((stats.total_sleep_time - 10.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_face_gap_prevents_incident() {
        let store = memory_store();
        let sink = Arc::new(RecordingSink::default());
        let mut driver = monitoring_loop(store.clone(), sink.clone());

        let mut script: Vec<_> = (0..30u64).map(|i| closed_face(i * 100)).collect();
        script.push(Observation::no_face(3_000));
        script.extend((31..=70u64).map(|i| closed_face(i * 100)));

        let (_tx, rx) = watch::channel(false);
        let summary = driver.run(&mut ScriptedSource::new(script), rx).await;
        assert_eq!(summary.incidents, 0);
        assert_eq!(summary.faces, 70);
        assert_eq!(store.stats("asha").unwrap().sleep_incidents, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_observed_while_waiting_for_frames() {
        let store = memory_store();
        let sink = Arc::new(RecordingSink::default());
        let mut driver = monitoring_loop(store, sink);

        // A reader that never produces a line
        let (_writer, reader) = tokio::io::duplex(64);
        let mut source = JsonLinesSource::new(tokio::io::BufReader::new(reader));

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_050)).await;
            tx.send(true).unwrap();
            tx
        });

        let summary = driver.run(&mut source, rx).await;
        assert_eq!(summary.exit, LoopExit::Stopped);
        assert_eq!(summary.frames, 0);
        // Waits end at 200, 400, 600, 800 and 1000 ms
        assert_eq!(summary.idle_timeouts, 5);
        drop(stopper.await.unwrap());
    }

    #[tokio::test]
    async fn test_unrecorded_incident_survives_loop_exit() {
        let store = Arc::new(FlakyStore::new("asha", 10));
        let sink = Arc::new(RecordingSink::default());
        let mut driver = monitoring_loop(store.clone(), sink.clone());

        let script: Vec<_> = (0..=60u64).map(|i| closed_face(i * 100)).collect();
        let (_tx, rx) = watch::channel(false);
        let summary = driver.run(&mut ScriptedSource::new(script), rx).await;

        assert_eq!(summary.incidents, 1);
        assert_eq!(summary.unrecorded_incidents, 1);
        assert_eq!(sink.count("asha"), 1);

        let mut recorder = driver.into_recorder();
        store.heal();
        recorder.flush_pending().unwrap();
        assert_eq!(store.stats("asha").unwrap().sleep_incidents, 1);
    }
}
