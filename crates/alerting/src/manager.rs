//! Alarm Notifier Implementation

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{AlertError, AlertSink};

/// Phrases shown alongside the alarm
pub const WAKE_UP_PHRASES: &[&str] = &[
    "Utho bhai! Neend me padhna mana hai.",
    "Zyada mat socho, bas padho!",
    "Focus karo! Aankhein khol lo.",
    "Padhai se bhaag mat yaar!",
    "Arey! Neend ko maaro goli, chalo padho.",
];

/// Alarm timing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmPolicy {
    /// Delay between chimes (milliseconds, default: 2000)
    pub repeat_interval_ms: u64,
    /// Total ringing window (milliseconds, default: 20000)
    pub duration_ms: u64,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        Self {
            repeat_interval_ms: 2_000,
            duration_ms: 20_000,
        }
    }
}

impl AlarmPolicy {
    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(self.repeat_interval_ms.max(1))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Something that makes one audible cue
pub trait Chime: Send + Sync + 'static {
    fn play(&self);
}

/// Terminal bell on stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&self) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07");
        let _ = stderr.flush();
    }
}

/// Alarm state for one user
#[derive(Debug)]
pub struct AlarmState {
    /// Number of alarms raised
    pub fire_count: usize,
    ring: Option<JoinHandle<()>>,
}

impl AlarmState {
    pub fn is_ringing(&self) -> bool {
        self.ring.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Alert sink that rings a chime on the alarm policy's schedule
///
/// A new alert for a user who is still ringing restarts the window.
pub struct AlarmNotifier<C: Chime> {
    chime: Arc<C>,
    policy: AlarmPolicy,
    states: Mutex<HashMap<String, AlarmState>>,
}

impl AlarmNotifier<TerminalBell> {
    /// Alarm that rings the terminal bell
    pub fn terminal(policy: AlarmPolicy) -> Self {
        Self::new(TerminalBell, policy)
    }
}

impl<C: Chime> AlarmNotifier<C> {
    /// Create a new alarm notifier
    pub fn new(chime: C, policy: AlarmPolicy) -> Self {
        info!("Creating alarm notifier with policy: {:?}", policy);
        Self {
            chime: Arc::new(chime),
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> AlarmPolicy {
        self.policy
    }

    /// Number of alarms raised for a user
    pub fn fire_count(&self, user_id: &str) -> usize {
        self.states
            .lock()
            .map(|s| s.get(user_id).map_or(0, |st| st.fire_count))
            .unwrap_or(0)
    }

    /// Whether the user's alarm is still ringing
    pub fn is_ringing(&self, user_id: &str) -> bool {
        self.states
            .lock()
            .map(|s| s.get(user_id).is_some_and(AlarmState::is_ringing))
            .unwrap_or(false)
    }

    /// Stop a ringing alarm early
    pub fn silence(&self, user_id: &str) -> bool {
        let Ok(mut states) = self.states.lock() else {
            return false;
        };
        match states.get_mut(user_id).and_then(|st| st.ring.take()) {
            Some(handle) => {
                handle.abort();
                info!("Alarm silenced for {}", user_id);
                true
            }
            None => false,
        }
    }
}

impl<C: Chime> AlertSink for AlarmNotifier<C> {
    fn raise_alert(&self, user_id: &str) -> Result<(), AlertError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| AlertError::NoRuntime)?;

        let mut states = self.states.lock().map_err(|_| AlertError::Lock)?;

        let phrase = WAKE_UP_PHRASES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Wake up!");
        warn!(user_id, "{}", phrase);

        let state = states.entry(user_id.to_string()).or_insert(AlarmState {
            fire_count: 0,
            ring: None,
        });
        let ring = runtime.spawn(ring(Arc::clone(&self.chime), self.policy));
        if let Some(previous) = state.ring.replace(ring) {
            debug!("Restarting alarm window for {}", user_id);
            previous.abort();
        }
        state.fire_count += 1;

        info!("Alarm raised for {} (count: {})", user_id, state.fire_count);
        Ok(())
    }
}

/// Chime immediately, then every interval until the window closes
async fn ring<C: Chime>(chime: Arc<C>, policy: AlarmPolicy) {
    let deadline = Instant::now() + policy.duration();
    let mut ticker = tokio::time::interval(policy.repeat_interval());
    loop {
        ticker.tick().await;
        if Instant::now() >= deadline {
            break;
        }
        chime.play();
    }
    debug!("Alarm window closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingChime(Arc<AtomicUsize>);

    impl Chime for CountingChime {
        fn play(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn notifier() -> (AlarmNotifier<CountingChime>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let notifier =
            AlarmNotifier::new(CountingChime(Arc::clone(&count)), AlarmPolicy::default());
        (notifier, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_chime_repeats_for_window_then_stops() {
        let (notifier, count) = notifier();
        notifier.raise_alert("asha").unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3); // 0s, 2s, 4s
        assert!(notifier.is_ringing("asha"));

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 10);
        assert!(!notifier.is_ringing("asha"));
        assert_eq!(notifier.fire_count("asha"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_alert_restarts_window() {
        let (notifier, count) = notifier();
        notifier.raise_alert("asha").unwrap();
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);

        notifier.raise_alert("asha").unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 15);
        assert_eq!(notifier.fire_count("asha"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence() {
        let (notifier, count) = notifier();
        notifier.raise_alert("asha").unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(notifier.silence("asha"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(!notifier.silence("nobody"));
    }

    #[test]
    fn test_requires_runtime() {
        let (notifier, _) = notifier();
        assert!(matches!(notifier.raise_alert("asha"), Err(AlertError::NoRuntime)));
        assert_eq!(notifier.fire_count("asha"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poisoned_state_does_not_ring() {
        let (notifier, count) = notifier();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = notifier.states.lock().unwrap();
            panic!("poison alarm state");
        }));

        assert!(matches!(notifier.raise_alert("asha"), Err(AlertError::Lock)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
