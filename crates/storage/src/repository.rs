//! In-memory stats store

use crate::{check_duration, StatsStore, StorageError, UserProfile, UserRecord, UserStats};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Stats store held in process memory
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        info!("Creating in-memory stats store");
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, UserRecord>>, StorageError> {
        self.users
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }

    fn update<F>(&self, user_id: &str, apply: F) -> Result<UserStats, StorageError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let mut users = self.lock()?;
        let record = users
            .get_mut(user_id)
            .ok_or_else(|| StorageError::UnknownUser(user_id.to_string()))?;
        apply(record);
        Ok(record.stats())
    }

    /// Full record for a user
    pub fn record(&self, user_id: &str) -> Option<UserRecord> {
        self.users.lock().ok()?.get(user_id).cloned()
    }

    /// Number of registered users
    pub fn user_count(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsStore for MemoryStore {
    fn register_user(&self, user_id: &str, profile: UserProfile) -> Result<bool, StorageError> {
        let mut users = self.lock()?;
        if users.contains_key(user_id) {
            return Ok(false);
        }
        users.insert(user_id.to_string(), UserRecord::new(profile));
        info!("Registered user {}", user_id);
        Ok(true)
    }

    fn add_sleep_incident(
        &self,
        user_id: &str,
        duration_secs: f64,
    ) -> Result<UserStats, StorageError> {
        let duration_secs = check_duration(duration_secs)?;
        let stats = self.update(user_id, |r| r.add_sleep_incident(duration_secs))?;
        debug!("{}: {} sleep incidents", user_id, stats.sleep_incidents);
        Ok(stats)
    }

    fn add_focused_time(
        &self,
        user_id: &str,
        duration_secs: f64,
    ) -> Result<UserStats, StorageError> {
        let duration_secs = check_duration(duration_secs)?;
        self.update(user_id, |r| r.add_focused_time(duration_secs))
    }

    fn stats(&self, user_id: &str) -> Result<UserStats, StorageError> {
        let users = self.lock()?;
        users
            .get(user_id)
            .map(UserRecord::stats)
            .ok_or_else(|| StorageError::UnknownUser(user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn store_with(user: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.register_user(user, UserProfile::default()).unwrap();
        store
    }

    #[test]
    fn test_register_twice() {
        let store = MemoryStore::new();
        assert!(store.register_user("asha", UserProfile::default()).unwrap());
        assert!(!store.register_user("asha", UserProfile::default()).unwrap());
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_accumulates() {
        let store = store_with("asha");
        store.add_sleep_incident("asha", 5.2).unwrap();
        let stats = store.add_sleep_incident("asha", 6.0).unwrap();
        assert_eq!(stats.sleep_incidents, 2);
        assert!((stats.total_sleep_time - 11.2).abs() < 1e-9);

        let stats = store.add_focused_time("asha", 60.0).unwrap();
        assert_eq!(stats.focused_time, 60.0);
        assert_eq!(store.stats("asha").unwrap(), stats);
    }

    #[test]
    fn test_unknown_user() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.add_focused_time("ghost", 1.0),
            Err(StorageError::UnknownUser(_))
        ));
        assert!(store.stats("ghost").is_err());
    }

    #[test]
    fn test_rejects_negative_duration() {
        let store = store_with("asha");
        assert!(store.add_sleep_incident("asha", -3.0).is_err());
        assert_eq!(store.stats("asha").unwrap(), UserStats::default());
    }

    #[test]
    fn test_concurrent_writes_are_linearized() {
        let store = Arc::new(store_with("asha"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.add_sleep_incident("asha", 1.0).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = store.stats("asha").unwrap();
        assert_eq!(stats.sleep_incidents, 800);
        assert_eq!(stats.total_sleep_time, 800.0);
    }
}
