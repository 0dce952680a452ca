//! JSON file stats store
//!
//! Keeps all users in one pretty-printed JSON object keyed by user id, the
//! same layout as the original `users.json`. Each write reloads the file,
//! applies the delta and atomically replaces it.

use crate::{check_duration, StatsStore, StorageError, UserProfile, UserRecord, UserStats};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

type UserFile = BTreeMap<String, UserRecord>;

/// Stats store backed by a JSON file
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store, creating an empty file if missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            info!("Creating user data file {}", path.display());
            write_atomic(&path, &UserFile::new())?;
        } else {
            info!("Using user data file {}", path.display());
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<UserFile, StorageError> {
        let raw = fs::read_to_string(&self.path).map_err(|e| StorageError::Io(e.to_string()))?;
        if raw.trim().is_empty() {
            return Ok(UserFile::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::SerializationError(e.to_string()))
    }

    fn update<F>(&self, user_id: &str, apply: F) -> Result<UserStats, StorageError>
    where
        F: FnOnce(&mut UserRecord),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let mut users = self.load()?;
        let record = users
            .get_mut(user_id)
            .ok_or_else(|| StorageError::UnknownUser(user_id.to_string()))?;
        apply(record);
        let stats = record.stats();

        write_atomic(&self.path, &users)?;
        debug!("Saved stats for {}", user_id);
        Ok(stats)
    }

    /// Full record for a user
    pub fn record(&self, user_id: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.load()?.remove(user_id))
    }
}

impl StatsStore for JsonFileStore {
    fn register_user(&self, user_id: &str, profile: UserProfile) -> Result<bool, StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;

        let mut users = self.load()?;
        if users.contains_key(user_id) {
            return Ok(false);
        }
        users.insert(user_id.to_string(), UserRecord::new(profile));
        write_atomic(&self.path, &users)?;
        info!("Registered user {}", user_id);
        Ok(true)
    }

    fn add_sleep_incident(
        &self,
        user_id: &str,
        duration_secs: f64,
    ) -> Result<UserStats, StorageError> {
        let duration_secs = check_duration(duration_secs)?;
        self.update(user_id, |r| r.add_sleep_incident(duration_secs))
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
        self.load()?
            .get(user_id)
            .map(UserRecord::stats)
            .ok_or_else(|| StorageError::UnknownUser(user_id.to_string()))
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, users: &UserFile) -> Result<(), StorageError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let body = serde_json::to_vec_pretty(users)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    let io_err = |e: std::io::Error| StorageError::Io(e.to_string());

    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&body).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
