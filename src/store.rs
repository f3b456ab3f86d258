use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MotionReplayError, Result};
use crate::sample::Sample;

/// Fixed name of the durable session record
pub const STORE_NAME: &str = "motion-data-storage";

/// Persisted controller state (JSON-serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_recording: bool,
    pub current_index: usize,
    pub log: Vec<Sample>,
    pub saved_at: String,
}

impl SessionSnapshot {
    pub fn new(is_recording: bool, current_index: usize, log: Vec<Sample>) -> Self {
        Self {
            is_recording,
            current_index,
            log,
            saved_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn empty() -> Self {
        Self::new(false, 0, Vec::new())
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| MotionReplayError::StorageError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MotionReplayError::StorageError(e.to_string()))
    }
}

/// Durable home for the session snapshot
pub trait PersistentStore {
    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<()>;

    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<SessionSnapshot>>;
}

/// Snapshot stored as `<dir>/motion-data-storage.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORE_NAME}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the stored snapshot; missing file is fine
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PersistentStore for JsonFileStore {
    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Readers see the old record or the new one, never a partial write
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, snapshot.to_json()?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        SessionSnapshot::from_json(&json).map(Some)
    }
}

/// In-memory store, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Option<SessionSnapshot>,
    save_count: usize,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            ..Self::default()
        }
    }

    /// Every save fails with a storage error
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn save_count(&self) -> usize {
        self.save_count
    }
}

impl PersistentStore for MemoryStore {
    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        if self.fail_writes {
            return Err(MotionReplayError::StorageError("write refused".to_string()));
        }
        self.snapshot = Some(snapshot.clone());
        self.save_count += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<SessionSnapshot>> {
        Ok(self.snapshot.clone())
    }
}
