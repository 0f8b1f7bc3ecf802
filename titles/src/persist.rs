use crate::error::PersistError;
use musiconn_api_client::EntityKind;
use musiconn_api_client::Uid;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Resolved titles, partitioned by the kind they were requested as.
pub type TitleMap = BTreeMap<EntityKind, BTreeMap<Uid, TitleEntry>>;

/// One resolved title as the remote API returns it for `props=title`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleEntry {
    pub title: String,
}

impl TitleEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Persisted copy of the whole title map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleSnapshot {
    pub data: TitleMap,
    /// Milliseconds since the Unix epoch at which the snapshot was taken
    pub timestamp: i64,
    pub version: String,
}

impl TitleSnapshot {
    pub const CURRENT_VERSION: &'static str = "1.0";

    pub fn new(data: TitleMap) -> Self {
        Self {
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: Self::CURRENT_VERSION.to_string(),
        }
    }

    /// Whether a snapshot may seed a cache at `now_ms`: same version and no
    /// older than `expiry`.
    pub fn is_usable(&self, now_ms: i64, expiry: Duration) -> bool {
        if self.version != Self::CURRENT_VERSION {
            tracing::warn!(
                "Title snapshot version mismatch: {} vs {}. Starting empty.",
                self.version,
                Self::CURRENT_VERSION
            );
            return false;
        }
        let max_age = i64::try_from(expiry.as_millis()).unwrap_or(i64::MAX);
        if now_ms.saturating_sub(self.timestamp) > max_age {
            tracing::info!("Title snapshot from {} has expired", self.timestamp);
            return false;
        }
        true
    }
}

/// Where title snapshots live between sessions.
pub trait SnapshotStore: Send + Sync {
    /// The stored snapshot, or `None` if nothing has been written yet.
    fn read(&self) -> Result<Option<TitleSnapshot>, PersistError>;

    fn write(&self, snapshot: &TitleSnapshot) -> Result<(), PersistError>;
}

/// Snapshot kept in one JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub const DEFAULT_FILENAME: &'static str = "titles_cache.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self) -> Result<Option<TitleSnapshot>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&self, snapshot: &TitleSnapshot) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(snapshot)?;
        // Atomic replace.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Snapshot held in memory as its serialized form.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    blob: Mutex<Option<String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw serialized snapshot, as a file store would have written it.
    pub fn raw(&self) -> Option<String> {
        match self.blob.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_raw(&self, raw: impl Into<String>) {
        let raw = Some(raw.into());
        match self.blob.lock() {
            Ok(mut guard) => *guard = raw,
            Err(poisoned) => *poisoned.into_inner() = raw,
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self) -> Result<Option<TitleSnapshot>, PersistError> {
        match self.raw() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write(&self, snapshot: &TitleSnapshot) -> Result<(), PersistError> {
        self.set_raw(serde_json::to_string(snapshot)?);
        Ok(())
    }
}
