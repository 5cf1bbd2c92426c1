//! Snapshot persistence.
//!
//! The whole snapshot is one JSON blob wrapped in a versioned envelope:
//!
//! ```json
//! { "version": 1, "snapshot": { "user": "alice", ... } }
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::Snapshot;

pub const STORE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("state file io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Load/save contract for the coordinator's snapshot.
pub trait SnapshotStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    snapshot: &'a Snapshot,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    snapshot: Snapshot,
}

/// JSON file store. Writes go to a temp file in the same directory, then
/// replace the target with a rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.io_error(error)),
        };

        let envelope: Envelope =
            serde_json::from_str(&raw).map_err(|error| self.corrupt(error.to_string()))?;
        if envelope.version != STORE_VERSION {
            return Err(self.corrupt(format!(
                "unsupported version {} (expected {STORE_VERSION})",
                envelope.version
            )));
        }

        debug!(path = %self.path.display(), "loaded persisted snapshot");
        Ok(Some(envelope.snapshot.normalize()))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(&EnvelopeRef {
            version: STORE_VERSION,
            snapshot,
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|error| self.io_error(error))?;

        let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|error| self.io_error(error))?;
        temp.write_all(&body).map_err(|error| self.io_error(error))?;
        temp.as_file().sync_all().map_err(|error| self.io_error(error))?;
        temp.persist(&self.path)
            .map_err(|error| self.io_error(error.error))?;

        debug!(path = %self.path.display(), bytes = body.len(), "persisted snapshot");
        Ok(())
    }
}

/// Process-local store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
