use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::time::Instant;

use crate::fetch::{BasicInformation, ExportBatch, FetchError};
use crate::ResourceKind;

/// Default minimum gap between two exports of the same resource.
pub const DEFAULT_EXPORT_COOLDOWN: Duration = Duration::from_secs(10);

/// Bulk export invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub resource: ResourceKind,
    /// Pretty JSON of the items is written here when set.
    pub path: Option<PathBuf>,
    /// Include the items in the response instead of counts only.
    pub return_items: bool,
}

impl ExportRequest {
    pub fn new(resource: ResourceKind) -> Self {
        Self {
            resource,
            path: None,
            return_items: false,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn returning_items(mut self) -> Self {
        self.return_items = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{resource} export called too frequently; try again in {:.1}s", .retry_in.as_secs_f64())]
    Cooldown {
        resource: ResourceKind,
        retry_in: Duration,
    },

    #[error("{resource} export is already running")]
    AlreadyRunning { resource: ResourceKind },

    #[error("cannot export without a username: {0}")]
    Username(#[source] FetchError),

    #[error("{resource} export failed: {source}")]
    Fetch {
        resource: ResourceKind,
        #[source]
        source: FetchError,
    },

    #[error("failed to write export to {path}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl ExportError {
    /// `{"error": "..."}` payload for callers that expect a JSON reply.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

/// Result of a finished export.
///
/// Serializes as `{"<resource>": [...], "complete": .., "pages": .., ...}`
/// when items were requested, counts only otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub resource: ResourceKind,
    pub count: usize,
    pub pages: u32,
    pub complete: bool,
    pub failure: Option<String>,
    pub path: Option<PathBuf>,
    pub items: Option<Vec<BasicInformation>>,
}

impl ExportSummary {
    pub fn from_batch(batch: ExportBatch, path: Option<PathBuf>, return_items: bool) -> Self {
        Self {
            resource: batch.resource,
            count: batch.items.len(),
            pages: batch.pages_fetched,
            complete: batch.complete,
            failure: batch.failure.map(|error| error.to_string()),
            path,
            items: return_items.then_some(batch.items),
        }
    }
}

impl Serialize for ExportSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("resource", &self.resource)?;
        map.serialize_entry("count", &self.count)?;
        map.serialize_entry("pages", &self.pages)?;
        map.serialize_entry("complete", &self.complete)?;
        if let Some(failure) = &self.failure {
            map.serialize_entry("failure", failure)?;
        }
        if let Some(path) = &self.path {
            map.serialize_entry("path", path)?;
        }
        if let Some(items) = &self.items {
            map.serialize_entry(self.resource.as_str(), items)?;
        }
        map.end()
    }
}

struct ResourceSlot {
    running: tokio::sync::Mutex<()>,
    last_started: Mutex<Option<Instant>>,
}

impl ResourceSlot {
    fn new() -> Self {
        Self {
            running: tokio::sync::Mutex::new(()),
            last_started: Mutex::new(None),
        }
    }
}

/// Per-resource cooldown and single-flight guard, owned by one coordinator.
pub(crate) struct ExportGuards {
    cooldown: Duration,
    collection: ResourceSlot,
    wantlist: ResourceSlot,
}

impl ExportGuards {
    pub(crate) fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            collection: ResourceSlot::new(),
            wantlist: ResourceSlot::new(),
        }
    }

    fn slot(&self, resource: ResourceKind) -> &ResourceSlot {
        match resource {
            ResourceKind::Collection => &self.collection,
            ResourceKind::Wantlist => &self.wantlist,
        }
    }

    /// Claims the resource without waiting. The export runs while the guard lives.
    pub(crate) fn begin(
        &self,
        resource: ResourceKind,
    ) -> Result<tokio::sync::MutexGuard<'_, ()>, ExportError> {
        let slot = self.slot(resource);
        let guard = slot
            .running
            .try_lock()
            .map_err(|_| ExportError::AlreadyRunning { resource })?;

        let now = Instant::now();
        let mut last_started = slot
            .last_started
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = *last_started {
            let elapsed = now.saturating_duration_since(previous);
            if elapsed < self.cooldown {
                return Err(ExportError::Cooldown {
                    resource,
                    retry_in: self.cooldown - elapsed,
                });
            }
        }
        *last_started = Some(now);

        Ok(guard)
    }
}

pub(crate) async fn write_items(
    path: &Path,
    items: &[BasicInformation],
) -> Result<(), ExportError> {
    let write_error = |reason: String| ExportError::Write {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| write_error(error.to_string()))?;
    }
    let body = serde_json::to_vec_pretty(items).map_err(|error| write_error(error.to_string()))?;
    tokio::fs::write(path, body)
        .await
        .map_err(|error| write_error(error.to_string()))
}
