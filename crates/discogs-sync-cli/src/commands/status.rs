use discogs_sync_core::{JsonFileStore, SnapshotStore, SyncConfig};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::CliError;

/// Persisted snapshot plus the effective schedule. Needs no token.
///
/// An unreadable state file reports `snapshot: null`, the same way the
/// coordinator treats it at setup.
pub fn run(config: &SyncConfig) -> Result<Value, CliError> {
    let store = JsonFileStore::new(&config.state_path);
    let snapshot = store.load().unwrap_or_else(|error| {
        warn!(%error, path = %store.path().display(), "ignoring unreadable persisted state");
        None
    });

    Ok(json!({
        "state_path": store.path(),
        "snapshot": snapshot,
        "scheduled_updates": config.enable_scheduled_updates,
        "intervals": config.schedule.effective(),
    }))
}
