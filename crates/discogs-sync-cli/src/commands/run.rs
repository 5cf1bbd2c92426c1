use discogs_sync_core::{SnapshotEvent, SyncConfig};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::connect;
use crate::error::CliError;

/// Polls until Ctrl-C, then prints the final status.
pub async fn run(config: &SyncConfig) -> Result<Value, CliError> {
    let coordinator = connect(config).await?;

    let mut events = coordinator.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SnapshotEvent::Updated { endpoints }) => {
                    info!(?endpoints, "snapshot updated");
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "event listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    coordinator.run(shutdown_signal()).await;
    listener.abort();

    Ok(serde_json::to_value(coordinator.status().await)?)
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "cannot listen for Ctrl-C; polling until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
