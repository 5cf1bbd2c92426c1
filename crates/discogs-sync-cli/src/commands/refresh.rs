use discogs_sync_core::SyncConfig;
use serde_json::{json, Value};

use super::connect;
use crate::cli::RefreshArgs;
use crate::error::CliError;

pub async fn run(config: &SyncConfig, args: &RefreshArgs) -> Result<Value, CliError> {
    let coordinator = connect(config).await?;
    let payload = coordinator.force_refresh(args.endpoint).await?;

    Ok(json!({
        "endpoint": args.endpoint,
        "payload": payload,
        "snapshot": coordinator.snapshot().await,
    }))
}
