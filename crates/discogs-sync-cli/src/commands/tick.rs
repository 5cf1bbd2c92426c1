use discogs_sync_core::SyncConfig;
use serde_json::{json, Value};

use super::connect;
use crate::error::CliError;

pub async fn run(config: &SyncConfig) -> Result<Value, CliError> {
    let coordinator = connect(config).await?;
    let report = coordinator.tick().await;

    Ok(json!({
        "report": report,
        "rate_limit": coordinator.rate_limit_status(),
        "credentials": coordinator.credential_health(),
    }))
}
