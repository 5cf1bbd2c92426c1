use discogs_sync_core::{ExportRequest, SyncConfig};
use serde_json::Value;

use super::connect;
use crate::cli::ExportArgs;
use crate::error::CliError;

pub async fn run(config: &SyncConfig, args: &ExportArgs) -> Result<Value, CliError> {
    let coordinator = connect(config).await?;

    let mut request = ExportRequest::new(args.resource);
    if let Some(path) = &args.path {
        request = request.with_path(path);
    }
    if args.return_items {
        request = request.returning_items();
    }

    let summary = coordinator.export(request).await?;
    Ok(serde_json::to_value(summary)?)
}
