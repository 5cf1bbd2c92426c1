mod export;
mod refresh;
mod run;
mod status;
mod tick;

use std::sync::Arc;

use discogs_sync_core::{Coordinator, JsonFileStore, ReqwestHttpClient, SyncConfig};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let config = load_config(cli)?;
    debug!(?config, "configuration loaded");

    match &cli.command {
        Command::Status => status::run(&config),
        Command::Tick => tick::run(&config).await,
        Command::Refresh(args) => refresh::run(&config, args).await,
        Command::Export(args) => export::run(&config, args).await,
        Command::Run => run::run(&config).await,
    }
}

fn load_config(cli: &Cli) -> Result<SyncConfig, CliError> {
    let mut config = SyncConfig::load(cli.config.as_deref())?;
    if let Some(state) = &cli.state {
        config.state_path = state.clone();
    }
    Ok(config)
}

/// Live coordinator over the reqwest transport, hydrated from the state file.
async fn connect(config: &SyncConfig) -> Result<Coordinator, CliError> {
    let http = Arc::new(ReqwestHttpClient::new(&config.user_agent));
    let source = Arc::new(config.build_source(http)?);
    let store = Arc::new(JsonFileStore::new(&config.state_path));

    let coordinator = Coordinator::new(source, store, config.coordinator_options());
    coordinator.setup().await?;
    Ok(coordinator)
}
