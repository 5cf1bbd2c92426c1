//! CLI argument definitions.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `status` | Print the persisted snapshot (no network) |
//! | `tick` | Fetch every endpoint that is due, once |
//! | `refresh` | Fetch one endpoint now, ignoring its interval |
//! | `export` | Fetch every page of the collection or wantlist |
//! | `run` | Poll on schedule until Ctrl-C |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | none | JSON configuration file |
//! | `--state` | `discogs_sync_state.json` | Snapshot file (overrides config and env) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--verbose` | `false` | Debug logging when `RUST_LOG` is unset |
//!
//! # Examples
//!
//! ```bash
//! DISCOGS_SYNC_TOKEN=... discogs-sync tick --pretty
//! discogs-sync refresh random_record
//! discogs-sync export wantlist --path wants.json
//! discogs-sync status
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use discogs_sync_core::{EndpointId, ResourceKind};

/// Rate-limited Discogs collection poller
#[derive(Debug, Parser)]
#[command(
    name = "discogs-sync",
    author,
    version,
    about = "Rate-limited Discogs collection poller",
    propagate_version = true
)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Snapshot file; takes precedence over config and environment.
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Pretty-print JSON output.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Debug logging when `RUST_LOG` is unset.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the persisted snapshot without contacting Discogs.
    Status,

    /// Fetch every endpoint that is due, once.
    Tick,

    /// Fetch one endpoint now, ignoring its interval.
    ///
    /// # Examples
    ///
    ///   discogs-sync refresh collection
    ///   discogs-sync refresh collection_value
    Refresh(RefreshArgs),

    /// Fetch every page of the collection or wantlist.
    ///
    /// # Examples
    ///
    ///   discogs-sync export collection --path collection.json
    ///   discogs-sync export wantlist --return-items
    Export(ExportArgs),

    /// Poll on schedule until Ctrl-C.
    Run,
}

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// One of collection, wantlist, collection_value, random_record.
    pub endpoint: EndpointId,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// collection or wantlist.
    pub resource: ResourceKind,

    /// Write the items as pretty JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Include the items in the printed result.
    #[arg(long, default_value_t = false)]
    pub return_items: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_refresh_endpoint_with_aliases() {
        let cli = Cli::try_parse_from(["discogs-sync", "refresh", "collection-value", "--pretty"])
            .expect("parse");

        assert!(cli.pretty);
        match cli.command {
            Command::Refresh(args) => assert_eq!(args.endpoint, EndpointId::CollectionValue),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_export_with_global_state_after_subcommand() {
        let cli = Cli::try_parse_from([
            "discogs-sync",
            "export",
            "wantlist",
            "--path",
            "wants.json",
            "--return-items",
            "--state",
            "state.json",
        ])
        .expect("parse");

        assert_eq!(cli.state, Some(PathBuf::from("state.json")));
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.resource, ResourceKind::Wantlist);
                assert_eq!(args.path, Some(PathBuf::from("wants.json")));
                assert!(args.return_items);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_endpoint() {
        assert!(Cli::try_parse_from(["discogs-sync", "refresh", "prices"]).is_err());
    }
}
