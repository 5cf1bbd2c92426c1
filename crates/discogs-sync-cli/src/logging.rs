//! Logging initialization.
//!
//! - `RUST_LOG`: filter directives (default: `info`, or `debug` with `--verbose`)
//!   - Example: `RUST_LOG=discogs_sync_core=debug`
//!
//! Logs always go to stderr so stdout stays a single JSON document.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";
const VERBOSE_LOG_LEVEL: &str = "debug";

pub fn init(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_LOG_LEVEL
    } else {
        DEFAULT_LOG_LEVEL
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (tests) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
