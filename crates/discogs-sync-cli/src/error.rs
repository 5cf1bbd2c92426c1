use discogs_sync_core::{
    CoordinatorError, CoreError, ExportError, FetchError, FetchErrorKind, ValidationError,
};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("configuration error: {0}")]
    Config(#[from] CoreError),

    #[error(transparent)]
    Setup(#[from] CoordinatorError),

    #[error("refresh failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) => 2,
            Self::Setup(_) => 3,
            Self::Fetch(error) | Self::Export(ExportError::Username(error)) => {
                if error.is_auth() {
                    3
                } else {
                    10
                }
            }
            Self::Export(ExportError::Fetch { source, .. }) => {
                if matches!(source.kind(), FetchErrorKind::Auth) {
                    3
                } else {
                    10
                }
            }
            Self::Export(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
