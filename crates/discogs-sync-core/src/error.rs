use thiserror::Error;

/// Validation and contract errors exposed by `discogs-sync-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid endpoint '{value}', expected one of collection, wantlist, collection_value, random_record")]
    InvalidEndpoint { value: String },
    #[error("invalid resource '{value}', expected one of collection, wantlist")]
    InvalidResource { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("api token is missing; set DISCOGS_SYNC_TOKEN or the `token` config field")]
    MissingToken,
    #[error("api base url must start with http:// or https://: '{value}'")]
    InvalidApiBase { value: String },
    #[error("field '{field}' must be greater than zero")]
    NonPositive { field: &'static str },
}

/// Top-level error type for configuration loading.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
