//! # Discogs Sync Core
//!
//! Rate-limited polling of a Discogs account: identity and collection count,
//! wantlist count, collection value and a random record, each on its own
//! interval, with the last known value kept across restarts.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | JSON configuration with environment overrides |
//! | [`coordinator`] | Scheduling coordinator, forced refresh, bulk export |
//! | [`domain`] | Snapshot and timestamp types |
//! | [`endpoint`] | Endpoint and resource identifiers |
//! | [`error`] | Core error types |
//! | [`fetch`] | Catalog source trait and the Discogs implementation |
//! | [`health`] | Credential health tracking |
//! | [`http_client`] | HTTP transport abstraction (reqwest and fixtures) |
//! | [`policy`] | Request spacing, timeout and retry budget |
//! | [`rate_limit`] | Shared request spacing and quota tracking |
//! | [`retry`] | Retry loop with backoff |
//! | [`store`] | Snapshot persistence |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use discogs_sync_core::{Coordinator, JsonFileStore, ReqwestHttpClient, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::load(None)?;
//!     let http = Arc::new(ReqwestHttpClient::new(&config.user_agent));
//!     let source = Arc::new(config.build_source(http)?);
//!     let store = Arc::new(JsonFileStore::new(&config.state_path));
//!
//!     let coordinator = Coordinator::new(source, store, config.coordinator_options());
//!     coordinator.setup().await?;
//!     let report = coordinator.tick().await;
//!     println!("{} records", report.snapshot.collection_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Coordinator    │────▶│ SnapshotStore    │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ CatalogSource   │────▶│ RateLimiter      │
//! │ (DiscogsSource) │     │ (shared, Arc)    │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ HttpClient      │
//! │ (reqwest/fixture)│
//! └─────────────────┘
//! ```
//!
//! ## Security
//!
//! - The token is never logged; `Debug` output redacts it
//! - Usernames are URL-encoded before they reach a request path

pub mod config;
pub mod coordinator;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod health;
pub mod http_client;
pub mod policy;
pub mod rate_limit;
pub mod retry;
pub mod store;

// Configuration
pub use config::{ExportConfig, RateLimitConfig, SyncConfig};

// Coordinator
pub use coordinator::{
    Coordinator, CoordinatorError, CoordinatorOptions, CoordinatorStatus, EndpointFailure,
    EndpointSchedule, ExportError, ExportRequest, ExportSummary, IntervalUpdate, SnapshotEvent,
    TickReport,
};

// Domain models
pub use domain::{CollectionValue, RandomRecord, RecordMetadata, Snapshot, UtcDateTime};

// Identifiers
pub use endpoint::{EndpointId, ResourceKind};

// Error types
pub use error::{CoreError, ValidationError};

// Fetchers
pub use fetch::{
    BasicInformation, CatalogSource, DiscogsSource, EndpointPayload, ExportBatch, FetchError,
    FetchErrorKind, IdentityInfo,
};

// Credential health
pub use health::{CredentialHealth, CredentialMonitor, CredentialState};

// HTTP client types
pub use http_client::{
    FixtureHttpClient, FixtureReply, HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Request policy
pub use policy::RequestPolicy;

// Rate limiting
pub use rate_limit::{RateLimitState, RateLimitStatus, RateLimiter};

// Retry logic
pub use retry::{retry_with_backoff, Backoff, RetryClass, RetryConfig};

// Persistence
pub use store::{JsonFileStore, MemoryStore, SnapshotStore, StoreError};
