//! Endpoint fetchers and the catalog source contract.
//!
//! | Operation | Upstream call(s) | Result |
//! |-----------|------------------|--------|
//! | [`CatalogSource::identity`] | `/oauth/identity` (when needed), `/users/{u}` | [`IdentityInfo`] |
//! | [`CatalogSource::wantlist_count`] | `/users/{u}/wants?page=1&per_page=1` | item count |
//! | [`CatalogSource::collection_value`] | `/users/{u}/collection/value` | [`CollectionValue`] |
//! | [`CatalogSource::random_record`] | `/users/{u}/collection/folders/0`, one release page | [`RandomRecord`] |
//! | [`CatalogSource::export`] | every page of releases or wants | [`ExportBatch`] |

mod discogs;
pub mod parse;
pub mod wire;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::rate_limit::RateLimiter;
use crate::retry::RetryClass;
use crate::{CollectionValue, EndpointId, RandomRecord, ResourceKind};

pub use discogs::{DiscogsSource, DEFAULT_API_BASE, DEFAULT_USER_AGENT};
pub use wire::BasicInformation;

pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Why a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Token rejected (`401`/`403`).
    Auth,
    /// `429` persisted through every retry.
    RateLimited,
    /// Transport failure, timeout or `5xx`.
    Network,
    /// Body could not be decoded.
    Parse,
    NotFound,
    /// The resource exists but has nothing to sample.
    NoData,
    /// No username is known and none could be resolved.
    MissingUsername,
}

impl FetchErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Auth => "fetch.auth",
            Self::RateLimited => "fetch.rate_limited",
            Self::Network => "fetch.network",
            Self::Parse => "fetch.parse",
            Self::NotFound => "fetch.not_found",
            Self::NoData => "fetch.no_data",
            Self::MissingUsername => "fetch.missing_username",
        }
    }

    pub const fn retry_class(self) -> RetryClass {
        match self {
            Self::RateLimited => RetryClass::RateLimited,
            Self::Network => RetryClass::Transient,
            _ => RetryClass::Fatal,
        }
    }
}

/// Structured fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({})", .kind.code())]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    status: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Auth, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Parse, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NoData, message)
    }

    /// The identity lookup behind a username-scoped request failed.
    pub fn missing_username(cause: &FetchError) -> Self {
        Self::new(
            FetchErrorKind::MissingUsername,
            format!("username could not be resolved: {cause}"),
        )
    }

    /// Maps a non-success HTTP status to a failure kind.
    pub fn from_status(status: u16, url: &str) -> Self {
        let kind = match status {
            401 | 403 => FetchErrorKind::Auth,
            404 => FetchErrorKind::NotFound,
            429 => FetchErrorKind::RateLimited,
            _ => FetchErrorKind::Network,
        };
        Self {
            kind,
            message: format!("upstream returned status {status} for {url}"),
            status: Some(status),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn retryable(&self) -> bool {
        !matches!(self.kind.retry_class(), RetryClass::Fatal)
    }

    pub const fn is_auth(&self) -> bool {
        matches!(self.kind, FetchErrorKind::Auth)
    }
}

/// Profile data resolved by the identity call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityInfo {
    pub username: String,
    pub currency: String,
    pub collection_count: u64,
    pub wantlist_count: u64,
}

/// Successful fetch result, one variant per endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "endpoint", content = "value", rename_all = "snake_case")]
pub enum EndpointPayload {
    Collection(IdentityInfo),
    Wantlist(u64),
    CollectionValue(CollectionValue),
    RandomRecord(RandomRecord),
}

impl EndpointPayload {
    pub const fn endpoint(&self) -> EndpointId {
        match self {
            Self::Collection(_) => EndpointId::Collection,
            Self::Wantlist(_) => EndpointId::Wantlist,
            Self::CollectionValue(_) => EndpointId::CollectionValue,
            Self::RandomRecord(_) => EndpointId::RandomRecord,
        }
    }
}

/// Items gathered by a paginated export.
///
/// `complete` is false when a page failed after its retries; `items` then
/// holds everything fetched before the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBatch {
    pub resource: ResourceKind,
    pub items: Vec<BasicInformation>,
    pub pages_fetched: u32,
    pub complete: bool,
    pub failure: Option<FetchError>,
}

/// Upstream catalog contract. One implementation per account.
pub trait CatalogSource: Send + Sync {
    /// Resolves the username when `known_username` is `None`, then reads the
    /// profile counts and currency.
    fn identity<'a>(&'a self, known_username: Option<&'a str>) -> FetchFuture<'a, IdentityInfo>;

    fn wantlist_count<'a>(&'a self, username: &'a str) -> FetchFuture<'a, u64>;

    fn collection_value<'a>(
        &'a self,
        username: &'a str,
        currency: &'a str,
    ) -> FetchFuture<'a, CollectionValue>;

    fn random_record<'a>(&'a self, username: &'a str) -> FetchFuture<'a, RandomRecord>;

    /// Fetches every page of `resource`. Fails only when the first page fails.
    fn export<'a>(&'a self, resource: ResourceKind, username: &'a str) -> FetchFuture<'a, ExportBatch>;

    /// Limiter shared by every call this source makes.
    fn rate_limiter(&self) -> Arc<RateLimiter>;
}
