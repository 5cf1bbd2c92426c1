use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::domain::DEFAULT_CURRENCY;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::policy::RequestPolicy;
use crate::rate_limit::RateLimiter;
use crate::retry::retry_with_backoff;
use crate::{CollectionValue, RandomRecord, ResourceKind};

use super::parse::{parse_amount, record_from};
use super::wire::{
    CollectionValueResponse, FolderResponse, IdentityResponse, PageResponse, ProfileResponse,
};
use super::{CatalogSource, ExportBatch, FetchError, FetchFuture, IdentityInfo};

pub const DEFAULT_API_BASE: &str = "https://api.discogs.com";
pub const DEFAULT_USER_AGENT: &str = concat!("discogs-sync/", env!("CARGO_PKG_VERSION"));

/// Live Discogs catalog source.
///
/// Every request waits on the shared [`RateLimiter`], carries the token and
/// user agent, and feeds the response headers back into the limiter before
/// the status is inspected.
pub struct DiscogsSource {
    http: Arc<dyn HttpClient>,
    auth: HttpAuth,
    api_base: String,
    user_agent: String,
    policy: RequestPolicy,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for DiscogsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscogsSource")
            .field("auth", &self.auth)
            .field("api_base", &self.api_base)
            .field("user_agent", &self.user_agent)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DiscogsSource {
    pub fn new(http: Arc<dyn HttpClient>, auth: HttpAuth, policy: RequestPolicy) -> Self {
        let limiter = Arc::new(RateLimiter::from_policy(&policy));
        Self {
            http,
            auth,
            api_base: String::from(DEFAULT_API_BASE),
            user_agent: String::from(DEFAULT_USER_AGENT),
            policy,
            limiter,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn user_url(&self, username: &str, rest: &str) -> String {
        self.url(&format!("/users/{}{rest}", urlencoding::encode(username)))
    }

    fn page_url(&self, resource: ResourceKind, username: &str, page: u64, per_page: u64) -> String {
        let path = match resource {
            ResourceKind::Collection => "/collection/folders/0/releases",
            ResourceKind::Wantlist => "/wants",
        };
        self.user_url(username, &format!("{path}?page={page}&per_page={per_page}"))
    }

    /// One logical GET with pacing, quota bookkeeping and retries.
    async fn get_json<T>(&self, label: &str, url: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Send,
    {
        retry_with_backoff(
            &self.policy.retry,
            label,
            |error: &FetchError| error.kind().retry_class(),
            |attempt| self.get_once(url, attempt),
        )
        .await
    }

    async fn get_once<T>(&self, url: &str, attempt: u32) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Send,
    {
        self.limiter.before_request().await;
        debug!(url, attempt, "discogs request");

        let request = HttpRequest::get(url)
            .with_auth(&self.auth)
            .with_header("user-agent", self.user_agent.as_str())
            .with_timeout_ms(self.policy.request_timeout.as_millis() as u64);

        let response = self.http.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                FetchError::network(format!("request to {url} timed out: {error}"))
            } else {
                FetchError::network(format!("request to {url} failed: {error}"))
            }
        })?;

        self.limiter.on_response(&response.headers, response.status);

        if !response.is_success() {
            return Err(FetchError::from_status(response.status, url));
        }

        serde_json::from_str(&response.body)
            .map_err(|error| FetchError::parse(format!("failed to decode {url}: {error}")))
    }

    async fn fetch_identity(&self, known_username: Option<&str>) -> Result<IdentityInfo, FetchError> {
        let username = match known_username.filter(|name| !name.is_empty()) {
            Some(name) => name.to_owned(),
            None => {
                let identity: IdentityResponse =
                    self.get_json("identity", &self.url("/oauth/identity")).await?;
                identity
                    .username
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| FetchError::parse("identity response carried no username"))?
            }
        };

        let profile: ProfileResponse = self
            .get_json("profile", &self.user_url(&username, ""))
            .await?;

        Ok(IdentityInfo {
            username,
            currency: profile
                .curr_abbr
                .filter(|currency| !currency.is_empty())
                .unwrap_or_else(|| String::from(DEFAULT_CURRENCY)),
            collection_count: profile.num_collection.unwrap_or(0),
            wantlist_count: profile.num_wantlist.unwrap_or(0),
        })
    }

    async fn fetch_wantlist_count(&self, username: &str) -> Result<u64, FetchError> {
        let page: PageResponse = self
            .get_json("wantlist", &self.page_url(ResourceKind::Wantlist, username, 1, 1))
            .await?;

        Ok(page
            .pagination
            .and_then(|pagination| pagination.items)
            .unwrap_or(0))
    }

    async fn fetch_collection_value(
        &self,
        username: &str,
        currency: &str,
    ) -> Result<CollectionValue, FetchError> {
        let value: CollectionValueResponse = self
            .get_json("collection_value", &self.user_url(username, "/collection/value"))
            .await?;

        Ok(CollectionValue {
            min: parse_amount(value.minimum.as_ref()),
            median: parse_amount(value.median.as_ref()),
            max: parse_amount(value.maximum.as_ref()),
            currency: currency.to_owned(),
        })
    }

    async fn fetch_random_record(&self, username: &str) -> Result<RandomRecord, FetchError> {
        let folder: FolderResponse = self
            .get_json("random_record", &self.user_url(username, "/collection/folders/0"))
            .await?;

        let count = folder.count.unwrap_or(0);
        if count == 0 {
            return Err(FetchError::no_data(format!("collection of {username} is empty")));
        }

        let per_page = u64::from(self.policy.page_size);
        let index = fastrand::u64(0..count);
        let (page, offset) = sample_position(index, per_page);
        debug!(count, index, page, "sampling random record");

        let response: PageResponse = self
            .get_json(
                "random_record",
                &self.page_url(ResourceKind::Collection, username, page, per_page),
            )
            .await?;

        let items = response.into_items();
        if items.is_empty() {
            return Err(FetchError::no_data(format!(
                "page {page} of {username}'s collection was empty"
            )));
        }

        // The collection may have shrunk since the count was read.
        let position = offset % items.len();
        let info = items
            .into_iter()
            .nth(position)
            .and_then(|item| item.basic_information)
            .unwrap_or_default();

        Ok(record_from(&info))
    }

    async fn fetch_export(
        &self,
        resource: ResourceKind,
        username: &str,
    ) -> Result<ExportBatch, FetchError> {
        let per_page = u64::from(self.policy.page_size);
        let label = format!("export_{resource}");
        let mut items = Vec::new();
        let mut page: u64 = 1;
        let mut pages_fetched: u32 = 0;

        loop {
            let url = self.page_url(resource, username, page, per_page);
            let response: PageResponse = match self.get_json(&label, &url).await {
                Ok(response) => response,
                Err(error) if pages_fetched == 0 => return Err(error),
                Err(error) => {
                    warn!(
                        %resource,
                        page,
                        fetched = items.len(),
                        %error,
                        "export stopped early; returning partial result"
                    );
                    return Ok(ExportBatch {
                        resource,
                        items,
                        pages_fetched,
                        complete: false,
                        failure: Some(error),
                    });
                }
            };

            pages_fetched += 1;
            let last_page = u64::from(response.last_page());
            let page_items = response.into_items();
            if page_items.is_empty() {
                debug!(%resource, page, "empty page; export finished");
                break;
            }

            let received = page_items.len();
            items.extend(
                page_items
                    .into_iter()
                    .map(|item| item.basic_information.unwrap_or_default()),
            );
            debug!(%resource, page, last_page, received, total = items.len(), "fetched export page");

            if page >= last_page {
                break;
            }
            page += 1;
        }

        info!(%resource, items = items.len(), pages = pages_fetched, "export finished");
        Ok(ExportBatch {
            resource,
            items,
            pages_fetched,
            complete: true,
            failure: None,
        })
    }
}

/// 1-based page and in-page offset holding the item at `index`.
fn sample_position(index: u64, per_page: u64) -> (u64, usize) {
    let per_page = per_page.max(1);
    (index / per_page + 1, (index % per_page) as usize)
}

impl CatalogSource for DiscogsSource {
    fn identity<'a>(&'a self, known_username: Option<&'a str>) -> FetchFuture<'a, IdentityInfo> {
        Box::pin(self.fetch_identity(known_username))
    }

    fn wantlist_count<'a>(&'a self, username: &'a str) -> FetchFuture<'a, u64> {
        Box::pin(self.fetch_wantlist_count(username))
    }

    fn collection_value<'a>(
        &'a self,
        username: &'a str,
        currency: &'a str,
    ) -> FetchFuture<'a, CollectionValue> {
        Box::pin(self.fetch_collection_value(username, currency))
    }

    fn random_record<'a>(&'a self, username: &'a str) -> FetchFuture<'a, RandomRecord> {
        Box::pin(self.fetch_random_record(username))
    }

    fn export<'a>(&'a self, resource: ResourceKind, username: &'a str) -> FetchFuture<'a, ExportBatch> {
        Box::pin(self.fetch_export(resource, username))
    }

    fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }
}
