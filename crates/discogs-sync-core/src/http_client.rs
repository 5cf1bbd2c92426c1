use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default upper bound for a single upstream call.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Authentication strategy applied to outgoing HTTP requests.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    /// Personal access token, sent as `Authorization: Discogs token=<token>`.
    DiscogsToken(String),
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        match self {
            Self::DiscogsToken(token) => {
                headers.insert(String::from("authorization"), format!("Discogs token={token}"));
            }
        }
    }
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DiscogsToken(_) => f.write_str("DiscogsToken(<redacted>)"),
        }
    }
}

/// HTTP GET request envelope used by fetcher transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// HTTP response envelope returned by a transport. Header names are lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error: the request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    timeout: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timeout: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn is_timeout(&self) -> bool {
        self.timeout
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Transport contract used by the catalog fetchers.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production HTTP client using reqwest for real API calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    /// Create a client that identifies itself with `user_agent`.
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(user_agent)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(&request.url)
                .timeout(Duration::from_millis(request.timeout_ms));

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    HttpError::new(format!("connection failed: {e}"))
                } else {
                    HttpError::new(format!("request failed: {e}"))
                }
            })?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_ascii_lowercase(), value.to_owned()))
                })
                .collect();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    HttpError::timeout(format!("response body timeout: {e}"))
                } else {
                    HttpError::new(format!("failed to read response body: {e}"))
                }
            })?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Canned reply for [`FixtureHttpClient`].
#[derive(Debug, Clone)]
pub enum FixtureReply {
    Response(HttpResponse),
    Error(HttpError),
}

impl From<HttpResponse> for FixtureReply {
    fn from(response: HttpResponse) -> Self {
        Self::Response(response)
    }
}

impl From<HttpError> for FixtureReply {
    fn from(error: HttpError) -> Self {
        Self::Error(error)
    }
}

/// Offline transport that answers from a route table keyed by path and query.
///
/// Replies queued for a route are consumed in order; the last one is sticky.
/// Unknown routes answer `404`. Every request is recorded, and the highest
/// number of concurrently executing requests is tracked.
#[derive(Debug, Default)]
pub struct FixtureHttpClient {
    routes: Mutex<HashMap<String, VecDeque<FixtureReply>>>,
    log: Mutex<Vec<HttpRequest>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FixtureHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queue a reply for `path_and_query`, e.g. `/users/alice/wants?page=1&per_page=1`.
    pub fn route(&self, path_and_query: impl Into<String>, reply: impl Into<FixtureReply>) -> &Self {
        let mut routes = self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        routes
            .entry(path_and_query.into())
            .or_default()
            .push_back(reply.into());
        self
    }

    /// Path-and-query of every request seen so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|request| path_and_query(&request.url).to_owned())
            .collect()
    }

    /// Full request envelopes, including headers.
    pub fn recorded(&self) -> Vec<HttpRequest> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn request_count(&self, path_and_query: &str) -> usize {
        self.requests()
            .iter()
            .filter(|seen| seen.as_str() == path_and_query)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, key: &str) -> FixtureReply {
        let mut routes = self.routes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match routes.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| FixtureReply::Response(not_found())),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| FixtureReply::Response(not_found())),
            None => FixtureReply::Response(not_found()),
        }
    }
}

impl HttpClient for FixtureHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let key = path_and_query(&request.url).to_owned();
            self.log
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(request);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let reply = self.next_reply(&key);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match reply {
                FixtureReply::Response(response) => Ok(response),
                FixtureReply::Error(error) => Err(error),
            }
        })
    }
}

fn not_found() -> HttpResponse {
    HttpResponse::new(404, r#"{"message": "The requested resource was not found."}"#)
}

/// Strips scheme and authority: `https://host/a?b=1` becomes `/a?b=1`.
fn path_and_query(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("/", |index| &rest[index..])
}
