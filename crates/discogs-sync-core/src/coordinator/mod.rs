//! Multi-endpoint polling coordinator.
//!
//! The coordinator owns the authoritative [`Snapshot`]. Every endpoint has its
//! own interval; a tick fetches the endpoints that are due, strictly one after
//! another, through the account-wide [`RateLimiter`]. A failed fetch never
//! touches the endpoint's fields.
//!
//! | Operation | Schedule | Limiter | Notifies |
//! |-----------|----------|---------|----------|
//! | [`Coordinator::tick`] | due endpoints only | yes | once per tick with changes |
//! | [`Coordinator::force_refresh`] | bypassed | yes | on success |
//! | [`Coordinator::export`] | n/a | yes | no |

mod export;
mod schedule;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::fetch::{CatalogSource, EndpointPayload, FetchError, FetchErrorKind};
use crate::health::{CredentialHealth, CredentialMonitor, DEFAULT_AUTH_FAILURE_THRESHOLD};
use crate::rate_limit::{RateLimitStatus, RateLimiter};
use crate::store::SnapshotStore;
use crate::{EndpointId, Snapshot, UtcDateTime};

pub use export::{ExportError, ExportRequest, ExportSummary, DEFAULT_EXPORT_COOLDOWN};
pub use schedule::{
    EndpointSchedule, IntervalUpdate, DEFAULT_COLLECTION_VALUE_MINUTES, DEFAULT_GLOBAL_MINUTES,
    DEFAULT_RANDOM_RECORD_MINUTES, IDLE_TICK_PERIOD, MIN_TICK_PERIOD,
};

use export::{write_items, ExportGuards};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("initial identity fetch failed: {0}")]
    Setup(#[source] FetchError),
}

/// Change notification sent after the snapshot was updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SnapshotEvent {
    Updated { endpoints: Vec<EndpointId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointFailure {
    pub endpoint: EndpointId,
    pub kind: FetchErrorKind,
    pub message: String,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub scheduled_updates: bool,
    pub due: Vec<EndpointId>,
    pub succeeded: Vec<EndpointId>,
    pub failed: Vec<EndpointFailure>,
    /// Due but not attempted because a 429 reset window is still open.
    pub skipped: Vec<EndpointId>,
    pub snapshot: Snapshot,
}

/// Everything a presentation layer needs in one read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorStatus {
    pub snapshot: Snapshot,
    pub rate_limit: RateLimitStatus,
    pub credentials: CredentialHealth,
    pub scheduled_updates: bool,
    pub intervals: BTreeMap<EndpointId, i64>,
    pub tick_period_secs: u64,
}

/// Coordinator tuning. Defaults match the documented intervals and guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub schedule: EndpointSchedule,
    pub scheduled_updates: bool,
    pub auth_failure_threshold: u32,
    pub export_cooldown: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            schedule: EndpointSchedule::default(),
            scheduled_updates: true,
            auth_failure_threshold: DEFAULT_AUTH_FAILURE_THRESHOLD,
            export_cooldown: DEFAULT_EXPORT_COOLDOWN,
        }
    }
}

struct ResolvedUser {
    username: String,
    currency: String,
}

/// Polling coordinator for one Discogs account.
pub struct Coordinator {
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn SnapshotStore>,
    limiter: Arc<RateLimiter>,
    snapshot: RwLock<Snapshot>,
    schedule: Mutex<EndpointSchedule>,
    scheduled_updates: AtomicBool,
    endpoint_locks: [tokio::sync::Mutex<()>; EndpointId::ALL.len()],
    tick_lock: tokio::sync::Mutex<()>,
    persist_lock: tokio::sync::Mutex<()>,
    credentials: CredentialMonitor,
    exports: ExportGuards,
    events: broadcast::Sender<SnapshotEvent>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("schedule", &self.schedule())
            .field("scheduled_updates", &self.scheduled_updates())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<dyn SnapshotStore>,
        options: CoordinatorOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            limiter: source.rate_limiter(),
            source,
            store,
            snapshot: RwLock::new(Snapshot::default()),
            schedule: Mutex::new(options.schedule),
            scheduled_updates: AtomicBool::new(options.scheduled_updates),
            endpoint_locks: std::array::from_fn(|_| tokio::sync::Mutex::new(())),
            tick_lock: tokio::sync::Mutex::new(()),
            persist_lock: tokio::sync::Mutex::new(()),
            credentials: CredentialMonitor::new(options.auth_failure_threshold),
            exports: ExportGuards::new(options.export_cooldown),
            events,
        }
    }

    /// Hydrates from the store. Without persisted state the identity fetch
    /// must succeed; with persisted state upstream errors are only logged.
    pub async fn setup(&self) -> Result<(), CoordinatorError> {
        let persisted = match self.store.load() {
            Ok(persisted) => persisted,
            Err(error) => {
                warn!(%error, "ignoring unreadable persisted state");
                None
            }
        };

        if let Some(snapshot) = persisted {
            info!(user = %snapshot.user, "restored persisted snapshot");
            *self.snapshot.write().await = snapshot;
            return Ok(());
        }

        info!("no persisted state; fetching identity");
        let _guard = self.endpoint_lock(EndpointId::Collection).lock().await;
        let identity = self.source.identity(None).await.map_err(|error| {
            self.note_failure(EndpointId::Collection, &error);
            CoordinatorError::Setup(error)
        })?;

        self.commit(EndpointPayload::Collection(identity), UtcDateTime::now())
            .await;
        self.notify(vec![EndpointId::Collection]);
        Ok(())
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.events.subscribe()
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status()
    }

    pub fn credential_health(&self) -> CredentialHealth {
        self.credentials.health()
    }

    pub fn schedule(&self) -> EndpointSchedule {
        self.schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn scheduled_updates(&self) -> bool {
        self.scheduled_updates.load(Ordering::SeqCst)
    }

    pub fn set_scheduled_updates(&self, enabled: bool) {
        let previous = self.scheduled_updates.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "scheduled updates toggled");
        }
    }

    /// Applies an interval change atomically; the run loop picks it up after
    /// the current sleep.
    pub fn update_intervals(&self, update: &IntervalUpdate) {
        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        schedule.apply(update);
        info!(intervals = ?schedule.effective(), "update intervals changed");
    }

    pub fn tick_period(&self) -> Duration {
        self.schedule().tick_period()
    }

    pub async fn status(&self) -> CoordinatorStatus {
        let schedule = self.schedule();
        CoordinatorStatus {
            snapshot: self.snapshot().await,
            rate_limit: self.rate_limit_status(),
            credentials: self.credential_health(),
            scheduled_updates: self.scheduled_updates(),
            intervals: schedule.effective(),
            tick_period_secs: schedule.tick_period().as_secs(),
        }
    }

    pub async fn tick(&self) -> TickReport {
        self.tick_at(UtcDateTime::now()).await
    }

    /// Runs every endpoint due at `now`, in tick order.
    pub async fn tick_at(&self, now: UtcDateTime) -> TickReport {
        let _tick = self.tick_lock.lock().await;
        let scheduled_updates = self.scheduled_updates();
        let mut report = TickReport {
            scheduled_updates,
            due: Vec::new(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            snapshot: Snapshot::default(),
        };

        if !scheduled_updates {
            debug!("scheduled updates disabled; tick is a no-op");
            report.snapshot = self.snapshot().await;
            return report;
        }

        let schedule = self.schedule();
        for endpoint in EndpointId::ALL {
            let _guard = self.endpoint_lock(endpoint).lock().await;

            let last_success = self.snapshot.read().await.last_success(endpoint);
            if !schedule.is_due(endpoint, last_success, now) {
                debug!(%endpoint, "not due");
                continue;
            }
            report.due.push(endpoint);

            if !endpoint.is_critical() && self.limiter.is_cooling_down() {
                debug!(%endpoint, "rate limit cooling down; skipping non-critical endpoint");
                report.skipped.push(endpoint);
                continue;
            }

            match self.fetch_and_commit(endpoint, now).await {
                Ok(_) => report.succeeded.push(endpoint),
                Err(error) => report.failed.push(EndpointFailure {
                    endpoint,
                    kind: error.kind(),
                    message: error.message().to_owned(),
                }),
            }
        }

        if !report.succeeded.is_empty() {
            self.notify(report.succeeded.clone());
        }
        debug!(
            due = report.due.len(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "tick finished"
        );

        report.snapshot = self.snapshot().await;
        report
    }

    /// Fetches `endpoint` now, regardless of its schedule.
    ///
    /// Waits for any scheduled fetch of the same endpoint to finish first and
    /// still goes through the shared limiter.
    pub async fn force_refresh(&self, endpoint: EndpointId) -> Result<EndpointPayload, FetchError> {
        let _guard = self.endpoint_lock(endpoint).lock().await;
        info!(%endpoint, "forced refresh");

        let payload = self.fetch_and_commit(endpoint, UtcDateTime::now()).await?;
        self.notify(vec![endpoint]);
        Ok(payload)
    }

    /// Ticks immediately, then every [`Self::tick_period`] until `shutdown`
    /// resolves. The period is re-read after every tick.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(period_secs = self.tick_period().as_secs(), "polling loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.tick() => {}
            }

            let period = self.tick_period();
            debug!(period_secs = period.as_secs(), "sleeping until next tick");
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        info!("polling loop stopped");
    }

    /// Fetches every page of a collection or wantlist.
    ///
    /// Rejected without waiting when an export of the same resource is running
    /// or the previous one started less than the cooldown ago.
    pub async fn export(&self, request: ExportRequest) -> Result<ExportSummary, ExportError> {
        let resource = request.resource;
        let _running = self.exports.begin(resource)?;
        info!(%resource, path = ?request.path, "export started");

        let user = self.resolve_user().await.map_err(ExportError::Username)?;
        let batch = self
            .source
            .export(resource, &user.username)
            .await
            .map_err(|source| {
                self.track_credentials(&source);
                ExportError::Fetch { resource, source }
            })?;

        if let Some(path) = &request.path {
            write_items(path, &batch.items).await?;
            info!(%resource, items = batch.items.len(), path = %path.display(), "export written");
        }

        Ok(ExportSummary::from_batch(
            batch,
            request.path,
            request.return_items,
        ))
    }

    fn endpoint_lock(&self, endpoint: EndpointId) -> &tokio::sync::Mutex<()> {
        &self.endpoint_locks[endpoint as usize]
    }

    /// Caller holds the endpoint lock.
    async fn fetch_and_commit(
        &self,
        endpoint: EndpointId,
        at: UtcDateTime,
    ) -> Result<EndpointPayload, FetchError> {
        match self.fetch(endpoint).await {
            Ok(payload) => {
                self.credentials.record_success();
                self.commit(payload.clone(), at).await;
                debug!(%endpoint, "fetch succeeded");
                Ok(payload)
            }
            Err(error) => {
                self.note_failure(endpoint, &error);
                Err(error)
            }
        }
    }

    async fn fetch(&self, endpoint: EndpointId) -> Result<EndpointPayload, FetchError> {
        let payload = match endpoint {
            EndpointId::Collection => {
                let known = self.snapshot.read().await.username().map(str::to_owned);
                EndpointPayload::Collection(self.source.identity(known.as_deref()).await?)
            }
            EndpointId::Wantlist => {
                let user = self.resolve_user().await?;
                EndpointPayload::Wantlist(self.source.wantlist_count(&user.username).await?)
            }
            EndpointId::CollectionValue => {
                let user = self.resolve_user().await?;
                EndpointPayload::CollectionValue(
                    self.source
                        .collection_value(&user.username, &user.currency)
                        .await?,
                )
            }
            EndpointId::RandomRecord => {
                let user = self.resolve_user().await?;
                EndpointPayload::RandomRecord(self.source.random_record(&user.username).await?)
            }
        };
        Ok(payload)
    }

    /// Username and currency from the snapshot, resolving the identity first
    /// when no username is known yet. Only `user` and `currency` are stored.
    async fn resolve_user(&self) -> Result<ResolvedUser, FetchError> {
        {
            let snapshot = self.snapshot.read().await;
            if let Some(username) = snapshot.username() {
                return Ok(ResolvedUser {
                    username: username.to_owned(),
                    currency: snapshot.currency.clone(),
                });
            }
        }

        debug!("username unknown; resolving identity");
        let identity = self.source.identity(None).await.map_err(|error| {
            if error.is_auth() {
                error
            } else {
                FetchError::missing_username(&error)
            }
        })?;

        {
            let mut snapshot = self.snapshot.write().await;
            snapshot.user = identity.username.clone();
            snapshot.currency = identity.currency.clone();
        }
        self.persist().await;

        Ok(ResolvedUser {
            username: identity.username,
            currency: identity.currency,
        })
    }

    /// Writes the endpoint's owned fields and persists the result.
    async fn commit(&self, payload: EndpointPayload, at: UtcDateTime) {
        {
            let endpoint = payload.endpoint();
            let mut snapshot = self.snapshot.write().await;
            match payload {
                EndpointPayload::Collection(identity) => {
                    snapshot.user = identity.username;
                    snapshot.currency = identity.currency;
                    snapshot.collection_count = identity.collection_count;
                }
                EndpointPayload::Wantlist(count) => snapshot.wantlist_count = count,
                EndpointPayload::CollectionValue(value) => snapshot.collection_value = value,
                EndpointPayload::RandomRecord(record) => snapshot.random_record = record,
            }
            snapshot.mark_success(endpoint, at);
        }
        self.persist().await;
    }

    /// Saves the current snapshot off the runtime threads. Saves are
    /// serialized and each one reads the snapshot after taking the lock, so a
    /// slow write never lands on top of a newer one.
    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(%error, "failed to persist snapshot; continuing with in-memory state");
            }
            Err(error) => {
                warn!(%error, "snapshot save task failed; continuing with in-memory state");
            }
        }
    }

    fn note_failure(&self, endpoint: EndpointId, error: &FetchError) {
        self.track_credentials(error);
        warn!(%endpoint, %error, "fetch failed; keeping last known value");
    }

    fn track_credentials(&self, error: &FetchError) {
        if error.is_auth() && self.credentials.record_auth_failure() {
            let health = self.credentials.health();
            error!(
                threshold = health.threshold,
                "discogs rejected the token {} times in a row; check the configured token",
                health.consecutive_auth_failures
            );
        }
    }

    fn notify(&self, endpoints: Vec<EndpointId>) {
        // No subscribers is not an error.
        let _ = self.events.send(SnapshotEvent::Updated { endpoints });
    }
}
