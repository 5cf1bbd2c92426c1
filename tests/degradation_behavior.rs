//! Behavior-driven tests for graceful degradation
//!
//! These tests verify that upstream trouble (server errors, rate limiting,
//! revoked tokens) never costs the user the last known values.

use discogs_sync_tests::*;

fn restored_coordinator(http: &Arc<FixtureHttpClient>) -> Coordinator {
    coordinator(http, Arc::new(MemoryStore::with_snapshot(known_user_snapshot())))
}

// =============================================================================
// Last known good values
// =============================================================================

#[tokio::test]
async fn failed_fetch_keeps_previous_values_after_retries() {
    // Given: A restored snapshot and a profile endpoint that keeps failing
    let http = Arc::new(FixtureHttpClient::new());
    http.route(PROFILE, HttpResponse::new(503, "upstream unavailable"));
    let coordinator = restored_coordinator(&http);
    coordinator.setup().await.expect("restored from store");

    // When: The user forces a collection refresh
    let error = coordinator
        .force_refresh(EndpointId::Collection)
        .await
        .expect_err("upstream is down");

    // Then: The failure is classified as transient and was retried
    assert_eq!(error.kind(), FetchErrorKind::Network);
    assert_eq!(http.request_count(PROFILE), 4);

    // And: Nothing in the snapshot changed
    assert_eq!(coordinator.snapshot().await, known_user_snapshot());
}

#[tokio::test]
async fn persisted_state_allows_offline_startup() {
    // Given: A persisted snapshot and an upstream that answers nothing useful
    let http = Arc::new(FixtureHttpClient::new());
    let coordinator = restored_coordinator(&http);

    // When: The coordinator starts
    coordinator.setup().await.expect("startup uses persisted state");

    // Then: The persisted values are served without any request
    assert!(http.requests().is_empty());
    assert_eq!(coordinator.snapshot().await.collection_count, 7);
}

#[tokio::test]
async fn startup_without_persisted_state_requires_identity() {
    // Given: No persisted state and a rejected token
    let http = Arc::new(FixtureHttpClient::new());
    http.route(IDENTITY, unauthorized());
    let coordinator = coordinator(&http, Arc::new(MemoryStore::new()));

    // When: The coordinator starts
    let error = coordinator.setup().await.expect_err("identity is required");

    // Then: Setup fails with the auth error and the snapshot stays empty
    let CoordinatorError::Setup(cause) = error;
    assert_eq!(cause.kind(), FetchErrorKind::Auth);
    assert!(!coordinator.snapshot().await.has_user());
    // Auth failures are not retried.
    assert_eq!(http.request_count(IDENTITY), 1);
}

#[tokio::test]
async fn empty_collection_leaves_random_record_unset() {
    // Given: A user whose collection folder is empty
    let http = Arc::new(FixtureHttpClient::new());
    http.route(FOLDER, json_response(serde_json::json!({"count": 0})));
    let coordinator = restored_coordinator(&http);
    coordinator.setup().await.expect("restored");

    // When: A random record is requested
    let error = coordinator
        .force_refresh(EndpointId::RandomRecord)
        .await
        .expect_err("nothing to sample");

    // Then: The failure says there is no data and no page was requested
    assert_eq!(error.kind(), FetchErrorKind::NoData);
    assert_eq!(http.requests(), vec![FOLDER.to_owned()]);
    assert_eq!(coordinator.snapshot().await.random_record.title, None);
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn rate_limited_request_is_retried_and_quota_recovers() {
    // Given: The profile endpoint answers 429 once, then succeeds
    let http = Arc::new(FixtureHttpClient::new());
    http.route(PROFILE, too_many_requests())
        .route(PROFILE, with_quota(profile(130, 45), 5, 55));
    let coordinator = restored_coordinator(&http);
    coordinator.setup().await.expect("restored");

    // When: The collection is refreshed
    coordinator
        .force_refresh(EndpointId::Collection)
        .await
        .expect("second attempt succeeds");

    // Then: The value is updated after one retry
    assert_eq!(http.request_count(PROFILE), 2);
    assert_eq!(coordinator.snapshot().await.collection_count, 130);

    // And: The quota reflects the successful response
    let status = coordinator.rate_limit_status();
    assert!(!status.exceeded);
    assert_eq!(status.used, 5);
    assert_eq!(status.remaining, 55);
    assert_eq!(status.reset_at, None);
}

#[tokio::test]
async fn exhausted_quota_skips_non_critical_endpoints_until_it_clears() {
    // Given: Every endpoint is due and the profile endpoint keeps answering 429
    let http = Arc::new(FixtureHttpClient::new());
    http.route(PROFILE, too_many_requests());
    user_endpoints_fixture(&http);
    let coordinator = coordinator_with_policy(
        &http,
        Arc::new(MemoryStore::with_snapshot(known_user_snapshot())),
        single_attempt_policy(Duration::from_secs(60)),
        CoordinatorOptions::default(),
    );
    coordinator.setup().await.expect("restored");

    // When: A tick runs while the upstream reports the quota exhausted
    let report = coordinator.tick_at(t0() + minutes(15)).await;

    // Then: The critical endpoint was attempted and failed as rate limited
    assert_eq!(report.due, EndpointId::ALL.to_vec());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].endpoint, EndpointId::Collection);
    assert_eq!(report.failed[0].kind, FetchErrorKind::RateLimited);

    // And: The other due endpoints were skipped without a request
    assert_eq!(
        report.skipped,
        vec![
            EndpointId::Wantlist,
            EndpointId::CollectionValue,
            EndpointId::RandomRecord
        ]
    );
    assert_eq!(http.request_count(WANTLIST_COUNT), 0);

    // And: Observers can tell "rate limited" from "offline"
    let status = coordinator.rate_limit_status();
    assert!(status.exceeded);
    assert_eq!(status.remaining, 0);
    assert!(status.reset_at.is_some());

    // When: The upstream recovers after one more 429
    http.route(PROFILE, with_quota(profile(120, 45), 2, 58));
    let still_limited = coordinator.force_refresh(EndpointId::Collection).await;
    assert_eq!(
        still_limited.map_err(|error| error.kind()).err(),
        Some(FetchErrorKind::RateLimited)
    );
    coordinator
        .force_refresh(EndpointId::Collection)
        .await
        .expect("recovered");

    // Then: The flag clears and the next tick runs every due endpoint
    assert!(!coordinator.rate_limit_status().exceeded);
    let report = coordinator.tick_at(t0() + minutes(30)).await;
    assert!(report.skipped.is_empty());
    assert!(report.succeeded.contains(&EndpointId::Wantlist));
}

#[tokio::test]
async fn non_critical_endpoints_resume_after_the_reset_window_without_collection() {
    // Given: Only the wantlist is polled and its first answer is a 429
    let http = Arc::new(FixtureHttpClient::new());
    http.route(WANTLIST_COUNT, too_many_requests())
        .route(WANTLIST_COUNT, json_response(serde_json::json!({"pagination": {"items": 99}})));
    let schedule = EndpointSchedule::uniform(10)
        .with_override(EndpointId::Collection, 0)
        .with_override(EndpointId::CollectionValue, 0)
        .with_override(EndpointId::RandomRecord, 0);
    let coordinator = coordinator_with_policy(
        &http,
        Arc::new(MemoryStore::with_snapshot(known_user_snapshot())),
        single_attempt_policy(Duration::from_millis(200)),
        CoordinatorOptions {
            schedule,
            ..CoordinatorOptions::default()
        },
    );
    coordinator.setup().await.expect("restored");

    // When: The wantlist is rate limited and polled again inside the window
    let limited = coordinator.tick_at(t0() + minutes(15)).await;
    let cooling = coordinator.tick_at(t0() + minutes(20)).await;

    // Then: The second tick skips it without a request
    assert_eq!(limited.failed[0].kind, FetchErrorKind::RateLimited);
    assert_eq!(cooling.skipped, vec![EndpointId::Wantlist]);
    assert_eq!(http.request_count(WANTLIST_COUNT), 1);

    // When: The reset window passes with no collection fetch to clear the flag
    tokio::time::sleep(Duration::from_millis(250)).await;
    let resumed = coordinator.tick_at(t0() + minutes(30)).await;

    // Then: The wantlist is fetched again and its success clears the flag
    assert!(resumed.skipped.is_empty());
    assert_eq!(resumed.succeeded, vec![EndpointId::Wantlist]);
    assert_eq!(coordinator.snapshot().await.wantlist_count, 99);
    assert_eq!(http.request_count(WANTLIST_COUNT), 2);
    assert!(!coordinator.rate_limit_status().exceeded);
}

// =============================================================================
// Credentials
// =============================================================================

#[tokio::test]
async fn repeated_auth_failures_mark_credentials_rejected() {
    // Given: A revoked token and a healthy wantlist endpoint
    let http = Arc::new(FixtureHttpClient::new());
    http.route(PROFILE, unauthorized()).route(
        WANTLIST_COUNT,
        json_response(serde_json::json!({"pagination": {"items": 46}})),
    );
    let coordinator = restored_coordinator(&http);
    coordinator.setup().await.expect("restored");
    assert_eq!(coordinator.credential_health().state, CredentialState::Healthy);

    // When: The collection refresh is rejected once
    let error = coordinator
        .force_refresh(EndpointId::Collection)
        .await
        .expect_err("rejected");

    // Then: The failure is an auth error and was not retried
    assert_eq!(error.kind(), FetchErrorKind::Auth);
    assert_eq!(http.request_count(PROFILE), 1);
    assert_eq!(coordinator.credential_health().state, CredentialState::Failing);

    // When: It is rejected two more times
    for _ in 0..2 {
        let _ = coordinator.force_refresh(EndpointId::Collection).await;
    }

    // Then: The credentials are reported as rejected
    let health = coordinator.credential_health();
    assert_eq!(health.state, CredentialState::Rejected);
    assert_eq!(health.consecutive_auth_failures, 3);

    // When: Any request succeeds again
    coordinator
        .force_refresh(EndpointId::Wantlist)
        .await
        .expect("wantlist still works");

    // Then: The credentials are healthy again
    assert_eq!(coordinator.credential_health().state, CredentialState::Healthy);
    assert_eq!(coordinator.snapshot().await.wantlist_count, 46);
}

// =============================================================================
// Username resolution
// =============================================================================

#[tokio::test]
async fn unknown_username_is_resolved_before_user_endpoints() {
    // Given: No identity has been fetched yet
    let http = Arc::new(FixtureHttpClient::new());
    healthy_fixture(&http);
    let coordinator = coordinator(&http, Arc::new(MemoryStore::new()));

    // When: The wantlist is refreshed first
    coordinator
        .force_refresh(EndpointId::Wantlist)
        .await
        .expect("resolves identity on demand");

    // Then: Identity and profile were read before the wantlist
    assert_eq!(
        http.requests(),
        vec![
            IDENTITY.to_owned(),
            PROFILE.to_owned(),
            WANTLIST_COUNT.to_owned()
        ]
    );

    // And: Only the username, currency and wantlist fields changed
    let snapshot = coordinator.snapshot().await;
    assert_eq!(snapshot.user, USER);
    assert_eq!(snapshot.currency, "EUR");
    assert_eq!(snapshot.wantlist_count, 45);
    assert_eq!(snapshot.collection_count, 0);
    assert_eq!(snapshot.last_success(EndpointId::Collection), None);
    assert!(snapshot.last_success(EndpointId::Wantlist).is_some());
}

#[tokio::test]
async fn unresolvable_username_fails_user_endpoints() {
    // Given: The identity endpoint is down
    let http = Arc::new(FixtureHttpClient::new());
    http.route(IDENTITY, HttpResponse::new(500, "boom"));
    let coordinator = coordinator(&http, Arc::new(MemoryStore::new()));

    // When: A user-scoped endpoint is refreshed
    let error = coordinator
        .force_refresh(EndpointId::CollectionValue)
        .await
        .expect_err("no username");

    // Then: It fails as a missing username and the value endpoint was never hit
    assert_eq!(error.kind(), FetchErrorKind::MissingUsername);
    assert_eq!(http.request_count(COLLECTION_VALUE), 0);
}
