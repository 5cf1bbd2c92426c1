//! Behavior-driven tests for bulk export
//!
//! These tests verify what a user gets when exporting a whole collection or
//! wantlist: every page, a file on disk, and clear refusals when called
//! too often.

use discogs_sync_tests::*;
use tempfile::tempdir;

fn restored(http: &Arc<FixtureHttpClient>) -> Coordinator {
    coordinator(http, Arc::new(MemoryStore::with_snapshot(known_user_snapshot())))
}

fn route_pages(http: &FixtureHttpClient, resource: ResourceKind, total: u64) {
    let pages = total.div_ceil(100).max(1);
    for number in 1..=pages {
        http.route(page_path(resource, number, 100), page(resource, number, 100, total));
    }
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn export_walks_every_page() {
    // Given: A collection of 250 releases served 100 per page
    let http = Arc::new(FixtureHttpClient::new());
    route_pages(&http, ResourceKind::Collection, 250);
    let coordinator = restored(&http);
    coordinator.setup().await.expect("restored");

    // When: The user exports it with items in the result
    let summary = coordinator
        .export(ExportRequest::new(ResourceKind::Collection).returning_items())
        .await
        .expect("export");

    // Then: All three pages were fetched once and every item is present
    assert_eq!(summary.count, 250);
    assert_eq!(summary.pages, 3);
    assert!(summary.complete);
    for number in 1..=3 {
        assert_eq!(
            http.request_count(&page_path(ResourceKind::Collection, number, 100)),
            1
        );
    }
    let items = summary.items.as_ref().expect("items requested");
    assert_eq!(items.len(), 250);
    assert_eq!(items[249].id, Some(250));

    // And: The known username was used without an identity lookup
    assert_eq!(http.request_count(IDENTITY), 0);
}

#[tokio::test]
async fn export_writes_items_to_the_requested_file() {
    // Given: A wantlist with two entries
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("exports").join("wants.json");
    let http = Arc::new(FixtureHttpClient::new());
    route_pages(&http, ResourceKind::Wantlist, 2);
    let coordinator = restored(&http);
    coordinator.setup().await.expect("restored");

    // When: The user exports it to a file
    let summary = coordinator
        .export(ExportRequest::new(ResourceKind::Wantlist).with_path(&path))
        .await
        .expect("export");

    // Then: The file holds the items as a JSON array
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(written.as_array().map(Vec::len), Some(2));
    assert_eq!(written[0]["id"], serde_json::json!(1));

    // And: The printed summary carries counts only
    let printed = serde_json::to_value(&summary).expect("json");
    assert_eq!(printed["count"], serde_json::json!(2));
    assert!(printed.get("wantlist").is_none());
    assert!(printed.get("path").is_some());
}

#[tokio::test]
async fn failure_after_first_page_returns_partial_result() {
    // Given: Page 2 of 3 keeps failing
    let http = Arc::new(FixtureHttpClient::new());
    let collection = ResourceKind::Collection;
    http.route(page_path(collection, 1, 100), page(collection, 1, 100, 250))
        .route(page_path(collection, 2, 100), HttpResponse::new(502, "bad gateway"))
        .route(page_path(collection, 3, 100), page(collection, 3, 100, 250));
    let coordinator = restored(&http);
    coordinator.setup().await.expect("restored");

    // When: The collection is exported
    let summary = coordinator
        .export(ExportRequest::new(ResourceKind::Collection))
        .await
        .expect("partial result is still a result");

    // Then: The first page is kept and the result is marked incomplete
    assert!(!summary.complete);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.count, 100);
    assert!(summary.failure.is_some());
    assert_eq!(http.request_count(&page_path(collection, 2, 100)), 4);
    assert_eq!(http.request_count(&page_path(collection, 3, 100)), 0);
}

#[tokio::test]
async fn failure_on_first_page_is_an_error() {
    // Given: The token is rejected for the wantlist
    let http = Arc::new(FixtureHttpClient::new());
    http.route(page_path(ResourceKind::Wantlist, 1, 100), unauthorized());
    let coordinator = restored(&http);
    coordinator.setup().await.expect("restored");

    // When: The wantlist is exported
    let error = coordinator
        .export(ExportRequest::new(ResourceKind::Wantlist))
        .await
        .expect_err("nothing fetched");

    // Then: The error names the resource and counts toward credential health
    match &error {
        ExportError::Fetch { resource, source } => {
            assert_eq!(*resource, ResourceKind::Wantlist);
            assert_eq!(source.kind(), FetchErrorKind::Auth);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(coordinator.credential_health().consecutive_auth_failures, 1);
}

// =============================================================================
// Guards
// =============================================================================

#[tokio::test]
async fn export_called_again_within_cooldown_is_refused() {
    // Given: A wantlist export just finished
    let http = Arc::new(FixtureHttpClient::new());
    route_pages(&http, ResourceKind::Wantlist, 3);
    route_pages(&http, ResourceKind::Collection, 3);
    let coordinator = restored(&http);
    coordinator.setup().await.expect("restored");
    coordinator
        .export(ExportRequest::new(ResourceKind::Wantlist))
        .await
        .expect("first export");

    // When: It is requested again right away
    let error = coordinator
        .export(ExportRequest::new(ResourceKind::Wantlist))
        .await
        .expect_err("too soon");

    // Then: The refusal says when to try again, as a JSON error payload too
    assert!(matches!(error, ExportError::Cooldown { .. }));
    let payload = error.to_payload();
    let message = payload["error"].as_str().expect("message");
    assert!(message.starts_with("wantlist export called too frequently; try again in"));

    // And: The other resource has its own cooldown
    coordinator
        .export(ExportRequest::new(ResourceKind::Collection))
        .await
        .expect("collection export is independent");
}

#[tokio::test]
async fn concurrent_export_of_same_resource_is_refused() {
    // Given: A slow upstream
    let http = Arc::new(FixtureHttpClient::with_latency(Duration::from_millis(50)));
    route_pages(&http, ResourceKind::Collection, 3);
    let coordinator = restored(&http);
    coordinator.setup().await.expect("restored");

    // When: Two exports of the collection start together
    let (first, second) = tokio::join!(
        coordinator.export(ExportRequest::new(ResourceKind::Collection)),
        coordinator.export(ExportRequest::new(ResourceKind::Collection))
    );

    // Then: The first runs and the second is refused immediately
    assert_eq!(first.expect("first export").count, 3);
    let error = second.expect_err("already running");
    assert_eq!(
        error.to_payload(),
        serde_json::json!({"error": "collection export is already running"})
    );
}

#[tokio::test]
async fn export_resolves_unknown_username_first() {
    // Given: No identity is known yet
    let http = Arc::new(FixtureHttpClient::new());
    healthy_fixture(&http);
    route_pages(&http, ResourceKind::Wantlist, 5);
    let coordinator = coordinator(&http, Arc::new(MemoryStore::new()));

    // When: The wantlist is exported
    let summary = coordinator
        .export(ExportRequest::new(ResourceKind::Wantlist))
        .await
        .expect("export");

    // Then: The username was resolved and stored along the way
    assert_eq!(summary.count, 5);
    assert_eq!(http.request_count(IDENTITY), 1);
    assert_eq!(coordinator.snapshot().await.user, USER);
}

#[tokio::test]
async fn export_without_resolvable_username_is_refused() {
    // Given: The identity endpoint is unreachable
    let http = Arc::new(FixtureHttpClient::new());
    http.route(IDENTITY, HttpError::new("connection refused"));
    let coordinator = coordinator(&http, Arc::new(MemoryStore::new()));

    // When: The collection is exported
    let error = coordinator
        .export(ExportRequest::new(ResourceKind::Collection))
        .await
        .expect_err("no username");

    // Then: The error explains that the username is missing
    match error {
        ExportError::Username(cause) => {
            assert_eq!(cause.kind(), FetchErrorKind::MissingUsername)
        }
        other => panic!("unexpected error: {other}"),
    }
}
