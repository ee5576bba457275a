//! Integration tests for the mirel HTTP API.
//!
//! Every route is exercised through an in-process axum-test `TestServer`;
//! nothing binds a socket.

// Tests may unwrap/panic. Auth tests hold the env mutex across awaits on
// purpose: the whole file is serialized around `MIREL_API_KEY`.
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::HeaderValue;
use axum_test::TestServer;
use mirel::api::{
    AppState, EventsResponse, ExportResponse, HealthResponse, LinkDetailResponse, LinksResponse,
    QueryResponse, StatusResponse, create_router,
};
use mirel::config::ServerConfig;
use mirel_core::{Link, LinkId, Mirror, import_snapshot, primitives::MAX_EVENT_BATCH};
use serde_json::json;
use std::sync::Mutex;

/// Serializes every test that reads or writes `MIREL_API_KEY`.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Holds the env mutex for the test's duration and scrubs the auth and
/// CORS variables on drop, so a panicking test cannot leak env state into
/// the next one.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: serialized by AUTH_TEST_MUTEX, no concurrent env access.
        unsafe {
            std::env::remove_var("MIREL_API_KEY");
            std::env::remove_var("MIREL_CORS_ORIGINS");
        }
    }
}

/// Test server over the given links, with auth disabled.
/// Keep the guard alive for the duration of the test.
fn create_server_with(links: Vec<Link>) -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: serialized by AUTH_TEST_MUTEX, no concurrent env access.
    unsafe {
        std::env::remove_var("MIREL_API_KEY");
        std::env::remove_var("MIREL_CORS_ORIGINS");
    }

    let mirror = Mirror::load(links).unwrap();
    let router = create_router(AppState::new(mirror), &ServerConfig::default());
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

/// Create a test server with a fresh empty mirror.
fn create_test_server() -> (TestServer, TestGuard) {
    create_server_with(Vec::new())
}

/// Three links used across tests: link 1 is typed 3, link 3 is an edge
/// 1 -> 2 with a dangling to, link 5 is an edge 7 -> 3 with a dangling from.
fn fixture_links() -> Vec<Link> {
    vec![
        Link::new(LinkId(1)).with_type(LinkId(3)),
        Link::new(LinkId(3))
            .with_type(LinkId(3))
            .with_from(LinkId(1))
            .with_to(LinkId(2)),
        Link::new(LinkId(5))
            .with_type(LinkId(3))
            .with_from(LinkId(7))
            .with_to(LinkId(3)),
    ]
}

/// Create a test server with the fixture links pre-loaded.
fn create_populated_test_server() -> (TestServer, TestGuard) {
    create_server_with(fixture_links())
}

fn ids(response: &QueryResponse) -> Vec<u64> {
    response.links.iter().map(|l| l.id).collect()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_reports_ok_and_crate_version() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_empty_mirror() {
    let (server, _guard) = create_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.link_count, 0);
    assert_eq!(status.reference_count, 0);
    assert_eq!(status.dangling_references, 0);
    assert_eq!(status.type_count, 0);
}

#[tokio::test]
async fn test_status_populated_mirror() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.link_count, 3);
    assert_eq!(status.reference_count, 7);
    assert_eq!(status.resolved_references, 5);
    assert_eq!(status.dangling_references, 2);
    assert_eq!(status.type_count, 1);
    // 5 of 7 resolved, integer permille
    assert_eq!(status.resolved_permille, 714);
}

// =============================================================================
// METRICS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_metrics_content_type() {
    let (server, _guard) = create_test_server();

    let response = server.get("/metrics").await;

    response.assert_status_ok();
    let content_type = response
        .headers()
        .get("content-type")
        .expect("content-type header must be present")
        .to_str()
        .expect("content-type must be valid utf8");
    assert_eq!(
        content_type, "text/plain; version=0.0.4",
        "Metrics endpoint must return correct Content-Type"
    );
}

#[tokio::test]
async fn test_metrics_contains_gauges() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/metrics").await;

    response.assert_status_ok();
    let body = response.text();
    assert!(
        body.contains("mirel_link_count 3"),
        "Metrics must contain mirel_link_count"
    );
    assert!(
        body.contains("mirel_dangling_references 2"),
        "Metrics must contain mirel_dangling_references"
    );
    assert!(
        body.contains("mirel_resolved_permille 714"),
        "Metrics must contain mirel_resolved_permille"
    );
    assert!(
        body.contains("# TYPE mirel_link_count gauge"),
        "Metrics must contain TYPE annotations"
    );
}

// =============================================================================
// LINKS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_links_lists_in_insertion_order() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/links").await;

    response.assert_status_ok();
    let result: LinksResponse = response.json();
    assert_eq!(result.total, 3);
    assert_eq!(result.count, 3);
    let listed: Vec<u64> = result.links.iter().map(|l| l.id).collect();
    assert_eq!(listed, vec![1, 3, 5]);
}

#[tokio::test]
async fn test_links_respects_limit() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/links?limit=2").await;

    response.assert_status_ok();
    let result: LinksResponse = response.json();
    assert_eq!(result.total, 3, "total reports the full mirror size");
    assert_eq!(result.count, 2);
    let listed: Vec<u64> = result.links.iter().map(|l| l.id).collect();
    assert_eq!(listed, vec![1, 3]);
}

#[tokio::test]
async fn test_link_detail_resolves_references() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/links/3").await;

    response.assert_status_ok();
    let detail: LinkDetailResponse = response.json();
    assert_eq!(detail.link.id, 3);
    assert_eq!(detail.link.type_id, Some(3));
    assert_eq!(detail.link.from_id, Some(1));
    assert_eq!(detail.link.to_id, Some(2));

    // type and from resolve, to target 2 does not exist
    assert_eq!(detail.type_link.as_ref().map(|l| l.id), Some(3));
    assert_eq!(detail.from_link.as_ref().map(|l| l.id), Some(1));
    assert!(detail.to_link.is_none(), "link 2 is dangling");

    assert_eq!(detail.typed, vec![1, 3, 5]);
    assert!(detail.outgoing.is_empty());
    assert_eq!(detail.incoming, vec![5]);
}

#[tokio::test]
async fn test_link_detail_not_found() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/links/999").await;

    response.assert_status_not_found();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("999"));
}

// =============================================================================
// QUERY ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_query_empty_predicate_matches_all() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .post("/query")
        .json(&json!({"predicate": {}}))
        .await;

    response.assert_status_ok();
    let result: QueryResponse = response.json();
    assert!(result.success);
    assert_eq!(result.count, 3);
    assert_eq!(ids(&result), vec![1, 3, 5]);
}

#[tokio::test]
async fn test_query_id_comparison() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .post("/query")
        .json(&json!({"predicate": {"id": {"_gt": 2}}}))
        .await;

    response.assert_status_ok();
    let result: QueryResponse = response.json();
    assert!(result.success);
    assert_eq!(ids(&result), vec![3, 5]);
}

#[tokio::test]
async fn test_query_typed_relation() {
    let (server, _guard) = create_populated_test_server();

    // Links used as the type of some link whose from is 7: only 3,
    // because link 5 is typed 3 and has from 7.
    let response = server
        .post("/query")
        .json(&json!({"predicate": {"typed": {"from_id": {"_eq": 7}}}}))
        .await;

    response.assert_status_ok();
    let result: QueryResponse = response.json();
    assert!(result.success);
    assert_eq!(ids(&result), vec![3]);
}

#[tokio::test]
async fn test_query_to_relation_follows_reference() {
    let links = vec![
        Link::new(LinkId(1)).with_type(LinkId(2)),
        Link::new(LinkId(3))
            .with_type(LinkId(3))
            .with_from(LinkId(4))
            .with_to(LinkId(4)),
        Link::new(LinkId(6))
            .with_type(LinkId(3))
            .with_from(LinkId(1))
            .with_to(LinkId(1)),
    ];
    let (server, _guard) = create_server_with(links);

    // Both 3 and 6 are typed 3, but only 6 has a to target that exists
    // and is typed 2. Link 3 points at the absent link 4.
    let response = server
        .post("/query")
        .json(&json!({"predicate": {"type_id": 3, "to": {"type_id": 2}}}))
        .await;

    response.assert_status_ok();
    let result: QueryResponse = response.json();
    assert!(result.success);
    assert_eq!(ids(&result), vec![6]);
}

#[tokio::test]
async fn test_query_null_operand_rejected() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .post("/query")
        .json(&json!({"predicate": {"from_id": null}}))
        .await;

    response.assert_status_bad_request();
    let result: QueryResponse = response.json();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_query_respects_limit() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .post("/query")
        .json(&json!({"predicate": {}, "limit": 1}))
        .await;

    response.assert_status_ok();
    let result: QueryResponse = response.json();
    assert!(result.success);
    assert_eq!(result.count, 1);
    assert_eq!(ids(&result), vec![1]);
}

#[tokio::test]
async fn test_query_invalid_json_body() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/query")
        .bytes(bytes::Bytes::from("not valid json"))
        .content_type("application/json")
        .await;

    // Should return 4xx error for invalid JSON
    assert!(response.status_code().is_client_error());
}

// =============================================================================
// EVENTS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_events_insert_single_object() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/events")
        .json(&json!({"op": "insert", "link": {"id": 10, "type_id": 3}}))
        .await;

    response.assert_status_ok();
    let result: EventsResponse = response.json();
    assert!(result.success);
    assert_eq!(result.applied, 1);
    assert!(result.error.is_none());

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.link_count, 1);
}

#[tokio::test]
async fn test_events_insert_duplicate_conflicts() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .post("/events")
        .json(&json!({"op": "insert", "link": {"id": 1}}))
        .await;

    assert_eq!(response.status_code().as_u16(), 409);
    let result: EventsResponse = response.json();
    assert!(!result.success);
    assert_eq!(result.applied, 0);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_events_update_missing_not_found() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/events")
        .json(&json!({"op": "update", "id": 999, "set": {"from_id": 1}}))
        .await;

    response.assert_status_not_found();
    let result: EventsResponse = response.json();
    assert!(!result.success);
    assert_eq!(result.applied, 0);
}

#[tokio::test]
async fn test_events_delete_missing_not_found() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/events")
        .json(&json!({"op": "delete", "id": 999}))
        .await;

    response.assert_status_not_found();
    let result: EventsResponse = response.json();
    assert!(!result.success);
}

#[tokio::test]
async fn test_events_delete_removes_link() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .post("/events")
        .json(&json!({"op": "delete", "id": 5}))
        .await;

    response.assert_status_ok();
    server.get("/links/5").await.assert_status_not_found();

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.link_count, 2);
}

#[tokio::test]
async fn test_events_batch_stops_at_first_failure() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/events")
        .json(&json!([
            {"op": "insert", "link": {"id": 10}},
            {"op": "insert", "link": {"id": 11}},
            {"op": "insert", "link": {"id": 10}}
        ]))
        .await;

    assert_eq!(response.status_code().as_u16(), 409);
    let result: EventsResponse = response.json();
    assert!(!result.success);
    assert_eq!(result.applied, 2, "events before the failure stay applied");

    let links: LinksResponse = server.get("/links").await.json();
    assert_eq!(links.total, 2);
}

#[tokio::test]
async fn test_events_batch_over_limit_rejected() {
    let (server, _guard) = create_test_server();

    let events: Vec<serde_json::Value> = (1..=(MAX_EVENT_BATCH as u64 + 1))
        .map(|id| json!({"op": "insert", "link": {"id": id}}))
        .collect();

    let response = server.post("/events").json(&json!(events)).await;

    response.assert_status_bad_request();
    let result: EventsResponse = response.json();
    assert!(!result.success);
    assert_eq!(result.applied, 0);

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.link_count, 0, "nothing from the oversized batch lands");
}

#[tokio::test]
async fn test_events_unknown_op_rejected() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/events")
        .json(&json!({"op": "frobnicate", "id": 1}))
        .await;

    response.assert_status_bad_request();
    let result: EventsResponse = response.json();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_events_patch_null_clears_absent_keeps() {
    let (server, _guard) = create_test_server();

    let insert = json!({"op": "insert", "link": {
        "id": 20, "type_id": 3, "props": {"a": 1, "b": 2}
    }});
    server.post("/events").json(&insert).await.assert_status_ok();

    // from_id is set, prop a is removed; type_id is absent so it is kept
    let update = json!({"op": "update", "id": 20, "set": {"from_id": 7, "a": null}});
    server.post("/events").json(&update).await.assert_status_ok();

    let detail: LinkDetailResponse = server.get("/links/20").await.json();
    assert_eq!(detail.link.type_id, Some(3), "absent key leaves type intact");
    assert_eq!(detail.link.from_id, Some(7));
    assert!(detail.link.to_id.is_none());
    assert!(detail.link.props.get("a").is_none(), "null removes the prop");
    assert_eq!(detail.link.props.get("b"), Some(&json!(2)));
}

#[tokio::test]
async fn test_events_patch_null_reference_clears_it() {
    let (server, _guard) = create_populated_test_server();

    let update = json!({"op": "update", "id": 3, "set": {"to_id": null}});
    server.post("/events").json(&update).await.assert_status_ok();

    let detail: LinkDetailResponse = server.get("/links/3").await.json();
    assert!(detail.link.to_id.is_none());
}

#[tokio::test]
async fn test_events_patch_may_not_change_id() {
    let (server, _guard) = create_populated_test_server();

    let update = json!({"op": "update", "id": 3, "set": {"id": 4}});
    let response = server.post("/events").json(&update).await;

    response.assert_status_bad_request();
    let result: EventsResponse = response.json();
    assert!(!result.success);
    assert_eq!(result.applied, 0);
}

#[tokio::test]
async fn test_events_retroactive_resolution() {
    let (server, _guard) = create_test_server();

    // Insert a link whose to target does not exist yet
    let insert = json!({"op": "insert", "link": {"id": 10, "to_id": 99}});
    server.post("/events").json(&insert).await.assert_status_ok();

    let detail: LinkDetailResponse = server.get("/links/10").await.json();
    assert!(detail.to_link.is_none(), "target 99 is still dangling");

    // Insert the target; the earlier reference must resolve
    let target = json!({"op": "insert", "link": {"id": 99}});
    server.post("/events").json(&target).await.assert_status_ok();

    let detail: LinkDetailResponse = server.get("/links/10").await.json();
    assert_eq!(detail.to_link.as_ref().map(|l| l.id), Some(99));

    let target: LinkDetailResponse = server.get("/links/99").await.json();
    assert_eq!(target.incoming, vec![10]);
}

#[tokio::test]
async fn test_events_invalid_json_body() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/events")
        .bytes(bytes::Bytes::from("{not json"))
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// EXPORT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_export_empty_mirror() {
    let (server, _guard) = create_test_server();

    let response = server.post("/export").await;

    response.assert_status_ok();
    let result: ExportResponse = response.json();
    assert!(result.success);
    assert!(result.data.is_some());
    assert!(result.checksum.is_some());
    assert_eq!(result.link_count, Some(0));
}

#[tokio::test]
async fn test_export_round_trips_through_import() {
    let (server, _guard) = create_populated_test_server();

    let response = server.post("/export").await;

    response.assert_status_ok();
    let result: ExportResponse = response.json();
    assert!(result.success);
    assert_eq!(result.link_count, Some(3));

    // Data is base64-encoded canonical snapshot bytes
    let data = result.data.unwrap();
    let decoded =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &data).unwrap();

    let store = import_snapshot(&decoded).unwrap();
    assert_eq!(store.len(), 3);
    let edge = store.get(LinkId(3)).unwrap();
    assert_eq!(edge.from_id, Some(LinkId(1)));
    assert_eq!(edge.to_id, Some(LinkId(2)));
}

// =============================================================================
// CORS TESTS
// =============================================================================

/// Test server with the given `[server] cors_origins` value and, when
/// `env` is set, `MIREL_CORS_ORIGINS` in the environment.
fn create_cors_test_server(config: Option<&str>, env: Option<&str>) -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: serialized by AUTH_TEST_MUTEX, no concurrent env access.
    unsafe {
        std::env::remove_var("MIREL_API_KEY");
        match env {
            Some(value) => std::env::set_var("MIREL_CORS_ORIGINS", value),
            None => std::env::remove_var("MIREL_CORS_ORIGINS"),
        }
    }

    let server = ServerConfig {
        cors_origins: config.map(str::to_string),
        ..ServerConfig::default()
    };
    let router = create_router(AppState::new(Mirror::new()), &server);
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

/// `GET /health` carrying the given Origin; returns the
/// `access-control-allow-origin` value the server granted, if any.
async fn granted_origin(server: &TestServer, origin: &str) -> Option<String> {
    let response = server
        .get("/health")
        .add_header(
            axum::http::header::ORIGIN,
            origin.parse::<HeaderValue>().unwrap(),
        )
        .await;

    // CORS is enforced by browsers; the server always answers and only
    // the response headers vary.
    response.assert_status_ok();
    response
        .headers()
        .get("access-control-allow-origin")
        .map(|value| value.to_str().unwrap().to_string())
}

#[tokio::test]
async fn test_cors_unconfigured_allows_localhost_only() {
    let (server, _guard) = create_cors_test_server(None, None);

    assert_eq!(
        granted_origin(&server, "http://localhost:3000").await.as_deref(),
        Some("http://localhost:3000")
    );
    assert_eq!(granted_origin(&server, "http://evil.example.com").await, None);
}

#[tokio::test]
async fn test_cors_wildcard_opens_every_origin() {
    let (server, _guard) = create_cors_test_server(Some("*"), None);

    assert_eq!(
        granted_origin(&server, "http://anywhere.example.com").await.as_deref(),
        Some("*")
    );
}

#[tokio::test]
async fn test_cors_list_restricts_to_listed_origins() {
    let (server, _guard) =
        create_cors_test_server(Some("https://app.example.com, https://ops.example.com"), None);

    assert_eq!(
        granted_origin(&server, "https://app.example.com").await.as_deref(),
        Some("https://app.example.com")
    );
    assert_eq!(
        granted_origin(&server, "https://ops.example.com").await.as_deref(),
        Some("https://ops.example.com")
    );
    assert_eq!(
        granted_origin(&server, "https://other.example.com").await,
        None
    );
}

#[tokio::test]
async fn test_cors_env_overrides_config() {
    let (server, _guard) = create_cors_test_server(Some("https://app.example.com"), Some("*"));

    assert_eq!(
        granted_origin(&server, "https://anywhere.example.com").await.as_deref(),
        Some("*")
    );
}

#[tokio::test]
async fn test_cors_blank_list_falls_back_to_localhost() {
    let (server, _guard) = create_cors_test_server(Some(" , "), None);

    assert_eq!(
        granted_origin(&server, "http://127.0.0.1:8080").await.as_deref(),
        Some("http://127.0.0.1:8080")
    );
    assert_eq!(granted_origin(&server, "https://app.example.com").await, None);
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/unknown").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (server, _guard) = create_test_server();

    // /health is GET only
    let response = server.post("/health").await;
    // axum returns 405 Method Not Allowed
    assert_eq!(response.status_code().as_u16(), 405);
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Test server with `MIREL_API_KEY` set to the given key. The guard scrubs
/// the variable again on drop.
fn create_auth_test_server(api_key: &str) -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: serialized by AUTH_TEST_MUTEX, no concurrent env access.
    unsafe { std::env::set_var("MIREL_API_KEY", api_key) };

    let router = create_router(AppState::new(Mirror::new()), &ServerConfig::default());
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

/// `GET /status` carrying the given Authorization header value.
async fn status_with_header(server: &TestServer, value: &str) -> axum_test::TestResponse {
    server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            value.parse::<HeaderValue>().unwrap(),
        )
        .await
}

#[tokio::test]
async fn test_auth_accepts_bearer_scheme() {
    let (server, _guard) = create_auth_test_server("rotor-key-3f9a");

    let response = status_with_header(&server, "Bearer rotor-key-3f9a").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.link_count, 0);
}

#[tokio::test]
async fn test_auth_accepts_raw_token() {
    let (server, _guard) = create_auth_test_server("rotor-key-3f9a");

    // The scheme prefix is optional; a bare key is also accepted.
    let response = status_with_header(&server, "rotor-key-3f9a").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_rejects_wrong_key() {
    let (server, _guard) = create_auth_test_server("rotor-key-3f9a");

    // Differs only in the last character, still a mismatch.
    let response = status_with_header(&server, "Bearer rotor-key-3f9b").await;

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_rejects_missing_header() {
    let (server, _guard) = create_auth_test_server("rotor-key-3f9a");

    let response = server.get("/status").await;

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_rejects_empty_and_bare_scheme_values() {
    let (server, _guard) = create_auth_test_server("rotor-key-3f9a");

    // An empty value and a lone "Bearer " both carry no usable key.
    let empty = status_with_header(&server, "").await;
    assert_eq!(empty.status_code().as_u16(), 401);

    let bare = status_with_header(&server, "Bearer ").await;
    assert_eq!(bare.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_exempts_health_probe() {
    let (server, _guard) = create_auth_test_server("rotor-key-3f9a");

    // Load balancer probes carry no credentials.
    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}
