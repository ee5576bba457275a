//! One async handler per route, each a thin shim between axum extractors
//! and the mirror behind the shared lock.
//!
//! Error mapping: `DuplicateId` is 409, `NotFound` is 404, validation and
//! predicate errors are 400, codec and I/O failures are 500.

use super::{
    AppState,
    types::{
        ErrorBody, EventRequest, EventsResponse, ExportResponse, HealthResponse,
        LinkDetailResponse, LinkJson, LinksParams, LinksResponse, QueryRequest, QueryResponse,
        StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use mirel_core::{
    LinkId, MirelError, MirrorMetrics,
    primitives::MAX_EVENT_BATCH,
    snapshot::{export_snapshot, snapshot_checksum},
};

/// Map a core error to its HTTP status.
fn error_status(error: &MirelError) -> StatusCode {
    match error {
        MirelError::DuplicateId(_) => StatusCode::CONFLICT,
        MirelError::NotFound(_) => StatusCode::NOT_FOUND,
        MirelError::InvalidLink(_) | MirelError::InvalidPredicate(_) => StatusCode::BAD_REQUEST,
        MirelError::Serialization(_) | MirelError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// GET /health
// =============================================================================

/// Liveness probe, always 200 while the process is up.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// GET /status
// =============================================================================

/// Get mirror status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mirror = state.mirror.read().await;
    let metrics = mirror.metrics();

    (StatusCode::OK, Json(StatusResponse::from_metrics(&metrics)))
}

// =============================================================================
// GET /metrics
// =============================================================================

/// Plain-text exposition of the mirror counters.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mirror = state.mirror.read().await;
    let metrics = mirror.metrics();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        render_exposition(&metrics),
    )
}

fn render_exposition(metrics: &MirrorMetrics) -> String {
    let gauges = [
        ("mirel_link_count", metrics.link_count as u64),
        ("mirel_reference_count", metrics.reference_count as u64),
        (
            "mirel_resolved_references",
            metrics.resolved_references as u64,
        ),
        (
            "mirel_dangling_references",
            metrics.dangling_references as u64,
        ),
        ("mirel_type_count", metrics.type_count as u64),
        ("mirel_resolved_permille", metrics.resolved_permille()),
    ];

    let mut out = String::new();
    for (name, value) in gauges {
        out.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
    }
    out
}

// =============================================================================
// GET /links, GET /links/{id}
// =============================================================================

/// List links in first-insertion order, optionally capped by `?limit=`.
pub async fn links_handler(
    State(state): State<AppState>,
    Query(params): Query<LinksParams>,
) -> impl IntoResponse {
    let mirror = state.mirror.read().await;
    let limit = params.limit.unwrap_or(usize::MAX);
    let links: Vec<LinkJson> = mirror.all().take(limit).map(Into::into).collect();

    let response = LinksResponse {
        total: mirror.len(),
        count: links.len(),
        links,
    };
    (StatusCode::OK, Json(response))
}

/// Get one link with its resolved references and adjacency summary.
pub async fn link_detail_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    let mirror = state.mirror.read().await;
    match LinkDetailResponse::from_store(mirror.store(), LinkId(id)) {
        Some(detail) => (StatusCode::OK, Json(detail)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!("link {id} not found"))),
        )
            .into_response(),
    }
}

// =============================================================================
// POST /query
// =============================================================================

/// Evaluate a predicate against the whole mirror.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> impl IntoResponse {
    let mirror = state.mirror.read().await;
    match mirror.query_json(&request.predicate) {
        Ok(matches) => {
            let limit = request.limit.unwrap_or(usize::MAX);
            let links: Vec<LinkJson> = matches.into_iter().take(limit).map(Into::into).collect();
            (StatusCode::OK, Json(QueryResponse::with_links(links)))
        }
        Err(e) => (
            error_status(&e),
            Json(QueryResponse::error(format!("Query failed: {e}"))),
        ),
    }
}

// =============================================================================
// POST /events
// =============================================================================

/// Apply change feed events: a single event object or an array of them.
///
/// The whole payload is parsed and converted before anything is applied,
/// so a malformed request mutates nothing. Once application starts, each
/// event is individually atomic; on the first failure the response carries
/// the number of events that stayed applied.
pub async fn events_handler(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let requests = match parse_event_requests(body) {
        Ok(requests) => requests,
        Err(msg) => {
            return (StatusCode::BAD_REQUEST, Json(EventsResponse::failed(0, msg)));
        }
    };

    if requests.len() > MAX_EVENT_BATCH {
        return (
            StatusCode::BAD_REQUEST,
            Json(EventsResponse::failed(
                0,
                format!(
                    "batch of {} events exceeds maximum {}",
                    requests.len(),
                    MAX_EVENT_BATCH
                ),
            )),
        );
    }

    let mut events = Vec::with_capacity(requests.len());
    for request in &requests {
        match request.to_event() {
            Ok(event) => events.push(event),
            Err(e) => {
                return (
                    error_status(&e),
                    Json(EventsResponse::failed(0, e.to_string())),
                );
            }
        }
    }

    let mut mirror = state.mirror.write().await;
    let mut applied = 0;
    for event in events {
        if let Err(e) = mirror.apply(event) {
            return (
                error_status(&e),
                Json(EventsResponse::failed(applied, e.to_string())),
            );
        }
        applied += 1;
    }

    (StatusCode::OK, Json(EventsResponse::applied(applied)))
}

fn parse_event_requests(body: serde_json::Value) -> Result<Vec<EventRequest>, String> {
    let parsed = if body.is_array() {
        serde_json::from_value::<Vec<EventRequest>>(body)
    } else {
        serde_json::from_value::<EventRequest>(body).map(|event| vec![event])
    };
    parsed.map_err(|e| format!("invalid event payload: {e}"))
}

// =============================================================================
// POST /export
// =============================================================================

/// Export the mirror as canonical snapshot bytes.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mirror = state.mirror.read().await;
    let store = mirror.store();

    let data = match export_snapshot(store) {
        Ok(data) => data,
        Err(e) => {
            return (
                error_status(&e),
                Json(ExportResponse::error(format!("Export failed: {e}"))),
            );
        }
    };

    match snapshot_checksum(store) {
        Ok(checksum) => (
            StatusCode::OK,
            Json(ExportResponse::success(data, checksum, store.len())),
        ),
        Err(e) => (
            error_status(&e),
            Json(ExportResponse::error(format!("Checksum failed: {e}"))),
        ),
    }
}
