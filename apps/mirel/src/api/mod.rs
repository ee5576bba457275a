//! # mirel HTTP API Module
//!
//! The axum REST surface over a shared [`Mirror`].
//!
//! Routes:
//!
//! - `GET /health`: liveness probe (never behind auth)
//! - `GET /status`: mirror counters
//! - `GET /metrics`: plain-text metrics exposition
//! - `GET /links`: links in first-insertion order (optional `?limit=`)
//! - `GET /links/{id}`: one link with resolved references and adjacency
//! - `POST /query`: evaluate a predicate
//! - `POST /events`: apply change feed events (single object or array)
//! - `POST /export`: canonical snapshot of the mirror
//!
//! Security knobs, each overriding the `[server]` config section:
//! `MIREL_CORS_ORIGINS` (comma-separated list or `*`; default localhost
//! only), `MIREL_RATE_LIMIT` (requests/second; default 100, 0 disables),
//! and `MIREL_API_KEY` (set to require bearer auth).

mod auth;
mod handlers;
mod middleware;
mod types;

// Surface for the binary and the integration tests.
pub use auth::get_api_key_from_env;
pub use middleware::{DEFAULT_RATE_LIMIT, RateLimit, build_rate_limiter};

pub use handlers::{
    events_handler, export_handler, health_handler, link_detail_handler, links_handler,
    metrics_handler, query_handler, status_handler,
};
pub use types::{
    ErrorBody, EventRequest, EventsResponse, ExportResponse, HealthResponse, LinkDetailResponse,
    LinkJson, LinksParams, LinksResponse, QueryRequest, QueryResponse, StatusResponse,
};

use crate::config::ServerConfig;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use mirel_core::{MirelError, Mirror};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Hard cap on request body size. The largest legitimate payload is a
/// maximum-length event batch, which stays well under this.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Origins allowed when no CORS configuration is given.
const LOCALHOST_ORIGINS: [&str; 4] = [
    "http://localhost:3000",
    "http://localhost:8080",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:8080",
];

// =============================================================================
// SHARED STATE
// =============================================================================

/// Shared server state containing the link mirror.
#[derive(Clone)]
pub struct AppState {
    /// The mirrored link graph.
    pub mirror: Arc<RwLock<Mirror>>,
}

impl AppState {
    /// Create new app state around a mirror.
    #[must_use]
    pub fn new(mirror: Mirror) -> Self {
        Self {
            mirror: Arc::new(RwLock::new(mirror)),
        }
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Build the CORS layer from the merged origin configuration.
///
/// `"*"` opts into a permissive layer; a comma-separated list restricts
/// to those origins; no configuration (or a list with no valid entry)
/// restricts to localhost.
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!("CORS: MIREL_CORS_ORIGINS=* opens the API to every origin");
            CorsLayer::permissive()
        }
        Some(list) => {
            let parsed = parse_origin_list(list);
            if parsed.is_empty() {
                tracing::warn!("CORS: {list:?} has no valid origins, using localhost");
                restricted_cors(localhost_origins())
            } else {
                restricted_cors(parsed)
            }
        }
        None => {
            tracing::info!("CORS: no origins configured, allowing localhost only");
            restricted_cors(localhost_origins())
        }
    }
}

fn parse_origin_list(list: &str) -> Vec<HeaderValue> {
    list.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!("CORS: allowing origin {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: skipping invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

fn localhost_origins() -> Vec<HeaderValue> {
    LOCALHOST_ORIGINS
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect()
}

/// The restrictive layer shared by every non-wildcard configuration.
fn restricted_cors(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER ASSEMBLY
// =============================================================================

/// Assemble the full route table and middleware stack.
///
/// Settings resolve environment-first: each environment variable beats
/// the corresponding `[server]` config value, which beats the built-in
/// default.
///
/// Request path, outermost first: tracing, CORS, body limit, rate
/// limiting (when enabled), then API key auth (when configured).
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let cors_origins = std::env::var("MIREL_CORS_ORIGINS")
        .ok()
        .or_else(|| server.cors_origins.clone());
    let cors = build_cors_layer(cors_origins.as_deref());

    let auth_enabled = get_api_key_from_env().is_some();
    if auth_enabled {
        tracing::info!("auth: API key required on every route except /health");
    } else {
        tracing::warn!("auth: MIREL_API_KEY not set, every endpoint is publicly reachable");
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/links", get(handlers::links_handler))
        .route("/links/{id}", get(handlers::link_detail_handler))
        .route("/query", post(handlers::query_handler))
        .route("/events", post(handlers::events_handler))
        .route("/export", post(handlers::export_handler));

    // Authentication is the innermost layer (runs last on the way in)
    if auth_enabled {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    match RateLimit::resolve(server.rate_limit) {
        RateLimit::PerSecond(rps) => {
            tracing::info!("rate limit: {rps} requests/second");
            router = router.layer(axum_middleware::from_fn_with_state(
                build_rate_limiter(rps),
                middleware::rate_limit_middleware,
            ));
        }
        RateLimit::Disabled => {
            tracing::info!("rate limit: disabled");
        }
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// STARTUP
// =============================================================================

/// Bind the listener and serve until the process is stopped.
pub async fn run_server(addr: &str, mirror: Mirror, server: &ServerConfig) -> Result<(), MirelError> {
    let router = create_router(AppState::new(mirror), server);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MirelError::Io(format!("bind {addr}: {e}")))?;

    tracing::info!("mirel HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| MirelError::Io(format!("serve: {e}")))
}
