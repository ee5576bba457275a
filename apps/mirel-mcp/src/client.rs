//! # Mirel HTTP Client
//!
//! Thin wrapper around the Mirel REST API for use by the MCP bridge.

use serde_json::Value;
use thiserror::Error;

/// Everything that can go wrong between the bridge and the API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached at all.
    #[error("cannot connect to mirel at {0}")]
    Unreachable(String),
    /// The server rejected our API key, or we sent none.
    #[error("unauthorized: invalid or missing API key")]
    Unauthorized,
    /// The server is shedding load.
    #[error("rate limited: too many requests")]
    RateLimited,
    /// A 5xx response, with the raw body for context.
    #[error("server error ({0}): {1}")]
    ServerError(u16, String),
    /// The response body was not the JSON we expected.
    #[error("unreadable response: {0}")]
    BadPayload(String),
}

/// HTTP client that wraps calls to the Mirel REST API.
#[derive(Clone)]
pub struct MirelClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[allow(dead_code)]
impl MirelClient {
    /// Create a new client pointing at the given Mirel server URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Issue one request and decode the JSON response.
    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(key) = self.api_key.as_deref() {
            req = req.bearer_auth(key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(format!("{}: {e}", self.base_url)))?;

        match resp.status().as_u16() {
            401 => Err(ClientError::Unauthorized),
            429 => Err(ClientError::RateLimited),
            code @ 500..=599 => {
                let body = resp.text().await.unwrap_or_default();
                Err(ClientError::ServerError(code, body))
            }
            // 400 and 404 flow through: their bodies carry a structured
            // `{"success": false, "error": ...}` payload the tools render
            // for the model.
            _ => resp
                .json::<Value>()
                .await
                .map_err(|e| ClientError::BadPayload(e.to_string())),
        }
    }

    /// GET /health → liveness probe.
    pub async fn health(&self) -> Result<Value, ClientError> {
        self.call(reqwest::Method::GET, "/health", None).await
    }

    /// GET /status → mirror metrics.
    pub async fn status(&self) -> Result<Value, ClientError> {
        self.call(reqwest::Method::GET, "/status", None).await
    }

    /// GET /links/{id} → one link with resolved references and adjacency.
    pub async fn get_link(&self, id: u64) -> Result<Value, ClientError> {
        self.call(reqwest::Method::GET, &format!("/links/{id}"), None)
            .await
    }

    /// POST /query → evaluate a predicate against the mirror.
    pub async fn query(&self, predicate: Value, limit: Option<u64>) -> Result<Value, ClientError> {
        let body = serde_json::json!({
            "predicate": predicate,
            "limit": limit,
        });
        self.call(reqwest::Method::POST, "/query", Some(&body))
            .await
    }

    /// POST /events → apply one change feed event (insert/update/delete).
    pub async fn send_event(&self, event: Value) -> Result<Value, ClientError> {
        self.call(reqwest::Method::POST, "/events", Some(&event))
            .await
    }

    /// POST /export → export the mirror in canonical snapshot format.
    pub async fn export(&self) -> Result<Value, ClientError> {
        self.call(reqwest::Method::POST, "/export", None).await
    }
}
