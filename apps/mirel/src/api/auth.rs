//! Bearer-token authentication for the HTTP API.
//!
//! When `MIREL_API_KEY` is set, every route except `/health` requires
//! `Authorization: Bearer <key>` (a raw key without the scheme is also
//! accepted). Unset or empty means the API is open.
//!
//! Key comparison is constant-time via the `subtle` crate.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

// =============================================================================
// BEARER AUTH
// =============================================================================

/// The configured API key: `MIREL_API_KEY` when set and non-empty.
/// `None` means authentication is off.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("MIREL_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Pull the key out of the Authorization header.
///
/// Accepts both `Bearer <key>` and a raw `<key>`.
fn bearer_token(request: &Request<Body>) -> Option<&str> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes, preventing length-leaking side channels.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// API key authentication middleware.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    // Health stays reachable for load balancer probes
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    match bearer_token(&request) {
        Some(provided) if keys_match(provided, &expected) => Ok(next.run(request).await),
        Some(_) => {
            tracing::warn!(reason = "key_mismatch", "rejected request: wrong API key");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(reason = "no_credentials", "rejected request: no Authorization header");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_get_api_key_unset_returns_none() {
        // SAFETY: no other test in this binary touches MIREL_API_KEY.
        unsafe { std::env::remove_var("MIREL_API_KEY") };
        assert!(get_api_key_from_env().is_none());
    }

    #[test]
    fn test_bearer_token_strips_scheme() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_accepts_raw_key() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_header() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    fn test_keys_match_exact() {
        assert!(keys_match("secret-key", "secret-key"));
    }

    #[test]
    fn test_keys_match_rejects_wrong_key() {
        assert!(!keys_match("wrong-key", "secret-key"));
    }

    #[test]
    fn test_keys_match_rejects_prefix() {
        // A prefix of the real key must not pass
        assert!(!keys_match("secret", "secret-key"));
        assert!(!keys_match("secret-key-extra", "secret-key"));
    }

    #[test]
    fn test_keys_match_rejects_empty() {
        assert!(!keys_match("", "secret-key"));
    }
}
