//! Global rate limiting for the HTTP API.
//!
//! One budget covers every route. The effective limit layers
//! `MIREL_RATE_LIMIT` over the `[server]` config value over the built-in
//! default; zero from either source disables the layer.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Requests per second when neither the environment nor the config file
/// says otherwise.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// The one limiter shared by every request.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

// =============================================================================
// LIMIT RESOLUTION
// =============================================================================

/// Effective rate limit after layering all configuration sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// No limiting layer is installed.
    Disabled,
    /// Global budget in requests per second.
    PerSecond(NonZeroU32),
}

impl RateLimit {
    /// Resolve the effective limit from the environment and file config.
    ///
    /// `MIREL_RATE_LIMIT` beats `configured`, which beats
    /// [`DEFAULT_RATE_LIMIT`].
    #[must_use]
    pub fn resolve(configured: Option<u32>) -> Self {
        let rps = env_rate_limit()
            .or(configured)
            .unwrap_or(DEFAULT_RATE_LIMIT);
        match NonZeroU32::new(rps) {
            Some(rps) => Self::PerSecond(rps),
            None => Self::Disabled,
        }
    }
}

fn env_rate_limit() -> Option<u32> {
    std::env::var("MIREL_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
}

// =============================================================================
// RATE LIMITER
// =============================================================================

/// Create the shared limiter for a per-second budget.
#[must_use]
pub fn build_rate_limiter(rps: NonZeroU32) -> GlobalRateLimiter {
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Rate limiting middleware: 429 once the global budget is exhausted.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if limiter.check().is_err() {
        tracing::warn!("rate limit hit, shedding request");
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_config_over_default() {
        assert_eq!(
            RateLimit::resolve(Some(7)),
            RateLimit::PerSecond(NonZeroU32::new(7).unwrap())
        );
    }

    #[test]
    fn test_resolve_zero_disables() {
        assert_eq!(RateLimit::resolve(Some(0)), RateLimit::Disabled);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        assert_eq!(
            RateLimit::resolve(None),
            RateLimit::PerSecond(NonZeroU32::new(DEFAULT_RATE_LIMIT).unwrap())
        );
    }

    #[test]
    fn test_limiter_allows_within_budget() {
        let limiter = build_rate_limiter(NonZeroU32::new(50).unwrap());
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_limiter_blocks_after_burst() {
        let limiter = build_rate_limiter(NonZeroU32::new(2).unwrap());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        // Burst capacity of 2 exhausted
        assert!(limiter.check().is_err());
    }
}
