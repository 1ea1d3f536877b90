//! # Rebuild Rate Limiting
//!
//! Every `POST` route synthesizes a complete timeline from scratch. Building
//! is linear in the events a scenario emits, so a `DualDomain16` ring
//! AllToAll costs hundreds of times more than a health probe. The limiter
//! therefore meters timeline rebuilds only. `GET /health` and
//! `GET /compatibility` answer from static data and never spend quota.
//!
//! `COLLVIS_RATE_LIMIT` sets the rebuilds admitted per second (default 100,
//! `0` disables the limiter).

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
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

/// Rebuilds admitted per second when the environment says nothing usable.
const DEFAULT_REBUILDS_PER_SECOND: NonZeroU32 = NonZeroU32::MIN.saturating_add(99);

/// Shared quota for timeline rebuilds across all clients.
pub type RebuildLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// A limiter admitting `rebuilds_per_second` timeline builds, with a burst of
/// the same size. Zero falls back to the default quota.
pub fn create_rate_limiter(rebuilds_per_second: u32) -> RebuildLimiter {
    let rate = NonZeroU32::new(rebuilds_per_second).unwrap_or(DEFAULT_REBUILDS_PER_SECOND);
    Arc::new(RateLimiter::direct(Quota::per_second(rate)))
}

/// `COLLVIS_RATE_LIMIT`, or the default when unset or unparsable.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("COLLVIS_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_REBUILDS_PER_SECOND.get())
}

/// Whether serving this request synthesizes a timeline.
#[must_use]
pub fn builds_timeline(method: &Method, path: &str) -> bool {
    *method == Method::POST && (path == "/export" || path.starts_with("/timeline"))
}

/// Spends one unit of quota per timeline rebuild; 429 once it runs dry.
pub async fn rate_limit_middleware(
    State(limiter): State<RebuildLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if !builds_timeline(request.method(), request.uri().path()) {
        return Ok(next.run(request).await);
    }
    if limiter.check().is_err() {
        tracing::warn!(path = request.uri().path(), "Timeline rebuild quota exhausted");
        return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================
