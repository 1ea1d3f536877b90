//! # Authentication Module
//!
//! Optional API key gate in front of the timeline endpoints.
//!
//! With `COLLVIS_API_KEY` set, every request that builds a timeline must
//! carry the key as `Authorization: Bearer <key>` (a bare `<key>` is also
//! accepted). The static metadata routes in [`PUBLIC_PATHS`] stay open so
//! renderers can discover the compatibility table before they hold a key.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Routes that never build a timeline and are served without a key.
pub const PUBLIC_PATHS: [&str; 2] = ["/health", "/compatibility"];

/// The configured key, or `None` when `COLLVIS_API_KEY` is unset or empty.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("COLLVIS_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Whether `path` is served without authentication.
#[must_use]
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// The key carried by an `Authorization` header value.
fn presented_key(header_value: &str) -> &str {
    header_value.strip_prefix("Bearer ").unwrap_or(header_value)
}

/// Constant-time key comparison. Both sides are zero-padded to the same
/// length so timing does not leak how many leading bytes matched.
#[must_use]
pub fn keys_match(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    let width = presented.len().max(expected.len());

    let mut lhs = vec![0u8; width];
    let mut rhs = vec![0u8; width];
    lhs[..presented.len()].copy_from_slice(presented);
    rhs[..expected.len()].copy_from_slice(expected);

    bool::from(lhs.ct_eq(&rhs)) && presented.len() == expected.len()
}

/// Rejects timeline requests that lack the configured key.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    let path = request.uri().path().to_owned();
    if is_public_path(&path) {
        return Ok(next.run(request).await);
    }

    let verdict = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some(value) if keys_match(presented_key(value), &expected) => Ok(()),
        Some(_) => Err("invalid_api_key"),
        None => Err("missing_authorization_header"),
    };

    if let Err(reason) = verdict {
        tracing::warn!(event = "auth_failure", reason, path = %path, "Timeline request rejected");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_routes_are_public() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/compatibility"));
        assert!(!is_public_path("/timeline"));
        assert!(!is_public_path("/timeline/at"));
        assert!(!is_public_path("/export"));
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(presented_key("Bearer abc"), "abc");
        assert_eq!(presented_key("abc"), "abc");
        assert_eq!(presented_key("Bearer "), "");
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match("ring-key", "ring-key"));
        assert!(!keys_match("ring", "ring-key"));
        assert!(!keys_match("ring-key-extra", "ring-key"));
        assert!(!keys_match("", "ring-key"));
    }
}
