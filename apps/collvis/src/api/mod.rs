//! # Collvis HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /compatibility` - Operation/strategy compatibility table
//! - `POST /timeline` - Build a complete timeline
//! - `POST /timeline/at` - Playback state at a time or progress fraction
//! - `POST /timeline/utilization` - Windowed aggregate link utilization
//! - `POST /export` - Binary timeline (base64) with checksum
//!
//! Every POST body carries `{operation, strategy, topology}`. An
//! incompatible strategy is replaced by the operation's default and the
//! rejected name is returned in `substituted`.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `COLLVIS_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `COLLVIS_RATE_LIMIT`: Timeline rebuilds per second (default: 100, 0 to disable)
//! - `COLLVIS_API_KEY`: If set, every timeline route requires Bearer token authentication;
//!   `/health` and `/compatibility` stay public

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use handlers::{
    compatibility_handler, export_handler, health_handler, playback_handler, timeline_handler,
    utilization_handler,
};
pub use types::{
    CompatibilityResponse, CompatibilityRow, ExportResponse, HealthResponse, PlaybackRequest,
    PlaybackResponse, ScenarioRequest, TimelineResponse, UtilizationRequest, UtilizationResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use collvis_core::{CollectiveError, TimingConfig};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the timing parameters every request builds with.
///
/// Read-only for the lifetime of the server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TimingConfig>,
}

impl AppState {
    /// Create new app state from validated timing parameters.
    #[must_use]
    pub fn new(config: TimingConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `COLLVIS_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
///
/// # Security Note
///
/// The default is restrictive (localhost only). Set `COLLVIS_CORS_ORIGINS=*`
/// explicitly only for development or if you understand the security implications.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("COLLVIS_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (COLLVIS_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in COLLVIS_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No COLLVIS_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. CORS - handles preflight requests
/// 2. Tracing - logs all requests
/// 3. Rate Limiting - meters timeline rebuilds (if enabled)
/// 4. Authentication - validates API key on timeline routes (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} timeline rebuilds/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - timeline endpoints are publicly accessible! \
             Set COLLVIS_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/compatibility", get(handlers::compatibility_handler))
        .route("/timeline", post(handlers::timeline_handler))
        .route("/timeline/at", post(handlers::playback_handler))
        .route("/timeline/utilization", post(handlers::utilization_handler))
        .route("/export", post(handlers::export_handler));

    // Innermost: runs last on the request path
    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, config: TimingConfig) -> Result<(), CollectiveError> {
    config.validate()?;
    let state = AppState::new(config);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CollectiveError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Collvis HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| CollectiveError::IoError(format!("Server error: {}", e)))
}
