//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Timelines are rebuilt per request. Building is pure and fast, so the
//! server keeps no cache and no per-session state.

use super::{
    AppState,
    types::{
        CompatibilityResponse, ExportResponse, HealthResponse, PlaybackRequest, PlaybackResponse,
        ScenarioRequest, TimelineResponse, UtilizationRequest, UtilizationResponse,
    },
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use collvis_core::{
    CollectiveError, Resolution, SimTime, Timeline, TimingConfig, build_timeline,
    compatibility_matrix,
    primitives::{DEFAULT_UTILIZATION_WINDOWS, MAX_UTILIZATION_WINDOWS, PROGRESS_SCALE},
    timeline_checksum, timeline_to_bytes,
};

// =============================================================================
// SHARED
// =============================================================================

/// Resolve the requested triple and build its timeline.
fn build_requested(
    config: &TimingConfig,
    request: &ScenarioRequest,
) -> Result<(Resolution, Timeline), CollectiveError> {
    let resolution = request.resolve()?;
    if let Some(rejected) = resolution.substituted {
        tracing::warn!(
            operation = %resolution.scenario.operation(),
            requested = %rejected,
            substituted = %resolution.scenario.strategy(),
            "Strategy cannot execute operation, using default"
        );
    }
    Ok((resolution, build_timeline(&resolution.scenario, config)))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// COMPATIBILITY HANDLER
// =============================================================================

/// The operation/strategy compatibility table.
pub async fn compatibility_handler() -> impl IntoResponse {
    Json(CompatibilityResponse::from_matrix(compatibility_matrix()))
}

// =============================================================================
// TIMELINE HANDLER
// =============================================================================

/// Build a complete timeline.
pub async fn timeline_handler(
    State(state): State<AppState>,
    Json(request): Json<ScenarioRequest>,
) -> impl IntoResponse {
    match build_requested(&state.config, &request) {
        Ok((resolution, timeline)) => (
            StatusCode::OK,
            Json(TimelineResponse::success(timeline, resolution.substituted)),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(TimelineResponse::error(format!("Invalid scenario: {}", e))),
        ),
    }
}

// =============================================================================
// PLAYBACK HANDLER
// =============================================================================

/// Playback state at a time or progress fraction.
pub async fn playback_handler(
    State(state): State<AppState>,
    Json(request): Json<PlaybackRequest>,
) -> impl IntoResponse {
    if request.progress.is_some_and(|ppm| ppm > PROGRESS_SCALE) {
        return (
            StatusCode::BAD_REQUEST,
            Json(PlaybackResponse::error(format!(
                "progress must not exceed {}",
                PROGRESS_SCALE
            ))),
        );
    }

    let (resolution, timeline) = match build_requested(&state.config, &request.scenario) {
        Ok(built) => built,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(PlaybackResponse::error(format!("Invalid scenario: {}", e))),
            );
        }
    };

    let time = match (request.at, request.progress) {
        (Some(ticks), _) => SimTime::new(ticks),
        (None, Some(ppm)) => timeline.time_at_progress(ppm),
        (None, None) => timeline.duration,
    };

    let response = PlaybackResponse {
        success: true,
        substituted: resolution.substituted,
        time: time.ticks(),
        duration: timeline.duration.ticks(),
        step: timeline.step_at(time).cloned(),
        snapshot: timeline.snapshot_at(time).cloned(),
        active_events: timeline.active_events_at(time).into_iter().cloned().collect(),
        latest_event: timeline.latest_event_at(time).cloned(),
        error: None,
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// UTILIZATION HANDLER
// =============================================================================

/// Aggregate link utilization over fixed windows.
pub async fn utilization_handler(
    State(state): State<AppState>,
    Json(request): Json<UtilizationRequest>,
) -> impl IntoResponse {
    let windows = request.windows.unwrap_or(DEFAULT_UTILIZATION_WINDOWS);
    if windows == 0 || windows > MAX_UTILIZATION_WINDOWS {
        return (
            StatusCode::BAD_REQUEST,
            Json(UtilizationResponse::error(format!(
                "windows must be between 1 and {}",
                MAX_UTILIZATION_WINDOWS
            ))),
        );
    }

    match build_requested(&state.config, &request.scenario) {
        Ok((resolution, timeline)) => (
            StatusCode::OK,
            Json(UtilizationResponse::success(
                timeline.utilization(windows),
                resolution.substituted,
            )),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(UtilizationResponse::error(format!("Invalid scenario: {}", e))),
        ),
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export a timeline in the binary persistence format.
pub async fn export_handler(
    State(state): State<AppState>,
    Json(request): Json<ScenarioRequest>,
) -> impl IntoResponse {
    let (resolution, timeline) = match build_requested(&state.config, &request) {
        Ok(built) => built,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ExportResponse::error(format!("Invalid scenario: {}", e))),
            );
        }
    };

    let encoded = timeline_to_bytes(&timeline)
        .and_then(|data| timeline_checksum(&timeline).map(|checksum| (data, checksum)));

    match encoded {
        Ok((data, checksum)) => (
            StatusCode::OK,
            Json(ExportResponse::success(
                data,
                checksum,
                resolution.substituted,
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}
