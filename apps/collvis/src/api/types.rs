//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use collvis_core::{
    BufferSnapshot, CollectiveError, Event, Operation, Resolution, Scenario, Step, Strategy,
    Timeline, TopologyKind, UtilizationWindow, default_strategy,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// COMPATIBILITY RESPONSE
// =============================================================================

/// One operation's row of the compatibility table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityRow {
    pub operation: Operation,
    pub strategies: Vec<Strategy>,
    /// Strategy substituted when an incompatible one is requested.
    pub default_strategy: Strategy,
}

/// The full compatibility table plus the selectable topologies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityResponse {
    pub rows: Vec<CompatibilityRow>,
    pub topologies: Vec<TopologyKind>,
}

impl CompatibilityResponse {
    pub fn from_matrix(matrix: Vec<(Operation, Vec<Strategy>)>) -> Self {
        Self {
            rows: matrix
                .into_iter()
                .map(|(operation, strategies)| CompatibilityRow {
                    operation,
                    strategies,
                    default_strategy: default_strategy(operation),
                })
                .collect(),
            topologies: TopologyKind::ALL.to_vec(),
        }
    }
}

// =============================================================================
// SCENARIO REQUEST
// =============================================================================

/// The (operation, strategy, topology) triple carried by every timeline
/// request.
///
/// Names are matched case-insensitively and ignore `-`, `_` and spaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub operation: String,
    pub strategy: String,
    pub topology: String,
}

impl ScenarioRequest {
    /// Parse the names and substitute the default strategy for an
    /// incompatible pair.
    pub fn resolve(&self) -> Result<Resolution, CollectiveError> {
        let operation: Operation = self.operation.parse()?;
        let strategy: Strategy = self.strategy.parse()?;
        let topology: TopologyKind = self.topology.parse()?;
        Ok(Scenario::resolve(operation, strategy, topology))
    }
}

// =============================================================================
// TIMELINE RESPONSE
// =============================================================================

/// A complete timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResponse {
    pub success: bool,
    /// The requested strategy, when it was replaced by the default.
    pub substituted: Option<Strategy>,
    pub timeline: Option<Timeline>,
    pub error: Option<String>,
}

impl TimelineResponse {
    pub fn success(timeline: Timeline, substituted: Option<Strategy>) -> Self {
        Self {
            success: true,
            substituted,
            timeline: Some(timeline),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            substituted: None,
            timeline: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// PLAYBACK REQUEST/RESPONSE
// =============================================================================

/// Playback query: the state at `at` ticks, or at `progress` parts per
/// million of the duration. With neither, the terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackRequest {
    #[serde(flatten)]
    pub scenario: ScenarioRequest,
    #[serde(default)]
    pub at: Option<u64>,
    #[serde(default)]
    pub progress: Option<u64>,
}

/// What a renderer draws at one instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackResponse {
    pub success: bool,
    pub substituted: Option<Strategy>,
    pub time: u64,
    pub duration: u64,
    pub step: Option<Step>,
    pub snapshot: Option<BufferSnapshot>,
    pub active_events: Vec<Event>,
    pub latest_event: Option<Event>,
    pub error: Option<String>,
}

impl PlaybackResponse {
    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            substituted: None,
            time: 0,
            duration: 0,
            step: None,
            snapshot: None,
            active_events: vec![],
            latest_event: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// UTILIZATION REQUEST/RESPONSE
// =============================================================================

/// Windowed utilization query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationRequest {
    #[serde(flatten)]
    pub scenario: ScenarioRequest,
    /// Defaults to `DEFAULT_UTILIZATION_WINDOWS`.
    #[serde(default)]
    pub windows: Option<usize>,
}

/// Aggregate utilization per window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationResponse {
    pub success: bool,
    pub substituted: Option<Strategy>,
    pub windows: Vec<UtilizationWindow>,
    pub error: Option<String>,
}

impl UtilizationResponse {
    pub fn success(windows: Vec<UtilizationWindow>, substituted: Option<Strategy>) -> Self {
        Self {
            success: true,
            substituted,
            windows,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            substituted: None,
            windows: vec![],
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Binary timeline export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub substituted: Option<Strategy>,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: Vec<u8>, checksum: u64, substituted: Option<Strategy>) -> Self {
        Self {
            success: true,
            substituted,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            checksum: Some(checksum),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            substituted: None,
            data: None,
            checksum: None,
            error: Some(msg.into()),
        }
    }
}
