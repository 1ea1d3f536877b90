//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use collvis::api::{
    CompatibilityResponse, ExportResponse, HealthResponse, PlaybackRequest, PlaybackResponse,
    ScenarioRequest, TimelineResponse, UtilizationRequest, UtilizationResponse,
};
use collvis_core::{
    CollectiveError, Operation, Strategy, TopologyKind, build_default, compatibility_matrix,
};

fn scenario(operation: &str, strategy: &str, topology: &str) -> ScenarioRequest {
    ScenarioRequest {
        operation: operation.to_string(),
        strategy: strategy.to_string(),
        topology: topology.to_string(),
    }
}

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.4.2".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.4.2\""));
}

// =============================================================================
// SCENARIO REQUEST TESTS
// =============================================================================

#[test]
fn test_scenario_request_resolves_compatible_pair() {
    let resolution = scenario("ReduceScatter", "BidirectionalRing", "SmallDemo4")
        .resolve()
        .unwrap();
    assert!(resolution.substituted.is_none());
    assert_eq!(resolution.scenario.operation(), Operation::ReduceScatter);
    assert_eq!(resolution.scenario.strategy(), Strategy::BidirectionalRing);
    assert_eq!(resolution.scenario.topology(), TopologyKind::SmallDemo4);
}

#[test]
fn test_scenario_request_substitutes() {
    let resolution = scenario("broadcast", "switch-two-phase", "single8")
        .resolve()
        .unwrap();
    assert_eq!(resolution.substituted, Some(Strategy::SwitchTwoPhase));
    assert_eq!(resolution.scenario.strategy(), Strategy::Ring);
}

#[test]
fn test_scenario_request_unknown_names() {
    assert!(matches!(
        scenario("AllReduce", "Tree", "SingleDomain8").resolve(),
        Err(CollectiveError::UnknownStrategy(name)) if name == "Tree"
    ));
    assert!(matches!(
        scenario("AllReduce", "Ring", "Mesh").resolve(),
        Err(CollectiveError::UnknownTopology(_))
    ));
}

#[test]
fn test_scenario_request_deserialization() {
    let json = r#"{"operation":"AllGather","strategy":"Ring","topology":"DualDomain16"}"#;
    let request: ScenarioRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.operation, "AllGather");
    assert_eq!(request.topology, "DualDomain16");
}

// =============================================================================
// PLAYBACK / UTILIZATION REQUEST TESTS
// =============================================================================

#[test]
fn test_playback_request_flattens_scenario() {
    let json = r#"{"operation":"Reduce","strategy":"Centralized","topology":"SmallDemo4","at":1500}"#;
    let request: PlaybackRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.scenario.operation, "Reduce");
    assert_eq!(request.at, Some(1500));
    assert!(request.progress.is_none());
}

#[test]
fn test_utilization_request_window_optional() {
    let json = r#"{"operation":"AllReduce","strategy":"Ring","topology":"SingleDomain8"}"#;
    let request: UtilizationRequest = serde_json::from_str(json).unwrap();
    assert!(request.windows.is_none());
}

// =============================================================================
// RESPONSE TESTS
// =============================================================================

#[test]
fn test_compatibility_response_defaults() {
    let table = CompatibilityResponse::from_matrix(compatibility_matrix());
    assert_eq!(table.rows.len(), Operation::ALL.len());
    assert!(table.rows.iter().all(|row| row.default_strategy == Strategy::Ring));
    assert!(
        table
            .rows
            .iter()
            .all(|row| row.strategies.contains(&row.default_strategy))
    );
    assert_eq!(table.topologies, TopologyKind::ALL.to_vec());
}

#[test]
fn test_timeline_response_roundtrip() {
    let resolution = scenario("AllReduce", "SwitchSingleShot", "SmallDemo4")
        .resolve()
        .unwrap();
    let timeline = build_default(&resolution.scenario);
    let response = TimelineResponse::success(timeline.clone(), None);

    let json = serde_json::to_string(&response).unwrap();
    let parsed: TimelineResponse = serde_json::from_str(&json).unwrap();
    assert!(parsed.success);
    assert_eq!(parsed.timeline, Some(timeline));
}

#[test]
fn test_timeline_response_error() {
    let response = TimelineResponse::error("Invalid scenario");
    assert!(!response.success);
    assert!(response.timeline.is_none());
    assert_eq!(response.error.as_deref(), Some("Invalid scenario"));
}

#[test]
fn test_playback_response_error_is_empty() {
    let response = PlaybackResponse::error("bad");
    assert!(!response.success);
    assert!(response.snapshot.is_none());
    assert!(response.active_events.is_empty());
}

#[test]
fn test_utilization_response_error() {
    let response = UtilizationResponse::error("bad");
    assert!(!response.success);
    assert!(response.windows.is_empty());
}

#[test]
fn test_export_response_base64() {
    let response = ExportResponse::success(vec![0x43, 0x56, 0x54, 0x4c], 7, None);
    assert_eq!(response.data.as_deref(), Some("Q1ZUTA=="));
    assert_eq!(response.checksum, Some(7));

    let error = ExportResponse::error("failed");
    assert!(error.data.is_none());
    assert!(error.checksum.is_none());
}
