//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::ScenarioArgs;
use crate::api;
use collvis_core::{
    CollectiveError, Operation, Resolution, Scenario, SimTime, Strategy, Timeline, TimingConfig,
    TopologyKind, build_timeline, compatibility_matrix, is_compatible,
    primitives::{MAX_UTILIZATION_WINDOWS, PROGRESS_SCALE},
    timeline_checksum, timeline_crypto_hash, timeline_to_bytes,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a timing configuration file (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Environment variable naming a timing configuration file.
const CONFIG_ENV_VAR: &str = "COLLVIS_CONFIG";

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CollectiveError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CollectiveError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CollectiveError::InvalidConfig(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and `..`) and requires a
/// regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CollectiveError> {
    let canonical = path.canonicalize().map_err(|e| {
        CollectiveError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CollectiveError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output path.
///
/// The parent directory must exist; the result joins the canonical parent
/// with the original file name.
fn validate_output_path(path: &Path) -> Result<PathBuf, CollectiveError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        CollectiveError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(CollectiveError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| CollectiveError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Load timing parameters.
///
/// Uses `path` if given, then `COLLVIS_CONFIG`, and otherwise the defaults.
/// Missing fields in the file keep their default values.
pub fn load_timing_config(path: Option<&Path>) -> Result<TimingConfig, CollectiveError> {
    let from_env = std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    let Some(path) = path.map(Path::to_path_buf).or(from_env) else {
        return Ok(TimingConfig::default());
    };

    let validated = validate_file_path(&path)?;
    validate_file_size(&validated, MAX_CONFIG_FILE_SIZE)?;

    let raw = std::fs::read_to_string(&validated)
        .map_err(|e| CollectiveError::IoError(format!("Read file: {}", e)))?;
    let config = parse_timing_config(&raw)?;

    tracing::info!(path = %validated.display(), "Loaded timing configuration");
    Ok(config)
}

/// Parse and validate a TOML timing document.
pub fn parse_timing_config(raw: &str) -> Result<TimingConfig, CollectiveError> {
    let config: TimingConfig = toml::from_str(raw)
        .map_err(|e| CollectiveError::InvalidConfig(format!("Invalid TOML: {}", e)))?;
    config.validate()?;
    Ok(config)
}

// =============================================================================
// SCENARIO RESOLUTION
// =============================================================================

/// Parse a scenario from names, substituting the default strategy for an
/// incompatible pair.
pub fn resolve_scenario(args: &ScenarioArgs) -> Result<Resolution, CollectiveError> {
    let operation: Operation = args.operation.parse()?;
    let strategy: Strategy = args.strategy.parse()?;
    let topology: TopologyKind = args.topology.parse()?;

    let resolution = Scenario::resolve(operation, strategy, topology);
    if let Some(rejected) = resolution.substituted {
        tracing::warn!(
            operation = %operation,
            requested = %rejected,
            substituted = %resolution.scenario.strategy(),
            "Strategy cannot execute operation, using default"
        );
    }
    Ok(resolution)
}

fn build(
    config: &TimingConfig,
    args: &ScenarioArgs,
) -> Result<(Resolution, Timeline), CollectiveError> {
    let resolution = resolve_scenario(args)?;
    let timeline = build_timeline(&resolution.scenario, config);
    tracing::debug!(
        scenario = %resolution.scenario,
        events = timeline.events.len(),
        duration = timeline.duration.ticks(),
        "Built timeline"
    );
    Ok((resolution, timeline))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: TimingConfig, host: &str, port: u16) -> Result<(), CollectiveError> {
    println!("Collvis Timeline Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:          {}", host);
    println!("  Port:          {}", port);
    println!("  Transfer time: {}", config.transfer_time);
    println!("  Root:          {}", config.root);
    println!();
    println!("Endpoints:");
    println!("  GET  /health               - Health check");
    println!("  GET  /compatibility        - Operation/strategy table");
    println!("  POST /timeline             - Build a timeline");
    println!("  POST /timeline/at          - Playback state at a time");
    println!("  POST /timeline/utilization - Windowed link utilization");
    println!("  POST /export               - Binary timeline (base64)");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, config).await
}

// =============================================================================
// MATRIX COMMAND
// =============================================================================

/// Show the compatibility table.
pub fn cmd_matrix(json_mode: bool) -> Result<(), CollectiveError> {
    let matrix = compatibility_matrix();

    if json_mode {
        let rows: Vec<_> = matrix
            .iter()
            .map(|(op, strategies)| {
                serde_json::json!({
                    "operation": op.name(),
                    "strategies": strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
                })
            })
            .collect();
        print_json(&serde_json::json!({ "matrix": rows }));
        return Ok(());
    }

    print!("{:<15}", "");
    for strategy in Strategy::ALL {
        print!("{:>19}", strategy.name());
    }
    println!();
    for op in Operation::ALL {
        print!("{:<15}", op.name());
        for strategy in Strategy::ALL {
            let mark = if is_compatible(op, strategy) { "yes" } else { "-" };
            print!("{:>19}", mark);
        }
        println!();
    }

    Ok(())
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

/// Build a timeline and print its summary.
pub fn cmd_build(
    config: &TimingConfig,
    args: &ScenarioArgs,
    json_mode: bool,
    full: bool,
) -> Result<(), CollectiveError> {
    let (resolution, timeline) = build(config, args)?;

    if full {
        let json = serde_json::to_string_pretty(&timeline)
            .map_err(|e| CollectiveError::SerializationError(e.to_string()))?;
        println!("{}", json);
        return Ok(());
    }

    let phases = timeline.phase_round_counts();
    let counts = timeline.event_counts();

    if json_mode {
        print_json(&serde_json::json!({
            "scenario": timeline.scenario,
            "substituted": resolution.substituted,
            "duration": timeline.duration.ticks(),
            "node_count": timeline.node_count,
            "rounds": timeline.round_count(),
            "phases": phases
                .iter()
                .map(|(phase, rounds)| serde_json::json!({ "phase": phase, "rounds": rounds }))
                .collect::<Vec<_>>(),
            "event_counts": counts
                .iter()
                .map(|(kind, count)| (format!("{:?}", kind), serde_json::Value::from(*count)))
                .collect::<serde_json::Map<String, serde_json::Value>>(),
            "steps": timeline.steps.len(),
            "snapshots": timeline.snapshots.len(),
            "bandwidth_samples": timeline.bandwidth_samples.len(),
        }));
        return Ok(());
    }

    println!("Timeline: {}", timeline.scenario);
    if let Some(rejected) = resolution.substituted {
        println!("  (requested {} is not valid for this operation)", rejected);
    }
    println!("  Nodes:             {}", timeline.node_count);
    println!("  Duration:          {}", timeline.duration);
    println!("  Rounds:            {}", timeline.round_count());
    for (phase, rounds) in &phases {
        println!("    {:<28} {}", phase, rounds);
    }
    println!("  Events:            {}", timeline.events.len());
    for (kind, count) in &counts {
        println!("    {:<28} {}", format!("{:?}", kind), count);
    }
    println!("  Steps:             {}", timeline.steps.len());
    println!("  Snapshots:         {}", timeline.snapshots.len());
    println!("  Bandwidth samples: {}", timeline.bandwidth_samples.len());

    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Show the playback state at a time or progress fraction.
pub fn cmd_inspect(
    config: &TimingConfig,
    args: &ScenarioArgs,
    json_mode: bool,
    at: Option<u64>,
    progress: Option<u64>,
) -> Result<(), CollectiveError> {
    let (_, timeline) = build(config, args)?;

    let time = match (at, progress) {
        (Some(ticks), _) => SimTime::new(ticks),
        (None, Some(ppm)) => {
            if ppm > PROGRESS_SCALE {
                return Err(CollectiveError::InvalidConfig(format!(
                    "progress {} exceeds {}",
                    ppm, PROGRESS_SCALE
                )));
            }
            timeline.time_at_progress(ppm)
        }
        (None, None) => timeline.duration,
    };

    let step = timeline.step_at(time);
    let snapshot = timeline.snapshot_at(time);
    let active = timeline.active_events_at(time);

    if json_mode {
        print_json(&serde_json::json!({
            "time": time.ticks(),
            "duration": timeline.duration.ticks(),
            "step": step,
            "snapshot": snapshot,
            "active_events": active,
            "latest_event": timeline.latest_event_at(time),
        }));
        return Ok(());
    }

    println!("{} at {} of {}", timeline.scenario, time, timeline.duration);
    if let Some(step) = step {
        println!("  Step:   [{}] {}", step.phase, step.description);
    }
    println!("  Active events: {}", active.len());
    for event in &active {
        println!("    {:?} {:?}", event.kind(), event.nodes());
    }
    if let Some(snapshot) = snapshot {
        println!("  Buffers (snapshot at {}):", snapshot.time);
        for (node, chunks) in &snapshot.nodes {
            let listed: Vec<String> = chunks
                .iter()
                .map(|c| format!("{}:{:?}x{}", c.id, c.state, c.reduction_count))
                .collect();
            println!("    {:<4} {}", node, listed.join(" "));
        }
    }

    Ok(())
}

// =============================================================================
// UTILIZATION COMMAND
// =============================================================================

/// Show windowed link utilization.
pub fn cmd_utilization(
    config: &TimingConfig,
    args: &ScenarioArgs,
    json_mode: bool,
    windows: usize,
) -> Result<(), CollectiveError> {
    validate_window_count(windows)?;
    let (_, timeline) = build(config, args)?;
    let buckets = timeline.utilization(windows);

    if json_mode {
        print_json(&serde_json::json!({
            "scenario": timeline.scenario,
            "windows": buckets,
        }));
        return Ok(());
    }

    println!("{} ({} windows)", timeline.scenario, buckets.len());
    for window in &buckets {
        let bar = "#".repeat(usize::from(window.utilization.value() / 20));
        let flag = if window.bottleneck { " !" } else { "" };
        println!(
            "  {:>8}..{:<8} {:>4}‰ {}{}",
            window.start.ticks(),
            window.end.ticks(),
            window.utilization.value(),
            bar,
            flag
        );
    }

    Ok(())
}

/// Reject a window count outside `1..=MAX_UTILIZATION_WINDOWS`.
pub fn validate_window_count(windows: usize) -> Result<(), CollectiveError> {
    if windows == 0 || windows > MAX_UTILIZATION_WINDOWS {
        return Err(CollectiveError::InvalidConfig(format!(
            "window count must be between 1 and {}",
            MAX_UTILIZATION_WINDOWS
        )));
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export a timeline to file.
pub fn cmd_export(
    config: &TimingConfig,
    args: &ScenarioArgs,
    output: &Path,
    format: &str,
) -> Result<(), CollectiveError> {
    let validated_output = validate_output_path(output)?;
    let (_, timeline) = build(config, args)?;

    let data = match format {
        "binary" => {
            let data = timeline_to_bytes(&timeline)?;
            println!("Checksum: {}", timeline_checksum(&timeline)?);
            data
        }
        "json" => serde_json::to_vec_pretty(&timeline)
            .map_err(|e| CollectiveError::SerializationError(e.to_string()))?,
        _ => {
            return Err(CollectiveError::SerializationError(format!(
                "Unknown format: {}. Use: json, binary",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| CollectiveError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Fingerprint a timeline.
pub fn cmd_hash(
    config: &TimingConfig,
    args: &ScenarioArgs,
    json_mode: bool,
) -> Result<(), CollectiveError> {
    let (_, timeline) = build(config, args)?;
    let checksum = timeline_checksum(&timeline)?;
    let blake3 = timeline_crypto_hash(&timeline)?;

    if json_mode {
        print_json(&serde_json::json!({
            "scenario": timeline.scenario,
            "checksum": checksum,
            "blake3": blake3,
        }));
    } else {
        println!("Scenario: {}", timeline.scenario);
        println!("FNV-1a:   {:016x}", checksum);
        println!("BLAKE3:   {}", blake3);
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn args(operation: &str, strategy: &str, topology: &str) -> ScenarioArgs {
        ScenarioArgs {
            operation: operation.to_string(),
            strategy: strategy.to_string(),
            topology: topology.to_string(),
        }
    }

    #[test]
    fn resolve_substitutes_incompatible_strategy() {
        let resolution = resolve_scenario(&args("all-to-all", "single-shot", "dual16")).unwrap();
        assert_eq!(resolution.substituted, Some(Strategy::SwitchSingleShot));
        assert_eq!(resolution.scenario.strategy(), Strategy::Ring);
        assert_eq!(resolution.scenario.topology(), TopologyKind::DualDomain16);
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        assert!(matches!(
            resolve_scenario(&args("allscatter", "ring", "single8")),
            Err(CollectiveError::UnknownOperation(_))
        ));
        assert!(matches!(
            resolve_scenario(&args("allreduce", "tree", "single8")),
            Err(CollectiveError::UnknownStrategy(_))
        ));
        assert!(matches!(
            resolve_scenario(&args("allreduce", "ring", "torus")),
            Err(CollectiveError::UnknownTopology(_))
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = parse_timing_config("transfer_time = 500\nroot = 3\n").unwrap();
        assert_eq!(config.transfer_time, SimTime::new(500));
        assert_eq!(config.root, 3);
        assert_eq!(config.compute_time, TimingConfig::default().compute_time);
    }

    #[test]
    fn invalid_toml_values_rejected() {
        assert!(parse_timing_config("transfer_time = 0").is_err());
        assert!(parse_timing_config("inter_domain_multiplier = 900").is_err());
        assert!(parse_timing_config("transfer_time = \"fast\"").is_err());
    }

    #[test]
    fn config_file_loaded_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timing.toml");
        std::fs::write(&path, "compute_time = 42\n").unwrap();
        let config = load_timing_config(Some(&path)).unwrap();
        assert_eq!(config.compute_time, SimTime::new(42));
    }

    #[test]
    fn missing_config_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_timing_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn export_writes_binary_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = TimingConfig::default();
        let scenario = args("allgather", "bidi", "demo4");

        let bin = dir.path().join("timeline.bin");
        cmd_export(&config, &scenario, &bin, "binary").unwrap();
        let bytes = std::fs::read(&bin).unwrap();
        let restored = collvis_core::timeline_from_bytes(&bytes).unwrap();
        assert_eq!(restored.scenario.operation(), Operation::AllGather);

        let json = dir.path().join("timeline.json");
        cmd_export(&config, &scenario, &json, "json").unwrap();
        let parsed: Timeline =
            serde_json::from_slice(&std::fs::read(&json).unwrap()).unwrap();
        assert_eq!(parsed, restored);

        assert!(cmd_export(&config, &scenario, &json, "yaml").is_err());
    }

    #[test]
    fn window_count_bounds() {
        assert!(validate_window_count(0).is_err());
        assert!(validate_window_count(1).is_ok());
        assert!(validate_window_count(MAX_UTILIZATION_WINDOWS).is_ok());
        assert!(validate_window_count(MAX_UTILIZATION_WINDOWS + 1).is_err());
    }
}
