//! # Engine Primitives
//!
//! Hardcoded constants for the Collvis engine.
//!
//! Timing defaults live in [`crate::config::TimingConfig`]; this module only
//! holds the structural constants that are not meant to be tuned.

/// Nodes in one fully-connected domain.
pub const DOMAIN_SIZE: usize = 8;

/// Nodes in the small demonstration topology.
pub const DEMO_SIZE: usize = 4;

/// Number of domains bridged together in the dual-domain topology.
pub const DUAL_DOMAIN_COUNT: usize = 2;

/// Micro-phases in one switch-assisted shot (to-switch, in-switch, from-switch).
pub const SWITCH_SHOT_PHASES: usize = 3;

/// Default number of windows used when bucketing utilization.
pub const DEFAULT_UTILIZATION_WINDOWS: usize = 50;

/// Upper bound on utilization windows a caller may request.
pub const MAX_UTILIZATION_WINDOWS: usize = 10_000;

/// Playback progress is expressed in parts per million of the duration.
pub const PROGRESS_SCALE: u64 = 1_000_000;

/// Magic bytes for the Collvis binary timeline header.
///
/// - File Header = Magic Bytes ("CVTL") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"CVTL";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the timeline encoding.
pub const FORMAT_VERSION: u8 = 1;
