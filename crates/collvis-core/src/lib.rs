//! # collvis-core
//!
//! The deterministic timeline engine for Collvis.
//!
//! Given an (operation, strategy, topology) triple this crate synthesizes the
//! complete record an animation needs: time-stamped network and compute
//! events, narrative steps, per-node buffer snapshots and link-utilization
//! samples. Nothing is measured and no data moves; every value is a function
//! of the triple and a [`TimingConfig`].
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no async, no network, no I/O
//! - Deterministic: `BTreeMap` only, integer time, no randomness
//! - Total: every compatible [`Scenario`] builds, so [`build_timeline`] cannot fail
//! - Output is immutable; playback only queries it

// =============================================================================
// MODULES
// =============================================================================

pub mod bandwidth;
pub mod buffer;
pub mod builder;
pub mod compatibility;
pub mod config;
pub mod event;
pub mod formats;
pub mod primitives;
pub mod timeline;
pub mod topology;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{CollectiveError, NodeId, Operation, Permille, SimTime, Strategy, TopologyKind};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use bandwidth::{BandwidthSample, BandwidthSampler, LinkId, UtilizationWindow, utilization_windows};
pub use buffer::{AggregateTag, BufferSnapshot, BufferState, Chunk, ChunkId, ChunkState};
pub use builder::{build_default, build_timeline};
pub use compatibility::{
    Resolution, Scenario, compatibility_matrix, default_strategy, is_compatible, valid_strategies,
};
pub use config::TimingConfig;
pub use event::{Delivery, Direction, Event, EventKind};
pub use timeline::{Step, StepKind, Timeline};
pub use topology::Topology;

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{PersistenceHeader, timeline_checksum, timeline_from_bytes, timeline_to_bytes};

#[cfg(feature = "crypto-hash")]
pub use formats::timeline_crypto_hash;
