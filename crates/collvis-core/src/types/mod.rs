//! # Core Type Definitions
//!
//! This module contains the vocabulary shared by every part of the engine:
//! - Identifiers and fixed-point quantities (`NodeId`, `SimTime`, `Permille`)
//! - The three selection axes (`Operation`, `Strategy`, `TopologyKind`)
//! - Error types (`CollectiveError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic so no input can overflow a timeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS & QUANTITIES
// =============================================================================

/// Identifier of an accelerator in the topology, in `[0, node_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Get the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A point or span on the simulated time axis, in abstract ticks.
///
/// Ticks are illustrative, not calibrated: the baseline link transfer is
/// 1000 ticks by default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SimTime(pub u64);

impl SimTime {
    /// Time zero.
    pub const ZERO: SimTime = SimTime(0);

    /// Create a new time value.
    #[must_use]
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick count.
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Saturating addition of a span.
    #[must_use]
    pub const fn plus(self, span: SimTime) -> Self {
        Self(self.0.saturating_add(span.0))
    }

    /// Scale by a fixed-point factor, rounding down and never below one tick.
    #[must_use]
    pub fn scaled(self, factor: Permille) -> Self {
        let scaled = self.0.saturating_mul(factor.value() as u64) / 1000;
        Self(scaled.max(1))
    }

    /// Divide by an integer, never below one tick.
    #[must_use]
    pub fn divided(self, divisor: u64) -> Self {
        Self((self.0 / divisor.max(1)).max(1))
    }

    /// Multiply by an integer count.
    #[must_use]
    pub const fn times(self, count: u64) -> Self {
        Self(self.0.saturating_mul(count))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t", self.0)
    }
}

/// Fixed-point fraction in thousandths.
///
/// `Permille(1000)` is 1.0. Values above 1000 are valid for multipliers;
/// utilization values are always capped at 1000.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Permille(pub u16);

impl Permille {
    /// 1.0
    pub const ONE: Permille = Permille(1000);
    /// 0.0
    pub const ZERO: Permille = Permille(0);

    /// Create a new fixed-point value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Get the raw thousandths.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Clamp to the `[0, 1]` utilization range.
    #[must_use]
    pub fn capped(self) -> Self {
        Self(self.0.min(1000))
    }
}

// =============================================================================
// OPERATION
// =============================================================================

/// The collective operation being animated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    AllReduce,
    Reduce,
    Broadcast,
    AllGather,
    ReduceScatter,
    AllToAll,
}

impl Operation {
    /// Every operation, in menu order.
    pub const ALL: [Operation; 6] = [
        Operation::AllReduce,
        Operation::Reduce,
        Operation::Broadcast,
        Operation::AllGather,
        Operation::ReduceScatter,
        Operation::AllToAll,
    ];

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AllReduce => "AllReduce",
            Operation::Reduce => "Reduce",
            Operation::Broadcast => "Broadcast",
            Operation::AllGather => "AllGather",
            Operation::ReduceScatter => "ReduceScatter",
            Operation::AllToAll => "AllToAll",
        }
    }

    /// Whether contributions are folded together (reduction counts apply).
    #[must_use]
    pub fn is_reduction(&self) -> bool {
        matches!(
            self,
            Operation::AllReduce | Operation::Reduce | Operation::ReduceScatter
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = CollectiveError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match compact(raw).as_str() {
            "allreduce" => Ok(Operation::AllReduce),
            "reduce" => Ok(Operation::Reduce),
            "broadcast" | "bcast" => Ok(Operation::Broadcast),
            "allgather" => Ok(Operation::AllGather),
            "reducescatter" => Ok(Operation::ReduceScatter),
            "alltoall" | "a2a" => Ok(Operation::AllToAll),
            _ => Err(CollectiveError::UnknownOperation(raw.to_string())),
        }
    }
}

// =============================================================================
// STRATEGY
// =============================================================================

/// The algorithm used to execute a collective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Star / parameter-server: everything goes through one root.
    Centralized,
    /// Unidirectional ring, O(N) rounds.
    Ring,
    /// Ring with the payload split across both directions.
    BidirectionalRing,
    /// In-switch reduction/multicast in a single O(1) shot.
    SwitchSingleShot,
    /// Switch reduce-scatter followed by switch all-gather.
    SwitchTwoPhase,
}

impl Strategy {
    /// Every strategy, in menu order.
    pub const ALL: [Strategy; 5] = [
        Strategy::Centralized,
        Strategy::Ring,
        Strategy::BidirectionalRing,
        Strategy::SwitchSingleShot,
        Strategy::SwitchTwoPhase,
    ];

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Centralized => "Centralized",
            Strategy::Ring => "Ring",
            Strategy::BidirectionalRing => "BidirectionalRing",
            Strategy::SwitchSingleShot => "SwitchSingleShot",
            Strategy::SwitchTwoPhase => "SwitchTwoPhase",
        }
    }

    /// Whether the strategy runs O(N) ring rounds.
    #[must_use]
    pub fn is_ring(&self) -> bool {
        matches!(self, Strategy::Ring | Strategy::BidirectionalRing)
    }

    /// Whether the strategy uses in-fabric switch hardware.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        matches!(self, Strategy::SwitchSingleShot | Strategy::SwitchTwoPhase)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = CollectiveError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match compact(raw).as_str() {
            "centralized" | "star" | "parameterserver" | "ps" => Ok(Strategy::Centralized),
            "ring" | "unidirectionalring" => Ok(Strategy::Ring),
            "bidirectionalring" | "bidiring" | "bidi" => Ok(Strategy::BidirectionalRing),
            "switchsingleshot" | "singleshot" | "switch" | "nvls" => Ok(Strategy::SwitchSingleShot),
            "switchtwophase" | "twophase" | "multishot" => Ok(Strategy::SwitchTwoPhase),
            _ => Err(CollectiveError::UnknownStrategy(raw.to_string())),
        }
    }
}

// =============================================================================
// TOPOLOGY KIND
// =============================================================================

/// The interconnect topology selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TopologyKind {
    /// One fully-connected domain of 8 nodes.
    SingleDomain8,
    /// Two 8-node domains bridged into a 16-node ring.
    DualDomain16,
    /// A single 4-node domain for step-by-step demos.
    SmallDemo4,
}

impl TopologyKind {
    /// Every topology.
    pub const ALL: [TopologyKind; 3] = [
        TopologyKind::SingleDomain8,
        TopologyKind::DualDomain16,
        TopologyKind::SmallDemo4,
    ];

    /// Get the display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TopologyKind::SingleDomain8 => "SingleDomain8",
            TopologyKind::DualDomain16 => "DualDomain16",
            TopologyKind::SmallDemo4 => "SmallDemo4",
        }
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TopologyKind {
    type Err = CollectiveError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match compact(raw).as_str() {
            "singledomain8" | "singledomain" | "single" | "single8" | "8" => {
                Ok(TopologyKind::SingleDomain8)
            }
            "dualdomain16" | "dualdomain" | "dual" | "dual16" | "16" => {
                Ok(TopologyKind::DualDomain16)
            }
            "smalldemo4" | "smalldemo" | "demo" | "demo4" | "4" => Ok(TopologyKind::SmallDemo4),
            _ => Err(CollectiveError::UnknownTopology(raw.to_string())),
        }
    }
}

/// Lowercase and drop `-`, `_` and spaces so `all-reduce` == `AllReduce`.
fn compact(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Collvis system.
///
/// - The timeline builder itself never fails; every error here is raised
///   while parsing or validating inputs, or at the I/O boundary
/// - Use `Result<T, CollectiveError>` for fallible operations
#[derive(Debug, Error)]
pub enum CollectiveError {
    /// The strategy cannot execute the operation.
    #[error("Strategy {strategy} is not valid for {operation}")]
    IncompatibleStrategy {
        operation: Operation,
        strategy: Strategy,
    },

    /// The operation name could not be parsed.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The strategy name could not be parsed.
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// The topology name could not be parsed.
    #[error("Unknown topology: {0}")]
    UnknownTopology(String),

    /// A timing parameter is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_parse_aliases() {
        assert_eq!(
            "all-reduce".parse::<Operation>().ok(),
            Some(Operation::AllReduce)
        );
        assert_eq!(
            "REDUCE_SCATTER".parse::<Operation>().ok(),
            Some(Operation::ReduceScatter)
        );
        assert_eq!(
            "all_to_all".parse::<Operation>().ok(),
            Some(Operation::AllToAll)
        );
        assert!(matches!(
            "mystery".parse::<Operation>(),
            Err(CollectiveError::UnknownOperation(_))
        ));
    }

    #[test]
    fn strategy_parse_aliases() {
        assert_eq!("bidi".parse::<Strategy>().ok(), Some(Strategy::BidirectionalRing));
        assert_eq!("NVLS".parse::<Strategy>().ok(), Some(Strategy::SwitchSingleShot));
        assert_eq!("multi-shot".parse::<Strategy>().ok(), Some(Strategy::SwitchTwoPhase));
        assert!("tree".parse::<Strategy>().is_err());
    }

    #[test]
    fn topology_parse_aliases() {
        assert_eq!("dual-16".parse::<TopologyKind>().ok(), Some(TopologyKind::DualDomain16));
        assert_eq!("demo".parse::<TopologyKind>().ok(), Some(TopologyKind::SmallDemo4));
        assert!("torus".parse::<TopologyKind>().is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for op in Operation::ALL {
            assert_eq!(op.to_string().parse::<Operation>().ok(), Some(op));
        }
        for strategy in Strategy::ALL {
            assert_eq!(strategy.to_string().parse::<Strategy>().ok(), Some(strategy));
        }
        for kind in TopologyKind::ALL {
            assert_eq!(kind.to_string().parse::<TopologyKind>().ok(), Some(kind));
        }
    }

    #[test]
    fn reduction_operations() {
        let reductions: Vec<_> = Operation::ALL
            .into_iter()
            .filter(Operation::is_reduction)
            .collect();
        assert_eq!(
            reductions,
            vec![
                Operation::AllReduce,
                Operation::Reduce,
                Operation::ReduceScatter
            ]
        );
    }

    #[test]
    fn simtime_scaling_is_integer() {
        let base = SimTime::new(1000);
        assert_eq!(base.scaled(Permille::new(2500)), SimTime::new(2500));
        assert_eq!(base.scaled(Permille::new(350)), SimTime::new(350));
        assert_eq!(base.divided(2), SimTime::new(500));
        // Never collapses to a zero-length span
        assert_eq!(SimTime::new(1).scaled(Permille::new(1)), SimTime::new(1));
        assert_eq!(SimTime::new(u64::MAX).plus(base), SimTime::new(u64::MAX));
    }

    #[test]
    fn permille_cap() {
        assert_eq!(Permille::new(1500).capped(), Permille::ONE);
        assert_eq!(Permille::new(400).capped(), Permille::new(400));
    }
}
