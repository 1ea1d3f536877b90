//! # Compatibility Table
//!
//! Which strategies can execute which operation.
//!
//! | Operation     | Centralized | Ring | BidiRing | SingleShot | TwoPhase |
//! |---------------|-------------|------|----------|------------|----------|
//! | AllReduce     | yes         | yes  | yes      | yes        | yes      |
//! | Reduce        | yes         | yes  | yes      | yes        | no       |
//! | Broadcast     | yes         | yes  | yes      | yes        | no       |
//! | AllGather     | yes         | yes  | yes      | yes        | yes      |
//! | ReduceScatter | yes         | yes  | yes      | yes        | yes      |
//! | AllToAll      | yes         | yes  | yes      | no         | no       |
//!
//! AllToAll moves distinct point-to-point payloads, so in-switch reduction or
//! replication never applies to it. Only operations that decompose into a
//! reduce-scatter/all-gather pair admit the two-phase switch strategy.
//!
//! A [`Scenario`] can only be constructed from a compatible triple, which is
//! what lets the builder be infallible.

use crate::types::{CollectiveError, Operation, Strategy, TopologyKind};
use serde::{Deserialize, Serialize};

/// Strategies that can execute `operation`, in menu order.
#[must_use]
pub fn valid_strategies(operation: Operation) -> &'static [Strategy] {
    use Strategy::{BidirectionalRing, Centralized, Ring, SwitchSingleShot, SwitchTwoPhase};
    match operation {
        Operation::AllReduce | Operation::AllGather | Operation::ReduceScatter => &[
            Centralized,
            Ring,
            BidirectionalRing,
            SwitchSingleShot,
            SwitchTwoPhase,
        ],
        Operation::Reduce | Operation::Broadcast => {
            &[Centralized, Ring, BidirectionalRing, SwitchSingleShot]
        }
        Operation::AllToAll => &[Centralized, Ring, BidirectionalRing],
    }
}

/// Whether `strategy` can execute `operation`.
#[must_use]
pub fn is_compatible(operation: Operation, strategy: Strategy) -> bool {
    valid_strategies(operation).contains(&strategy)
}

/// Strategy substituted when a caller asks for an invalid pair.
#[must_use]
pub fn default_strategy(_operation: Operation) -> Strategy {
    Strategy::Ring
}

/// Every compatible (operation, strategy) pair, row by row.
#[must_use]
pub fn compatibility_matrix() -> Vec<(Operation, Vec<Strategy>)> {
    Operation::ALL
        .into_iter()
        .map(|op| (op, valid_strategies(op).to_vec()))
        .collect()
}

// =============================================================================
// SCENARIO
// =============================================================================

/// A validated (operation, strategy, topology) triple.
///
/// Deserializing goes through [`Scenario::new`], so a decoded scenario is as
/// trustworthy as a constructed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ScenarioParts")]
pub struct Scenario {
    operation: Operation,
    strategy: Strategy,
    topology: TopologyKind,
}

impl Scenario {
    /// Validate a triple against the compatibility table.
    pub fn new(
        operation: Operation,
        strategy: Strategy,
        topology: TopologyKind,
    ) -> Result<Self, CollectiveError> {
        if !is_compatible(operation, strategy) {
            return Err(CollectiveError::IncompatibleStrategy {
                operation,
                strategy,
            });
        }
        Ok(Self {
            operation,
            strategy,
            topology,
        })
    }

    /// Validate a triple, substituting the default strategy when the
    /// requested one cannot execute the operation.
    #[must_use]
    pub fn resolve(operation: Operation, strategy: Strategy, topology: TopologyKind) -> Resolution {
        if is_compatible(operation, strategy) {
            return Resolution {
                scenario: Self {
                    operation,
                    strategy,
                    topology,
                },
                substituted: None,
            };
        }
        Resolution {
            scenario: Self {
                operation,
                strategy: default_strategy(operation),
                topology,
            },
            substituted: Some(strategy),
        }
    }

    /// The operation.
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The topology selection.
    #[must_use]
    pub fn topology(&self) -> TopologyKind {
        self.topology
    }

    /// Every valid scenario across all topologies.
    #[must_use]
    pub fn all() -> Vec<Scenario> {
        let mut scenarios = Vec::new();
        for topology in TopologyKind::ALL {
            for operation in Operation::ALL {
                for &strategy in valid_strategies(operation) {
                    scenarios.push(Self {
                        operation,
                        strategy,
                        topology,
                    });
                }
            }
        }
        scenarios
    }
}

/// Unvalidated wire form of a [`Scenario`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScenarioParts {
    operation: Operation,
    strategy: Strategy,
    topology: TopologyKind,
}

impl TryFrom<ScenarioParts> for Scenario {
    type Error = CollectiveError;

    fn try_from(parts: ScenarioParts) -> Result<Self, Self::Error> {
        Self::new(parts.operation, parts.strategy, parts.topology)
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.operation, self.strategy, self.topology)
    }
}

/// Outcome of [`Scenario::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The scenario that will be built.
    pub scenario: Scenario,
    /// The rejected strategy, if a substitution happened.
    pub substituted: Option<Strategy>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn alltoall_rejects_switch_strategies() {
        assert!(!is_compatible(Operation::AllToAll, Strategy::SwitchSingleShot));
        assert!(!is_compatible(Operation::AllToAll, Strategy::SwitchTwoPhase));
        assert!(is_compatible(Operation::AllToAll, Strategy::BidirectionalRing));
    }

    #[test]
    fn reduce_rejects_two_phase() {
        assert!(!is_compatible(Operation::Reduce, Strategy::SwitchTwoPhase));
        assert!(is_compatible(Operation::Reduce, Strategy::SwitchSingleShot));
    }

    #[test]
    fn symmetric_operations_admit_everything() {
        for op in [
            Operation::AllReduce,
            Operation::AllGather,
            Operation::ReduceScatter,
        ] {
            for strategy in Strategy::ALL {
                assert!(is_compatible(op, strategy), "{} / {}", op, strategy);
            }
        }
    }

    #[test]
    fn default_strategy_is_always_valid() {
        for op in Operation::ALL {
            assert!(is_compatible(op, default_strategy(op)));
        }
    }

    #[test]
    fn scenario_new_rejects_invalid_pair() {
        let result = Scenario::new(
            Operation::AllToAll,
            Strategy::SwitchSingleShot,
            TopologyKind::SingleDomain8,
        );
        assert!(matches!(
            result,
            Err(CollectiveError::IncompatibleStrategy {
                operation: Operation::AllToAll,
                strategy: Strategy::SwitchSingleShot
            })
        ));
    }

    #[test]
    fn resolve_substitutes_invalid_pair() {
        let resolution = Scenario::resolve(
            Operation::Reduce,
            Strategy::SwitchTwoPhase,
            TopologyKind::DualDomain16,
        );
        assert_eq!(resolution.substituted, Some(Strategy::SwitchTwoPhase));
        assert_eq!(resolution.scenario.strategy(), Strategy::Ring);
        assert_eq!(resolution.scenario.topology(), TopologyKind::DualDomain16);
    }

    #[test]
    fn resolve_keeps_valid_pair() {
        let resolution = Scenario::resolve(
            Operation::AllReduce,
            Strategy::SwitchTwoPhase,
            TopologyKind::SingleDomain8,
        );
        assert_eq!(resolution.substituted, None);
        assert_eq!(resolution.scenario.strategy(), Strategy::SwitchTwoPhase);
    }

    #[test]
    fn decoding_rejects_invalid_pair() {
        let parts = ScenarioParts {
            operation: Operation::AllToAll,
            strategy: Strategy::SwitchTwoPhase,
            topology: TopologyKind::SmallDemo4,
        };
        let bytes = postcard::to_stdvec(&parts).unwrap();
        assert!(postcard::from_bytes::<Scenario>(&bytes).is_err());

        let valid =
            Scenario::new(Operation::AllToAll, Strategy::Ring, TopologyKind::SmallDemo4).unwrap();
        let bytes = postcard::to_stdvec(&valid).unwrap();
        assert_eq!(postcard::from_bytes::<Scenario>(&bytes).unwrap(), valid);
    }

    #[test]
    fn built_timeline_names_the_strategy_it_ran() {
        let unchecked = Scenario {
            operation: Operation::Broadcast,
            strategy: Strategy::SwitchTwoPhase,
            topology: TopologyKind::SmallDemo4,
        };
        let timeline = crate::builder::build_default(&unchecked);
        assert_eq!(timeline.scenario.strategy(), Strategy::Ring);
        assert!(timeline.round_count() > 0);
    }

    #[test]
    fn all_scenarios_count() {
        // 5 + 4 + 4 + 5 + 5 + 3 = 26 pairs, across 3 topologies
        assert_eq!(Scenario::all().len(), 26 * 3);
        assert!(
            Scenario::all()
                .iter()
                .all(|s| is_compatible(s.operation(), s.strategy()))
        );
    }
}
