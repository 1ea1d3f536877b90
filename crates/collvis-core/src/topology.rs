//! # Topology Resolver
//!
//! Maps a [`TopologyKind`] to node count, ring adjacency and domain membership.
//!
//! Nodes of domain `d` occupy ids `[d * 8, (d + 1) * 8)`. In the dual-domain
//! topology the two domains are spliced into one clockwise cycle
//! `0 -> 1 -> ... -> 7 -> 8 -> ... -> 15 -> 0`, so the only edges that cross a
//! domain boundary are the bridges `7 -> 8` and `15 -> 0` (and their reverses
//! for counter-clockwise traffic).

use crate::config::TimingConfig;
use crate::primitives::{DEMO_SIZE, DOMAIN_SIZE, DUAL_DOMAIN_COUNT};
use crate::types::{NodeId, SimTime, TopologyKind};
use serde::{Deserialize, Serialize};

/// A resolved topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    kind: TopologyKind,
    node_count: usize,
    domain_size: usize,
}

impl Topology {
    /// Resolve a topology selection.
    #[must_use]
    pub fn new(kind: TopologyKind) -> Self {
        let (node_count, domain_size) = match kind {
            TopologyKind::SingleDomain8 => (DOMAIN_SIZE, DOMAIN_SIZE),
            TopologyKind::DualDomain16 => (DOMAIN_SIZE * DUAL_DOMAIN_COUNT, DOMAIN_SIZE),
            TopologyKind::SmallDemo4 => (DEMO_SIZE, DEMO_SIZE),
        };
        Self {
            kind,
            node_count,
            domain_size,
        }
    }

    /// The selection this topology was resolved from.
    #[must_use]
    pub fn kind(&self) -> TopologyKind {
        self.kind
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of domains.
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.node_count / self.domain_size
    }

    /// All node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.node_count).map(NodeId)
    }

    /// Clockwise ring successor.
    #[must_use]
    pub fn next(&self, node: NodeId) -> NodeId {
        NodeId((node.0 + 1) % self.node_count)
    }

    /// Clockwise ring predecessor.
    #[must_use]
    pub fn prev(&self, node: NodeId) -> NodeId {
        NodeId((node.0 + self.node_count - 1) % self.node_count)
    }

    /// Node `offset` hops clockwise from `node` (negative offsets go the other way).
    #[must_use]
    pub fn offset(&self, node: NodeId, offset: isize) -> NodeId {
        let n = self.node_count as isize;
        NodeId((node.0 as isize + offset).rem_euclid(n) as usize)
    }

    /// Clockwise hop distance from `from` to `to`.
    #[must_use]
    pub fn clockwise_distance(&self, from: NodeId, to: NodeId) -> usize {
        (to.0 + self.node_count - from.0) % self.node_count
    }

    /// Domain a node belongs to.
    #[must_use]
    pub fn domain_of(&self, node: NodeId) -> usize {
        node.0 / self.domain_size
    }

    /// Position of a node inside its domain.
    #[must_use]
    pub fn domain_index(&self, node: NodeId) -> usize {
        node.0 % self.domain_size
    }

    /// Whether a transfer between two nodes crosses a domain bridge.
    #[must_use]
    pub fn is_inter_domain(&self, from: NodeId, to: NodeId) -> bool {
        self.domain_of(from) != self.domain_of(to)
    }

    /// The clockwise bridge edges (empty for single-domain topologies).
    #[must_use]
    pub fn bridges(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes()
            .map(|node| (node, self.next(node)))
            .filter(|(from, to)| self.is_inter_domain(*from, *to))
            .collect()
    }

    /// Duration of a full-payload transfer between two nodes.
    #[must_use]
    pub fn link_time(&self, from: NodeId, to: NodeId, config: &TimingConfig) -> SimTime {
        if self.is_inter_domain(from, to) {
            config.transfer_time.scaled(config.inter_domain_multiplier)
        } else {
            config.transfer_time
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_counts() {
        assert_eq!(Topology::new(TopologyKind::SingleDomain8).node_count(), 8);
        assert_eq!(Topology::new(TopologyKind::DualDomain16).node_count(), 16);
        assert_eq!(Topology::new(TopologyKind::SmallDemo4).node_count(), 4);
        assert_eq!(Topology::new(TopologyKind::DualDomain16).domain_count(), 2);
    }

    #[test]
    fn single_domain_wraps_modulo() {
        let topo = Topology::new(TopologyKind::SingleDomain8);
        assert_eq!(topo.next(NodeId(7)), NodeId(0));
        assert_eq!(topo.prev(NodeId(0)), NodeId(7));
        assert_eq!(topo.next(NodeId(3)), NodeId(4));
        assert!(topo.bridges().is_empty());
        assert!(!topo.is_inter_domain(NodeId(0), NodeId(7)));
    }

    #[test]
    fn dual_domain_bridges() {
        let topo = Topology::new(TopologyKind::DualDomain16);
        assert_eq!(topo.next(NodeId(7)), NodeId(8));
        assert_eq!(topo.next(NodeId(15)), NodeId(0));
        assert_eq!(topo.prev(NodeId(8)), NodeId(7));
        assert_eq!(
            topo.bridges(),
            vec![(NodeId(7), NodeId(8)), (NodeId(15), NodeId(0))]
        );
        assert_eq!(topo.domain_index(NodeId(8)), 0);
        assert_eq!(topo.domain_index(NodeId(15)), 7);
    }

    #[test]
    fn inter_domain_only_across_bridge() {
        let topo = Topology::new(TopologyKind::DualDomain16);
        let crossing: Vec<_> = topo
            .nodes()
            .filter(|node| topo.is_inter_domain(*node, topo.next(*node)))
            .collect();
        assert_eq!(crossing, vec![NodeId(7), NodeId(15)]);
        assert!(topo.is_inter_domain(NodeId(8), NodeId(7)));
    }

    #[test]
    fn bridge_transfer_uses_multiplier() {
        let topo = Topology::new(TopologyKind::DualDomain16);
        let config = TimingConfig::default();
        assert_eq!(
            topo.link_time(NodeId(7), NodeId(8), &config),
            SimTime::new(2500)
        );
        assert_eq!(
            topo.link_time(NodeId(3), NodeId(4), &config),
            config.transfer_time
        );
    }

    #[test]
    fn offsets_and_distances() {
        let topo = Topology::new(TopologyKind::SmallDemo4);
        assert_eq!(topo.offset(NodeId(0), -1), NodeId(3));
        assert_eq!(topo.offset(NodeId(3), 2), NodeId(1));
        assert_eq!(topo.clockwise_distance(NodeId(3), NodeId(1)), 2);
        assert_eq!(topo.clockwise_distance(NodeId(1), NodeId(1)), 0);
    }
}
