//! # Event Model
//!
//! Time-stamped synthetic network and compute activity.
//!
//! Each variant carries only the fields relevant to it; consumers dispatch
//! with an exhaustive `match`. Every event satisfies `duration > 0`.

use crate::buffer::ChunkId;
use crate::types::{NodeId, SimTime};
use serde::{Deserialize, Serialize};

/// Which way a point-to-point transfer travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
    ToRoot,
    FromRoot,
    Direct,
}

/// How the switch delivers a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Delivery {
    /// The same payload replicated to every destination.
    Multicast,
    /// A distinct payload addressed to its owning node.
    Unicast,
}

/// Discriminant of an [`Event`], for counting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Transfer,
    Compute,
    LinkActive,
    SwitchIngress,
    SwitchEgress,
    SwitchReduce,
    SwitchBroadcast,
}

/// One synthetic event on the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A chunk moving between two nodes.
    Transfer {
        from: NodeId,
        to: NodeId,
        chunk: ChunkId,
        start: SimTime,
        duration: SimTime,
        direction: Direction,
    },
    /// Local work on a node (reduction, copy).
    Compute {
        node: NodeId,
        label: String,
        start: SimTime,
        duration: SimTime,
    },
    /// Visual marker that a link is busy; carries no payload.
    LinkActive {
        from: NodeId,
        to: NodeId,
        start: SimTime,
        duration: SimTime,
        direction: Direction,
    },
    /// Node to switch.
    SwitchIngress {
        from: NodeId,
        chunk: ChunkId,
        start: SimTime,
        duration: SimTime,
    },
    /// Switch to node.
    SwitchEgress {
        to: NodeId,
        chunk: ChunkId,
        start: SimTime,
        duration: SimTime,
        delivery: Delivery,
    },
    /// In-switch reduction of every source's contribution.
    SwitchReduce {
        sources: Vec<NodeId>,
        chunk: ChunkId,
        start: SimTime,
        duration: SimTime,
    },
    /// In-switch replication towards the destinations.
    SwitchBroadcast {
        destinations: Vec<NodeId>,
        start: SimTime,
        duration: SimTime,
    },
}

impl Event {
    /// Start time.
    #[must_use]
    pub fn start(&self) -> SimTime {
        match self {
            Event::Transfer { start, .. }
            | Event::Compute { start, .. }
            | Event::LinkActive { start, .. }
            | Event::SwitchIngress { start, .. }
            | Event::SwitchEgress { start, .. }
            | Event::SwitchReduce { start, .. }
            | Event::SwitchBroadcast { start, .. } => *start,
        }
    }

    /// Duration.
    #[must_use]
    pub fn duration(&self) -> SimTime {
        match self {
            Event::Transfer { duration, .. }
            | Event::Compute { duration, .. }
            | Event::LinkActive { duration, .. }
            | Event::SwitchIngress { duration, .. }
            | Event::SwitchEgress { duration, .. }
            | Event::SwitchReduce { duration, .. }
            | Event::SwitchBroadcast { duration, .. } => *duration,
        }
    }

    /// End time (exclusive).
    #[must_use]
    pub fn end(&self) -> SimTime {
        self.start().plus(self.duration())
    }

    /// Whether the event is in progress at `time` (`start <= time < end`).
    #[must_use]
    pub fn is_active_at(&self, time: SimTime) -> bool {
        self.start() <= time && time < self.end()
    }

    /// The variant tag.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Transfer { .. } => EventKind::Transfer,
            Event::Compute { .. } => EventKind::Compute,
            Event::LinkActive { .. } => EventKind::LinkActive,
            Event::SwitchIngress { .. } => EventKind::SwitchIngress,
            Event::SwitchEgress { .. } => EventKind::SwitchEgress,
            Event::SwitchReduce { .. } => EventKind::SwitchReduce,
            Event::SwitchBroadcast { .. } => EventKind::SwitchBroadcast,
        }
    }

    /// Whether the event moves a payload (and so has a bandwidth sample).
    #[must_use]
    pub fn is_transfer_class(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::Transfer | EventKind::SwitchIngress | EventKind::SwitchEgress
        )
    }

    /// Nodes the event touches, for highlighting.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            Event::Transfer { from, to, .. } | Event::LinkActive { from, to, .. } => {
                vec![*from, *to]
            }
            Event::Compute { node, .. } => vec![*node],
            Event::SwitchIngress { from, .. } => vec![*from],
            Event::SwitchEgress { to, .. } => vec![*to],
            Event::SwitchReduce { sources, .. } => sources.clone(),
            Event::SwitchBroadcast { destinations, .. } => destinations.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(start: u64, duration: u64) -> Event {
        Event::Transfer {
            from: NodeId(0),
            to: NodeId(1),
            chunk: ChunkId::Numbered(0),
            start: SimTime::new(start),
            duration: SimTime::new(duration),
            direction: Direction::Clockwise,
        }
    }

    #[test]
    fn active_window_is_half_open() {
        let event = transfer(100, 50);
        assert!(!event.is_active_at(SimTime::new(99)));
        assert!(event.is_active_at(SimTime::new(100)));
        assert!(event.is_active_at(SimTime::new(149)));
        assert!(!event.is_active_at(SimTime::new(150)));
        assert_eq!(event.end(), SimTime::new(150));
    }

    #[test]
    fn kinds_and_transfer_class() {
        assert_eq!(transfer(0, 1).kind(), EventKind::Transfer);
        assert!(transfer(0, 1).is_transfer_class());

        let reduce = Event::SwitchReduce {
            sources: vec![NodeId(0), NodeId(1)],
            chunk: ChunkId::Numbered(0),
            start: SimTime::ZERO,
            duration: SimTime::new(10),
        };
        assert!(!reduce.is_transfer_class());
        assert_eq!(reduce.nodes(), vec![NodeId(0), NodeId(1)]);
    }
}
