//! Centralized (star / parameter-server) plans.
//!
//! Rooted operations funnel everything through one node. All root-bound
//! transfers share a start time, but the round lasts
//! `(N - 1) x transfer_time x dampening` so the root link reads as the
//! bottleneck it is. Non-rooted operations fire one dense all-pairs burst
//! whose length is stretched by the congestion dampening instead.

use super::Recorder;
use crate::bandwidth::LinkId;
use crate::buffer::{AggregateTag, BufferState, Chunk, ChunkId, ChunkState};
use crate::event::Direction;
use crate::types::{NodeId, Permille, SimTime};

const ALL: ChunkId = ChunkId::Aggregate(AggregateTag::All);
const RESULT: ChunkId = ChunkId::Aggregate(AggregateTag::Result);

pub(super) fn all_reduce(rec: &mut Recorder<'_>) {
    let root = rec.root();
    let n = rec.node_count();
    rec.init(
        whole_buffers(n),
        format!("Every node holds its full buffer; {} acts as the parameter server", root),
    );
    gather_round(rec);
    root_reduce_round(rec);
    fan_out_round(rec, RESULT, n);
    rec.done("Every node holds the reduced result", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn reduce(rec: &mut Recorder<'_>) {
    let root = rec.root();
    let n = rec.node_count();
    rec.init(
        whole_buffers(n),
        format!("Every node holds its full buffer; {} collects the sum", root),
    );
    gather_round(rec);
    root_reduce_round(rec);
    let topo = rec.topology();
    rec.done(format!("{} holds the reduced result", root), |buffers| {
        for node in topo.nodes().filter(|node| *node != root) {
            buffers.clear_node(node);
        }
        buffers.set_node_state(root, ChunkState::Final);
    });
}

pub(super) fn broadcast(rec: &mut Recorder<'_>) {
    let root = rec.root();
    let mut buffers = BufferState::new(rec.node_count());
    buffers.upsert(root, Chunk::new(ALL, ChunkState::Source));
    rec.init(buffers, format!("{} holds the payload to broadcast", root));
    fan_out_round(rec, ALL, 1);
    rec.done("Every node holds the broadcast payload", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn all_gather(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let buffers = BufferState::filled(topo.node_count(), |node| {
        vec![Chunk::new(ChunkId::Numbered(node.index()), ChunkState::Local).from_origin(node)]
    });
    rec.init(buffers, "Each node holds only its own contribution");

    let pairs = all_pairs(rec, |from, _| ChunkId::Numbered(from.index()));
    dense_round(
        rec,
        "all-pairs",
        "Every node sends its contribution directly to every other node",
        &pairs,
        |buffers| {
            for (from, to, chunk) in &pairs {
                buffers.upsert(*to, Chunk::new(*chunk, ChunkState::Received).from_origin(*from));
            }
        },
    );

    rec.done("Every node holds every node's contribution", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn reduce_scatter(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    let buffers = BufferState::filled(n, |_| topo.nodes().map(|slice| Chunk::local(slice.index())).collect());
    rec.init(buffers, format!("Each of the {} nodes splits its buffer into {} chunks", n, n));

    let pairs = all_pairs(rec, |_, to| ChunkId::Numbered(to.index()));
    dense_round(
        rec,
        "scatter-to-owners",
        "Every node sends each chunk straight to the node that owns it",
        &pairs,
        |buffers| {
            for node in topo.nodes() {
                for chunk in buffers.take(node, |_| true) {
                    let state = if chunk.id == ChunkId::Numbered(node.index()) {
                        ChunkState::Gathered
                    } else {
                        ChunkState::Sent
                    };
                    buffers.upsert(node, chunk.with_state(state));
                }
            }
        },
    );

    rec.begin_round("owner-reduce", 1, "Every owner folds the contributions it received");
    let mut span = SimTime::ZERO;
    for node in topo.nodes() {
        span = span.max(rec.compute(node, "reduce", SimTime::ZERO));
    }
    rec.end_round(span, |buffers| {
        for node in topo.nodes() {
            let owned = ChunkId::Numbered(node.index());
            buffers.retain(node, |c| c.id == owned);
            if let Some(held) = buffers.chunk_mut(node, owned) {
                held.reduction_count = n;
                held.state = ChunkState::Reduced;
            }
        }
    });

    rec.done("Each node holds its owned chunk, fully reduced", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn all_to_all(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let buffers = BufferState::filled(topo.node_count(), |node| {
        topo.nodes()
            .map(|destination| {
                let state = if destination == node {
                    ChunkState::Local
                } else {
                    ChunkState::ToSend
                };
                Chunk::new(ChunkId::Numbered(destination.index()), state).from_origin(node)
            })
            .collect()
    });
    rec.init(buffers, "Every node holds one distinct item for every destination");

    let pairs = all_pairs(rec, |_, to| ChunkId::Numbered(to.index()));
    dense_round(
        rec,
        "all-pairs",
        "Every node sends each item directly to its destination",
        &pairs,
        |buffers| {
            let mut landed = Vec::new();
            for node in topo.nodes() {
                let own = ChunkId::Numbered(node.index());
                landed.extend(buffers.take(node, |c| c.id != own));
            }
            for chunk in landed {
                if let ChunkId::Numbered(destination) = chunk.id {
                    buffers.upsert(NodeId(destination), chunk.with_state(ChunkState::Received));
                }
            }
        },
    );

    rec.done("Every node holds one item from every source", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

// =============================================================================
// ROUNDS
// =============================================================================

fn whole_buffers(node_count: usize) -> BufferState {
    BufferState::filled(node_count, |_| vec![Chunk::new(ALL, ChunkState::Local)])
}

/// Round length for `N - 1` logically serialized transfers, never shorter
/// than the longest transfer actually emitted.
fn serialized_window(rec: &Recorder<'_>, longest: SimTime, dampening: Permille) -> SimTime {
    let senders = rec.node_count().saturating_sub(1) as u64;
    rec.config()
        .transfer_time
        .times(senders)
        .scaled(dampening)
        .max(longest)
}

fn gather_round(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let root = rec.root();
    let senders: Vec<NodeId> = topo.nodes().filter(|node| *node != root).collect();

    rec.begin_round(
        "gather-to-root",
        1,
        format!(
            "{} nodes send their buffers to {} at once; the root link serializes them",
            senders.len(),
            root
        ),
    );

    let mut longest = SimTime::ZERO;
    for from in &senders {
        let duration = rec.link_time(*from, root);
        longest = longest.max(rec.transfer(*from, root, ALL, Direction::ToRoot, duration));
    }
    let window = serialized_window(rec, longest, rec.config().root_gather_dampening);
    for from in &senders {
        rec.saturate(LinkId::Direct { from: *from, to: root }, window, true);
    }

    rec.end_round(window, |buffers| {
        for from in &senders {
            buffers.set_node_state(*from, ChunkState::Sent);
        }
        buffers.set_node_state(root, ChunkState::Gathered);
    });
}

fn root_reduce_round(rec: &mut Recorder<'_>) {
    let root = rec.root();
    let n = rec.node_count();
    rec.begin_round(
        "root-reduce",
        1,
        format!("{} folds all {} contributions", root, n),
    );
    let span = rec.compute(root, "reduce", SimTime::ZERO);
    rec.end_round(span, |buffers| {
        buffers.clear_node(root);
        buffers.upsert(root, Chunk::new(RESULT, ChunkState::Reduced).with_count(n));
    });
}

/// The root sends `chunk` to every other node at once.
fn fan_out_round(rec: &mut Recorder<'_>, chunk: ChunkId, count: usize) {
    let topo = rec.topology();
    let root = rec.root();
    let receivers: Vec<NodeId> = topo.nodes().filter(|node| *node != root).collect();

    rec.begin_round(
        "broadcast-from-root",
        1,
        format!("{} sends {} to all {} other nodes at once", root, chunk, receivers.len()),
    );

    let mut longest = SimTime::ZERO;
    for to in &receivers {
        let duration = rec.link_time(root, *to);
        longest = longest.max(rec.transfer(root, *to, chunk, Direction::FromRoot, duration));
    }
    let window = serialized_window(rec, longest, rec.config().root_broadcast_dampening);
    for to in &receivers {
        rec.saturate(LinkId::Direct { from: root, to: *to }, window, true);
    }

    rec.end_round(window, |buffers| {
        for to in &receivers {
            buffers.clear_node(*to);
            buffers.upsert(*to, Chunk::new(chunk, ChunkState::Received).with_count(count));
        }
    });
}

/// Every ordered pair of distinct nodes with the chunk it carries.
fn all_pairs(
    rec: &Recorder<'_>,
    chunk_of: impl Fn(NodeId, NodeId) -> ChunkId,
) -> Vec<(NodeId, NodeId, ChunkId)> {
    let topo = rec.topology();
    topo.nodes()
        .flat_map(|from| {
            topo.nodes()
                .filter(move |to| *to != from)
                .map(move |to| (from, to))
        })
        .map(|(from, to)| (from, to, chunk_of(from, to)))
        .collect()
}

/// One burst of simultaneous direct transfers plus a fabric-wide
/// congestion sample spanning it.
fn dense_round(
    rec: &mut Recorder<'_>,
    phase: &str,
    description: &str,
    pairs: &[(NodeId, NodeId, ChunkId)],
    mutate: impl FnOnce(&mut BufferState),
) {
    rec.begin_round(phase, 1, description);

    let mut longest = SimTime::ZERO;
    for (from, to, chunk) in pairs {
        let duration = rec.link_time(*from, *to);
        longest = longest.max(rec.transfer(*from, *to, *chunk, Direction::Direct, duration));
    }
    let window = serialized_window(rec, longest, rec.config().congestion_dampening);
    rec.saturate(LinkId::Fabric, window, true);

    rec.end_round(window, mutate);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::super::build_default;
    use crate::bandwidth::LinkId;
    use crate::buffer::ChunkState;
    use crate::compatibility::Scenario;
    use crate::event::EventKind;
    use crate::timeline::Timeline;
    use crate::types::{NodeId, Operation, SimTime, Strategy, TopologyKind};

    fn build(op: Operation, topology: TopologyKind) -> Timeline {
        build_default(&Scenario::new(op, Strategy::Centralized, topology).unwrap())
    }

    #[test]
    fn gather_uses_dampened_window() {
        let timeline = build(Operation::AllReduce, TopologyKind::SingleDomain8);
        let gather = &timeline.steps[1];
        assert_eq!(gather.phase, "gather-to-root");
        // 7 x 1000 x 0.35
        let reduce = &timeline.steps[2];
        assert_eq!(reduce.time, SimTime::new(2450));
        // + 300 compute + 7 x 1000 x 0.30
        assert_eq!(timeline.duration, SimTime::new(2450 + 300 + 2100));
    }

    #[test]
    fn root_bound_transfers_share_start() {
        let timeline = build(Operation::Reduce, TopologyKind::SingleDomain8);
        assert_eq!(
            timeline
                .events_starting_at(EventKind::Transfer, SimTime::ZERO)
                .len(),
            7
        );
        let bottlenecks = timeline
            .bandwidth_samples
            .iter()
            .filter(|s| s.bottleneck && matches!(s.link, LinkId::Direct { to: NodeId(0), .. }))
            .count();
        assert_eq!(bottlenecks, 7);
    }

    #[test]
    fn dense_burst_records_congestion() {
        let timeline = build(Operation::AllToAll, TopologyKind::SmallDemo4);
        assert_eq!(timeline.event_counts()[&EventKind::Transfer], 12);
        assert!(
            timeline
                .bandwidth_samples
                .iter()
                .any(|s| s.link == LinkId::Fabric && s.bottleneck)
        );
    }

    #[test]
    fn reduce_scatter_owners_end_reduced() {
        let timeline = build(Operation::ReduceScatter, TopologyKind::SmallDemo4);
        let terminal = timeline.terminal_snapshot().unwrap();
        for node in 0..4 {
            let chunks = terminal.chunks(NodeId(node));
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].reduction_count, 4);
            assert_eq!(chunks[0].state, ChunkState::Final);
        }
    }
}
