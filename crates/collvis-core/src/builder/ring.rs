//! Ring and bidirectional-ring plans.
//!
//! A ring plan runs one or two lanes. The unidirectional ring has a single
//! clockwise lane carrying chunk ids `[0, N)`; the bidirectional ring adds a
//! counter-clockwise lane carrying ids `[N, 2N)`, and both lanes move half
//! the payload, so each transfer takes half the link time. Either way every
//! phase is exactly `N - 1` rounds and all transfers of a round share its
//! start time.

use super::Recorder;
use crate::buffer::{AggregateTag, BufferState, Chunk, ChunkId, ChunkState};
use crate::event::Direction;
use crate::topology::Topology;
use crate::types::{NodeId, SimTime};

pub(super) fn all_reduce(rec: &mut Recorder<'_>) {
    all_reduce_on(rec, false);
}

pub(super) fn all_reduce_bidirectional(rec: &mut Recorder<'_>) {
    all_reduce_on(rec, true);
}

pub(super) fn reduce(rec: &mut Recorder<'_>) {
    reduce_on(rec, false);
}

pub(super) fn reduce_bidirectional(rec: &mut Recorder<'_>) {
    reduce_on(rec, true);
}

pub(super) fn broadcast(rec: &mut Recorder<'_>) {
    broadcast_on(rec, false);
}

pub(super) fn broadcast_bidirectional(rec: &mut Recorder<'_>) {
    broadcast_on(rec, true);
}

pub(super) fn all_gather(rec: &mut Recorder<'_>) {
    all_gather_on(rec, false);
}

pub(super) fn all_gather_bidirectional(rec: &mut Recorder<'_>) {
    all_gather_on(rec, true);
}

pub(super) fn reduce_scatter(rec: &mut Recorder<'_>) {
    reduce_scatter_on(rec, false);
}

pub(super) fn reduce_scatter_bidirectional(rec: &mut Recorder<'_>) {
    reduce_scatter_on(rec, true);
}

pub(super) fn all_to_all(rec: &mut Recorder<'_>) {
    all_to_all_on(rec, false);
}

pub(super) fn all_to_all_bidirectional(rec: &mut Recorder<'_>) {
    all_to_all_on(rec, true);
}

// =============================================================================
// LANES
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Lane {
    direction: Direction,
    /// `1` clockwise, `-1` counter-clockwise.
    step: isize,
    /// First chunk id carried by this lane.
    base: usize,
    /// The lane carries half the payload.
    halved: bool,
}

impl Lane {
    fn neighbor(&self, topo: &Topology, node: NodeId) -> NodeId {
        topo.offset(node, self.step)
    }

    /// Node `hops` positions against the lane's direction.
    fn upstream(&self, topo: &Topology, node: NodeId, hops: usize) -> NodeId {
        topo.offset(node, -self.step * hops as isize)
    }

    /// Node `hops` positions along the lane's direction.
    fn downstream(&self, topo: &Topology, node: NodeId, hops: usize) -> NodeId {
        topo.offset(node, self.step * hops as isize)
    }

    fn chunk(&self, slice: NodeId) -> ChunkId {
        ChunkId::Numbered(self.base + slice.index())
    }

    fn time(&self, rec: &Recorder<'_>, from: NodeId, to: NodeId) -> SimTime {
        let full = rec.link_time(from, to);
        if self.halved { full.divided(2) } else { full }
    }
}

fn lanes(node_count: usize, bidirectional: bool) -> Vec<Lane> {
    let clockwise = Lane {
        direction: Direction::Clockwise,
        step: 1,
        base: 0,
        halved: bidirectional,
    };
    if !bidirectional {
        return vec![clockwise];
    }
    vec![
        clockwise,
        Lane {
            direction: Direction::CounterClockwise,
            step: -1,
            base: node_count,
            halved: true,
        },
    ]
}

fn direction_label(lanes: &[Lane]) -> &'static str {
    if lanes.len() > 1 {
        "both neighbours"
    } else {
        "its clockwise neighbour"
    }
}

/// Every node holds every slice of every lane.
fn sliced_buffers(topo: &Topology, lanes: &[Lane]) -> BufferState {
    BufferState::filled(topo.node_count(), |_| {
        lanes
            .iter()
            .flat_map(|lane| topo.nodes().map(move |slice| Chunk::new(lane.chunk(slice), ChunkState::Local)))
            .collect()
    })
}

// =============================================================================
// REDUCE-SCATTER / ALL-GATHER SWEEPS
// =============================================================================

/// `N - 1` rounds after which node `c` owns the fully reduced slice `c` of
/// every lane.
fn reduce_scatter_rounds(rec: &mut Recorder<'_>, lanes: &[Lane]) {
    let topo = rec.topology();
    let n = topo.node_count();

    for k in 0..n - 1 {
        rec.begin_round(
            "reduce-scatter",
            k + 1,
            format!(
                "Round {}/{}: every node sends one partial chunk to {} and folds the chunk it receives",
                k + 1,
                n - 1,
                direction_label(lanes)
            ),
        );

        let mut folds = Vec::new();
        let mut span = SimTime::ZERO;
        for node in topo.nodes() {
            for lane in lanes {
                let to = lane.neighbor(&topo, node);
                let chunk = lane.chunk(lane.upstream(&topo, node, k + 1));
                let count = rec
                    .buffers()
                    .chunk(node, chunk)
                    .map_or(1, |c| c.reduction_count);
                let duration = lane.time(rec, node, to);
                span = span.max(rec.transfer(node, to, chunk, lane.direction, duration));
                folds.push((to, chunk, count));
            }
        }

        let mut compute = SimTime::ZERO;
        for node in topo.nodes() {
            compute = compute.max(rec.compute(node, "reduce", span));
        }

        rec.end_round(span.plus(compute), |buffers| {
            for (to, chunk, count) in folds {
                if let Some(held) = buffers.chunk_mut(to, chunk) {
                    held.reduction_count += count;
                    held.state = if held.reduction_count >= n {
                        ChunkState::Reduced
                    } else {
                        ChunkState::Partial
                    };
                }
            }
        });
    }
}

/// `N - 1` rounds that circulate each node's owned slice to everyone. The
/// receiver takes the sender's copy as-is.
fn all_gather_rounds(rec: &mut Recorder<'_>, lanes: &[Lane]) {
    let topo = rec.topology();
    let n = topo.node_count();

    for k in 0..n - 1 {
        rec.begin_round(
            "all-gather",
            k + 1,
            format!(
                "Round {}/{}: every node forwards the chunk it most recently completed to {}",
                k + 1,
                n - 1,
                direction_label(lanes)
            ),
        );

        let mut copies = Vec::new();
        let mut span = SimTime::ZERO;
        for node in topo.nodes() {
            for lane in lanes {
                let to = lane.neighbor(&topo, node);
                let chunk = lane.chunk(lane.upstream(&topo, node, k));
                let sent = rec.buffers().chunk(node, chunk).cloned();
                let duration = lane.time(rec, node, to);
                span = span.max(rec.transfer(node, to, chunk, lane.direction, duration));
                if let Some(sent) = sent {
                    copies.push((to, sent));
                }
            }
        }

        rec.end_round(span, |buffers| {
            for (to, chunk) in copies {
                buffers.upsert(to, chunk.with_state(ChunkState::Received));
            }
        });
    }
}

// =============================================================================
// PLANS
// =============================================================================

fn all_reduce_on(rec: &mut Recorder<'_>, bidirectional: bool) {
    let topo = rec.topology();
    let n = topo.node_count();
    let lanes = lanes(n, bidirectional);

    rec.init(
        sliced_buffers(&topo, &lanes),
        format!("Each of the {} nodes splits its buffer into {} chunks", n, n * lanes.len()),
    );
    reduce_scatter_rounds(rec, &lanes);
    all_gather_rounds(rec, &lanes);
    rec.done("Every node holds every fully reduced chunk", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

fn reduce_scatter_on(rec: &mut Recorder<'_>, bidirectional: bool) {
    let topo = rec.topology();
    let n = topo.node_count();
    let lanes = lanes(n, bidirectional);

    rec.init(
        sliced_buffers(&topo, &lanes),
        format!("Each of the {} nodes splits its buffer into {} chunks", n, n * lanes.len()),
    );
    reduce_scatter_rounds(rec, &lanes);
    rec.done("Each node keeps only the chunk it owns, fully reduced", |buffers| {
        for node in topo.nodes() {
            buffers.retain(node, |c| lanes.iter().any(|lane| c.id == lane.chunk(node)));
            buffers.set_node_state(node, ChunkState::Final);
        }
    });
}

fn all_gather_on(rec: &mut Recorder<'_>, bidirectional: bool) {
    let topo = rec.topology();
    let n = topo.node_count();
    let lanes = lanes(n, bidirectional);

    let buffers = BufferState::filled(n, |node| {
        lanes
            .iter()
            .map(|lane| Chunk::new(lane.chunk(node), ChunkState::Local).from_origin(node))
            .collect()
    });
    rec.init(buffers, "Each node holds only its own contribution");
    all_gather_rounds(rec, &lanes);
    rec.done("Every node holds every node's contribution", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

/// The chunk a chain lane carries: the whole payload, or one numbered half.
fn chain_chunk(lane_count: usize, lane: usize) -> ChunkId {
    if lane_count == 1 {
        ChunkId::Aggregate(AggregateTag::All)
    } else {
        ChunkId::Numbered(lane)
    }
}

/// A partial sum travels along the ring and ends at the root.
fn reduce_on(rec: &mut Recorder<'_>, bidirectional: bool) {
    let topo = rec.topology();
    let n = topo.node_count();
    let root = rec.root();
    let lanes = lanes(n, bidirectional);
    let ids: Vec<ChunkId> = (0..lanes.len()).map(|i| chain_chunk(lanes.len(), i)).collect();

    let buffers = BufferState::filled(n, |_| {
        ids.iter()
            .map(|id| Chunk::new(*id, ChunkState::Local))
            .collect()
    });
    rec.init(buffers, format!("Every node holds its contribution; {} collects the sum", root));

    for k in 0..n - 1 {
        rec.begin_round(
            "reduce-chain",
            k + 1,
            format!(
                "Round {}/{}: the running sum moves one hop closer to {}",
                k + 1,
                n - 1,
                root
            ),
        );

        let mut folds = Vec::new();
        let mut span = SimTime::ZERO;
        for (lane, chunk) in lanes.iter().zip(&ids) {
            let from = lane.downstream(&topo, root, k + 1);
            let to = lane.neighbor(&topo, from);
            let count = rec
                .buffers()
                .chunk(from, *chunk)
                .map_or(1, |c| c.reduction_count);
            let duration = lane.time(rec, from, to);
            span = span.max(rec.transfer(from, to, *chunk, lane.direction, duration));
            folds.push((from, to, *chunk, count));
        }

        let mut compute = SimTime::ZERO;
        for (_, to, _, _) in &folds {
            compute = compute.max(rec.compute(*to, "reduce", span));
        }

        rec.end_round(span.plus(compute), |buffers| {
            for (from, to, chunk, count) in folds {
                if let Some(sent) = buffers.chunk_mut(from, chunk) {
                    sent.state = ChunkState::Sent;
                }
                if let Some(held) = buffers.chunk_mut(to, chunk) {
                    held.reduction_count += count;
                    held.state = if held.reduction_count >= n {
                        ChunkState::Reduced
                    } else {
                        ChunkState::Partial
                    };
                }
            }
        });
    }

    rec.done(format!("{} holds the fully reduced result", root), |buffers| {
        for node in topo.nodes().filter(|node| *node != root) {
            buffers.clear_node(node);
        }
        buffers.set_node_state(root, ChunkState::Final);
    });
}

/// The root's payload travels along the ring, one hop per round.
fn broadcast_on(rec: &mut Recorder<'_>, bidirectional: bool) {
    let topo = rec.topology();
    let n = topo.node_count();
    let root = rec.root();
    let lanes = lanes(n, bidirectional);
    let ids: Vec<ChunkId> = (0..lanes.len()).map(|i| chain_chunk(lanes.len(), i)).collect();

    let mut buffers = BufferState::new(n);
    for id in &ids {
        buffers.upsert(root, Chunk::new(*id, ChunkState::Source));
    }
    rec.init(buffers, format!("{} holds the payload to broadcast", root));

    for k in 0..n - 1 {
        rec.begin_round(
            "broadcast-chain",
            k + 1,
            format!("Round {}/{}: the payload moves one hop further from {}", k + 1, n - 1, root),
        );

        let mut arrivals = Vec::new();
        let mut span = SimTime::ZERO;
        for (lane, chunk) in lanes.iter().zip(&ids) {
            let from = lane.downstream(&topo, root, k);
            let to = lane.neighbor(&topo, from);
            let duration = lane.time(rec, from, to);
            span = span.max(rec.transfer(from, to, *chunk, lane.direction, duration));
            arrivals.push((to, *chunk));
        }

        rec.end_round(span, |buffers| {
            for (to, chunk) in arrivals {
                buffers.upsert(to, Chunk::new(chunk, ChunkState::Received));
            }
        });
    }

    rec.done("Every node holds the broadcast payload", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

// =============================================================================
// ALL-TO-ALL
// =============================================================================

/// Which lane carries the item destined for `id`.
fn all_to_all_lane(id: ChunkId, node_count: usize, lane_count: usize) -> usize {
    match id {
        ChunkId::Numbered(destination) if lane_count > 1 && destination >= node_count / 2 => 1,
        _ => 0,
    }
}

/// An item is in transit while it sits anywhere but its destination.
fn in_transit(chunk: &Chunk, node: NodeId) -> bool {
    chunk.id != ChunkId::Numbered(node.index())
}

/// Store-and-forward: each round every node passes the bundle of items it is
/// relaying to the next node of the lane.
fn all_to_all_on(rec: &mut Recorder<'_>, bidirectional: bool) {
    let topo = rec.topology();
    let n = topo.node_count();
    let lanes = lanes(n, bidirectional);
    let lane_count = lanes.len();

    let buffers = BufferState::filled(n, |node| {
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

    for k in 0..n - 1 {
        rec.begin_round(
            "forward",
            k + 1,
            format!(
                "Round {}/{}: every node forwards the items still in transit to {}",
                k + 1,
                n - 1,
                direction_label(&lanes)
            ),
        );

        let mut moves = Vec::new();
        let mut span = SimTime::ZERO;
        for node in topo.nodes() {
            for (index, lane) in lanes.iter().enumerate() {
                let carrying = rec.buffers().chunks(node).iter().any(|c| {
                    in_transit(c, node) && all_to_all_lane(c.id, n, lane_count) == index
                });
                if !carrying {
                    continue;
                }
                let to = lane.neighbor(&topo, node);
                let duration = lane.time(rec, node, to);
                let bundle = ChunkId::Aggregate(AggregateTag::Pending);
                span = span.max(rec.transfer(node, to, bundle, lane.direction, duration));
                moves.push((node, to, index));
            }
        }

        rec.end_round(span, |buffers| {
            // Plan first, then apply, so nothing moves twice in one round.
            let mut landed = Vec::new();
            for (from, to, index) in moves {
                let moving = buffers.take(from, |c| {
                    in_transit(c, from) && all_to_all_lane(c.id, n, lane_count) == index
                });
                landed.extend(moving.into_iter().map(|chunk| (to, chunk)));
            }
            for (to, chunk) in landed {
                let state = if in_transit(&chunk, to) {
                    ChunkState::ToSend
                } else {
                    ChunkState::Received
                };
                buffers.upsert(to, chunk.with_state(state));
            }
        });
    }

    rec.done("Every node holds one item from every source", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::super::build_default;
    use crate::compatibility::Scenario;
    use crate::event::{Event, EventKind};
    use crate::types::{NodeId, Operation, SimTime, Strategy, TopologyKind};

    fn build(op: Operation, strategy: Strategy, topology: TopologyKind) -> crate::timeline::Timeline {
        let scenario = Scenario::new(op, strategy, topology).unwrap();
        build_default(&scenario)
    }

    #[test]
    fn ring_all_reduce_phases() {
        let timeline = build(Operation::AllReduce, Strategy::Ring, TopologyKind::SingleDomain8);
        assert_eq!(
            timeline.phase_round_counts(),
            vec![("reduce-scatter".to_string(), 7), ("all-gather".to_string(), 7)]
        );
        // 7 x (1000 + 300) + 7 x 1000
        assert_eq!(timeline.duration, SimTime::new(16_100));
    }

    #[test]
    fn reduce_scatter_sends_rotated_chunk() {
        let timeline = build(Operation::AllReduce, Strategy::Ring, TopologyKind::SmallDemo4);
        let first_round: Vec<_> = timeline
            .events_starting_at(EventKind::Transfer, SimTime::ZERO)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(first_round.len(), 4);
        for event in first_round {
            if let Event::Transfer { from, to, chunk, .. } = event {
                assert_eq!(to, NodeId((from.0 + 1) % 4));
                assert_eq!(chunk, crate::buffer::ChunkId::Numbered((from.0 + 3) % 4));
            }
        }
    }

    #[test]
    fn bidirectional_uses_both_directions_at_half_time() {
        let timeline = build(
            Operation::AllReduce,
            Strategy::BidirectionalRing,
            TopologyKind::SingleDomain8,
        );
        let transfers = timeline.events_starting_at(EventKind::Transfer, SimTime::ZERO);
        assert_eq!(transfers.len(), 16);
        assert!(transfers.iter().all(|e| e.duration() == SimTime::new(500)));
        let terminal = timeline.terminal_snapshot().unwrap();
        assert_eq!(terminal.chunks(NodeId(0)).len(), 16);
        assert!(terminal.fully_reduced(8));
    }

    #[test]
    fn ring_reduce_ends_at_root_only() {
        let timeline = build(Operation::Reduce, Strategy::Ring, TopologyKind::SingleDomain8);
        let terminal = timeline.terminal_snapshot().unwrap();
        assert_eq!(terminal.chunks(NodeId(0)).len(), 1);
        assert_eq!(terminal.chunks(NodeId(0))[0].reduction_count, 8);
        assert!((1..8).all(|i| terminal.chunks(NodeId(i)).is_empty()));
    }

    #[test]
    fn ring_all_to_all_bundles_shrink() {
        let timeline = build(Operation::AllToAll, Strategy::Ring, TopologyKind::SmallDemo4);
        assert_eq!(timeline.round_count(), 3);
        let terminal = timeline.terminal_snapshot().unwrap();
        for node in 0..4 {
            let chunks = terminal.chunks(NodeId(node));
            assert_eq!(chunks.len(), 4);
            let mut origins: Vec<_> = chunks.iter().filter_map(|c| c.origin).collect();
            origins.sort();
            assert_eq!(origins, (0..4).map(NodeId).collect::<Vec<_>>());
        }
    }
}
