//! Switch-assisted plans.
//!
//! A shot is three timed rounds whose durations never depend on the node
//! count: a parallel burst into the switch, one in-switch reduction or
//! replication, and a parallel burst out of it. The two-phase strategy
//! composes two shots.

use super::Recorder;
use crate::buffer::{AggregateTag, BufferState, Chunk, ChunkId, ChunkState};
use crate::event::Delivery;
use crate::types::{NodeId, SimTime};

const ALL: ChunkId = ChunkId::Aggregate(AggregateTag::All);
const RESULT: ChunkId = ChunkId::Aggregate(AggregateTag::Result);

// =============================================================================
// SHOT
// =============================================================================

/// What the switch does between ingress and egress.
#[derive(Debug, Clone, Copy)]
enum Middle {
    /// Fold every ingress contribution into `chunk`.
    Reduce(ChunkId),
    /// Replicate towards the egress destinations.
    Replicate,
}

#[derive(Debug)]
struct Shot {
    /// Prepended to every phase label, empty for single-shot plans.
    prefix: &'static str,
    ingress: Vec<(NodeId, ChunkId)>,
    middle: Middle,
    egress: Vec<(NodeId, ChunkId, Delivery)>,
}

fn run_shot(
    rec: &mut Recorder<'_>,
    shot: Shot,
    on_ingress: impl FnOnce(&mut BufferState),
    on_egress: impl FnOnce(&mut BufferState),
) {
    let Shot {
        prefix,
        ingress,
        middle,
        egress,
    } = shot;

    rec.begin_round(
        &format!("{}to-switch", prefix),
        1,
        format!("{} nodes push their payload into the switch in parallel", ingress.len()),
    );
    let mut span = SimTime::ZERO;
    for (from, chunk) in &ingress {
        span = span.max(rec.switch_ingress(*from, *chunk));
    }
    rec.end_round(span, on_ingress);

    match middle {
        Middle::Reduce(chunk) => {
            rec.begin_round(
                &format!("{}switch-reduce", prefix),
                1,
                format!(
                    "The switch folds all {} contributions in a single step",
                    ingress.len()
                ),
            );
            let sources = ingress.iter().map(|(node, _)| *node).collect();
            let span = rec.switch_reduce(sources, chunk);
            rec.end_round(span, |_| {});
        }
        Middle::Replicate => {
            rec.begin_round(
                &format!("{}switch-replicate", prefix),
                1,
                format!("The switch replicates the payload for {} destinations", egress.len()),
            );
            let destinations = egress.iter().map(|(node, _, _)| *node).collect();
            let span = rec.switch_broadcast(destinations);
            rec.end_round(span, |_| {});
        }
    }

    let description = if egress.iter().all(|(_, _, d)| *d == Delivery::Multicast) {
        format!("The switch multicasts to {} nodes at once", egress.len())
    } else {
        "The switch routes each result to the node that owns it".to_string()
    };
    rec.begin_round(&format!("{}from-switch", prefix), 1, description);
    let mut span = SimTime::ZERO;
    for (to, chunk, delivery) in &egress {
        span = span.max(rec.switch_egress(*to, *chunk, *delivery));
    }
    rec.end_round(span, on_egress);
}

fn whole_buffers(node_count: usize) -> BufferState {
    BufferState::filled(node_count, |_| vec![Chunk::new(ALL, ChunkState::Local)])
}

fn in_half(id: ChunkId, base: usize, node_count: usize) -> bool {
    matches!(id, ChunkId::Numbered(i) if (base..base + node_count).contains(&i))
}

// =============================================================================
// SINGLE SHOT
// =============================================================================

pub(super) fn all_reduce(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    rec.init(whole_buffers(n), "Every node holds its full buffer");

    let shot = Shot {
        prefix: "",
        ingress: topo.nodes().map(|node| (node, ALL)).collect(),
        middle: Middle::Reduce(ALL),
        egress: topo
            .nodes()
            .map(|node| (node, RESULT, Delivery::Multicast))
            .collect(),
    };
    run_shot(
        rec,
        shot,
        |buffers| buffers.set_all_states(ChunkState::InSwitch),
        |buffers| {
            for node in topo.nodes() {
                buffers.clear_node(node);
                buffers.upsert(node, Chunk::new(RESULT, ChunkState::Received).with_count(n));
            }
        },
    );

    rec.done("Every node holds the reduced result", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn reduce(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    let root = rec.root();
    rec.init(
        whole_buffers(n),
        format!("Every node holds its full buffer; {} receives the sum", root),
    );

    let shot = Shot {
        prefix: "",
        ingress: topo.nodes().map(|node| (node, ALL)).collect(),
        middle: Middle::Reduce(ALL),
        egress: vec![(root, RESULT, Delivery::Unicast)],
    };
    run_shot(
        rec,
        shot,
        |buffers| buffers.set_all_states(ChunkState::InSwitch),
        |buffers| {
            buffers.clear_node(root);
            buffers.upsert(root, Chunk::new(RESULT, ChunkState::Received).with_count(n));
        },
    );

    rec.done(format!("{} holds the reduced result", root), |buffers| {
        for node in topo.nodes().filter(|node| *node != root) {
            buffers.clear_node(node);
        }
        buffers.set_node_state(root, ChunkState::Final);
    });
}

pub(super) fn broadcast(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let root = rec.root();
    let mut buffers = BufferState::new(topo.node_count());
    buffers.upsert(root, Chunk::new(ALL, ChunkState::Source));
    rec.init(buffers, format!("{} holds the payload to broadcast", root));

    let receivers: Vec<NodeId> = topo.nodes().filter(|node| *node != root).collect();
    let shot = Shot {
        prefix: "",
        ingress: vec![(root, ALL)],
        middle: Middle::Replicate,
        egress: receivers
            .iter()
            .map(|node| (*node, ALL, Delivery::Multicast))
            .collect(),
    };
    run_shot(
        rec,
        shot,
        |buffers| buffers.set_node_state(root, ChunkState::InSwitch),
        |buffers| {
            for node in &receivers {
                buffers.upsert(*node, Chunk::new(ALL, ChunkState::Received));
            }
        },
    );

    rec.done("Every node holds the broadcast payload", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn all_gather(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    let buffers = BufferState::filled(n, |node| {
        vec![Chunk::new(ChunkId::Numbered(node.index()), ChunkState::Local).from_origin(node)]
    });
    rec.init(buffers, "Each node holds only its own contribution");

    let nodes: Vec<NodeId> = topo.nodes().collect();
    run_shot(
        rec,
        gather_shot("", &nodes, 0),
        |buffers| buffers.set_all_states(ChunkState::InSwitch),
        |buffers| deliver_gathered(buffers, &nodes, 0),
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

    let nodes: Vec<NodeId> = topo.nodes().collect();
    run_shot(
        rec,
        scatter_shot("", &nodes, 0),
        |buffers| buffers.set_all_states(ChunkState::InSwitch),
        |buffers| {
            for node in topo.nodes() {
                buffers.clear_node(node);
                buffers.upsert(node, owned_result(node, 0, n));
            }
        },
    );

    rec.done("Each node holds its owned chunk, fully reduced", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

/// Every node sends its contribution `base + node`; the switch replicates
/// it to everyone.
fn gather_shot(prefix: &'static str, nodes: &[NodeId], base: usize) -> Shot {
    Shot {
        prefix,
        ingress: nodes
            .iter()
            .map(|node| (*node, ChunkId::Numbered(base + node.index())))
            .collect(),
        middle: Middle::Replicate,
        egress: nodes
            .iter()
            .map(|node| (*node, ALL, Delivery::Multicast))
            .collect(),
    }
}

/// Every node sends its whole buffer; the switch reduces and routes chunk
/// `base + d` to node `d`.
fn scatter_shot(prefix: &'static str, nodes: &[NodeId], base: usize) -> Shot {
    Shot {
        prefix,
        ingress: nodes.iter().map(|node| (*node, ALL)).collect(),
        middle: Middle::Reduce(ALL),
        egress: nodes
            .iter()
            .map(|node| (*node, ChunkId::Numbered(base + node.index()), Delivery::Unicast))
            .collect(),
    }
}

fn owned_result(node: NodeId, base: usize, node_count: usize) -> Chunk {
    Chunk::local(base + node.index())
        .with_state(ChunkState::Received)
        .with_count(node_count)
}

/// Hand every node the contributions `base + s` of every other node `s`.
fn deliver_gathered(buffers: &mut BufferState, nodes: &[NodeId], base: usize) {
    for destination in nodes {
        for source in nodes.iter().filter(|source| *source != destination) {
            buffers.upsert(
                *destination,
                Chunk::new(ChunkId::Numbered(base + source.index()), ChunkState::Received)
                    .from_origin(*source),
            );
        }
    }
}

// =============================================================================
// TWO PHASE
// =============================================================================

pub(super) fn all_reduce_two_phase(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    let nodes: Vec<NodeId> = topo.nodes().collect();
    let buffers = BufferState::filled(n, |_| topo.nodes().map(|slice| Chunk::local(slice.index())).collect());
    rec.init(buffers, format!("Each of the {} nodes splits its buffer into {} chunks", n, n));

    run_shot(
        rec,
        scatter_shot("reduce-scatter/", &nodes, 0),
        |buffers| buffers.set_all_states(ChunkState::InSwitch),
        |buffers| {
            for node in topo.nodes() {
                buffers.clear_node(node);
                buffers.upsert(node, owned_result(node, 0, n));
            }
        },
    );

    run_shot(
        rec,
        gather_shot("all-gather/", &nodes, 0),
        |buffers| buffers.set_all_states(ChunkState::InSwitch),
        |buffers| {
            for node in topo.nodes() {
                for slice in topo.nodes() {
                    buffers.upsert(node, owned_result(slice, 0, n));
                }
            }
        },
    );

    rec.done("Every node holds every fully reduced chunk", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn reduce_scatter_two_phase(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    let nodes: Vec<NodeId> = topo.nodes().collect();
    let buffers = BufferState::filled(n, |_| (0..2 * n).map(Chunk::local).collect());
    rec.init(
        buffers,
        format!("Each node splits its buffer into two halves of {} chunks", n),
    );

    for (prefix, base) in [("first-half/", 0), ("second-half/", n)] {
        run_shot(
            rec,
            scatter_shot(prefix, &nodes, base),
            |buffers| {
                for node in topo.nodes() {
                    for slice in base..base + n {
                        if let Some(chunk) = buffers.chunk_mut(node, ChunkId::Numbered(slice)) {
                            chunk.state = ChunkState::InSwitch;
                        }
                    }
                }
            },
            |buffers| {
                for node in topo.nodes() {
                    buffers.retain(node, |c| !in_half(c.id, base, n));
                    buffers.upsert(node, owned_result(node, base, n));
                }
            },
        );
    }

    rec.done("Each node holds both halves of its owned chunk, fully reduced", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

pub(super) fn all_gather_two_phase(rec: &mut Recorder<'_>) {
    let topo = rec.topology();
    let n = topo.node_count();
    let nodes: Vec<NodeId> = topo.nodes().collect();
    let buffers = BufferState::filled(n, |node| {
        [0, n]
            .into_iter()
            .map(|base| Chunk::local(base + node.index()).from_origin(node))
            .collect()
    });
    rec.init(buffers, "Each node holds its own contribution, split in two halves");

    for (prefix, base) in [("first-half/", 0), ("second-half/", n)] {
        run_shot(
            rec,
            gather_shot(prefix, &nodes, base),
            |buffers| {
                for node in topo.nodes() {
                    if let Some(chunk) = buffers.chunk_mut(node, ChunkId::Numbered(base + node.index())) {
                        chunk.state = ChunkState::InSwitch;
                    }
                }
            },
            |buffers| deliver_gathered(buffers, &nodes, base),
        );
    }

    rec.done("Every node holds every node's contribution", |buffers| {
        buffers.set_all_states(ChunkState::Final);
    });
}

// =============================================================================
// TESTS
// =============================================================================
