//! # Timeline Builder
//!
//! Turns a validated [`Scenario`] into a complete [`Timeline`].
//!
//! Every (operation, strategy) pair maps to one plan function through
//! [`plan_for`]. Plans share a [`Recorder`] that owns the time cursor, the
//! buffers and everything emitted so far, and enforces the per-round order:
//!
//! 1. `begin_round` appends the narrative step at the current cursor
//! 2. events are emitted anchored at the cursor
//! 3. `end_round` advances the cursor by the round's span, applies the buffer
//!    mutation and snapshots the result
//!
//! The builder is total: it cannot fail for any scenario the compatibility
//! table admits, and it never performs I/O.

mod centralized;
mod ring;
mod switch;

use crate::bandwidth::{BandwidthSampler, LinkId};
use crate::buffer::{BufferSnapshot, BufferState, ChunkId};
use crate::compatibility::Scenario;
use crate::config::TimingConfig;
use crate::event::{Delivery, Direction, Event};
use crate::timeline::{Step, StepKind, Timeline};
use crate::topology::Topology;
use crate::types::{NodeId, Operation, Permille, SimTime, Strategy};

/// A plan emits one scenario's whole state machine into a recorder.
type Plan = fn(&mut Recorder<'_>);

/// Build the timeline for a scenario.
#[must_use]
pub fn build_timeline(scenario: &Scenario, config: &TimingConfig) -> Timeline {
    let topology = Topology::new(scenario.topology());
    let mut recorder = Recorder::new(topology, config);

    // A no-op for validated scenarios. An unchecked triple runs the default
    // strategy, and the timeline names that strategy.
    let scenario = Scenario::resolve(scenario.operation(), scenario.strategy(), scenario.topology())
        .scenario;
    if let Some(plan) = plan_for(scenario.operation(), scenario.strategy()) {
        plan(&mut recorder);
    }

    recorder.finish(scenario)
}

/// Build with the default timing parameters.
#[must_use]
pub fn build_default(scenario: &Scenario) -> Timeline {
    build_timeline(scenario, &TimingConfig::default())
}

/// The dispatch table. `None` exactly where the compatibility table says no.
#[must_use]
fn plan_for(operation: Operation, strategy: Strategy) -> Option<Plan> {
    use Operation::{AllGather, AllReduce, AllToAll, Broadcast, Reduce, ReduceScatter};
    use Strategy::{BidirectionalRing, Centralized, Ring, SwitchSingleShot, SwitchTwoPhase};

    let plan: Plan = match (operation, strategy) {
        (AllReduce, Centralized) => centralized::all_reduce,
        (Reduce, Centralized) => centralized::reduce,
        (Broadcast, Centralized) => centralized::broadcast,
        (AllGather, Centralized) => centralized::all_gather,
        (ReduceScatter, Centralized) => centralized::reduce_scatter,
        (AllToAll, Centralized) => centralized::all_to_all,

        (AllReduce, Ring) => ring::all_reduce,
        (Reduce, Ring) => ring::reduce,
        (Broadcast, Ring) => ring::broadcast,
        (AllGather, Ring) => ring::all_gather,
        (ReduceScatter, Ring) => ring::reduce_scatter,
        (AllToAll, Ring) => ring::all_to_all,

        (AllReduce, BidirectionalRing) => ring::all_reduce_bidirectional,
        (Reduce, BidirectionalRing) => ring::reduce_bidirectional,
        (Broadcast, BidirectionalRing) => ring::broadcast_bidirectional,
        (AllGather, BidirectionalRing) => ring::all_gather_bidirectional,
        (ReduceScatter, BidirectionalRing) => ring::reduce_scatter_bidirectional,
        (AllToAll, BidirectionalRing) => ring::all_to_all_bidirectional,

        (AllReduce, SwitchSingleShot) => switch::all_reduce,
        (Reduce, SwitchSingleShot) => switch::reduce,
        (Broadcast, SwitchSingleShot) => switch::broadcast,
        (AllGather, SwitchSingleShot) => switch::all_gather,
        (ReduceScatter, SwitchSingleShot) => switch::reduce_scatter,

        (AllReduce, SwitchTwoPhase) => switch::all_reduce_two_phase,
        (AllGather, SwitchTwoPhase) => switch::all_gather_two_phase,
        (ReduceScatter, SwitchTwoPhase) => switch::reduce_scatter_two_phase,

        (AllToAll, SwitchSingleShot | SwitchTwoPhase) | (Reduce | Broadcast, SwitchTwoPhase) => {
            return None;
        }
    };
    Some(plan)
}

// =============================================================================
// RECORDER
// =============================================================================

/// Mutable state of one builder run. Owned exclusively by that run.
pub(crate) struct Recorder<'a> {
    topology: Topology,
    config: &'a TimingConfig,
    cursor: SimTime,
    events: Vec<Event>,
    steps: Vec<Step>,
    snapshots: Vec<BufferSnapshot>,
    sampler: BandwidthSampler,
    buffers: BufferState,
}

impl<'a> Recorder<'a> {
    fn new(topology: Topology, config: &'a TimingConfig) -> Self {
        Self {
            topology,
            config,
            cursor: SimTime::ZERO,
            events: Vec::new(),
            steps: Vec::new(),
            snapshots: Vec::new(),
            sampler: BandwidthSampler::new(),
            buffers: BufferState::new(topology.node_count()),
        }
    }

    pub(crate) fn topology(&self) -> Topology {
        self.topology
    }

    pub(crate) fn config(&self) -> &TimingConfig {
        self.config
    }

    pub(crate) fn node_count(&self) -> usize {
        self.topology.node_count()
    }

    /// Root node for rooted operations, clamped into the topology.
    pub(crate) fn root(&self) -> NodeId {
        NodeId(self.config.root % self.node_count())
    }

    pub(crate) fn buffers(&self) -> &BufferState {
        &self.buffers
    }

    // -------------------------------------------------------------------------
    // Steps and snapshots
    // -------------------------------------------------------------------------

    /// Install the initial buffers and record the INIT checkpoint.
    pub(crate) fn init(&mut self, buffers: BufferState, description: impl Into<String>) {
        self.buffers = buffers;
        self.push_step(StepKind::Init, "init", description.into());
        self.snapshot();
    }

    /// Open a timed round at the current cursor.
    pub(crate) fn begin_round(&mut self, phase: &str, index: usize, description: impl Into<String>) {
        self.push_step(StepKind::Round { index }, phase, description.into());
    }

    /// Close a round: advance by `span`, mutate the buffers, snapshot.
    pub(crate) fn end_round(&mut self, span: SimTime, mutate: impl FnOnce(&mut BufferState)) {
        // A round always takes time, even if nothing moved.
        let span = if span == SimTime::ZERO {
            self.config.transfer_time
        } else {
            span
        };
        self.cursor = self.cursor.plus(span);
        mutate(&mut self.buffers);
        self.snapshot();
    }

    /// Apply the terminal mutation and record the DONE checkpoint.
    pub(crate) fn done(&mut self, description: impl Into<String>, mutate: impl FnOnce(&mut BufferState)) {
        mutate(&mut self.buffers);
        self.push_step(StepKind::Done, "done", description.into());
        self.snapshot();
    }

    fn push_step(&mut self, kind: StepKind, phase: &str, description: String) {
        self.steps.push(Step {
            time: self.cursor,
            kind,
            phase: phase.to_string(),
            description,
        });
    }

    fn snapshot(&mut self) {
        self.snapshots.push(self.buffers.snapshot(self.cursor));
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Full-payload transfer time between two nodes.
    pub(crate) fn link_time(&self, from: NodeId, to: NodeId) -> SimTime {
        self.topology.link_time(from, to, self.config)
    }

    /// A node-to-node transfer starting at the cursor. Returns its duration.
    pub(crate) fn transfer(
        &mut self,
        from: NodeId,
        to: NodeId,
        chunk: ChunkId,
        direction: Direction,
        duration: SimTime,
    ) -> SimTime {
        let start = self.cursor;
        self.events.push(Event::Transfer {
            from,
            to,
            chunk,
            start,
            duration,
            direction,
        });
        if matches!(direction, Direction::Clockwise | Direction::CounterClockwise) {
            self.events.push(Event::LinkActive {
                from,
                to,
                start,
                duration,
                direction,
            });
        }
        self.sampler.record(
            LinkId::Direct { from, to },
            start,
            duration,
            Permille::ONE,
            false,
        );
        duration
    }

    /// A compute step on `node`, `offset` after the cursor. Returns its duration.
    pub(crate) fn compute(&mut self, node: NodeId, label: &str, offset: SimTime) -> SimTime {
        let duration = self.config.compute_time;
        self.events.push(Event::Compute {
            node,
            label: label.to_string(),
            start: self.cursor.plus(offset),
            duration,
        });
        duration
    }

    /// Node to switch, starting at the cursor.
    pub(crate) fn switch_ingress(&mut self, from: NodeId, chunk: ChunkId) -> SimTime {
        let duration = self.config.switch_link_time;
        let start = self.cursor;
        self.events.push(Event::SwitchIngress {
            from,
            chunk,
            start,
            duration,
        });
        self.sampler
            .record(LinkId::Uplink(from), start, duration, Permille::ONE, false);
        duration
    }

    /// Switch to node, starting at the cursor.
    pub(crate) fn switch_egress(&mut self, to: NodeId, chunk: ChunkId, delivery: Delivery) -> SimTime {
        let duration = self.config.switch_link_time;
        let start = self.cursor;
        self.events.push(Event::SwitchEgress {
            to,
            chunk,
            start,
            duration,
            delivery,
        });
        self.sampler
            .record(LinkId::Downlink(to), start, duration, Permille::ONE, false);
        duration
    }

    /// In-switch reduction, starting at the cursor.
    pub(crate) fn switch_reduce(&mut self, sources: Vec<NodeId>, chunk: ChunkId) -> SimTime {
        let duration = self.config.switch_reduce_time;
        self.events.push(Event::SwitchReduce {
            sources,
            chunk,
            start: self.cursor,
            duration,
        });
        duration
    }

    /// In-switch replication pass-through, starting at the cursor.
    pub(crate) fn switch_broadcast(&mut self, destinations: Vec<NodeId>) -> SimTime {
        let duration = self.config.switch_reduce_time;
        self.events.push(Event::SwitchBroadcast {
            destinations,
            start: self.cursor,
            duration,
        });
        duration
    }

    /// A synthetic saturation sample over `[cursor, cursor + span)`.
    pub(crate) fn saturate(&mut self, link: LinkId, span: SimTime, bottleneck: bool) {
        self.sampler
            .record(link, self.cursor, span, Permille::ONE, bottleneck);
    }

    fn finish(self, scenario: Scenario) -> Timeline {
        Timeline {
            scenario,
            duration: self.cursor,
            node_count: self.topology.node_count(),
            events: self.events,
            steps: self.steps,
            snapshots: self.snapshots,
            bandwidth_samples: self.sampler.into_samples(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::is_compatible;
    use crate::types::TopologyKind;

    #[test]
    fn dispatch_table_matches_compatibility_table() {
        for op in Operation::ALL {
            for strategy in Strategy::ALL {
                assert_eq!(
                    plan_for(op, strategy).is_some(),
                    is_compatible(op, strategy),
                    "{} / {}",
                    op,
                    strategy
                );
            }
        }
    }

    #[test]
    fn recorder_round_ordering() {
        let config = TimingConfig::default();
        let mut rec = Recorder::new(Topology::new(TopologyKind::SmallDemo4), &config);
        rec.init(BufferState::new(4), "start");
        rec.begin_round("phase", 1, "round");
        let span = rec.transfer(
            NodeId(0),
            NodeId(1),
            ChunkId::Numbered(0),
            Direction::Clockwise,
            SimTime::new(10),
        );
        rec.end_round(span, |_| {});
        rec.done("end", |_| {});

        let scenario = Scenario::resolve(
            Operation::AllReduce,
            Strategy::Ring,
            TopologyKind::SmallDemo4,
        )
        .scenario;
        let timeline = rec.finish(scenario);

        assert_eq!(timeline.duration, SimTime::new(10));
        assert_eq!(timeline.steps.len(), 3);
        assert_eq!(timeline.steps[1].time, SimTime::ZERO);
        assert_eq!(timeline.snapshots.len(), 3);
        assert_eq!(timeline.snapshots[1].time, SimTime::new(10));
        // Transfer + LinkActive marker
        assert_eq!(timeline.events.len(), 2);
        assert_eq!(timeline.bandwidth_samples.len(), 1);
    }

    #[test]
    fn empty_round_still_takes_time() {
        let config = TimingConfig::default();
        let mut rec = Recorder::new(Topology::new(TopologyKind::SmallDemo4), &config);
        rec.init(BufferState::new(4), "start");
        rec.begin_round("idle", 1, "nothing moves");
        rec.end_round(SimTime::ZERO, |_| {});
        assert_eq!(rec.cursor, config.transfer_time);
    }

    #[test]
    fn root_is_clamped_into_topology() {
        let config = TimingConfig {
            root: 9,
            ..TimingConfig::default()
        };
        let rec = Recorder::new(Topology::new(TopologyKind::SmallDemo4), &config);
        assert_eq!(rec.root(), NodeId(1));
    }
}
