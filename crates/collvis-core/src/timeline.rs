//! # Timeline
//!
//! The immutable output of one builder run and the read-only queries the
//! playback layer issues against it.
//!
//! All point queries use "latest not-after" semantics: the answer for time
//! `t` is the last item whose time is `<= t`. Nothing is interpolated.

use crate::bandwidth::{BandwidthSample, UtilizationWindow, utilization_windows};
use crate::buffer::BufferSnapshot;
use crate::compatibility::Scenario;
use crate::event::{Event, EventKind};
use crate::primitives::PROGRESS_SCALE;
use crate::types::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// STEP
// =============================================================================

/// Position of a step in the builder's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// Initial buffers, before anything moves.
    Init,
    /// One timed round; `index` counts from 1 within its phase.
    Round { index: usize },
    /// Converged buffers.
    Done,
}

/// A narrative checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub time: SimTime,
    pub kind: StepKind,
    /// Short phase label, e.g. `reduce-scatter`.
    pub phase: String,
    pub description: String,
}

impl Step {
    /// Whether this step opens a timed round.
    #[must_use]
    pub fn is_round(&self) -> bool {
        matches!(self.kind, StepKind::Round { .. })
    }
}

// =============================================================================
// TIMELINE
// =============================================================================

/// Everything the renderer needs to animate one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub scenario: Scenario,
    pub duration: SimTime,
    pub node_count: usize,
    pub events: Vec<Event>,
    pub steps: Vec<Step>,
    pub snapshots: Vec<BufferSnapshot>,
    pub bandwidth_samples: Vec<BandwidthSample>,
}

impl Timeline {
    /// Latest snapshot taken at or before `time`.
    #[must_use]
    pub fn snapshot_at(&self, time: SimTime) -> Option<&BufferSnapshot> {
        latest_not_after(&self.snapshots, time, |s| s.time)
    }

    /// Latest step at or before `time`.
    #[must_use]
    pub fn step_at(&self, time: SimTime) -> Option<&Step> {
        latest_not_after(&self.steps, time, |s| s.time)
    }

    /// Latest event started at or before `time`.
    #[must_use]
    pub fn latest_event_at(&self, time: SimTime) -> Option<&Event> {
        latest_not_after(&self.events, time, Event::start)
    }

    /// Events in progress at `time`.
    #[must_use]
    pub fn active_events_at(&self, time: SimTime) -> Vec<&Event> {
        self.events
            .iter()
            .take_while(|e| e.start() <= time)
            .filter(|e| e.is_active_at(time))
            .collect()
    }

    /// Absolute time for a playback progress in parts per million.
    #[must_use]
    pub fn time_at_progress(&self, progress_ppm: u64) -> SimTime {
        let ppm = progress_ppm.min(PROGRESS_SCALE);
        let ticks = (self.duration.ticks() as u128 * ppm as u128) / PROGRESS_SCALE as u128;
        SimTime::new(ticks as u64)
    }

    /// The converged buffers.
    #[must_use]
    pub fn terminal_snapshot(&self) -> Option<&BufferSnapshot> {
        self.snapshots.last()
    }

    /// Number of timed rounds across all phases.
    #[must_use]
    pub fn round_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_round()).count()
    }

    /// Timed rounds per phase label, in first-seen order.
    #[must_use]
    pub fn phase_round_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for step in self.steps.iter().filter(|s| s.is_round()) {
            match counts.last_mut() {
                Some((phase, count)) if *phase == step.phase => *count += 1,
                _ => counts.push((step.phase.clone(), 1)),
            }
        }
        counts
    }

    /// Event count per variant.
    #[must_use]
    pub fn event_counts(&self) -> BTreeMap<EventKind, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Events of one variant that start exactly at `time`.
    #[must_use]
    pub fn events_starting_at(&self, kind: EventKind, time: SimTime) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.kind() == kind && e.start() == time)
            .collect()
    }

    /// Aggregate link utilization over `window_count` windows.
    #[must_use]
    pub fn utilization(&self, window_count: usize) -> Vec<UtilizationWindow> {
        utilization_windows(&self.bandwidth_samples, self.duration, window_count)
    }
}

/// Last item in a time-sorted slice whose time is `<= time`.
fn latest_not_after<T>(items: &[T], time: SimTime, time_of: impl Fn(&T) -> SimTime) -> Option<&T> {
    let idx = items.partition_point(|item| time_of(item) <= time);
    idx.checked_sub(1).and_then(|i| items.get(i))
}

// =============================================================================
// TESTS
// =============================================================================
