//! # Bandwidth Sampler
//!
//! Link utilization intervals recorded while a timeline is built, and the
//! windowed aggregation the playback layer draws as a utilization graph.
//!
//! Besides one sample per transfer-class event the builder adds synthetic
//! samples (root bottleneck, dense congestion) so the graph shows load that
//! literal per-link occupancy would hide.

use crate::types::{NodeId, Permille, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The link or link group a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkId {
    /// A point-to-point link between two nodes.
    Direct { from: NodeId, to: NodeId },
    /// Node to switch.
    Uplink(NodeId),
    /// Switch to node.
    Downlink(NodeId),
    /// The fabric as a whole (congestion samples).
    Fabric,
}

/// One utilization interval `[time, end_time)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthSample {
    pub time: SimTime,
    pub end_time: SimTime,
    pub link: LinkId,
    pub utilization: Permille,
    pub bottleneck: bool,
}

/// Collects samples in recording order.
#[derive(Debug, Clone, Default)]
pub struct BandwidthSampler {
    samples: Vec<BandwidthSample>,
}

impl BandwidthSampler {
    /// Create an empty sampler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record utilization of `link` over `[start, start + duration)`.
    ///
    /// Utilization is capped at 1.0 and empty intervals are ignored.
    pub fn record(
        &mut self,
        link: LinkId,
        start: SimTime,
        duration: SimTime,
        utilization: Permille,
        bottleneck: bool,
    ) {
        if duration == SimTime::ZERO {
            return;
        }
        self.samples.push(BandwidthSample {
            time: start,
            end_time: start.plus(duration),
            link,
            utilization: utilization.capped(),
            bottleneck,
        });
    }

    /// Number of samples recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Hand over the recorded samples.
    #[must_use]
    pub fn into_samples(self) -> Vec<BandwidthSample> {
        self.samples
    }
}

// =============================================================================
// AGGREGATION
// =============================================================================

/// Aggregate utilization over one fixed-width window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationWindow {
    pub start: SimTime,
    pub end: SimTime,
    pub utilization: Permille,
    pub bottleneck: bool,
}

/// Bucket `[0, duration)` into `window_count` windows. Each window sums the
/// utilization of every overlapping sample, then divides once by
/// `link_count`, capped at 1.0.
///
/// `link_count` is the number of distinct links that appear in `samples`.
#[must_use]
pub fn utilization_windows(
    samples: &[BandwidthSample],
    duration: SimTime,
    window_count: usize,
) -> Vec<UtilizationWindow> {
    if window_count == 0 || duration == SimTime::ZERO {
        return Vec::new();
    }

    let link_count = samples
        .iter()
        .map(|s| s.link)
        .collect::<BTreeSet<_>>()
        .len()
        .max(1) as u64;

    let total = duration.ticks();
    let buckets = window_count as u64;

    (0..buckets)
        .map(|i| {
            let start = SimTime::new(total.saturating_mul(i) / buckets);
            let end = SimTime::new(total.saturating_mul(i + 1) / buckets);
            let overlapping: Vec<&BandwidthSample> = samples
                .iter()
                .filter(|s| s.time < end.max(start.plus(SimTime::new(1))) && s.end_time > start)
                .collect();
            let busy: u64 = overlapping
                .iter()
                .map(|s| u64::from(s.utilization.value()))
                .sum();
            UtilizationWindow {
                start,
                end,
                utilization: Permille::new((busy / link_count).min(1000) as u16),
                bottleneck: overlapping.iter().any(|s| s.bottleneck),
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn link(from: usize, to: usize) -> LinkId {
        LinkId::Direct {
            from: NodeId(from),
            to: NodeId(to),
        }
    }

    #[test]
    fn record_caps_and_skips_empty() {
        let mut sampler = BandwidthSampler::new();
        sampler.record(link(0, 1), SimTime::ZERO, SimTime::new(10), Permille::new(1800), false);
        sampler.record(link(0, 1), SimTime::ZERO, SimTime::ZERO, Permille::ONE, false);

        assert_eq!(sampler.len(), 1);
        let samples = sampler.into_samples();
        assert_eq!(samples[0].utilization, Permille::ONE);
        assert_eq!(samples[0].end_time, SimTime::new(10));
    }

    #[test]
    fn windows_split_by_link_count() {
        let mut sampler = BandwidthSampler::new();
        // Two links, each busy for the first half only
        sampler.record(link(0, 1), SimTime::ZERO, SimTime::new(50), Permille::ONE, false);
        sampler.record(link(1, 0), SimTime::ZERO, SimTime::new(50), Permille::ONE, false);
        let samples = sampler.into_samples();

        let windows = utilization_windows(&samples, SimTime::new(100), 2);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].utilization, Permille::ONE);
        assert_eq!(windows[1].utilization, Permille::ZERO);
        assert_eq!(windows[1].end, SimTime::new(100));
    }

    #[test]
    fn windows_divide_after_summing() {
        let mut sampler = BandwidthSampler::new();
        for to in 1..4 {
            sampler.record(link(0, to), SimTime::ZERO, SimTime::new(10), Permille::ONE, false);
        }
        let windows = utilization_windows(&sampler.into_samples(), SimTime::new(10), 1);
        assert_eq!(windows[0].utilization, Permille::ONE);

        // 16 of 32 links busy is exactly half
        let mut sampler = BandwidthSampler::new();
        for node in 0..32 {
            let end = if node < 16 { 10 } else { 20 };
            sampler.record(
                LinkId::Uplink(NodeId(node)),
                SimTime::new(end - 10),
                SimTime::new(10),
                Permille::ONE,
                false,
            );
        }
        let windows = utilization_windows(&sampler.into_samples(), SimTime::new(20), 2);
        assert_eq!(windows[0].utilization, Permille::new(500));
        assert_eq!(windows[1].utilization, Permille::new(500));
    }

    #[test]
    fn windows_are_capped() {
        let mut sampler = BandwidthSampler::new();
        for _ in 0..5 {
            sampler.record(link(0, 1), SimTime::ZERO, SimTime::new(10), Permille::ONE, true);
        }
        let windows = utilization_windows(&sampler.into_samples(), SimTime::new(10), 1);
        assert_eq!(windows[0].utilization, Permille::ONE);
        assert!(windows[0].bottleneck);
    }

    #[test]
    fn no_windows_for_empty_request() {
        assert!(utilization_windows(&[], SimTime::new(10), 0).is_empty());
        assert!(utilization_windows(&[], SimTime::ZERO, 4).is_empty());
    }
}
