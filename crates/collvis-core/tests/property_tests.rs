//! # Property-Based Tests
//!
//! Determinism and playback-query invariants over arbitrary scenarios,
//! timing parameters and query times.

use collvis_core::primitives::PROGRESS_SCALE;
use collvis_core::{
    Permille, Scenario, SimTime, Timeline, TimingConfig, build_timeline, timeline_checksum,
    timeline_from_bytes, timeline_to_bytes,
};
use proptest::prelude::*;

fn any_scenario() -> impl Strategy<Value = Scenario> {
    let all = Scenario::all();
    (0..all.len()).prop_map(move |i| all[i])
}

fn any_config() -> impl Strategy<Value = TimingConfig> {
    (
        2u64..5000,
        1u64..2000,
        1001u16..4000,
        1u64..3000,
        1u64..1000,
        1u16..=1000,
        1u16..=1000,
        1u16..=1000,
        0usize..32,
    )
        .prop_map(
            |(transfer, compute, multiplier, link, reduce, gather, broadcast, congestion, root)| {
                TimingConfig {
                    transfer_time: SimTime::new(transfer),
                    compute_time: SimTime::new(compute),
                    inter_domain_multiplier: Permille::new(multiplier),
                    switch_link_time: SimTime::new(link),
                    switch_reduce_time: SimTime::new(reduce),
                    root_gather_dampening: Permille::new(gather),
                    root_broadcast_dampening: Permille::new(broadcast),
                    congestion_dampening: Permille::new(congestion),
                    root,
                }
            },
        )
}

fn build(scenario: Scenario, config: &TimingConfig) -> Timeline {
    build_timeline(&scenario, config)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Same triple and config produce byte-identical timelines.
    #[test]
    fn determinism_identical_input_produces_identical_output(
        scenario in any_scenario(),
        config in any_config(),
    ) {
        prop_assert!(config.validate().is_ok());
        let first = build(scenario, &config);
        let second = build(scenario, &config);
        prop_assert_eq!(
            timeline_checksum(&first).expect("checksum"),
            timeline_checksum(&second).expect("checksum")
        );
        prop_assert_eq!(first, second);
    }

    /// Every valid config yields a positive duration and non-empty events.
    #[test]
    fn any_valid_config_builds(scenario in any_scenario(), config in any_config()) {
        let timeline = build(scenario, &config);
        prop_assert!(timeline.duration > SimTime::ZERO);
        prop_assert!(!timeline.events.is_empty());
        prop_assert!(timeline.events.iter().all(|e| e.duration() > SimTime::ZERO));
        prop_assert!(timeline.events.windows(2).all(|w| w[0].start() <= w[1].start()));
    }

    /// Snapshot and step queries return the latest item not after `t`.
    #[test]
    fn queries_are_latest_not_after(scenario in any_scenario(), raw in 0u64..200_000) {
        let timeline = build(scenario, &TimingConfig::default());
        let t = SimTime::new(raw % (timeline.duration.ticks() + 1));

        let snapshot = timeline.snapshot_at(t).expect("init snapshot at zero");
        prop_assert!(snapshot.time <= t);
        prop_assert!(timeline.snapshots.iter().all(|s| s.time <= snapshot.time || s.time > t));

        let step = timeline.step_at(t).expect("init step at zero");
        prop_assert!(step.time <= t);
        prop_assert!(timeline.steps.iter().all(|s| s.time <= step.time || s.time > t));

        for event in timeline.active_events_at(t) {
            prop_assert!(event.start() <= t && t < event.end());
        }
    }

    /// Past the end, playback shows the converged state.
    #[test]
    fn queries_past_end_return_terminal(scenario in any_scenario(), extra in 0u64..10_000) {
        let timeline = build(scenario, &TimingConfig::default());
        let after = timeline.duration.plus(SimTime::new(extra));
        prop_assert_eq!(timeline.snapshot_at(after), timeline.terminal_snapshot());
    }

    /// Progress maps monotonically onto `[0, duration]`.
    #[test]
    fn progress_is_monotonic(scenario in any_scenario(), a in 0u64..2_000_000, b in 0u64..2_000_000) {
        let timeline = build(scenario, &TimingConfig::default());
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(timeline.time_at_progress(lo) <= timeline.time_at_progress(hi));
        prop_assert!(timeline.time_at_progress(hi) <= timeline.duration);
        prop_assert_eq!(timeline.time_at_progress(PROGRESS_SCALE), timeline.duration);
    }

    /// Utilization windows tile the timeline and stay within 0..=1000.
    #[test]
    fn utilization_windows_bounded(scenario in any_scenario(), windows in 1usize..200) {
        let timeline = build(scenario, &TimingConfig::default());
        let buckets = timeline.utilization(windows);
        prop_assert_eq!(buckets.len(), windows);
        prop_assert_eq!(buckets.first().map(|w| w.start), Some(SimTime::ZERO));
        prop_assert_eq!(buckets.last().map(|w| w.end), Some(timeline.duration));
        prop_assert!(buckets.iter().all(|w| w.utilization <= Permille::ONE));
    }

    /// Binary encoding is lossless for every scenario.
    #[test]
    fn binary_encoding_lossless(scenario in any_scenario()) {
        let timeline = build(scenario, &TimingConfig::default());
        let bytes = timeline_to_bytes(&timeline).expect("encode");
        let restored = timeline_from_bytes(&bytes).expect("decode");
        prop_assert_eq!(restored, timeline);
    }
}
