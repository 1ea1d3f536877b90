//! # Timeline Benchmarks
//!
//! Performance benchmarks for collvis-core timeline building and playback.
//!
//! Run with: `cargo bench -p collvis-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use collvis_core::{
    Operation, Scenario, SimTime, Strategy, TimingConfig, TopologyKind, build_timeline,
    timeline_to_bytes,
};
use std::hint::black_box;

fn scenario(op: Operation, strategy: Strategy, topology: TopologyKind) -> Scenario {
    Scenario::new(op, strategy, topology).expect("compatible scenario")
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_build_by_strategy(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_allreduce");
    let config = TimingConfig::default();

    for strategy in Strategy::ALL {
        for topology in [TopologyKind::SingleDomain8, TopologyKind::DualDomain16] {
            let scenario = scenario(Operation::AllReduce, strategy, topology);
            group.bench_with_input(
                BenchmarkId::new(strategy.name(), topology.name()),
                &scenario,
                |b, scenario| {
                    b.iter(|| black_box(build_timeline(scenario, &config)));
                },
            );
        }
    }

    group.finish();
}

fn bench_build_all(c: &mut Criterion) {
    let config = TimingConfig::default();
    let scenarios = Scenario::all();

    c.bench_function("build_every_scenario", |b| {
        b.iter(|| {
            for scenario in &scenarios {
                black_box(build_timeline(scenario, &config));
            }
        });
    });
}

fn bench_playback_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback");
    let timeline = build_timeline(
        &scenario(Operation::AllToAll, Strategy::Centralized, TopologyKind::DualDomain16),
        &TimingConfig::default(),
    );
    let middle = SimTime::new(timeline.duration.ticks() / 2);

    group.bench_function("snapshot_at", |b| {
        b.iter(|| black_box(timeline.snapshot_at(black_box(middle))));
    });
    group.bench_function("active_events_at", |b| {
        b.iter(|| black_box(timeline.active_events_at(black_box(middle))));
    });

    for windows in [50, 500] {
        group.bench_with_input(BenchmarkId::new("utilization", windows), &windows, |b, &windows| {
            b.iter(|| black_box(timeline.utilization(windows)));
        });
    }

    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let timeline = build_timeline(
        &scenario(Operation::AllReduce, Strategy::BidirectionalRing, TopologyKind::DualDomain16),
        &TimingConfig::default(),
    );

    c.bench_function("timeline_to_bytes", |b| {
        b.iter(|| black_box(timeline_to_bytes(&timeline)));
    });
}

criterion_group!(
    benches,
    bench_build_by_strategy,
    bench_build_all,
    bench_playback_queries,
    bench_encode,
);
criterion_main!(benches);
