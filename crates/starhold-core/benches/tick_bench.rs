//! Criterion benchmarks for the Starhold tick pipeline.
//!
//! - `small_universe`: 100 planets, 200 ships in flight
//! - `large_universe`: 2000 planets, 5000 ships in flight
//! - `snapshot`: capture and encode a snapshot of the large universe

use criterion::{Criterion, criterion_group, criterion_main};
use starhold_core::snapshot::encode_snapshot;
use starhold_core::test_utils::busy_universe;

fn bench_small_universe(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_universe");
    group.sample_size(50);

    let mut universe = busy_universe(100, 200);
    let mut now = 0u64;

    group.bench_function("100_planets_200_ships", |b| {
        b.iter(|| {
            now += 1_000;
            universe.step(now);
        });
    });

    group.finish();
}

fn bench_large_universe(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_universe");
    group.sample_size(20);

    let mut universe = busy_universe(2_000, 5_000);
    let mut now = 0u64;

    group.bench_function("2000_planets_5000_ships", |b| {
        b.iter(|| {
            now += 1_000;
            universe.step(now);
        });
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    group.sample_size(20);

    let mut universe = busy_universe(2_000, 5_000);
    universe.step(1_000);

    group.bench_function("capture_2000_planets", |b| {
        b.iter(|| universe.snapshot(1_000));
    });

    let snapshot = universe.snapshot(1_000);
    group.bench_function("encode_2000_planets", |b| {
        b.iter(|| encode_snapshot(&snapshot).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_small_universe, bench_large_universe, bench_snapshot);
criterion_main!(benches);
