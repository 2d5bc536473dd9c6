//! Benchmarks for the point pipeline: smoothing, segmentation and compression.
//!
//! Run with: `cargo bench --features synthetic --bench compression`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tracktotrip::compression::{drp, spt, td_sp, td_tr};
use tracktotrip::synthetic::{Leg, PathPattern, SyntheticScenario};
use tracktotrip::{Point, SmoothStrategy, TripConfig, segment_points, smooth};

// ============================================================================
// Inputs
// ============================================================================

/// A single straight-ish drive of `km` kilometers at 40 km/h, 5 s sampling.
fn drive(km: f64, seed: u64) -> Vec<Point> {
    SyntheticScenario {
        legs: vec![Leg::Move {
            length_meters: km * 1000.0,
            speed_kmh: 40.0,
            pattern: PathPattern::Winding,
        }],
        seed,
        ..SyntheticScenario::default()
    }
    .generate()
    .points
}

fn commute_points() -> Vec<Point> {
    SyntheticScenario::commute(7).generate().points
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_simplify(c: &mut Criterion) {
    let mut group = c.benchmark_group("simplify");

    for km in [5.0, 20.0, 50.0] {
        let mut points = drive(km, 1);
        tracktotrip::preprocess::compute_metrics(&mut points);
        let label = format!("{}km", km);

        group.bench_with_input(BenchmarkId::new("drp", &label), &points, |b, p| {
            b.iter(|| drp(black_box(p), 1e-5))
        });
        group.bench_with_input(BenchmarkId::new("td_sp", &label), &points, |b, p| {
            b.iter(|| td_sp(black_box(p), 5.0))
        });
        group.bench_with_input(BenchmarkId::new("td_tr", &label), &points, |b, p| {
            b.iter(|| td_tr(black_box(p), 10.0))
        });
        group.bench_with_input(BenchmarkId::new("spt", &label), &points, |b, p| {
            b.iter(|| spt(black_box(p), 10.0, 5.0))
        });
    }

    group.finish();
}

fn bench_smooth(c: &mut Criterion) {
    let mut group = c.benchmark_group("smooth");
    group.sample_size(10);
    let points = commute_points();

    for strategy in [SmoothStrategy::Inverse, SmoothStrategy::default()] {
        group.bench_with_input(
            BenchmarkId::new(strategy.as_str(), points.len()),
            &points,
            |b, p| b.iter(|| smooth(black_box(p), 1.0, strategy, 10)),
        );
    }

    group.finish();
}

fn bench_segmentation(c: &mut Criterion) {
    let points = commute_points();
    c.bench_function("segment_commute", |b| {
        b.iter(|| segment_points(black_box(&points), 0.15, 80.0))
    });
}

fn bench_to_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("to_trip");
    group.sample_size(10);
    let track = SyntheticScenario::commute(11).generate().into_track("");
    let config = TripConfig::default();

    group.bench_function("commute", |b| {
        b.iter(|| {
            let mut trip = track.clone();
            let _ = trip.to_trip("bench", black_box(&config));
            trip
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_simplify,
    bench_smooth,
    bench_segmentation,
    bench_to_trip,
);

criterion_main!(benches);
