//! Benchmarks for segment similarity and trip learning.
//!
//! Run with: `cargo bench --features synthetic --bench similarity`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tracktotrip::synthetic::SyntheticScenario;
use tracktotrip::{
    CanonicalStore, CanonicalTrip, LearnConfig, Result, Track, learn_trip, segment_similarity,
};

/// Discards everything; only the decision is measured.
struct NullStore;

impl CanonicalStore for NullStore {
    fn insert(&mut self, _track: &Track, _external_id: u64) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _canonical_id: u64, _track: &Track, _external_id: u64) -> Result<()> {
        Ok(())
    }
}

/// `count` commutes from the same origin with different seeds.
fn canonical_trips(count: usize) -> Vec<CanonicalTrip> {
    (0..count)
        .map(|i| CanonicalTrip {
            id: i as u64,
            track: SyntheticScenario::commute(100 + i as u64)
                .generate()
                .into_track("canonical"),
            usage: 1,
        })
        .collect()
}

fn bench_segment_similarity(c: &mut Criterion) {
    let a = SyntheticScenario::commute(1).generate().points;
    let b = SyntheticScenario::commute(2).generate().points;

    c.bench_function("segment_similarity_commute", |bench| {
        bench.iter(|| segment_similarity(black_box(&a), black_box(&b)))
    });
}

fn bench_learn_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("learn_trip");
    group.sample_size(10);
    let current = SyntheticScenario::commute(3).generate().into_track("current");
    let config = LearnConfig::default();

    for count in [1, 10, 50] {
        let trips = canonical_trips(count);
        group.bench_with_input(BenchmarkId::new("canonical", count), &trips, |b, trips| {
            b.iter(|| {
                let mut store = NullStore;
                learn_trip(black_box(&current), 0, trips.clone(), &mut store, &config)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_segment_similarity, bench_learn_trip);
criterion_main!(benches);
