//! Incremental trip learning against canonical trips.
//!
//! A canonical trip is a reference track refined every time a new
//! observation matches it. [`learn_trip`] decides whether an incoming track
//! refines an existing canonical trip or becomes a new one, and reports the
//! decision back through a caller-supplied [`CanonicalStore`].
//!
//! [`complete_trip`] answers the reverse question: given a start and an end
//! point, which stretches of the canonical trips connect them.

use crate::compression::SimplifyStrategy;
use crate::segment::closest_index;
use crate::track::{SegmentPairing, Track};
use crate::{Point, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// A canonical trip as handed over by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTrip {
    pub id: u64,
    pub track: Track,
    /// Number of observations merged into this trip
    pub usage: u64,
}

/// Caller-owned persistence of canonical trips.
pub trait CanonicalStore {
    /// Store `track` as a new canonical trip learnt from `external_id`.
    fn insert(&mut self, track: &Track, external_id: u64) -> Result<()>;

    /// Replace canonical trip `canonical_id` after merging `external_id` into it.
    fn update(&mut self, canonical_id: u64, track: &Track, external_id: u64) -> Result<()>;
}

/// Trip learning thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnConfig {
    /// Similarity from which a track is the same trip as a canonical one.
    /// Default: 0.8
    pub match_threshold: f64,
    /// Similarity from which the middle band applies. Default: 0.3
    pub similar_threshold: f64,
    /// Fit both trips in the middle band instead of inserting. Default: false
    pub fit_similar_trips: bool,
    /// Douglas-Peucker tolerance (degrees) for stored trips. Default: 1e-5
    pub simplify_epsilon: f64,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.8,
            similar_threshold: 0.3,
            fit_similar_trips: false,
            simplify_epsilon: 1e-5,
        }
    }
}

/// What [`learn_trip`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum LearnOutcome {
    /// Stored as a new canonical trip
    Inserted,
    /// Merged into an existing canonical trip
    Updated { canonical_id: u64, similarity: f64 },
    /// Middle band: the canonical trip was updated and the current trip,
    /// fitted against it, stored as a new one
    FittedBoth { canonical_id: u64, similarity: f64 },
}

/// Paths between two query points, one per qualifying canonical trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripCompletion {
    /// `[lat, lon]` paths
    pub possibilities: Vec<Vec<[f64; 2]>>,
    /// Usage weights summing to 1
    pub weights: Vec<f64>,
}

struct Scored {
    position: usize,
    similarity: f64,
    /// Pairings with the canonical trip on the `self` side
    pairings: Vec<SegmentPairing>,
}

/// Best of both similarity directions between `canonical` and `current`.
fn score(position: usize, canonical: &Track, current: &Track) -> Scored {
    let (covered, pairings) = canonical.similarity(current);
    let (covering, reverse) = current.similarity(canonical);
    if covering > covered {
        Scored {
            position,
            similarity: covering,
            pairings: reverse.iter().map(SegmentPairing::flipped).collect(),
        }
    } else {
        Scored {
            position,
            similarity: covered,
            pairings,
        }
    }
}

#[cfg(feature = "parallel")]
fn score_all(canonical: &[CanonicalTrip], current: &Track) -> Vec<Scored> {
    use rayon::prelude::*;

    canonical
        .par_iter()
        .enumerate()
        .map(|(i, c)| score(i, &c.track, current))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn score_all(canonical: &[CanonicalTrip], current: &Track) -> Vec<Scored> {
    canonical
        .iter()
        .enumerate()
        .map(|(i, c)| score(i, &c.track, current))
        .collect()
}

/// Learn `current` against the canonical trips.
///
/// Without canonical trips the simplified track is inserted. Otherwise the
/// best match (by the higher of both similarity directions) decides:
/// - at or above `match_threshold` the track is merged into it and the
///   canonical trip updated;
/// - at or above `similar_threshold`, when `fit_similar_trips` is set, both
///   trips are fitted to each other; the canonical one is updated and the
///   current one inserted;
/// - otherwise the track is inserted.
///
/// Stored tracks are simplified with Douglas-Peucker first.
pub fn learn_trip(
    current: &Track,
    current_id: u64,
    canonical: Vec<CanonicalTrip>,
    store: &mut impl CanonicalStore,
    config: &LearnConfig,
) -> Result<LearnOutcome> {
    let topology = SimplifyStrategy::Topology {
        epsilon: config.simplify_epsilon,
    };

    let best = score_all(&canonical, current)
        .into_iter()
        .fold(None, |best: Option<Scored>, s| match best {
            Some(b) if b.similarity >= s.similarity => Some(b),
            _ => Some(s),
        });
    let Some(best) = best else {
        info!("[Learn] no canonical trips, inserting trip {}", current_id);
        store.insert(current.clone().simplify(topology).compute_metrics(), current_id)?;
        return Ok(LearnOutcome::Inserted);
    };

    let mut canonical = canonical;
    let matched = canonical.swap_remove(best.position);
    debug!(
        "[Learn] trip {} best match is canonical {} with {:.3}",
        current_id, matched.id, best.similarity
    );

    if best.similarity >= config.match_threshold {
        let mut trip = matched.track;
        trip.merge_and_fit(current, &best.pairings)
            .simplify(topology)
            .compute_metrics();
        store.update(matched.id, &trip, current_id)?;
        info!("[Learn] trip {} merged into canonical {}", current_id, matched.id);
        return Ok(LearnOutcome::Updated {
            canonical_id: matched.id,
            similarity: best.similarity,
        });
    }

    if config.fit_similar_trips && best.similarity >= config.similar_threshold {
        let original = matched.track.clone();
        let mut trip = matched.track;
        trip.merge_and_fit(current, &best.pairings)
            .simplify(topology)
            .compute_metrics();

        let flipped: Vec<SegmentPairing> =
            best.pairings.iter().map(SegmentPairing::flipped).collect();
        let mut fitted = current.clone();
        fitted
            .merge_and_fit(&original, &flipped)
            .simplify(topology)
            .compute_metrics();

        store.update(matched.id, &trip, current_id)?;
        store.insert(&fitted, current_id)?;
        info!(
            "[Learn] trip {} fitted with canonical {} and inserted",
            current_id, matched.id
        );
        return Ok(LearnOutcome::FittedBoth {
            canonical_id: matched.id,
            similarity: best.similarity,
        });
    }

    info!(
        "[Learn] trip {} is a new canonical trip ({:.3} < {})",
        current_id, best.similarity, config.match_threshold
    );
    store.insert(current.clone().simplify(topology).compute_metrics(), current_id)?;
    Ok(LearnOutcome::Inserted)
}

/// Paths of the canonical trips that pass within `distance_threshold` meters
/// of both `from` and `to`.
///
/// Each trip's points are flattened across segments and sliced between the
/// closest indices, reversed when `from` comes later. A boundary is replaced
/// by the query point when the query is closer to the adjacent path point.
/// Weights are the trips' usage normalized to 1, uniform when all are zero.
pub fn complete_trip(
    canonical: &[CanonicalTrip],
    from: &Point,
    to: &Point,
    distance_threshold: f64,
) -> TripCompletion {
    let mut possibilities = Vec::new();
    let mut usages = Vec::new();

    for trip in canonical {
        let points: Vec<Point> = trip
            .track
            .segments
            .iter()
            .flat_map(|s| s.points.iter().copied())
            .collect();
        let (Some(start), Some(end)) = (
            closest_index(&points, from, distance_threshold),
            closest_index(&points, to, distance_threshold),
        ) else {
            continue;
        };

        let mut path: Vec<Point> = if start <= end {
            points[start..=end].to_vec()
        } else {
            points[end..=start].iter().rev().copied().collect()
        };
        snap_boundary(&mut path, from, true);
        snap_boundary(&mut path, to, false);

        possibilities.push(path.iter().map(|p| [p.lat, p.lon]).collect());
        usages.push(trip.usage as f64);
    }

    let total: f64 = usages.iter().sum();
    let weights = if total > 0.0 {
        usages.iter().map(|u| u / total).collect()
    } else {
        vec![1.0 / usages.len() as f64; usages.len()]
    };
    debug!(
        "[Learn] {} of {} canonical trips complete the query",
        possibilities.len(),
        canonical.len()
    );

    TripCompletion {
        possibilities,
        weights,
    }
}

fn snap_boundary(path: &mut [Point], query: &Point, at_start: bool) {
    let n = path.len();
    if n < 2 {
        return;
    }
    let (boundary, adjacent) = if at_start { (0, 1) } else { (n - 1, n - 2) };
    if query.distance(&path[adjacent]) < path[boundary].distance(&path[adjacent]) {
        path[boundary] = *query;
    }
}
