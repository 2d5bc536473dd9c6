//! Span feature extraction.
//!
//! Training and inference must use the same extractor; a classifier pins the
//! one it was trained with through [`FeatureExtractor::id`].

use crate::Point;
use serde::{Deserialize, Serialize};

/// Velocity (km/h) that maps to 1.0 in the decile histogram.
pub const MAX_VEL: f64 = 200.0;

/// Marks an already selected histogram bin.
const TAKEN: f64 = -1.0;

/// Versioned feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureExtractor {
    /// Cumulative share of samples at or below each velocity decile of [`MAX_VEL`].
    VelocityDeciles,
    /// The `n_tops` velocity bins with the most time spent, as `(bin, share)` pairs.
    TopVelocityBins { n_tops: usize },
}

impl FeatureExtractor {
    /// Stable identifier, including the version and parameters.
    pub fn id(&self) -> String {
        match self {
            FeatureExtractor::VelocityDeciles => "velocity-deciles/v1".to_string(),
            FeatureExtractor::TopVelocityBins { n_tops } => {
                format!("top-velocity-bins/v1/{}", n_tops)
            }
        }
    }

    /// Length of a non-empty feature vector.
    pub fn feature_length(&self) -> usize {
        match self {
            FeatureExtractor::VelocityDeciles => 10,
            FeatureExtractor::TopVelocityBins { n_tops } => n_tops * 2,
        }
    }

    /// Features for a run of points. Empty when the run carries no information.
    pub fn extract(&self, points: &[Point]) -> Vec<f64> {
        match self {
            FeatureExtractor::VelocityDeciles => velocity_deciles(points),
            FeatureExtractor::TopVelocityBins { n_tops } => extract_features(points, *n_tops),
        }
    }
}

/// Fraction of points with `min(vel, MAX_VEL) / MAX_VEL <= k / 10`, k = 1..=10.
pub fn velocity_deciles(points: &[Point]) -> Vec<f64> {
    if points.is_empty() {
        return Vec::new();
    }
    let n = points.len() as f64;
    let normalized: Vec<f64> = points
        .iter()
        .map(|p| p.vel.clamp(0.0, MAX_VEL) / MAX_VEL)
        .collect();
    (1..=10)
        .map(|k| {
            let cut = k as f64 / 10.0;
            normalized.iter().filter(|v| **v <= cut).count() as f64 / n
        })
        .collect()
}

/// Time-weighted velocity histogram, top `n_tops` bins.
///
/// Bins are `round(vel)` km/h wide and weighted by `dt`; velocities above
/// [`MAX_VEL`] share the last bin. The result holds
/// `n_tops` `(bin, share)` pairs in descending share; once every bin has been
/// taken the remaining pairs are `(0, 0)`. Zero total time gives an empty
/// vector.
pub fn extract_features(points: &[Point], n_tops: usize) -> Vec<f64> {
    let bin_of = |p: &Point| p.vel.clamp(0.0, MAX_VEL).round() as usize;
    let top_bin = points.iter().map(bin_of).max().unwrap_or(0);
    let mut histogram = vec![0.0; top_bin + 1];
    let mut total = 0.0;
    for p in points {
        let bin = bin_of(p);
        histogram[bin] += p.dt;
        total += p.dt;
    }
    if total <= 0.0 {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(n_tops * 2);
    for _ in 0..n_tops {
        let top = histogram
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != TAKEN)
            .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((i, v)),
            });
        match top {
            Some((bin, time)) => {
                result.push(bin as f64);
                result.push(time / total);
                histogram[bin] = TAKEN;
            }
            None => {
                result.push(0.0);
                result.push(0.0);
            }
        }
    }
    result
}
