//! Spatio-temporal segmentation.
//!
//! Splits one point sequence into runs separated by stays. Points are
//! clustered in standardized `(lon, lat, time)` space with DBSCAN; a run
//! starts wherever a new stay cluster begins. Stays that are too short are
//! folded back into the surrounding movement, and runs are further split at
//! recording gaps longer than `min_time`.
//!
//! The concatenation of the returned runs is always the input, in order.

pub mod dbscan;

use crate::Point;
use log::debug;
use std::collections::HashMap;

/// Default DBSCAN radius in standardized units.
pub const DEFAULT_EPS: f64 = 0.15;

/// Default minimum stay duration in seconds.
pub const DEFAULT_MIN_TIME: f64 = 80.0;

struct Run {
    points: Vec<Point>,
    opener: Option<usize>,
}

/// Split `points` at stays and recording gaps.
///
/// # Example
/// ```
/// use tracktotrip::{Point, segment_points};
/// let mut points: Vec<Point> = (0..10)
///     .map(|i| Point::at_epoch_seconds(41.15 + i as f64 * 1e-4, -8.61, i as f64 * 5.0))
///     .collect();
/// // Ten minutes of silence, then more movement
/// points.extend((0..10).map(|i| {
///     Point::at_epoch_seconds(41.16 + i as f64 * 1e-4, -8.61, 645.0 + i as f64 * 5.0)
/// }));
/// let runs = segment_points(&points, 0.15, 80.0);
/// assert_eq!(runs.iter().map(|r| r.len()).sum::<usize>(), 20);
/// assert!(runs.len() >= 2);
/// ```
pub fn segment_points(points: &[Point], eps: f64, min_time: f64) -> Vec<Vec<Point>> {
    if points.is_empty() {
        return Vec::new();
    }
    if points.len() == 1 {
        return vec![points.to_vec()];
    }

    let median_dt = match median_positive_step(points) {
        Some(dt) => dt,
        None => {
            debug!("[Segmentation] no positive time steps, temporal split only");
            return fold_short_runs(temporal_segmentation(points, min_time));
        }
    };
    let min_samples = ((min_time / median_dt).ceil() as usize).max(1);

    let features = standardize(points);
    let labels = dbscan::dbscan(&features, eps, min_samples);
    debug!(
        "[Segmentation] {} points, min_samples={}, {} clusters",
        points.len(),
        min_samples,
        dbscan::cluster_count(&labels)
    );

    let runs = split_on_clusters(points, &labels);
    let durations = cluster_durations(points, &labels);
    let corrected = correct_segmentation(runs, &durations, min_time);

    let split: Vec<Vec<Point>> = corrected
        .into_iter()
        .flat_map(|run| temporal_segmentation(&run, min_time))
        .collect();
    let result = fold_short_runs(split);
    debug!("[Segmentation] produced {} runs", result.len());
    result
}

/// Split wherever consecutive timestamps differ by more than `min_time`.
pub fn temporal_segmentation(points: &[Point], min_time: f64) -> Vec<Vec<Point>> {
    let mut runs: Vec<Vec<Point>> = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for point in points {
        if let Some(last) = current.last() {
            if point.time_difference(last) > min_time {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(*point);
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Z-score standardized `(lon, lat, epoch seconds)` features.
///
/// Uses the population standard deviation; a constant axis is only centered.
pub fn standardize(points: &[Point]) -> Vec<[f64; 3]> {
    let raw: Vec<[f64; 3]> = points.iter().map(|p| p.gen3arr()).collect();
    let n = raw.len() as f64;
    let mut mean = [0.0; 3];
    let mut std = [0.0; 3];
    for axis in 0..3 {
        mean[axis] = raw.iter().map(|r| r[axis]).sum::<f64>() / n;
        let var = raw.iter().map(|r| (r[axis] - mean[axis]).powi(2)).sum::<f64>() / n;
        std[axis] = if var > 0.0 { var.sqrt() } else { 1.0 };
    }
    raw.iter()
        .map(|r| {
            [
                (r[0] - mean[0]) / std[0],
                (r[1] - mean[1]) / std[1],
                (r[2] - mean[2]) / std[2],
            ]
        })
        .collect()
}

fn median_positive_step(points: &[Point]) -> Option<f64> {
    let mut steps: Vec<f64> = points
        .windows(2)
        .map(|w| w[1].time_difference(&w[0]))
        .filter(|dt| *dt > 0.0)
        .collect();
    if steps.is_empty() {
        return None;
    }
    steps.sort_by(|a, b| a.total_cmp(b));
    let n = steps.len();
    Some(if n % 2 == 1 {
        steps[n / 2]
    } else {
        (steps[n / 2 - 1] + steps[n / 2]) / 2.0
    })
}

/// A new run starts at each clustered point whose cluster differs from the
/// one that opened the current run. Noise points stay in the current run.
fn split_on_clusters(points: &[Point], labels: &[Option<usize>]) -> Vec<Run> {
    let mut runs = vec![Run {
        points: Vec::new(),
        opener: None,
    }];
    for (point, label) in points.iter().zip(labels) {
        if let Some(cluster) = label {
            let current = runs.last_mut();
            match current {
                Some(run) if run.points.is_empty() => run.opener = Some(*cluster),
                Some(run) if run.opener == Some(*cluster) => {}
                _ => runs.push(Run {
                    points: Vec::new(),
                    opener: Some(*cluster),
                }),
            }
        }
        if let Some(run) = runs.last_mut() {
            run.points.push(*point);
        }
    }
    runs
}

/// First-to-last time span of each cluster's members.
fn cluster_durations(points: &[Point], labels: &[Option<usize>]) -> HashMap<usize, f64> {
    let mut spans: HashMap<usize, (f64, f64)> = HashMap::new();
    for (point, label) in points.iter().zip(labels) {
        if let Some(cluster) = label {
            let t = point.timestamp();
            spans
                .entry(*cluster)
                .and_modify(|(first, last)| {
                    *first = first.min(t);
                    *last = last.max(t);
                })
                .or_insert((t, t));
        }
    }
    spans
        .into_iter()
        .map(|(cluster, (first, last))| (cluster, last - first))
        .collect()
}

/// Fold runs opened by stays no longer than `min_time` into the previous run.
fn correct_segmentation(
    runs: Vec<Run>,
    durations: &HashMap<usize, f64>,
    min_time: f64,
) -> Vec<Vec<Point>> {
    let mut result: Vec<Vec<Point>> = Vec::new();
    let mut folded = 0usize;
    for run in runs {
        if run.points.is_empty() {
            continue;
        }
        let short_stay = run
            .opener
            .and_then(|c| durations.get(&c))
            .is_some_and(|d| *d <= min_time);
        match result.last_mut() {
            Some(previous) if short_stay => {
                previous.extend(run.points);
                folded += 1;
            }
            _ => result.push(run.points),
        }
    }
    if folded > 0 {
        debug!("[Segmentation] folded {} short stays", folded);
    }
    result
}

/// Merge runs of at most one point into their neighbor.
fn fold_short_runs(runs: Vec<Vec<Point>>) -> Vec<Vec<Point>> {
    let mut result: Vec<Vec<Point>> = Vec::new();
    let mut pending: Vec<Point> = Vec::new();
    for run in runs {
        if run.len() <= 1 {
            match result.last_mut() {
                Some(previous) => previous.extend(run),
                None => pending.extend(run),
            }
        } else {
            let mut merged = std::mem::take(&mut pending);
            merged.extend(run);
            result.push(merged);
        }
    }
    if !pending.is_empty() {
        result.push(pending);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(t: f64) -> Point {
        Point::at_epoch_seconds(41.0, -8.0, t)
    }

    #[test]
    fn test_fold_short_runs_leading_single() {
        let runs = vec![vec![p(0.0)], vec![p(1.0), p(2.0)], vec![p(3.0)]];
        let folded = fold_short_runs(runs);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].len(), 4);
    }

    #[test]
    fn test_fold_short_runs_all_single() {
        let runs = vec![vec![p(0.0)], vec![p(100.0)]];
        let folded = fold_short_runs(runs);
        assert_eq!(folded, vec![vec![p(0.0), p(100.0)]]);
    }

    #[test]
    fn test_split_on_clusters_noise_stays_in_run() {
        let points: Vec<Point> = (0..5).map(|i| p(i as f64)).collect();
        let labels = vec![None, Some(0), None, Some(0), Some(1)];
        let runs = split_on_clusters(&points, &labels);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].points.len(), 1);
        assert_eq!(runs[1].points.len(), 3);
        assert_eq!(runs[2].opener, Some(1));
    }

    #[test]
    fn test_standardize_constant_axis() {
        let points = vec![p(0.0), p(10.0)];
        let features = standardize(&points);
        assert_eq!(features[0][0], 0.0);
        assert!((features[0][2] + 1.0).abs() < 1e-12);
        assert!((features[1][2] - 1.0).abs() < 1e-12);
    }
}
