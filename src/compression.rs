//! Trajectory compression.
//!
//! Two families:
//! - topology based: Douglas-Peucker ([`drp`])
//! - time based: top-down speed ([`td_sp`]), top-down time ratio ([`td_tr`])
//!   and their combination ([`spt`])
//!
//! Every variant keeps the first and last point, never grows the input and
//! returns original points. Divide and conquer runs on an explicit work
//! stack, so very long tracks cannot overflow the call stack.

use crate::Point;
use crate::geo_utils::planar_distance;

/// Zero time steps are replaced by this many seconds.
pub const MIN_DT: f64 = 1e-9;

/// Compression strategy, resolved by [`simplify`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimplifyStrategy {
    /// Douglas-Peucker with a tolerance in degrees.
    Topology { epsilon: f64 },
    /// Top-down speed based, tolerated speed error in km/h.
    Speed { speed_threshold: f64 },
    /// Top-down time ratio, tolerated distance error in meters.
    TimeRatio { dist_threshold: f64 },
    /// Combined distance (meters) and speed (km/h) check.
    Spatiotemporal {
        max_dist_error: f64,
        max_speed_error: f64,
    },
}

impl SimplifyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimplifyStrategy::Topology { .. } => "drp",
            SimplifyStrategy::Speed { .. } => "td_sp",
            SimplifyStrategy::TimeRatio { .. } => "td_tr",
            SimplifyStrategy::Spatiotemporal { .. } => "spt",
        }
    }
}

impl std::fmt::Display for SimplifyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Simplify `points` with the given strategy.
pub fn simplify(points: &[Point], strategy: SimplifyStrategy) -> Vec<Point> {
    match strategy {
        SimplifyStrategy::Topology { epsilon } => drp(points, epsilon),
        SimplifyStrategy::Speed { speed_threshold } => td_sp(points, speed_threshold),
        SimplifyStrategy::TimeRatio { dist_threshold } => td_tr(points, dist_threshold),
        SimplifyStrategy::Spatiotemporal {
            max_dist_error,
            max_speed_error,
        } => spt(points, max_dist_error, max_speed_error),
    }
}

/// Distance in degrees from `point` to the line through `start` and `end`.
///
/// Coincident endpoints fall back to the point distance.
pub fn point_line_distance(point: &Point, start: &Point, end: &Point) -> f64 {
    if start.lat == end.lat && start.lon == end.lon {
        return planar_distance(point.gen2arr(), start.gen2arr());
    }
    let numerator = ((end.lat - start.lat) * (start.lon - point.lon)
        - (start.lat - point.lat) * (end.lon - start.lon))
        .abs();
    let denominator = ((end.lat - start.lat).powi(2) + (end.lon - start.lon).powi(2)).sqrt();
    numerator / denominator
}

/// Douglas-Peucker.
///
/// # Example
/// ```
/// use tracktotrip::{Point, compression::drp};
/// let points = vec![
///     Point::at_epoch_seconds(0.0, 0.0, 0.0),
///     Point::at_epoch_seconds(0.5, 0.00001, 1.0),
///     Point::at_epoch_seconds(1.0, 0.0, 2.0),
///     Point::at_epoch_seconds(1.0, 1.0, 3.0),
/// ];
/// let simplified = drp(&points, 0.001);
/// assert_eq!(simplified.len(), 3);
/// ```
pub fn drp(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        let mut dmax = 0.0;
        let mut index = start;
        for i in start + 1..end {
            let d = point_line_distance(&points[i], &points[start], &points[end]);
            if d > dmax {
                dmax = d;
                index = i;
            }
        }
        if dmax > epsilon {
            keep[index] = true;
            stack.push((index, end));
            stack.push((start, index));
        }
    }
    collect_kept(points, &keep)
}

/// Top-down speed based compression.
///
/// Splits at the point with the largest change between incoming and outgoing
/// speed while that change exceeds `speed_threshold` (km/h).
pub fn td_sp(points: &[Point], speed_threshold: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    let mut stack = vec![(0usize, points.len() - 1)];

    while let Some((start, end)) = stack.pop() {
        if end - start < 2 {
            keep[start..=end].iter_mut().for_each(|k| *k = true);
            continue;
        }
        let mut max_speed_diff = 0.0;
        let mut found = 0usize;
        for i in start + 1..end {
            let v_in = speed(&points[i - 1], &points[i]);
            let v_out = speed(&points[i], &points[i + 1]);
            let diff = (v_out - v_in).abs();
            if diff > max_speed_diff {
                max_speed_diff = diff;
                found = i;
            }
        }
        if max_speed_diff > speed_threshold && found > 0 {
            stack.push((found, end));
            stack.push((start, found - 1));
        } else {
            keep[start] = true;
            keep[end] = true;
        }
    }
    collect_kept(points, &keep)
}

/// Top-down time ratio compression.
///
/// Each interior point is compared with the position interpolated along the
/// chord at the same fraction of elapsed time; splits while the largest
/// deviation exceeds `dist_threshold` (meters).
pub fn td_tr(points: &[Point], dist_threshold: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    let mut stack = vec![(0usize, points.len() - 1)];

    while let Some((start, end)) = stack.pop() {
        if end - start < 2 {
            keep[start..=end].iter_mut().for_each(|k| *k = true);
            continue;
        }
        let mut max_dist = 0.0;
        let mut found = 0usize;
        for i in start + 1..end {
            let expected = interpolate(&points[start], &points[end], &points[i]);
            let d = points[i].distance(&expected);
            if d > max_dist {
                max_dist = d;
                found = i;
            }
        }
        if max_dist > dist_threshold && found > 0 {
            stack.push((found, end));
            stack.push((start, found - 1));
        } else {
            keep[start] = true;
            keep[end] = true;
        }
    }
    collect_kept(points, &keep)
}

/// Combined spatio-temporal compression.
///
/// Grows a window `[0, e]` and checks every `i < e` for either a distance
/// error (meters) against the time-interpolated chord or a speed change
/// (km/h). On the first violation `points[0]` is kept and compression
/// continues from `points[i]`.
pub fn spt(points: &[Point], max_dist_error: f64, max_speed_error: f64) -> Vec<Point> {
    let mut result = Vec::new();
    let mut base = 0usize;

    loop {
        let rest = &points[base..];
        if rest.len() <= 2 {
            result.extend_from_slice(rest);
            break;
        }
        match first_violation(rest, max_dist_error, max_speed_error) {
            Some(i) => {
                result.push(rest[0]);
                base += i;
            }
            None => {
                result.push(rest[0]);
                result.push(rest[rest.len() - 1]);
                break;
            }
        }
    }
    result
}

fn first_violation(points: &[Point], max_dist_error: f64, max_speed_error: f64) -> Option<usize> {
    for e in 1..points.len() {
        for i in 1..e {
            let expected = interpolate(&points[0], &points[e], &points[i]);
            let v_prev = speed(&points[i - 1], &points[i]);
            let v_next = speed(&points[i], &points[i + 1]);
            if points[i].distance(&expected) > max_dist_error
                || (v_next - v_prev).abs() > max_speed_error
            {
                return Some(i);
            }
        }
    }
    None
}

/// Speed in km/h between two points, zero time clamped to [`MIN_DT`].
fn speed(from: &Point, to: &Point) -> f64 {
    let mut dt = to.time_difference(from);
    if dt == 0.0 {
        dt = MIN_DT;
    }
    to.distance(from) / dt * 3.6
}

/// Position on the `start`-`end` chord at `at`'s fraction of elapsed time.
///
/// Used only for distance testing, never emitted.
fn interpolate(start: &Point, end: &Point, at: &Point) -> Point {
    let total = end.time_difference(start);
    let ratio = if total != 0.0 {
        at.time_difference(start) / total
    } else {
        0.0
    };
    at.with_position(
        start.lat + (end.lat - start.lat) * ratio,
        start.lon + (end.lon - start.lon) * ratio,
    )
}

fn collect_kept(points: &[Point], keep: &[bool]) -> Vec<Point> {
    points
        .iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(p, _)| *p)
        .collect()
}
