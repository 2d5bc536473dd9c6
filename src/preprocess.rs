//! Metric computation and destructive cleanup of raw point sequences.

use crate::Point;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;

/// Points recorded before this instant are treated as clock garbage.
pub fn min_valid_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Recompute `dt`, `vel` and `acc` over the current ordering.
pub fn compute_metrics(points: &mut [Point]) {
    for i in 0..points.len() {
        if i == 0 {
            let first = &mut points[0];
            first.dt = 0.0;
            first.vel = 0.0;
            first.acc = 0.0;
        } else {
            let previous = points[i - 1];
            points[i] = points[i].compute_metrics(&previous);
        }
    }
}

/// Recompute metrics and, when `destructive`, drop or clamp implausible points.
///
/// Destructive mode drops points timestamped before [`min_valid_time`] and
/// replaces any point whose `|acc|` exceeds `max_acc` with the previous kept
/// position at the offending point's time.
pub fn preprocess_segment(points: &[Point], max_acc: f64, destructive: bool) -> Vec<Point> {
    let min_time = min_valid_time();
    let mut result: Vec<Point> = Vec::with_capacity(points.len());
    let mut clamped = 0usize;

    for point in points {
        if destructive && point.time < min_time {
            continue;
        }
        let mut current = Point::new(point.lat, point.lon, point.time);
        if let Some(last) = result.last().copied() {
            current = current.compute_metrics(&last);
            if destructive && current.acc.abs() > max_acc {
                current = Point::new(last.lat, last.lon, point.time).compute_metrics(&last);
                clamped += 1;
            }
        }
        result.push(current);
    }

    if destructive {
        debug!(
            "[Preprocess] kept {}/{} points, clamped {}",
            result.len(),
            points.len(),
            clamped
        );
    }
    result
}
