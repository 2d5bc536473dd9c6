//! Tests for preprocess module

use tracktotrip::Point;
use tracktotrip::preprocess::{compute_metrics, min_valid_time, preprocess_segment};

// 2001-09-09T01:46:40Z
const T0: f64 = 1_000_000_000.0;

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_compute_metrics_first_point_is_zero() {
    let mut points = vec![
        Point::at_epoch_seconds(41.0, -8.0, T0),
        Point::at_epoch_seconds(41.001, -8.0, T0 + 10.0),
        Point::at_epoch_seconds(41.002, -8.0, T0 + 20.0),
    ];
    points[0].vel = 99.0;
    compute_metrics(&mut points);

    assert_eq!(points[0].dt, 0.0);
    assert_eq!(points[0].vel, 0.0);
    assert_eq!(points[0].acc, 0.0);
    assert!(approx_eq(points[1].dt, 10.0, 1e-9));
    assert!(approx_eq(points[1].vel, 40.0, 0.1));
    assert!(approx_eq(points[2].acc, 0.0, 1e-3));
}

#[test]
fn test_drops_points_before_1999() {
    let points = vec![
        Point::at_epoch_seconds(41.0, -8.0, 0.0),
        Point::at_epoch_seconds(41.0, -8.0, T0),
        Point::at_epoch_seconds(41.0001, -8.0, T0 + 10.0),
    ];
    let cleaned = preprocess_segment(&points, 20.0, true);
    assert_eq!(cleaned.len(), 2);
    assert!(cleaned.iter().all(|p| p.time >= min_valid_time()));
    assert_eq!(cleaned[0].dt, 0.0);
}

#[test]
fn test_non_destructive_keeps_everything() {
    let points = vec![
        Point::at_epoch_seconds(41.0, -8.0, 0.0),
        Point::at_epoch_seconds(41.0, -8.0, T0),
        Point::at_epoch_seconds(45.0, -8.0, T0 + 1.0),
    ];
    let cleaned = preprocess_segment(&points, 20.0, false);
    assert_eq!(cleaned.len(), 3);
    assert_eq!(cleaned[2].lat, 45.0);
    assert!(cleaned[2].vel > 0.0);
}

#[test]
fn test_clamps_acceleration_spike() {
    let points = vec![
        Point::at_epoch_seconds(41.0, -8.0, T0),
        Point::at_epoch_seconds(41.0, -8.0, T0 + 1.0),
        // ~1.1 km in one second
        Point::at_epoch_seconds(41.01, -8.0, T0 + 2.0),
        Point::at_epoch_seconds(41.0, -8.0, T0 + 3.0),
    ];
    let cleaned = preprocess_segment(&points, 20.0, true);
    assert_eq!(cleaned.len(), 4);
    assert_eq!(cleaned[2].lat, 41.0);
    assert_eq!(cleaned[2].lon, -8.0);
    assert_eq!(cleaned[2].time, points[2].time);
    assert_eq!(cleaned[2].vel, 0.0);
}
