//! Tests for smooth module

use approx::assert_relative_eq;
use tracktotrip::smooth::{
    DEFAULT_EXTRAPOLATED_POINTS, extrapolate_points, kalman_smooth, with_extrapolation,
    with_inverse,
};
use tracktotrip::{Point, SmoothStrategy, TripError, smooth};

const T0: f64 = 1_000_000_000.0;

/// Straight walk north with a deterministic jitter of ~1 m.
fn jittered_line(n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let jitter = (i as f64 * 1.7).sin() * 1e-5;
            Point::at_epoch_seconds(41.15 + i as f64 * 1e-4 + jitter, -8.61 - jitter, T0 + i as f64)
        })
        .collect()
}

fn max_deviation(a: &[Point], b: &[Point]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(p, q)| (p.lat - q.lat).abs().max((p.lon - q.lon).abs()))
        .fold(0.0, f64::max)
}

#[test]
fn test_default_strategy() {
    assert_eq!(
        SmoothStrategy::default(),
        SmoothStrategy::Extrapolate {
            n_points: DEFAULT_EXTRAPOLATED_POINTS
        }
    );
    assert_eq!(SmoothStrategy::Inverse.to_string(), "inverse");
}

#[test]
fn test_rejects_invalid_noise() {
    let points = jittered_line(10);
    assert!(matches!(
        smooth(&points, -1.0, SmoothStrategy::Inverse, 5),
        Err(TripError::InvalidConfig(_))
    ));
    assert!(matches!(
        smooth(&points, f64::NAN, SmoothStrategy::default(), 5),
        Err(TripError::InvalidConfig(_))
    ));
}

#[test]
fn test_fewer_than_two_points_unchanged() {
    let one = vec![Point::at_epoch_seconds(41.0, -8.0, T0)];
    assert_eq!(smooth(&one, 1.0, SmoothStrategy::default(), 5).unwrap(), one);
    assert!(smooth(&[], 1.0, SmoothStrategy::Inverse, 5).unwrap().is_empty());
}

#[test]
fn test_extrapolate_preserves_length_and_times() {
    let points = jittered_line(60);
    let smoothed = smooth(&points, 1.0, SmoothStrategy::default(), 5).unwrap();
    assert_eq!(smoothed.len(), points.len());
    for (a, b) in points.iter().zip(&smoothed) {
        assert_eq!(a.time, b.time);
    }
    assert!(max_deviation(&points, &smoothed) < 1e-3);
}

#[test]
fn test_inverse_preserves_length_and_times() {
    let points = jittered_line(80);
    let smoothed = with_inverse(&points, 1.0, 5).unwrap();
    assert_eq!(smoothed.len(), points.len());
    assert!(points.iter().zip(&smoothed).all(|(a, b)| a.time == b.time));
    assert!(max_deviation(&points, &smoothed) < 1e-3);
}

#[test]
fn test_with_extrapolation_drops_prefix() {
    let points = jittered_line(40);
    let smoothed = with_extrapolation(&points, 1.0, 10, 3).unwrap();
    assert_eq!(smoothed.len(), 40);
    assert_eq!(smoothed[0].time, points[0].time);
}

#[test]
fn test_kalman_smooth_keeps_positions_close() {
    let points = jittered_line(50);
    let smoothed = kalman_smooth(&points, 1.0, 5).unwrap();
    assert_eq!(smoothed.len(), 50);
    assert!(smoothed.iter().all(|p| p.lat.is_finite() && p.lon.is_finite()));
    assert!(max_deviation(&points, &smoothed) < 1e-3);
}

#[test]
fn test_extrapolated_points_are_chronological() {
    let points: Vec<Point> = (0..10)
        .map(|i| Point::at_epoch_seconds(41.0 + i as f64 * 1e-4, -8.0, T0 + i as f64 * 2.0))
        .collect();
    let prefix = extrapolate_points(&points, 5);
    assert_eq!(prefix.len(), 5);
    assert!(prefix.windows(2).all(|w| w[0].time < w[1].time));
    assert!(prefix[4].time < points[0].time);
    assert!((points[0].timestamp() - prefix[4].timestamp() - 2.0).abs() < 1e-6);
    // Continues the line backwards
    assert!((prefix[4].lat - (41.0 - 1e-4)).abs() < 1e-9);
    assert!((prefix[0].lat - (41.0 - 5e-4)).abs() < 1e-9);
}

#[test]
fn test_extrapolate_degenerate_input() {
    let one = vec![Point::at_epoch_seconds(41.0, -8.0, T0)];
    assert!(extrapolate_points(&one, 5).is_empty());
    assert!(extrapolate_points(&jittered_line(5), 0).is_empty());
}

#[test]
fn test_kalman_smooth_matches_reference_smoother() {
    // Standard EM + RTS smoother (identity covariances, zero initial
    // velocity), 5 iterations, 5 s steps.
    let lat = [41.0, 41.0004, 41.0011, 41.0013, 41.0021, 41.0024, 41.003, 41.0037];
    let lon = [-8.6, -8.6003, -8.6005, -8.601, -8.6012, -8.6017, -8.6019, -8.6024];
    let expected = [
        (40.999988894619, -8.600000812259),
        (41.000445159383, -8.600282081869),
        (41.001017265715, -8.600545930828),
        (41.001395417831, -8.600949125312),
        (41.002013941147, -8.601245003779),
        (41.002441988757, -8.601649176851),
        (41.003013507899, -8.601946085960),
        (41.003683532253, -8.602382235116),
    ];
    let points: Vec<Point> = lat
        .iter()
        .zip(&lon)
        .enumerate()
        .map(|(i, (a, b))| Point::at_epoch_seconds(*a, *b, T0 + i as f64 * 5.0))
        .collect();

    let smoothed = kalman_smooth(&points, 1.0, 5).unwrap();
    for (p, (lat, lon)) in smoothed.iter().zip(expected) {
        assert_relative_eq!(p.lat, lat, epsilon = 1e-9);
        assert_relative_eq!(p.lon, lon, epsilon = 1e-9);
    }
}

#[test]
fn test_kalman_smooth_tracks_exact_line() {
    let points: Vec<Point> = (0..40)
        .map(|i| Point::at_epoch_seconds(41.0 + i as f64 * 0.001, -8.0, T0 + i as f64 * 10.0))
        .collect();
    let smoothed = kalman_smooth(&points, 1.0, 10).unwrap();
    assert!(max_deviation(&points, &smoothed) < 1e-6);
}
