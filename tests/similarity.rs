//! Tests for similarity module

use approx::assert_relative_eq;
use tracktotrip::similarity::{
    CLOSE_DISTANCE_THRESHOLD, angle_similarity, closest_point, distance_to_line,
    segment_similarity_with_threshold,
};
use tracktotrip::{Point, line_similarity, segment_similarity, sort_segment_points};

const A: [[f64; 2]; 7] = [
    [0.5, 0.5],
    [1.0, 1.5],
    [2.0, 2.5],
    [3.5, 3.5],
    [5.2, 4.5],
    [7.5, 6.5],
    [7.9, 8.0],
];

const B: [[f64; 2]; 9] = [
    [0.6, 0.5],
    [1.05, 1.45],
    [2.1, 2.4],
    [2.8, 4.0],
    [3.5, 5.5],
    [5.0, 5.7],
    [7.8, 5.7],
    [8.1, 6.5],
    [8.1, 8.0],
];

fn to_points(coords: &[[f64; 2]]) -> Vec<Point> {
    coords
        .iter()
        .enumerate()
        .map(|(i, c)| Point::at_epoch_seconds(c[0], c[1], 1_000_000_000.0 + i as f64))
        .collect()
}

#[test]
fn test_line_similarity_identical_and_crossing() {
    let t = CLOSE_DISTANCE_THRESHOLD;
    assert_eq!(line_similarity([0.0, 0.0], [5.0, 2.0], [0.0, 0.0], [5.0, 2.0], t), 1.0);
    assert_eq!(line_similarity([0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], t), 0.0);
}

#[test]
fn test_line_similarity_ignores_direction() {
    let t = CLOSE_DISTANCE_THRESHOLD;
    assert_eq!(line_similarity([0.0, 0.0], [5.0, 2.0], [5.0, 2.0], [0.0, 0.0], t), 1.0);
}

#[test]
fn test_line_similarity_decays_with_offset() {
    let t = CLOSE_DISTANCE_THRESHOLD;
    let near = line_similarity([0.0, 0.0], [5.0, 2.0], [0.0, 0.0], [5.0, 1.9], t);
    let far = line_similarity([0.0, 0.0], [5.0, 2.0], [0.0, 0.0], [5.0, 2.1], t);
    assert_relative_eq!(near, 0.95343, epsilon = 1e-4);
    assert_relative_eq!(far, 0.94986, epsilon = 1e-4);
    assert!(near > far);
}

#[test]
fn test_degenerate_edges() {
    let p = [1.0, 1.0];
    assert_eq!(angle_similarity(p, p, p, p), 1.0);
    assert_eq!(angle_similarity(p, p, [0.0, 0.0], [1.0, 0.0]), 0.0);
    assert_eq!(closest_point([0.0, 0.0], [2.0, 0.0], [1.0, 3.0]), [1.0, 0.0]);
    assert_eq!(closest_point([0.0, 0.0], [2.0, 0.0], [-1.0, 3.0]), [0.0, 0.0]);
    assert_eq!(distance_to_line([0.0, 0.0], [2.0, 0.0], [3.0, 0.0]), 1.0);
}

#[test]
fn test_segment_similarity_scenario() {
    let a = to_points(&A);
    let b = to_points(&B);
    let (score, edges) = segment_similarity(&a, &b);

    assert_eq!(edges.len(), B.len() - 1);
    assert!(score > 0.35, "score {}", score);
    assert_relative_eq!(score, 0.41114, epsilon = 1e-4);
    // Dip at B's deviation, then recovery
    assert!(edges[3] > edges[4]);
    assert!(edges[4] < edges[5]);
}

#[test]
fn test_segment_similarity_is_asymmetric() {
    let a = to_points(&A);
    let b = to_points(&B);
    let (ab, _) = segment_similarity(&a, &b);
    let (ba, edges) = segment_similarity(&b, &a);
    assert_eq!(edges.len(), A.len() - 1);
    assert_relative_eq!(ba, 0.51265, epsilon = 1e-4);
    assert!(ab < ba);
}

#[test]
fn test_self_similarity_is_one() {
    let a = to_points(&A);
    let b = to_points(&B);
    assert_relative_eq!(segment_similarity(&a, &a).0, 1.0, epsilon = 1e-12);
    assert_relative_eq!(segment_similarity(&b, &b).0, 1.0, epsilon = 1e-12);
}

#[test]
fn test_segment_similarity_bounds() {
    let a = to_points(&A);
    let b = to_points(&B);
    for threshold in [0.1, 0.5, 1.0, 5.0] {
        let (score, edges) = segment_similarity_with_threshold(&a, &b, threshold);
        assert!((0.0..=1.0).contains(&score));
        assert!(edges.iter().all(|e| (0.0..=1.0).contains(e)));
    }
}

#[test]
fn test_segment_similarity_degenerate() {
    let a = to_points(&A);
    let single = to_points(&[[0.5, 0.5]]);
    assert_eq!(segment_similarity(&a, &single), (0.0, Vec::new()));
    assert_eq!(segment_similarity(&single, &a), (0.0, Vec::new()));
}

#[test]
fn test_far_segments_score_zero() {
    let a = to_points(&A);
    let shifted: Vec<[f64; 2]> = A.iter().map(|c| [c[0] + 50.0, c[1] + 50.0]).collect();
    let (score, edges) = segment_similarity(&a, &to_points(&shifted));
    assert_eq!(score, 0.0);
    assert!(edges.iter().all(|e| *e == 0.0));
}

#[test]
fn test_sort_segment_points_keeps_every_point() {
    let a = to_points(&A);
    let b = to_points(&B);
    let merged = sort_segment_points(&a, &b);
    assert_eq!(merged.len(), a.len() + b.len());
    assert_eq!(merged[0], a[0]);
    for p in a.iter().chain(&b) {
        assert_eq!(merged.iter().filter(|q| *q == p).count(), 1);
    }
    // a's points keep their relative order
    let a_positions: Vec<usize> = a
        .iter()
        .map(|p| merged.iter().position(|q| q == p).unwrap())
        .collect();
    assert!(a_positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_sort_segment_points_empty_sides() {
    let b = to_points(&B);
    assert_eq!(sort_segment_points(&[], &b), b);
    assert_eq!(sort_segment_points(&b, &[]), b);
}
