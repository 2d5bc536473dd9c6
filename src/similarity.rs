//! Segment similarity and point merging.
//!
//! Similarity is asymmetric: [`segment_similarity`] measures how well `b` is
//! covered by `a`. Each edge of `b` is compared with the edges of `a` whose
//! dilated bounding boxes intersect its own, found through an R-tree.

use crate::Point;
use crate::geo_utils::planar_distance;
use log::debug;
use rstar::{AABB, RTree, RTreeObject};

/// Distance (coordinate units) at which a point stops counting as close.
pub const CLOSE_DISTANCE_THRESHOLD: f64 = 1.0;

/// An edge `points[index]..points[index + 1]` with its dilated envelope.
#[derive(Debug, Clone)]
struct EdgeBox {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EdgeBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Bounding box of an edge grown by twice its extent on every side.
fn dilated_box(a: [f64; 2], b: [f64; 2]) -> AABB<[f64; 2]> {
    let (min_x, max_x) = (a[0].min(b[0]), a[0].max(b[0]));
    let (min_y, max_y) = (a[1].min(b[1]), a[1].max(b[1]));
    let dx = (max_x - min_x) * 2.0;
    let dy = (max_y - min_y) * 2.0;
    AABB::from_corners([min_x - dx, min_y - dy], [max_x + dx, max_y + dy])
}

/// Closest point to `p` on the segment `a`-`b`.
pub fn closest_point(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> [f64; 2] {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let mag = ab[0] * ab[0] + ab[1] * ab[1];
    if mag == 0.0 {
        return a;
    }
    let t = (ap[0] * ab[0] + ap[1] * ab[1]) / mag;
    if t <= 0.0 {
        a
    } else if t >= 1.0 {
        b
    } else {
        [a[0] + ab[0] * t, a[1] + ab[1] * t]
    }
}

/// Distance from `p` to the segment `a`-`b`.
pub fn distance_to_line(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    planar_distance(closest_point(a, b, p), p)
}

/// `max(0, 1 - d / threshold)` where `d` is the distance of `p` to `a`-`b`.
pub fn distance_similarity(a: [f64; 2], b: [f64; 2], p: [f64; 2], threshold: f64) -> f64 {
    let r = 1.0 - distance_to_line(a, b, p) / threshold;
    r.max(0.0)
}

/// Mean distance similarity of `b0` and `b1` to the segment `a0`-`a1`.
pub fn line_distance_similarity(
    a0: [f64; 2],
    a1: [f64; 2],
    b0: [f64; 2],
    b1: [f64; 2],
    threshold: f64,
) -> f64 {
    (distance_similarity(a0, a1, b0, threshold) + distance_similarity(a0, a1, b1, threshold)) * 0.5
}

/// Normal `(A, B)` of the line through `p1` and `p2`.
pub fn line_normal(p1: [f64; 2], p2: [f64; 2]) -> [f64; 2] {
    [p1[1] - p2[1], p2[0] - p1[0]]
}

/// `|cos|` of the angle between the two edges.
///
/// Two zero-length edges are aligned; one zero-length edge is not.
pub fn angle_similarity(a0: [f64; 2], a1: [f64; 2], b0: [f64; 2], b1: [f64; 2]) -> f64 {
    let na = line_normal(a0, a1);
    let nb = line_normal(b0, b1);
    let la = na[0] * na[0] + na[1] * na[1];
    let lb = nb[0] * nb[0] + nb[1] * nb[1];
    match (la == 0.0, lb == 0.0) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => ((na[0] * nb[0] + na[1] * nb[1]).abs() / (la * lb).sqrt()).min(1.0),
    }
}

/// Similarity of edge `b0`-`b1` to edge `a0`-`a1`, in `[0, 1]`.
///
/// # Example
/// ```
/// use tracktotrip::similarity::{CLOSE_DISTANCE_THRESHOLD, line_similarity};
/// let same = line_similarity([0.0, 0.0], [5.0, 2.0], [0.0, 0.0], [5.0, 2.0], CLOSE_DISTANCE_THRESHOLD);
/// assert_eq!(same, 1.0);
/// let crossing = line_similarity([0.0, 0.0], [1.0, 1.0], [1.0, 0.0], [0.0, 1.0], CLOSE_DISTANCE_THRESHOLD);
/// assert_eq!(crossing, 0.0);
/// ```
pub fn line_similarity(
    a0: [f64; 2],
    a1: [f64; 2],
    b0: [f64; 2],
    b1: [f64; 2],
    threshold: f64,
) -> f64 {
    line_distance_similarity(a0, a1, b0, b1, threshold) * angle_similarity(a0, a1, b0, b1)
}

/// How well `b` is covered by `a`: the mean score plus one score per edge of `b`.
///
/// Fewer than two points on either side yields `(0.0, [])`.
pub fn segment_similarity(a: &[Point], b: &[Point]) -> (f64, Vec<f64>) {
    segment_similarity_with_threshold(a, b, CLOSE_DISTANCE_THRESHOLD)
}

/// [`segment_similarity`] with an explicit closeness threshold.
pub fn segment_similarity_with_threshold(a: &[Point], b: &[Point], threshold: f64) -> (f64, Vec<f64>) {
    if a.len() < 2 || b.len() < 2 {
        return (0.0, Vec::new());
    }
    let a_coords: Vec<[f64; 2]> = a.iter().map(Point::gen2arr).collect();
    let b_coords: Vec<[f64; 2]> = b.iter().map(Point::gen2arr).collect();

    let tree = RTree::bulk_load(
        a_coords
            .windows(2)
            .enumerate()
            .map(|(index, w)| EdgeBox {
                index,
                envelope: dilated_box(w[0], w[1]),
            })
            .collect(),
    );

    let per_edge: Vec<f64> = b_coords
        .windows(2)
        .map(|w| {
            let query = dilated_box(w[0], w[1]);
            tree.locate_in_envelope_intersecting(&query)
                .map(|edge| {
                    line_similarity(
                        a_coords[edge.index],
                        a_coords[edge.index + 1],
                        w[0],
                        w[1],
                        threshold,
                    )
                })
                .fold(0.0, f64::max)
        })
        .collect();

    let mean = per_edge.iter().sum::<f64>() / per_edge.len() as f64;
    (mean.clamp(0.0, 1.0), per_edge)
}

/// Interleave `b`'s points into `a`'s path.
///
/// Walks `a`'s edges; before each next `a` point, appends `b` points while they
/// are not farther from the current `a` point than the edge is long. Every
/// input point appears exactly once.
pub fn sort_segment_points(a: &[Point], b: &[Point]) -> Vec<Point> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let Some(first) = a.first() else {
        return b.to_vec();
    };
    merged.push(*first);

    let mut cursor = 0usize;
    for w in a.windows(2) {
        let edge = planar_distance(w[0].gen2arr(), w[1].gen2arr());
        while cursor < b.len() && planar_distance(w[0].gen2arr(), b[cursor].gen2arr()) <= edge {
            merged.push(b[cursor]);
            cursor += 1;
        }
        merged.push(w[1]);
    }
    merged.extend_from_slice(&b[cursor..]);

    debug!(
        "[Similarity] merged {} + {} points into {}",
        a.len(),
        b.len(),
        merged.len()
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilated_box_grows_by_twice_extent() {
        let bbox = dilated_box([1.0, 1.0], [2.0, 3.0]);
        assert_eq!(bbox.lower(), [-1.0, -3.0]);
        assert_eq!(bbox.upper(), [4.0, 7.0]);
    }

    #[test]
    fn test_closest_point_degenerate_edge() {
        assert_eq!(closest_point([1.0, 1.0], [1.0, 1.0], [5.0, 5.0]), [1.0, 1.0]);
    }
}
