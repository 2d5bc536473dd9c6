//! Distance functions and coordinate helpers.
//!
//! Distances switch between a flat-earth approximation for nearby points and
//! the haversine formula for everything else. The 0.2 degree switchover is
//! part of the numeric contract: velocities, accelerations and every threshold
//! downstream are computed through [`distance`].

use crate::{Bounds, Point};
use geo::{Centroid, Distance, Haversine, MultiPoint, point};

/// Meters per degree of latitude used by the flat-earth approximation.
pub const ONE_DEGREE: f64 = 1000.0 * 10000.8 / 90.0;

/// Largest per-axis separation (degrees) handled by the flat-earth formula.
pub const FLAT_EARTH_LIMIT: f64 = 0.2;

/// Decimal-degree precision of a person-scale position (~11 cm).
pub const PRECISION_PERSON: usize = 6;

// Meters per 10^-precision degrees at 0/23/45/67 degrees of latitude.
const PRECISION_TABLE: [[f64; 4]; 9] = [
    [111.32 * 1000.0, 102.47 * 1000.0, 78.71 * 1000.0, 43.496 * 1000.0],
    [11.132 * 1000.0, 10.247 * 1000.0, 7.871 * 1000.0, 4.3496 * 1000.0],
    [1.1132 * 1000.0, 1.0247 * 1000.0, 787.1, 434.96 * 1000.0],
    [111.32, 102.47, 78.71, 43.496 * 1000.0],
    [11.132, 10.247, 7.871, 4.3496 * 1000.0],
    [1.1132, 1.0247, 787.1 / 1000.0, 434.96 / 1000.0],
    [111.32 / 1000.0, 102.47 / 1000.0, 78.71 / 1000.0, 43.496 / 1000.0],
    [11.132 / 1000.0, 10.247 / 1000.0, 7.871 / 1000.0, 4.3496 / 1000.0],
    [
        1.1132 / 1000.0,
        1.0247 / 1000.0,
        787.1 / (1000.0 * 1000.0),
        434.96 / (1000.0 * 1000.0),
    ],
];

/// Distance in meters between two coordinates.
///
/// Uses [`flat_distance`] when both `|Δlat|` and `|Δlon|` are at most
/// [`FLAT_EARTH_LIMIT`], [`haversine_distance`] otherwise.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if (lat2 - lat1).abs() <= FLAT_EARTH_LIMIT && (lon2 - lon1).abs() <= FLAT_EARTH_LIMIT {
        flat_distance(lat1, lon1, lat2, lon2)
    } else {
        haversine_distance(lat1, lon1, lat2, lon2)
    }
}

/// Equirectangular approximation scaled by [`ONE_DEGREE`].
///
/// Longitude is scaled by the cosine of the mean latitude so that the result
/// does not depend on argument order.
pub fn flat_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1) * ((lat1 + lat2) / 2.0).to_radians().cos();
    (dlat * dlat + dlon * dlon).sqrt() * ONE_DEGREE
}

/// Great-circle distance in meters on geo's mean earth radius.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine::distance(point!(x: lon1, y: lat1), point!(x: lon2, y: lat2))
}

/// Rough conversion of meters to degrees at the given decimal precision.
///
/// Precisions above 8 are treated as 8.
pub fn estimate_meters_to_deg(meters: f64, precision: usize) -> f64 {
    let precision = precision.min(PRECISION_TABLE.len() - 1);
    let line = PRECISION_TABLE[precision];
    let dec = 1.0 / 10f64.powi(precision as i32);
    meters / line[3] * dec
}

/// Bounding box of a point sequence, `None` when empty.
pub fn compute_bounds(points: &[Point]) -> Option<Bounds> {
    Bounds::from_points(points)
}

/// Mean position of the points as `(lat, lon)`. `None` when empty.
pub fn centroid(points: &[Point]) -> Option<(f64, f64)> {
    let multi: MultiPoint<f64> = points.iter().map(|p| point!(x: p.lon, y: p.lat)).collect();
    multi.centroid().map(|c| (c.y(), c.x()))
}

/// Euclidean distance between two `[x, y]` pairs in coordinate units.
pub fn planar_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_clamped() {
        assert_eq!(estimate_meters_to_deg(10.0, 12), estimate_meters_to_deg(10.0, 8));
    }

    #[test]
    fn test_flat_distance_symmetric() {
        let d1 = flat_distance(41.15, -8.61, 41.16, -8.60);
        let d2 = flat_distance(41.16, -8.60, 41.15, -8.61);
        assert_eq!(d1, d2);
    }
}
