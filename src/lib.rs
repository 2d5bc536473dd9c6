//! # Track to Trip
//!
//! Turns raw GPS tracks into trips: denoised, smoothed, segmented at stays,
//! simplified, and annotated with transportation modes and semantic locations.
//!
//! This library provides:
//! - Point metrics and a flat/haversine dual-mode distance
//! - Outlier and noise filters
//! - An EM-fitted Kalman smoother (inverse and extrapolation strategies)
//! - Spatio-temporal segmentation with DBSCAN
//! - Douglas-Peucker and time-aware trajectory compression
//! - Changepoint-based transportation mode inference over an injected classifier
//! - R-tree accelerated segment similarity, merging and trip learning
//! - Location inference against a caller-owned knowledge base
//!
//! ## Features
//!
//! - **`parallel`** - Score canonical trips in parallel with rayon while learning
//! - **`synthetic`** - Synthetic track generator for tests and benchmarks
//!
//! ## Quick Start
//!
//! ```rust
//! use tracktotrip::{Point, Segment, Track, compression::drp};
//!
//! let points: Vec<Point> = (0..10)
//!     .map(|i| Point::at_epoch_seconds(41.15 + i as f64 * 0.0001, -8.61, i as f64 * 5.0))
//!     .collect();
//!
//! let simplified = drp(&points, 1e-6);
//! assert_eq!(simplified.len(), 2);
//!
//! let track = Track::from_segments("commute", vec![Segment::new(points)]);
//! assert_eq!(track.point_count(), 10);
//! ```

use chrono::{DateTime, TimeZone, Utc};
use rstar::AABB;
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TripError};

// Distance functions and coordinate helpers
pub mod geo_utils;

// Metric computation and destructive cleanup
pub mod preprocess;
pub use preprocess::preprocess_segment;

// Outlier and direction-based noise removal
pub mod noise;
pub use noise::{DirectionNoiseFilter, NoiseFilter, NoiseStrategy, TemporalOutlierFilter};

// Kalman smoothing
pub mod smooth;
pub use smooth::{SmoothStrategy, smooth};

// DBSCAN based stay detection
pub mod segmentation;
pub use segmentation::segment_points;

// Trajectory compression
pub mod compression;
pub use compression::{SimplifyStrategy, simplify};

// Transportation mode inference
pub mod transportation;
pub use transportation::{
    Classifier, FeatureExtractor, ModeConfig, NaiveThresholds, TransportationMode, infer_modes,
};

// Segment similarity and point merging
pub mod similarity;
pub use similarity::{line_similarity, segment_similarity, sort_segment_points};

// Canonical trip learning
pub mod learning;
pub use learning::{
    CanonicalStore, CanonicalTrip, LearnConfig, LearnOutcome, TripCompletion, complete_trip,
    learn_trip,
};

// Semantic locations
pub mod location;
pub use location::{
    CachedProvider, Location, LocationCandidate, LocationConfig, LocationQuery, LocationSource,
    LocationStore, PlaceProvider, infer_location,
};

// Data model
pub mod segment;
pub use segment::Segment;
pub mod track;
pub use track::{SegmentPairing, Track};

// Synthetic data generation for tests and benchmarks
#[cfg(feature = "synthetic")]
pub mod synthetic;

// ============================================================================
// Core Types
// ============================================================================

/// A spatio-temporal GPS point.
///
/// `dt`, `vel` and `acc` are derived from the previous point of a sequence and
/// are only meaningful after [`Point::compute_metrics`] (or
/// [`Segment::compute_metrics`]) has run over the current ordering.
///
/// # Example
/// ```
/// use tracktotrip::Point;
/// let a = Point::at_epoch_seconds(41.1500, -8.6100, 0.0);
/// let b = Point::at_epoch_seconds(41.1509, -8.6100, 10.0).compute_metrics(&a);
/// assert!((b.dt - 10.0).abs() < 1e-9);
/// assert!(b.vel > 30.0 && b.vel < 40.0); // ~100 m in 10 s
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    /// Seconds since the previous point
    #[serde(skip)]
    pub dt: f64,
    /// Velocity in km/h relative to the previous point
    #[serde(skip)]
    pub vel: f64,
    /// Change in velocity (km/h) per second
    #[serde(skip)]
    pub acc: f64,
}

impl Point {
    /// Create a point with zeroed metrics.
    pub fn new(lat: f64, lon: f64, time: DateTime<Utc>) -> Self {
        Self {
            lat,
            lon,
            time,
            dt: 0.0,
            vel: 0.0,
            acc: 0.0,
        }
    }

    /// Create a point from seconds (with fraction) since the Unix epoch.
    pub fn at_epoch_seconds(lat: f64, lon: f64, seconds: f64) -> Self {
        let whole = seconds.floor();
        let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
        let time = Utc
            .timestamp_opt(whole as i64, nanos)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(lat, lon, time)
    }

    /// Same time, new position. Metrics are reset.
    pub fn with_position(&self, lat: f64, lon: f64) -> Self {
        Self::new(lat, lon, self.time)
    }

    /// Seconds since the Unix epoch, with sub-second precision.
    pub fn timestamp(&self) -> f64 {
        self.time.timestamp() as f64 + f64::from(self.time.timestamp_subsec_nanos()) * 1e-9
    }

    /// `[lon, lat]`, the planar (x, y) used by the geometric algorithms.
    pub fn gen2arr(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    /// `[lon, lat, timestamp]`.
    pub fn gen3arr(&self) -> [f64; 3] {
        [self.lon, self.lat, self.timestamp()]
    }

    /// Distance in meters, see [`geo_utils::distance`].
    pub fn distance(&self, other: &Point) -> f64 {
        geo_utils::distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Absolute time difference in seconds.
    pub fn time_difference(&self, other: &Point) -> f64 {
        (self.timestamp() - other.timestamp()).abs()
    }

    /// Compute `dt`, `vel` and `acc` relative to `previous`.
    pub fn compute_metrics(mut self, previous: &Point) -> Self {
        let dt = self.time_difference(previous);
        let (vel, acc) = if dt != 0.0 {
            let vel = self.distance(previous) / dt * 3.6;
            (vel, (vel - previous.vel) / dt)
        } else {
            (0.0, 0.0)
        };
        self.dt = dt;
        self.vel = vel;
        self.acc = acc;
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Bounding box of a point sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Create bounds from points. `None` when empty.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut bounds = Self {
            min_lat: f64::MAX,
            max_lat: f64::MIN,
            min_lon: f64::MAX,
            max_lon: f64::MIN,
        };
        for p in points {
            bounds.extend(p);
        }
        Some(bounds)
    }

    /// Grow to include a point.
    pub fn extend(&mut self, p: &Point) {
        self.min_lat = self.min_lat.min(p.lat);
        self.max_lat = self.max_lat.max(p.lat);
        self.min_lon = self.min_lon.min(p.lon);
        self.max_lon = self.max_lon.max(p.lon);
    }

    /// Smallest bounds containing both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Center of the box as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// R-tree envelope in `[lon, lat]` order.
    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lon, self.min_lat], [self.max_lon, self.max_lat])
    }
}

/// Parameters for [`Track::to_trip`].
#[derive(Debug, Clone)]
pub struct TripConfig {
    /// Smoothing strategy. Default: extrapolate 30 points
    pub smooth_strategy: SmoothStrategy,
    /// Expected noise; scales the fitted observation covariance. Default: 1.0
    pub smooth_noise: f64,
    /// EM iterations for the smoother. Default: 10
    pub smooth_iterations: usize,
    /// DBSCAN radius in standardized units. Default: 0.15
    pub seg_eps: f64,
    /// Minimum stay duration, seconds. Default: 80.0
    pub seg_min_time: f64,
    /// Speed error tolerated by `td_sp`, km/h. Default: 5.0
    pub simplify_speed_threshold: f64,
    /// Douglas-Peucker tolerance in degrees for topology-only simplification.
    /// Default: 1e-5 (~1 m)
    pub simplify_epsilon: f64,
    /// Acceleration above which preprocessing clamps a point. Default: 20.0
    pub max_acc: f64,
    /// Name format used when no name is given. Default: "%Y-%m-%d"
    pub name_format: String,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            smooth_strategy: SmoothStrategy::default(),
            smooth_noise: 1.0,
            smooth_iterations: 10,
            seg_eps: 0.15,
            seg_min_time: 80.0,
            simplify_speed_threshold: 5.0,
            simplify_epsilon: 1e-5,
            max_acc: 20.0,
            name_format: "%Y-%m-%d".to_string(),
        }
    }
}
