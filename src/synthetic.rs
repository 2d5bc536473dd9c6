//! Synthetic GPS track generator for tests and benchmarking.
//!
//! Generates timestamped tracks made of moves and stays, with the index
//! ranges of every stay kept as ground truth for segmentation.
//!
//! Feature-gated behind `synthetic`.
//!
//! # Example
//!
//! ```rust
//! use tracktotrip::synthetic::{Leg, PathPattern, SyntheticScenario};
//!
//! let scenario = SyntheticScenario {
//!     legs: vec![
//!         Leg::Move { length_meters: 1_000.0, speed_kmh: 30.0, pattern: PathPattern::Straight },
//!         Leg::Stay { duration_seconds: 300.0 },
//!         Leg::Move { length_meters: 500.0, speed_kmh: 5.0, pattern: PathPattern::Winding },
//!     ],
//!     ..SyntheticScenario::default()
//! };
//!
//! let generated = scenario.generate();
//! assert_eq!(generated.stays.len(), 1);
//! assert!(generated.points.windows(2).all(|w| w[0].time < w[1].time));
//! ```

use crate::{Point, Segment, Track};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

// ============================================================================
// Types
// ============================================================================

/// Heading behavior of a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathPattern {
    /// Straight line with a slight drift.
    Straight,
    /// Winding road, at most ~20 degrees of heading change per sample.
    Winding,
}

/// One leg of a scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Leg {
    /// Travel `length_meters` at a constant speed.
    Move {
        length_meters: f64,
        speed_kmh: f64,
        pattern: PathPattern,
    },
    /// Stay in place; only GPS noise moves the points.
    Stay { duration_seconds: f64 },
}

/// Scenario configuration for a synthetic track.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    /// Starting `(lat, lon)`.
    pub origin: (f64, f64),
    /// Seconds since the Unix epoch of the first point.
    pub start_time: f64,
    /// Seconds between samples.
    pub sample_interval: f64,
    pub legs: Vec<Leg>,
    /// GPS noise standard deviation in meters.
    pub gps_noise_sigma_meters: f64,
    /// RNG seed for deterministic reproduction.
    pub seed: u64,
}

impl Default for SyntheticScenario {
    fn default() -> Self {
        Self {
            origin: (41.1579, -8.6291),
            // 2017-03-01T08:00:00Z
            start_time: 1_488_355_200.0,
            sample_interval: 5.0,
            legs: Vec::new(),
            gps_noise_sigma_meters: 3.0,
            seed: 42,
        }
    }
}

/// A generated track with ground truth.
#[derive(Debug, Clone)]
pub struct SyntheticTrack {
    pub points: Vec<Point>,
    /// Inclusive index ranges of every stay leg.
    pub stays: Vec<(usize, usize)>,
}

impl SyntheticTrack {
    /// Wrap the points in a single-segment track.
    pub fn into_track(self, name: &str) -> Track {
        Track::from_segments(name, vec![Segment::new(self.points)])
    }
}

// ============================================================================
// Coordinate Helpers
// ============================================================================

/// Meters per degree of latitude (approximately constant).
const METERS_PER_DEG_LAT: f64 = 111_320.0;

fn meters_to_deg_lat(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

fn meters_to_deg_lon(meters: f64, latitude: f64) -> f64 {
    let meters_per_deg_lon = METERS_PER_DEG_LAT * latitude.to_radians().cos();
    if meters_per_deg_lon.abs() < 1e-10 {
        return 0.0;
    }
    meters / meters_per_deg_lon
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> (f64, f64) {
    let u1: f64 = rng.gen_range(0.0001..1.0);
    let u2: f64 = rng.r#gen();
    let r = (-2.0 * u1.ln()).sqrt();
    (r * (2.0 * PI * u2).cos(), r * (2.0 * PI * u2).sin())
}

// ============================================================================
// Scenario Implementation
// ============================================================================

impl SyntheticScenario {
    /// A commute: walk, ride, stay at work, ride back.
    pub fn commute(seed: u64) -> Self {
        Self {
            legs: vec![
                Leg::Move {
                    length_meters: 400.0,
                    speed_kmh: 5.0,
                    pattern: PathPattern::Winding,
                },
                Leg::Move {
                    length_meters: 6_000.0,
                    speed_kmh: 40.0,
                    pattern: PathPattern::Straight,
                },
                Leg::Stay {
                    duration_seconds: 600.0,
                },
                Leg::Move {
                    length_meters: 6_000.0,
                    speed_kmh: 40.0,
                    pattern: PathPattern::Winding,
                },
            ],
            seed,
            ..Self::default()
        }
    }

    /// Generate the track. Timestamps increase strictly.
    pub fn generate(&self) -> SyntheticTrack {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let interval = self.sample_interval.max(1e-3);
        let (mut lat, mut lon) = self.origin;
        let mut time = self.start_time;
        let mut heading: f64 = rng.gen_range(0.0..(2.0 * PI));

        let mut clean: Vec<(f64, f64, f64)> = vec![(lat, lon, time)];
        let mut stays = Vec::new();

        for leg in &self.legs {
            match *leg {
                Leg::Move {
                    length_meters,
                    speed_kmh,
                    pattern,
                } => {
                    let step = (speed_kmh / 3.6 * interval).max(1e-3);
                    let samples = (length_meters / step).ceil() as usize;
                    for i in 0..samples {
                        heading += match pattern {
                            PathPattern::Straight => rng.gen_range(-0.02..0.02),
                            PathPattern::Winding => {
                                (i as f64 * 0.05).sin() * 0.2 + rng.gen_range(-0.15..0.15)
                            }
                        };
                        lat += meters_to_deg_lat(step * heading.sin());
                        lon += meters_to_deg_lon(step * heading.cos(), lat);
                        time += interval;
                        clean.push((lat, lon, time));
                    }
                }
                Leg::Stay { duration_seconds } => {
                    let start = clean.len() - 1;
                    let samples = (duration_seconds / interval).ceil() as usize;
                    for _ in 0..samples {
                        time += interval;
                        clean.push((lat, lon, time));
                    }
                    stays.push((start, clean.len() - 1));
                }
            }
        }

        let points = clean
            .into_iter()
            .map(|(lat, lon, t)| {
                let (lat, lon) = if self.gps_noise_sigma_meters > 0.0 {
                    let (z0, z1) = gaussian(&mut rng);
                    (
                        lat + meters_to_deg_lat(z0 * self.gps_noise_sigma_meters),
                        lon + meters_to_deg_lon(z1 * self.gps_noise_sigma_meters, lat),
                    )
                } else {
                    (lat, lon)
                };
                Point::at_epoch_seconds(lat, lon, t)
            })
            .collect();

        SyntheticTrack { points, stays }
    }
}
