//! Kalman smoothing of point sequences.
//!
//! Both strategies run the EM-fitted constant-velocity smoother from
//! [`kalman`]; they differ in how they compensate for the cold start at the
//! head of the sequence.

pub mod kalman;

use crate::{OptionExt, Point, Result, TripError};
use kalman::{KalmanParams, ObsVec};
use log::debug;

/// Default number of synthetic points prepended by [`SmoothStrategy::Extrapolate`].
pub const DEFAULT_EXTRAPOLATED_POINTS: usize = 30;

/// Head points of the reversed half that are discarded by [`SmoothStrategy::Inverse`].
pub const NOISE_SAMPLE: usize = 20;

/// Default EM iterations.
pub const DEFAULT_EM_ITERATIONS: usize = 10;

/// How the smoother warms up its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothStrategy {
    /// Smooth the reversed first half too and stitch its head onto the forward run.
    Inverse,
    /// Prepend `n_points` back-extrapolated points, smooth, drop them again.
    Extrapolate { n_points: usize },
}

impl Default for SmoothStrategy {
    fn default() -> Self {
        SmoothStrategy::Extrapolate {
            n_points: DEFAULT_EXTRAPOLATED_POINTS,
        }
    }
}

impl SmoothStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothStrategy::Inverse => "inverse",
            SmoothStrategy::Extrapolate { .. } => "extrapolate",
        }
    }
}

impl std::fmt::Display for SmoothStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Smooth `points` with the given strategy.
///
/// `noise` scales the fitted observation covariance: higher values smooth
/// more. Times are preserved and the output has the input's length.
/// Sequences with fewer than two points are returned unchanged.
///
/// # Example
/// ```
/// use tracktotrip::{Point, SmoothStrategy, smooth};
/// let points: Vec<Point> = (0..40)
///     .map(|i| Point::at_epoch_seconds(41.15 + i as f64 * 1e-4, -8.61, i as f64))
///     .collect();
/// let smoothed = smooth(&points, 1.0, SmoothStrategy::Inverse, 5).unwrap();
/// assert_eq!(smoothed.len(), points.len());
/// ```
pub fn smooth(
    points: &[Point],
    noise: f64,
    strategy: SmoothStrategy,
    n_iter: usize,
) -> Result<Vec<Point>> {
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(TripError::invalid_config(format!(
            "smoothing noise must be a non-negative number, got {noise}"
        )));
    }
    if points.len() < 2 {
        return Ok(points.to_vec());
    }
    debug!(
        "[Smooth] {} points, strategy={}, noise={}, iterations={}",
        points.len(),
        strategy,
        noise,
        n_iter
    );
    match strategy {
        SmoothStrategy::Inverse => with_inverse(points, noise, n_iter),
        SmoothStrategy::Extrapolate { n_points } => {
            with_extrapolation(points, noise, n_points, n_iter)
        }
    }
}

/// Smooth with a back-extrapolated warm-up prefix.
pub fn with_extrapolation(
    points: &[Point],
    noise: f64,
    n_points: usize,
    n_iter: usize,
) -> Result<Vec<Point>> {
    let mut extended = extrapolate_points(points, n_points);
    let prefix = extended.len();
    extended.extend_from_slice(points);
    let smoothed = kalman_smooth(&extended, noise, n_iter)?;
    let total = smoothed.len();
    Ok(smoothed
        .get(prefix..)
        .ok_or_insufficient_points("extrapolated smoothing", total, prefix)?
        .to_vec())
}

/// Smooth forward and on the reversed first half, then stitch.
pub fn with_inverse(points: &[Point], noise: f64, n_iter: usize) -> Result<Vec<Point>> {
    let half = points.len() / 2;
    let break_point = half.saturating_sub(NOISE_SAMPLE);

    let reversed_half: Vec<Point> = points[..half].iter().rev().copied().collect();
    let mut part = kalman_smooth(&reversed_half, noise, n_iter)?;
    part.reverse();
    let total = kalman_smooth(points, noise, n_iter)?;

    let mut result = Vec::with_capacity(points.len());
    result.extend_from_slice(&part[..break_point]);
    result.extend_from_slice(&total[break_point..]);
    Ok(result)
}

/// Synthetic points continuing the sequence backwards in time, oldest first.
///
/// Uses the mean per-step position delta and the mean time step of `points`.
pub fn extrapolate_points(points: &[Point], n_points: usize) -> Vec<Point> {
    if points.len() < 2 || n_points == 0 {
        return Vec::new();
    }
    let steps = (points.len() - 1) as f64;
    let (mut dlat, mut dlon, mut dt) = (0.0, 0.0, 0.0);
    for w in points.windows(2) {
        dlat += w[0].lat - w[1].lat;
        dlon += w[0].lon - w[1].lon;
        dt += w[1].timestamp() - w[0].timestamp();
    }
    let (dlat, dlon, dt) = (dlat / steps, dlon / steps, dt / steps);

    let first = points[0];
    let origin = first.timestamp();
    let mut generated: Vec<Point> = (1..=n_points)
        .map(|k| {
            let k = k as f64;
            Point::at_epoch_seconds(first.lat + dlat * k, first.lon + dlon * k, origin - dt * k)
        })
        .collect();
    generated.reverse();
    generated
}

/// Fit the constant-velocity model by EM and return RTS-smoothed positions.
pub fn kalman_smooth(points: &[Point], noise: f64, n_iter: usize) -> Result<Vec<Point>> {
    if points.len() < 2 {
        return Ok(points.to_vec());
    }

    // Work relative to the first point to keep covariances well scaled.
    let origin = points[0];
    let observations: Vec<ObsVec> = points
        .iter()
        .map(|p| ObsVec::new(p.lat - origin.lat, p.lon - origin.lon))
        .collect();

    let dt = mean_step(points);
    let initial = KalmanParams::constant_velocity(dt, observations[0]);
    let mut params = kalman::em(&observations, &initial, n_iter)?;
    params.observation_cov *= noise;

    let states = kalman::rts_smooth(&observations, &params)?;
    Ok(points
        .iter()
        .zip(states.means.iter())
        .map(|(p, state)| p.with_position(state[0] + origin.lat, state[1] + origin.lon))
        .collect())
}

/// Mean of the positive time steps, 1 s when there are none.
fn mean_step(points: &[Point]) -> f64 {
    let positive: Vec<f64> = points
        .windows(2)
        .map(|w| w[0].time_difference(&w[1]))
        .filter(|dt| *dt > 0.0)
        .collect();
    if positive.is_empty() {
        1.0
    } else {
        positive.iter().sum::<f64>() / positive.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_step_ignores_zero_gaps() {
        let points = vec![
            Point::at_epoch_seconds(0.0, 0.0, 0.0),
            Point::at_epoch_seconds(0.0, 0.0, 0.0),
            Point::at_epoch_seconds(0.0, 0.0, 4.0),
        ];
        assert_eq!(mean_step(&points), 4.0);
    }

    #[test]
    fn test_mean_step_defaults_to_one_second() {
        let points = vec![
            Point::at_epoch_seconds(0.0, 0.0, 7.0),
            Point::at_epoch_seconds(1.0, 0.0, 7.0),
        ];
        assert_eq!(mean_step(&points), 1.0);
    }
}
