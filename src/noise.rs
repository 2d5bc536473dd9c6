//! Outlier and noise removal.
//!
//! Two filters share the [`NoiseFilter`] capability:
//! - [`TemporalOutlierFilter`] drops points whose timestamp is out of order
//!   with respect to their immediate neighbors.
//! - [`DirectionNoiseFilter`] flags points where the direction signal jumps
//!   above a windowed `median + variance / var` threshold.
//!
//! Both always keep the first and last point and return sequences of length
//! two or less unchanged.

use crate::Point;
use log::debug;

/// A point filter that only ever removes points.
pub trait NoiseFilter {
    fn filter(&self, points: &[Point]) -> Vec<Point>;
}

/// Drops interior points not timestamped between their neighbors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalOutlierFilter;

impl NoiseFilter for TemporalOutlierFilter {
    fn filter(&self, points: &[Point]) -> Vec<Point> {
        remove_outliers(points)
    }
}

/// Direction-signal noise filter.
#[derive(Debug, Clone, Copy)]
pub struct DirectionNoiseFilter {
    /// Divisor applied to the window variance. Smaller is less sensitive.
    pub var: f64,
    /// Centered window size over the direction signal.
    pub window: usize,
}

impl Default for DirectionNoiseFilter {
    fn default() -> Self {
        Self { var: 2.0, window: 5 }
    }
}

impl NoiseFilter for DirectionNoiseFilter {
    fn filter(&self, points: &[Point]) -> Vec<Point> {
        remove_noise(points, self.var, self.window)
    }
}

/// Noise strategy selected by callers, resolved to a concrete filter once.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NoiseStrategy {
    #[default]
    TemporalOutliers,
    Direction { var: f64, window: usize },
}

impl NoiseStrategy {
    /// The filter implementing this strategy.
    pub fn resolve(&self) -> Box<dyn NoiseFilter> {
        match *self {
            NoiseStrategy::TemporalOutliers => Box::new(TemporalOutlierFilter),
            NoiseStrategy::Direction { var, window } => {
                Box::new(DirectionNoiseFilter { var, window })
            }
        }
    }
}

/// Drop any interior point whose time is not within `[prev.time, next.time]`.
///
/// Neighbors are the original ones, not the ones left after earlier drops.
pub fn remove_outliers(points: &[Point]) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let last = points.len() - 1;
    let kept: Vec<Point> = points
        .iter()
        .enumerate()
        .filter(|(i, p)| {
            if *i == 0 || *i == last {
                return true;
            }
            let prev = &points[i - 1];
            let next = &points[i + 1];
            prev.time <= p.time && p.time <= next.time
        })
        .map(|(_, p)| *p)
        .collect();

    if kept.len() != points.len() {
        debug!("[Noise] dropped {} temporal outliers", points.len() - kept.len());
    }
    kept
}

/// Remove points flagged by the direction signal.
pub fn remove_noise(points: &[Point], var: f64, window: usize) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let flagged = direction_noise_indices(points, var, window);
    if flagged.is_empty() {
        return points.to_vec();
    }
    debug!("[Noise] dropped {} direction outliers", flagged.len());

    let mut flags = vec![false; points.len()];
    for i in flagged {
        flags[i] = true;
    }
    points
        .iter()
        .zip(flags)
        .filter(|(_, noisy)| !noisy)
        .map(|(p, _)| *p)
        .collect()
}

/// Indices of points flagged by the direction signal, ascending.
///
/// Signal value `j` is the change between dot products `j` and `j + 1` and is
/// attributed to point `j`. A spike at point `k` moves dot products `k - 1`
/// and `k` together, so its jumps land at `k - 2` and `k`. Index 0 is skipped
/// and the signal stops short of the last point, so endpoints are never flagged.
pub fn direction_noise_indices(points: &[Point], var: f64, window: usize) -> Vec<usize> {
    if points.len() <= 2 {
        return Vec::new();
    }

    let units: Vec<[f64; 2]> = points
        .iter()
        .map(|p| {
            let norm = (p.lat * p.lat + p.lon * p.lon).sqrt();
            if norm > 0.0 {
                [p.lat / norm, p.lon / norm]
            } else {
                [0.0, 0.0]
            }
        })
        .collect();

    let dots: Vec<f64> = units
        .windows(2)
        .map(|w| w[0][0] * w[1][0] + w[0][1] * w[1][1])
        .collect();

    let mut signal: Vec<f64> = dots.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let max = signal.iter().cloned().fold(0.0, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }
    for v in signal.iter_mut() {
        *v /= max;
    }

    let half = window.max(1) / 2;
    let mut flagged = Vec::new();
    for (j, &value) in signal.iter().enumerate() {
        let start = j.saturating_sub(half);
        let end = (j + half + 1).min(signal.len());
        let sample = &signal[start..end];
        let threshold = median(sample) + variance(sample) / var;
        if j > 0 && value > threshold {
            flagged.push(j);
        }
    }
    flagged
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
    }

    #[test]
    fn test_variance_constant_is_zero() {
        assert_eq!(variance(&[0.5, 0.5, 0.5]), 0.0);
    }
}
