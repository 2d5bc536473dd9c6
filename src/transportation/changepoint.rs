//! Exact changepoint detection with PELT.
//!
//! The cost of a segment is the Gaussian negative log-likelihood with a free
//! mean and a fixed variance taken from the whole signal:
//! `(Σx² − (Σx)²/n) / σ²`.

use crate::Point;
use serde::{Deserialize, Serialize};

/// Per-point signal fed to changepoint detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChangepointSignal {
    /// Raw velocity.
    Velocity,
    /// Velocity difference to the previous point, 0 for the first.
    #[default]
    VelocityDelta,
    /// Acceleration as computed by the metrics pass.
    Acceleration,
}

impl ChangepointSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangepointSignal::Velocity => "velocity",
            ChangepointSignal::VelocityDelta => "velocity_delta",
            ChangepointSignal::Acceleration => "acceleration",
        }
    }

    /// Signal values for `points`, one per point.
    pub fn compute(&self, points: &[Point]) -> Vec<f64> {
        match self {
            ChangepointSignal::Velocity => points.iter().map(|p| p.vel).collect(),
            ChangepointSignal::VelocityDelta => {
                let mut signal = Vec::with_capacity(points.len());
                if !points.is_empty() {
                    signal.push(0.0);
                }
                signal.extend(points.windows(2).map(|w| w[1].vel - w[0].vel));
                signal
            }
            ChangepointSignal::Acceleration => points
                .iter()
                .enumerate()
                .map(|(i, p)| if i == 0 { 0.0 } else { p.acc })
                .collect(),
        }
    }
}

impl std::fmt::Display for ChangepointSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ChangepointSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "velocity" => Ok(ChangepointSignal::Velocity),
            "velocity_delta" => Ok(ChangepointSignal::VelocityDelta),
            "acceleration" => Ok(ChangepointSignal::Acceleration),
            _ => Err(format!("Unknown changepoint signal: {}", s)),
        }
    }
}

/// Prefix sums giving O(1) segment costs.
struct NormalMeanCost {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    inv_variance: f64,
}

impl NormalMeanCost {
    fn new(signal: &[f64], variance: f64) -> Self {
        let mut sum = Vec::with_capacity(signal.len() + 1);
        let mut sum_sq = Vec::with_capacity(signal.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        for x in signal {
            sum.push(sum[sum.len() - 1] + x);
            sum_sq.push(sum_sq[sum_sq.len() - 1] + x * x);
        }
        Self {
            sum,
            sum_sq,
            inv_variance: 1.0 / variance,
        }
    }

    /// Cost of `signal[start..end]`.
    fn cost(&self, start: usize, end: usize) -> f64 {
        let n = (end - start) as f64;
        let s = self.sum[end] - self.sum[start];
        let s2 = self.sum_sq[end] - self.sum_sq[start];
        ((s2 - s * s / n) * self.inv_variance).max(0.0)
    }
}

/// Start indices of the optimal segmentation, sorted, always beginning at 0.
///
/// `penalty` defaults to `ln(n)`. Signals shorter than two values or with
/// zero variance have no changepoints.
///
/// # Example
/// ```
/// use tracktotrip::transportation::changepoint::changepoints;
/// let mut signal = vec![0.0; 20];
/// signal.extend(vec![10.0; 20]);
/// assert_eq!(changepoints(&signal, None), vec![0, 20]);
/// ```
pub fn changepoints(signal: &[f64], penalty: Option<f64>) -> Vec<usize> {
    let n = signal.len();
    if n < 2 {
        return vec![0];
    }
    let mean = signal.iter().sum::<f64>() / n as f64;
    let variance = signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    if !(variance > 0.0 && variance.is_finite()) {
        return vec![0];
    }
    let penalty = penalty.unwrap_or((n as f64).ln());
    let cost = NormalMeanCost::new(signal, variance);

    let mut best = vec![0.0; n + 1];
    let mut previous = vec![0usize; n + 1];
    best[0] = -penalty;
    let mut candidates: Vec<usize> = vec![0];

    for t in 1..=n {
        let scores: Vec<f64> = candidates
            .iter()
            .map(|&s| best[s] + cost.cost(s, t))
            .collect();
        let (arg, min) = scores
            .iter()
            .enumerate()
            .fold((0usize, f64::INFINITY), |acc, (i, &v)| {
                if v < acc.1 { (i, v) } else { acc }
            });
        best[t] = min + penalty;
        previous[t] = candidates[arg];

        let mut pruned: Vec<usize> = candidates
            .iter()
            .zip(scores.iter())
            .filter(|(_, score)| **score <= best[t])
            .map(|(s, _)| *s)
            .collect();
        pruned.push(t);
        candidates = pruned;
    }

    let mut result = Vec::new();
    let mut last = previous[n];
    result.push(last);
    while last > 0 {
        last = previous[last];
        result.push(last);
    }
    result.sort_unstable();
    result.dedup();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_of_constant_segment_is_zero() {
        let cost = NormalMeanCost::new(&[3.0, 3.0, 3.0, 5.0], 1.0);
        assert!(cost.cost(0, 3).abs() < 1e-12);
        assert!(cost.cost(0, 4) > 0.0);
    }

    #[test]
    fn test_flat_signal_has_no_changepoints() {
        assert_eq!(changepoints(&[1.0; 10], None), vec![0]);
        assert_eq!(changepoints(&[1.0], None), vec![0]);
    }
}
