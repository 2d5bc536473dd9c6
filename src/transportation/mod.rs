//! Transportation mode inference.
//!
//! Two detectors coexist:
//! - [`naive_modes`] thresholds each point's velocity into stop, foot or
//!   vehicle and groups equal labels.
//! - [`infer_modes`] splits the sequence at changepoints of a derived signal,
//!   drops boundaries closer than `min_time`, and asks a [`Classifier`] to
//!   label each span.
//!
//! Both return contiguous spans: the first starts at 0, the last ends at the
//! final index, and each span's `to` is the next span's `from`.

pub mod changepoint;
pub mod classifier;
pub mod features;

pub use changepoint::{ChangepointSignal, changepoints};
pub use classifier::{Classifier, LabelProbabilities, predict_labels, top_label};
pub use features::{FeatureExtractor, MAX_VEL, extract_features, velocity_deciles};

use crate::{Point, Result, TripError};
use log::debug;
use serde::{Deserialize, Serialize};

/// A labelled span of point indices, both ends inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportationMode {
    pub label: String,
    pub from: usize,
    pub to: usize,
}

impl TransportationMode {
    pub fn new(label: impl Into<String>, from: usize, to: usize) -> Self {
        Self {
            label: label.into(),
            from,
            to,
        }
    }
}

/// Velocity buckets of the naive detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NaiveLabel {
    Stop,
    Foot,
    Vehicle,
}

impl NaiveLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NaiveLabel::Stop => "Stop",
            NaiveLabel::Foot => "Foot",
            NaiveLabel::Vehicle => "Vehicle",
        }
    }
}

impl std::fmt::Display for NaiveLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NaiveLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(NaiveLabel::Stop),
            "foot" => Ok(NaiveLabel::Foot),
            "vehicle" => Ok(NaiveLabel::Vehicle),
            _ => Err(format!("Unknown naive label: {}", s)),
        }
    }
}

/// Velocity thresholds (km/h) of the naive detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaiveThresholds {
    /// Below this a point is a stop. Default: 1.0
    pub stop: f64,
    /// Below this (and not a stop) a point is on foot. Default: 8.0
    pub walk: f64,
}

impl Default for NaiveThresholds {
    fn default() -> Self {
        Self {
            stop: 1.0,
            walk: 8.0,
        }
    }
}

impl NaiveThresholds {
    pub fn classify(&self, vel: f64) -> NaiveLabel {
        if vel < self.stop {
            NaiveLabel::Stop
        } else if vel < self.walk {
            NaiveLabel::Foot
        } else {
            NaiveLabel::Vehicle
        }
    }
}

/// Parameters for [`infer_modes`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModeConfig {
    /// Minimum span duration in seconds. Default: 60.0
    pub min_time: f64,
    /// Signal used for changepoint detection. Default: velocity delta
    pub signal: ChangepointSignal,
    /// PELT penalty, `ln(n)` when `None`. Default: None
    pub penalty: Option<f64>,
    /// Fallback labels for spans without time. Default: 1.0 / 8.0 km/h
    pub naive: NaiveThresholds,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            min_time: 60.0,
            signal: ChangepointSignal::default(),
            penalty: None,
            naive: NaiveThresholds::default(),
        }
    }
}

/// Label every point by velocity and group equal neighbors.
pub fn naive_modes(points: &[Point], thresholds: &NaiveThresholds) -> Vec<TransportationMode> {
    let mut spans: Vec<TransportationMode> = Vec::new();
    for (i, p) in points.iter().enumerate() {
        let label = thresholds.classify(p.vel).as_str();
        match spans.last_mut() {
            Some(span) if span.label == label => span.to = i,
            Some(span) => {
                span.to = i;
                spans.push(TransportationMode::new(label, i, i));
            }
            None => spans.push(TransportationMode::new(label, i, i)),
        }
    }
    spans
}

/// Merge adjacent spans with the same label.
///
/// The merged span keeps the first `from`; the last span ends where the
/// input's last span ended.
pub fn group_modes(spans: &[TransportationMode]) -> Vec<TransportationMode> {
    let Some(last) = spans.last() else {
        return Vec::new();
    };
    let mut grouped: Vec<TransportationMode> = Vec::new();
    for span in spans {
        match grouped.last_mut() {
            Some(running) if running.label == span.label => running.to = span.to,
            Some(running) => {
                running.to = span.from;
                grouped.push(span.clone());
            }
            None => grouped.push(span.clone()),
        }
    }
    if let Some(running) = grouped.last_mut() {
        running.to = last.to;
    }
    grouped
}

/// Changepoint-based transportation mode inference.
///
/// Fails with [`TripError::MissingClassifier`] without a classifier. Empty
/// input gives no spans; a single point gives one naive span `(0, 0)`.
pub fn infer_modes(
    classifier: Option<&dyn Classifier>,
    points: &[Point],
    config: &ModeConfig,
) -> Result<Vec<TransportationMode>> {
    let classifier = classifier.ok_or(TripError::MissingClassifier)?;
    if points.is_empty() {
        return Ok(Vec::new());
    }
    let last = points.len() - 1;
    if last == 0 {
        let label = config.naive.classify(points[0].vel);
        return Ok(vec![TransportationMode::new(label.as_str(), 0, 0)]);
    }

    let signal = config.signal.compute(points);
    let candidates = changepoints(&signal, config.penalty);
    let boundaries = filter_boundaries(points, &candidates, config.min_time);
    debug!(
        "[Transportation] {} changepoints, {} spans after min_time={}s",
        candidates.len(),
        boundaries.len() - 1,
        config.min_time
    );

    let extractor = classifier.feature_extractor();
    let mut spans: Vec<TransportationMode> = Vec::with_capacity(boundaries.len() - 1);
    let mut features: Vec<Vec<f64>> = Vec::new();
    let mut pending: Vec<usize> = Vec::new();

    for w in boundaries.windows(2) {
        let (from, to) = (w[0], w[1]);
        let span_points = &points[from + 1..=to];
        let f = extractor.extract(span_points);
        if f.is_empty() {
            let mean_vel =
                span_points.iter().map(|p| p.vel).sum::<f64>() / span_points.len() as f64;
            spans.push(TransportationMode::new(
                config.naive.classify(mean_vel).as_str(),
                from,
                to,
            ));
        } else {
            pending.push(spans.len());
            features.push(f);
            spans.push(TransportationMode::new(String::new(), from, to));
        }
    }

    let labels = predict_labels(classifier, &features)?;
    for (index, label) in pending.into_iter().zip(labels) {
        spans[index].label = label;
    }

    Ok(group_modes(&spans))
}

/// Keep changepoints at least `min_time` apart, always starting at 0 and
/// ending at the last index. A too short final span absorbs its predecessor.
fn filter_boundaries(points: &[Point], candidates: &[usize], min_time: f64) -> Vec<usize> {
    let last = points.len() - 1;
    let mut kept = vec![0usize];
    for &c in candidates {
        if c == 0 || c >= last {
            continue;
        }
        let previous = kept[kept.len() - 1];
        if points[c].time_difference(&points[previous]) >= min_time {
            kept.push(c);
        }
    }
    if kept.len() > 1 {
        let previous = kept[kept.len() - 1];
        if points[last].time_difference(&points[previous]) < min_time {
            kept.pop();
        }
    }
    kept.push(last);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(n: usize, step: f64) -> Vec<Point> {
        (0..n)
            .map(|i| Point::at_epoch_seconds(0.0, 0.0, i as f64 * step))
            .collect()
    }

    #[test]
    fn test_filter_boundaries_drops_close_changepoints() {
        let points = timed(100, 1.0);
        let kept = filter_boundaries(&points, &[0, 10, 70, 90], 25.0);
        assert_eq!(kept, vec![0, 70, 99]);
    }

    #[test]
    fn test_filter_boundaries_final_span_absorbs_predecessor() {
        let points = timed(100, 1.0);
        let kept = filter_boundaries(&points, &[0, 40, 80], 30.0);
        assert_eq!(kept, vec![0, 40, 99]);
    }

    #[test]
    fn test_filter_boundaries_short_sequence() {
        let points = timed(3, 1.0);
        assert_eq!(filter_boundaries(&points, &[0, 1], 60.0), vec![0, 2]);
    }
}
