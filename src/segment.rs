//! A contiguous run of points between stays.

use crate::compression::{SimplifyStrategy, simplify};
use crate::location::{LocationConfig, LocationQuery, PlaceProvider, infer_location};
use crate::noise::NoiseStrategy;
use crate::preprocess::{compute_metrics, preprocess_segment};
use crate::segmentation::segment_points;
use crate::similarity::sort_segment_points;
use crate::smooth::{SmoothStrategy, smooth};
use crate::transportation::{Classifier, ModeConfig, TransportationMode, infer_modes};
use crate::{Bounds, Location, Point, Result};
use serde::{Deserialize, Serialize};

/// Default distance (meters) within which [`Segment::closest_point_to`] matches.
pub const CLOSEST_POINT_THRESHOLD: f64 = 20.0;

/// Ordered points plus the annotations inferred for them.
///
/// Most pipeline stages replace `points` in place; annotations refer to the
/// current points and are cleared by stages that change them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub points: Vec<Point>,
    #[serde(default)]
    pub transportation_modes: Vec<TransportationMode>,
    #[serde(default)]
    pub location_from: Option<Location>,
    #[serde(default)]
    pub location_to: Option<Location>,
}

impl Segment {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.points)
    }

    /// Recompute `dt`, `vel` and `acc` over the current ordering.
    pub fn compute_metrics(&mut self) -> &mut Self {
        compute_metrics(&mut self.points);
        self
    }

    /// See [`preprocess_segment`].
    pub fn preprocess(&mut self, max_acc: f64, destructive: bool) -> &mut Self {
        self.set_points(preprocess_segment(&self.points, max_acc, destructive));
        self
    }

    pub fn remove_noise(&mut self, strategy: NoiseStrategy) -> &mut Self {
        let filter = strategy.resolve();
        self.set_points(filter.filter(&self.points));
        self
    }

    pub fn smooth(
        &mut self,
        noise: f64,
        strategy: SmoothStrategy,
        n_iter: usize,
    ) -> Result<&mut Self> {
        let smoothed = smooth(&self.points, noise, strategy, n_iter)?;
        self.set_points(smoothed);
        Ok(self)
    }

    /// Split into new segments at stays and recording gaps.
    pub fn segment(&self, eps: f64, min_time: f64) -> Vec<Segment> {
        segment_points(&self.points, eps, min_time)
            .into_iter()
            .map(Segment::new)
            .collect()
    }

    pub fn simplify(&mut self, strategy: SimplifyStrategy) -> &mut Self {
        self.set_points(simplify(&self.points, strategy));
        self
    }

    /// Label the segment's spans. Requires current metrics.
    pub fn infer_transportation_mode(
        &mut self,
        classifier: Option<&dyn Classifier>,
        config: &ModeConfig,
    ) -> Result<&mut Self> {
        self.transportation_modes = infer_modes(classifier, &self.points, config)?;
        Ok(self)
    }

    /// Infer the start and end locations.
    pub fn infer_location(
        &mut self,
        knowledge: Option<&dyn LocationQuery>,
        providers: &[&dyn PlaceProvider],
        config: &LocationConfig,
    ) -> &mut Self {
        if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
            self.location_from = Some(infer_location(
                first,
                knowledge,
                providers,
                config.max_distance,
                config.limit,
            ));
            self.location_to = Some(infer_location(
                last,
                knowledge,
                providers,
                config.max_distance,
                config.limit,
            ));
        }
        self
    }

    /// Interleave `other`'s points into this segment's path.
    pub fn merge_and_fit(&mut self, other: &Segment) -> &mut Self {
        self.set_points(sort_segment_points(&self.points, &other.points));
        self
    }

    /// Index of the point closest to `point`, if within `threshold` meters.
    pub fn closest_point_to(&self, point: &Point, threshold: f64) -> Option<usize> {
        closest_index(&self.points, point, threshold)
    }

    /// Points `start..=end` as a new segment, reversed when `start > end`.
    ///
    /// Indices past the end are clamped.
    pub fn slice(&self, start: usize, end: usize) -> Segment {
        if self.points.is_empty() {
            return Segment::default();
        }
        let last = self.points.len() - 1;
        let (lo, hi) = (start.min(end).min(last), start.max(end).min(last));
        let mut points = self.points[lo..=hi].to_vec();
        if start > end {
            points.reverse();
        }
        Segment::new(points)
    }

    /// Time of the first point.
    pub fn start_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.points.first().map(|p| p.time)
    }

    fn set_points(&mut self, points: Vec<Point>) {
        if points.len() != self.points.len() {
            self.transportation_modes.clear();
        }
        self.points = points;
    }
}

/// Index of the point of `points` closest to `target`, within `threshold` meters.
pub(crate) fn closest_index(points: &[Point], target: &Point, threshold: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.distance(target)))
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, b)) if b <= d => best,
            _ => Some((i, d)),
        })
        .filter(|(_, d)| *d <= threshold)
        .map(|(i, _)| i)
}
