//! Tracks: named, time-ordered collections of segments.

use crate::compression::SimplifyStrategy;
use crate::location::{LocationConfig, LocationQuery, PlaceProvider};
use crate::noise::NoiseStrategy;
use crate::segment::Segment;
use crate::similarity::segment_similarity;
use crate::smooth::SmoothStrategy;
use crate::transportation::{Classifier, ModeConfig};
use crate::{Bounds, Point, Result, TripConfig, TripError};
use log::{debug, info, warn};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Name given to tracks without points.
pub const EMPTY_TRACK_NAME: &str = "EmptyTrack";

const DEFAULT_NAME_FORMAT: &str = "%Y-%m-%d";

/// A named sequence of segments sorted by start time.
///
/// Empty segments sort first. Deserialization goes through
/// [`Track::from_segments`], so decoded tracks are sorted and carry metrics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawTrack")]
pub struct Track {
    pub name: String,
    pub segments: Vec<Segment>,
}

#[derive(Deserialize)]
struct RawTrack {
    name: String,
    #[serde(default)]
    segments: Vec<Segment>,
}

impl From<RawTrack> for Track {
    fn from(raw: RawTrack) -> Self {
        Track::from_segments(raw.name, raw.segments)
    }
}

/// Best match of one segment of the compared track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPairing {
    /// Segment of the track `similarity` was called on
    pub self_index: usize,
    /// Segment of the track passed to `similarity`
    pub other_index: usize,
    pub score: f64,
    pub edge_scores: Vec<f64>,
}

impl SegmentPairing {
    /// The same pairing seen from the other track.
    pub fn flipped(&self) -> Self {
        Self {
            self_index: self.other_index,
            other_index: self.self_index,
            score: self.score,
            edge_scores: self.edge_scores.clone(),
        }
    }
}

struct SegmentBox {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SegmentBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl Track {
    /// Build a track, sorting segments by start time and computing metrics.
    pub fn from_segments(name: impl Into<String>, mut segments: Vec<Segment>) -> Self {
        segments.sort_by_key(Segment::start_time);
        let mut track = Self {
            name: name.into(),
            segments,
        };
        track.compute_metrics();
        track
    }

    /// `<start time formatted>.gpx`, or `"EmptyTrack"` without points.
    ///
    /// An invalid `format` falls back to `%Y-%m-%d`.
    pub fn generate_name(&self, format: &str) -> String {
        let Some(start) = self.segments.iter().find_map(Segment::start_time) else {
            return EMPTY_TRACK_NAME.to_string();
        };
        let mut name = String::new();
        if write!(name, "{}", start.format(format)).is_err() {
            warn!("[Track] invalid name format '{}', using default", format);
            name.clear();
            let _ = write!(name, "{}", start.format(DEFAULT_NAME_FORMAT));
        }
        name.push_str(".gpx");
        name
    }

    pub fn point_count(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Bounds over every segment, `None` without points.
    pub fn bounds(&self) -> Option<Bounds> {
        self.segments
            .iter()
            .filter_map(Segment::bounds)
            .reduce(|a, b| a.union(&b))
    }

    pub fn compute_metrics(&mut self) -> &mut Self {
        for segment in &mut self.segments {
            segment.compute_metrics();
        }
        self
    }

    pub fn preprocess(&mut self, max_acc: f64, destructive: bool) -> &mut Self {
        for segment in &mut self.segments {
            segment.preprocess(max_acc, destructive);
        }
        self
    }

    pub fn remove_noise(&mut self, strategy: NoiseStrategy) -> &mut Self {
        for segment in &mut self.segments {
            segment.remove_noise(strategy);
        }
        self
    }

    pub fn smooth(
        &mut self,
        noise: f64,
        strategy: SmoothStrategy,
        n_iter: usize,
    ) -> Result<&mut Self> {
        for segment in &mut self.segments {
            segment.smooth(noise, strategy, n_iter)?;
        }
        Ok(self)
    }

    /// Replace every segment by its spatio-temporal segmentation.
    pub fn segment(&mut self, eps: f64, min_time: f64) -> &mut Self {
        let before = self.segments.len();
        self.segments = self
            .segments
            .iter()
            .flat_map(|s| s.segment(eps, min_time))
            .collect();
        debug!(
            "[Track] '{}' segmented {} -> {} segments",
            self.name,
            before,
            self.segments.len()
        );
        self
    }

    pub fn simplify(&mut self, strategy: SimplifyStrategy) -> &mut Self {
        for segment in &mut self.segments {
            segment.simplify(strategy);
        }
        self
    }

    pub fn infer_transportation_mode(
        &mut self,
        classifier: Option<&dyn Classifier>,
        config: &ModeConfig,
    ) -> Result<&mut Self> {
        for segment in &mut self.segments {
            segment.infer_transportation_mode(classifier, config)?;
        }
        Ok(self)
    }

    pub fn infer_location(
        &mut self,
        knowledge: Option<&dyn LocationQuery>,
        providers: &[&dyn PlaceProvider],
        config: &LocationConfig,
    ) -> &mut Self {
        for segment in &mut self.segments {
            segment.infer_location(knowledge, providers, config);
        }
        self
    }

    /// Fail with [`TripError::NonMonotonicTime`] at the first point (counted
    /// across segments) that is earlier than its predecessor.
    pub fn validate_time_order(&self) -> Result<()> {
        let mut previous: Option<&Point> = None;
        for (index, point) in self.segments.iter().flat_map(|s| &s.points).enumerate() {
            if previous.is_some_and(|p| point.time < p.time) {
                return Err(TripError::NonMonotonicTime { index });
            }
            previous = Some(point);
        }
        Ok(())
    }

    /// How well `other` is covered by this track.
    ///
    /// Each of `other`'s segments is compared with the segments of this track
    /// whose bounds intersect its own; the best score counts and produces a
    /// pairing. The result is the mean over `other`'s segments (unmatched ones
    /// score 0), or 0 when `other` has no segments.
    pub fn similarity(&self, other: &Track) -> (f64, Vec<SegmentPairing>) {
        if other.segments.is_empty() {
            return (0.0, Vec::new());
        }
        let tree = RTree::bulk_load(
            self.segments
                .iter()
                .enumerate()
                .filter_map(|(index, s)| {
                    s.bounds().map(|b| SegmentBox {
                        index,
                        envelope: b.envelope(),
                    })
                })
                .collect(),
        );

        let mut total = 0.0;
        let mut pairings = Vec::new();
        for (other_index, segment) in other.segments.iter().enumerate() {
            let Some(bounds) = segment.bounds() else {
                continue;
            };
            let mut best: Option<SegmentPairing> = None;
            for candidate in tree.locate_in_envelope_intersecting(&bounds.envelope()) {
                let (score, edge_scores) =
                    segment_similarity(&self.segments[candidate.index].points, &segment.points);
                if best.as_ref().is_none_or(|b| score > b.score) {
                    best = Some(SegmentPairing {
                        self_index: candidate.index,
                        other_index,
                        score,
                        edge_scores,
                    });
                }
            }
            if let Some(pairing) = best {
                total += pairing.score;
                pairings.push(pairing);
            }
        }
        // R-tree query order is unspecified
        pairings.sort_by_key(|p| p.other_index);
        (total / other.segments.len() as f64, pairings)
    }

    /// Merge `other`'s paired segments into this track's.
    ///
    /// Pairings follow [`Track::similarity`] called on `self`; out of range
    /// indices are skipped.
    pub fn merge_and_fit(&mut self, other: &Track, pairings: &[SegmentPairing]) -> &mut Self {
        for pairing in pairings {
            match (
                self.segments.get_mut(pairing.self_index),
                other.segments.get(pairing.other_index),
            ) {
                (Some(mine), Some(theirs)) => {
                    mine.merge_and_fit(theirs);
                }
                _ => warn!(
                    "[Track] skipping pairing ({}, {}) out of range",
                    pairing.self_index, pairing.other_index
                ),
            }
        }
        self
    }

    /// Turn a raw track into a trip.
    ///
    /// Smooths, segments and simplifies (speed-aware) with metrics
    /// recomputed after each step. An empty `name` is replaced by
    /// [`Track::generate_name`] with the configured format.
    pub fn to_trip(&mut self, name: &str, config: &TripConfig) -> Result<&mut Self> {
        let name = if name.is_empty() {
            self.generate_name(&config.name_format)
        } else {
            name.to_string()
        };
        let points_in = self.point_count();

        self.smooth(
            config.smooth_noise,
            config.smooth_strategy,
            config.smooth_iterations,
        )?;
        self.compute_metrics();
        self.segment(config.seg_eps, config.seg_min_time);
        self.compute_metrics();
        self.simplify(SimplifyStrategy::Speed {
            speed_threshold: config.simplify_speed_threshold,
        });
        self.compute_metrics();
        self.name = name;

        info!(
            "[Track] '{}': {} points -> {} points in {} segments",
            self.name,
            points_in,
            self.point_count(),
            self.segments.len()
        );
        Ok(self)
    }
}
