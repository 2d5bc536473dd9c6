//! Semantic locations.
//!
//! A [`LocationStore`] is the caller-owned knowledge base of labelled places.
//! Each place keeps the raw points it was learnt from and a centroid taken
//! from the densest cluster of those points. [`infer_location`] ranks known
//! places first and only falls back to external [`PlaceProvider`]s when the
//! knowledge base has few answers.

use crate::geo_utils::{PRECISION_PERSON, centroid, estimate_meters_to_deg};
use crate::segmentation::dbscan::dbscan;
use crate::{Point, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Label used when nothing is known about a place.
pub const UNKNOWN_LABEL: &str = "#?";

/// Where a location candidate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    Knowledge,
    Google,
    Foursquare,
    External(String),
}

impl LocationSource {
    pub fn as_str(&self) -> &str {
        match self {
            LocationSource::Knowledge => "KB",
            LocationSource::Google => "GOOGLE",
            LocationSource::Foursquare => "FOURSQUARE",
            LocationSource::External(name) => name,
        }
    }
}

impl std::fmt::Display for LocationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A possible label for a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub label: String,
    /// Meters from the queried point
    pub distance: f64,
    pub source: LocationSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
}

/// An inferred place: the chosen label plus every ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub label: String,
    #[serde(rename = "position")]
    pub centroid: Point,
    pub other: Vec<LocationCandidate>,
}

impl Location {
    /// Meters between the centroid and `point`.
    pub fn distance(&self, point: &Point) -> f64 {
        self.centroid.distance(point)
    }

    /// Whether no candidate was found.
    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }
}

/// A labelled place returned by a knowledge-base query.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownLocation {
    pub label: String,
    pub centroid: Point,
}

/// Read access to a knowledge base of places.
pub trait LocationQuery {
    /// Known places whose centroid lies within `max_distance` meters of `point`.
    fn query(&self, point: &Point, max_distance: f64) -> Vec<KnownLocation>;
}

/// External nearby-places lookup.
pub trait PlaceProvider {
    fn source(&self) -> LocationSource;

    /// Places within `radius` meters of `point`.
    fn nearby(&self, point: &Point, radius: f64) -> Result<Vec<LocationCandidate>>;
}

/// Location inference parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
    /// Search radius in meters. Default: 20.0
    pub max_distance: f64,
    /// DBSCAN `min_samples` when updating centroids. Default: 2
    pub min_samples: usize,
    /// Maximum number of candidates kept. Default: 5
    pub limit: usize,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            max_distance: 20.0,
            min_samples: 2,
            limit: 5,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredLocation {
    centroid: Point,
    cluster: Vec<Point>,
}

/// Caller-owned knowledge base of labelled places.
#[derive(Debug, Clone, Default)]
pub struct LocationStore {
    locations: BTreeMap<String, StoredLocation>,
}

impl LocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Add an observation of `label` at `point` and return the updated centroid.
    pub fn learn(
        &mut self,
        label: &str,
        point: &Point,
        max_distance: f64,
        min_samples: usize,
    ) -> Point {
        let entry = self
            .locations
            .entry(label.to_string())
            .or_insert_with(|| StoredLocation {
                centroid: *point,
                cluster: Vec::new(),
            });
        entry.centroid = update_location_centroid(point, &mut entry.cluster, max_distance, min_samples);
        debug!(
            "[Location] '{}' now has {} points",
            label,
            entry.cluster.len()
        );
        entry.centroid
    }

    /// Current centroid of `label`.
    pub fn centroid(&self, label: &str) -> Option<Point> {
        self.locations.get(label).map(|l| l.centroid)
    }

    /// Points learnt for `label`, in insertion order.
    pub fn cluster(&self, label: &str) -> Option<&[Point]> {
        self.locations.get(label).map(|l| l.cluster.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }
}

impl LocationQuery for LocationStore {
    fn query(&self, point: &Point, max_distance: f64) -> Vec<KnownLocation> {
        self.locations
            .iter()
            .filter(|(_, l)| l.centroid.distance(point) <= max_distance)
            .map(|(label, l)| KnownLocation {
                label: label.clone(),
                centroid: l.centroid,
            })
            .collect()
    }
}

/// Append `point` to `cluster` and recompute the place centroid.
///
/// The cluster's `(lon, lat)` positions are clustered with DBSCAN using a
/// radius of `max_distance` meters converted to degrees. The centroid of the
/// largest cluster wins (the last one on ties); without any cluster the
/// centroid of every point is used.
pub fn update_location_centroid(
    point: &Point,
    cluster: &mut Vec<Point>,
    max_distance: f64,
    min_samples: usize,
) -> Point {
    cluster.push(*point);
    let coords: Vec<[f64; 2]> = cluster.iter().map(Point::gen2arr).collect();
    let eps = estimate_meters_to_deg(max_distance, PRECISION_PERSON);
    let labels = dbscan(&coords, eps, min_samples);

    let mut groups: BTreeMap<usize, Vec<Point>> = BTreeMap::new();
    for (p, label) in cluster.iter().zip(&labels) {
        if let Some(id) = label {
            groups.entry(*id).or_default().push(*p);
        }
    }

    let mut biggest: Option<&Vec<Point>> = None;
    for members in groups.values() {
        if biggest.is_none_or(|b| members.len() >= b.len()) {
            biggest = Some(members);
        }
    }
    let members: &[Point] = biggest.map_or(cluster.as_slice(), Vec::as_slice);
    match centroid(members) {
        Some((lat, lon)) => point.with_position(lat, lon),
        None => *point,
    }
}

/// Caches a provider's answers by position.
///
/// A query reuses the first cached answer whose position is closer than the
/// requested radius. Entries are never evicted. Provider failures are logged
/// and answered with an empty list, which is not cached.
pub struct CachedProvider<P> {
    provider: P,
    cache: RefCell<Vec<(Point, Vec<LocationCandidate>)>>,
}

impl<P: PlaceProvider> CachedProvider<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cache: RefCell::new(Vec::new()),
        }
    }

    /// Number of cached answers.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn inner(&self) -> &P {
        &self.provider
    }
}

impl<P: PlaceProvider> PlaceProvider for CachedProvider<P> {
    fn source(&self) -> LocationSource {
        self.provider.source()
    }

    fn nearby(&self, point: &Point, radius: f64) -> Result<Vec<LocationCandidate>> {
        if let Some((_, hit)) = self
            .cache
            .borrow()
            .iter()
            .find(|(cached, _)| cached.distance(point) < radius)
        {
            return Ok(hit.clone());
        }

        match self.provider.nearby(point, radius) {
            Ok(found) => {
                self.cache.borrow_mut().push((*point, found.clone()));
                Ok(found)
            }
            Err(e) => {
                warn!("[Location] {} lookup failed: {}", self.provider.source(), e);
                Ok(Vec::new())
            }
        }
    }
}

/// Infer the semantic location of `point`.
///
/// Knowledge-base candidates come first, sorted by distance. Providers are
/// only consulted when the knowledge base returned at most `limit`
/// candidates; their answers are sorted by distance and appended. The list
/// is truncated to `limit` and the first label wins, or `"#?"` when empty.
///
/// # Example
/// ```
/// use tracktotrip::{LocationStore, Point, infer_location};
/// let mut store = LocationStore::new();
/// let home = Point::at_epoch_seconds(41.1500, -8.6100, 0.0);
/// store.learn("home", &home, 20.0, 2);
/// let location = infer_location(&home, Some(&store), &[], 20.0, 5);
/// assert_eq!(location.label, "home");
/// ```
pub fn infer_location(
    point: &Point,
    knowledge: Option<&dyn LocationQuery>,
    providers: &[&dyn PlaceProvider],
    max_distance: f64,
    limit: usize,
) -> Location {
    let mut candidates: Vec<LocationCandidate> = knowledge
        .map(|kb| kb.query(point, max_distance))
        .unwrap_or_default()
        .into_iter()
        .map(|known| LocationCandidate {
            distance: known.centroid.distance(point),
            label: known.label,
            source: LocationSource::Knowledge,
            types: None,
        })
        .collect();
    candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    if candidates.len() <= limit {
        let mut external: Vec<LocationCandidate> = Vec::new();
        for provider in providers {
            match provider.nearby(point, max_distance) {
                Ok(found) => external.extend(found),
                Err(e) => warn!("[Location] {} lookup failed: {}", provider.source(), e),
            }
        }
        external.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates.extend(external);
    }
    candidates.truncate(limit);

    let label = candidates
        .first()
        .map_or_else(|| UNKNOWN_LABEL.to_string(), |c| c.label.clone());
    Location {
        label,
        centroid: *point,
        other: candidates,
    }
}
