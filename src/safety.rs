use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use geo::{Coord, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, GeometryError};
use crate::geometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Multiplier per severity. Must stay strictly ordered high > medium > low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityWeights {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            high: 50.0,
            medium: 20.0,
            low: 5.0,
        }
    }
}

impl SeverityWeights {
    pub fn new(high: f64, medium: f64, low: f64) -> Result<Self, ConfigError> {
        let weights = Self { high, medium, low };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("high", self.high), ("medium", self.medium), ("low", self.low)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NonPositiveWeight { field, value });
            }
        }
        if !(self.high > self.medium && self.medium > self.low) {
            return Err(ConfigError::UnorderedWeights {
                high: self.high,
                medium: self.medium,
                low: self.low,
            });
        }
        Ok(())
    }

    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// A region flagged as unsafe, bounded by a closed ring of lon/lat points.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardZone {
    pub id: String,
    boundary: Vec<Coord<f64>>,
    pub severity: Severity,
}

impl HazardZone {
    /// Repeated consecutive boundary points are collapsed.
    pub fn new(id: impl Into<String>, boundary: Vec<Coord<f64>>, severity: Severity) -> Self {
        let mut boundary = boundary;
        boundary.dedup();
        Self {
            id: id.into(),
            boundary,
            severity,
        }
    }

    pub fn boundary(&self) -> &[Coord<f64>] {
        &self.boundary
    }

    /// Checks the ring is finite, has three distinct vertices, is closed and simple.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if let Some(index) = self
            .boundary
            .iter()
            .position(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(GeometryError::NonFinite { index });
        }
        if self.boundary.len() < 4 {
            return Err(GeometryError::TooFewPoints {
                min: 4,
                got: self.boundary.len(),
            });
        }
        if self.boundary.first() != self.boundary.last() {
            return Err(GeometryError::NotClosed);
        }
        if let Some((first, second)) = geometry::first_self_intersection(&self.boundary) {
            return Err(GeometryError::SelfIntersecting { first, second });
        }
        Ok(())
    }
}

/// Why a zone was left out of an index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneRejection {
    #[error("zone {id}: invalid geometry: {source}")]
    InvalidGeometry { id: String, source: GeometryError },
    #[error("zone {0}: id already used by an earlier zone")]
    DuplicateId(String),
}

impl ZoneRejection {
    pub fn zone_id(&self) -> &str {
        match self {
            ZoneRejection::InvalidGeometry { id, .. } => id,
            ZoneRejection::DuplicateId(id) => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexedZone {
    pub zone: HazardZone,
    pub weight: f64,
    pub bbox: Rect<f64>,
}

type ZoneEnvelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Immutable snapshot of the valid hazard zones with a bounding-box index.
pub struct HazardIndex {
    zones: Vec<IndexedZone>,
    tree: RTree<ZoneEnvelope>,
    rejected: Vec<ZoneRejection>,
    weights: SeverityWeights,
}

impl fmt::Debug for HazardIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HazardIndex")
            .field("zones", &self.zones.len())
            .field("rejected", &self.rejected)
            .field("weights", &self.weights)
            .finish()
    }
}

impl HazardIndex {
    pub fn empty(weights: SeverityWeights) -> Self {
        Self::build(Vec::new(), weights)
    }

    /// Invalid zones are skipped and reported through [`HazardIndex::rejected`];
    /// the rest are indexed.
    pub fn build(zones: Vec<HazardZone>, weights: SeverityWeights) -> Self {
        let mut seen = HashSet::new();
        let mut indexed = Vec::with_capacity(zones.len());
        let mut rejected = Vec::new();

        for zone in zones {
            if let Err(source) = zone.validate() {
                warn!(zone = %zone.id, error = %source, "rejecting hazard zone");
                rejected.push(ZoneRejection::InvalidGeometry { id: zone.id, source });
                continue;
            }
            if !seen.insert(zone.id.clone()) {
                warn!(zone = %zone.id, "rejecting hazard zone with duplicate id");
                rejected.push(ZoneRejection::DuplicateId(zone.id));
                continue;
            }
            // validated rings have at least four points, so bounds exist
            let Some(bbox) = geometry::bounding_box(zone.boundary()) else {
                continue;
            };
            let weight = weights.weight(zone.severity);
            indexed.push(IndexedZone { zone, weight, bbox });
        }

        let envelopes: Vec<ZoneEnvelope> = indexed
            .iter()
            .enumerate()
            .map(|(i, z)| {
                GeomWithData::new(
                    Rectangle::from_corners(
                        [z.bbox.min().x, z.bbox.min().y],
                        [z.bbox.max().x, z.bbox.max().y],
                    ),
                    i,
                )
            })
            .collect();

        debug!(
            zones = indexed.len(),
            rejected = rejected.len(),
            "hazard index built"
        );

        Self {
            zones: indexed,
            tree: RTree::bulk_load(envelopes),
            rejected,
            weights,
        }
    }

    pub fn zones(&self) -> &[IndexedZone] {
        &self.zones
    }

    pub fn rejected(&self) -> &[ZoneRejection] {
        &self.rejected
    }

    pub fn weights(&self) -> SeverityWeights {
        self.weights
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones whose bounding box overlaps `bbox` (touching counts), in build order.
    pub fn candidate_zones_for(&self, bbox: Rect<f64>) -> Vec<&IndexedZone> {
        let envelope = AABB::from_corners(
            [bbox.min().x, bbox.min().y],
            [bbox.max().x, bbox.max().y],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.zones[i]).collect()
    }
}

/// An index together with the upload version it was built from.
#[derive(Debug, Clone)]
pub struct HazardSnapshot {
    pub version: u64,
    pub index: Arc<HazardIndex>,
}

/// A hazard upload older than the snapshot already in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hazard version {version} is older than current version {current}")]
pub struct StaleSnapshot {
    pub version: u64,
    pub current: u64,
}

/// Holds the current hazard snapshot. Replacement swaps the whole index, so
/// a reader holding a snapshot never sees a partial update.
#[derive(Debug)]
pub struct HazardStore {
    current: RwLock<HazardSnapshot>,
    weights: SeverityWeights,
}

impl HazardStore {
    pub fn new(weights: SeverityWeights) -> Self {
        Self {
            current: RwLock::new(HazardSnapshot {
                version: 0,
                index: Arc::new(HazardIndex::empty(weights)),
            }),
            weights,
        }
    }

    pub fn weights(&self) -> SeverityWeights {
        self.weights
    }

    pub fn snapshot(&self) -> Arc<HazardIndex> {
        self.current().index
    }

    pub fn current(&self) -> HazardSnapshot {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Builds a fresh index outside the lock, then swaps it in.
    ///
    /// With `Some(version)` the upload is refused when an upload with a higher
    /// version is already in place; re-sending the current version replaces
    /// it. `None` takes the next version after the current one.
    pub fn replace(
        &self,
        zones: Vec<HazardZone>,
        version: Option<u64>,
    ) -> Result<HazardSnapshot, StaleSnapshot> {
        let index = Arc::new(HazardIndex::build(zones, self.weights));

        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = match version {
            Some(v) if v < current.version => {
                warn!(version = v, current = current.version, "dropping stale hazard upload");
                return Err(StaleSnapshot {
                    version: v,
                    current: current.version,
                });
            }
            Some(v) => v,
            None => current.version + 1,
        };
        *current = HazardSnapshot { version, index };

        info!(
            version,
            zones = current.index.len(),
            rejected = current.index.rejected().len(),
            "hazard snapshot replaced"
        );
        Ok(current.clone())
    }
}
