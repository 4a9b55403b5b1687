//! Assessment zones and structure footprints.
//!
//! A [`ZoneSet`] keeps zones in input order alongside an R-tree of their
//! bounding boxes. Point location uses the R-tree to find candidates and then
//! picks the *first zone in input order* whose geometry covers the point, so a
//! cell centre lying exactly on a shared boundary always resolves to the same
//! zone within a run.

use std::collections::HashMap;

use geo::{Area, BoundingRect, Intersects, MultiPolygon, Point, Polygon, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::{ApzError, Result};

/// Stable identifier of a zone, supplied by the polygon source.
pub type ZoneId = i64;

/// An identified polygon over which terrain and vegetation are assessed.
#[derive(Debug, Clone)]
pub struct Zone {
    id: ZoneId,
    geometry: MultiPolygon<f64>,
    /// Planar area in square map units.
    area: f64,
    /// Free-text vegetation classification.
    vegetation: Option<String>,
}

impl Zone {
    pub fn new(id: ZoneId, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        let geometry = geometry.into();
        let area = geometry.unsigned_area();
        Self {
            id,
            geometry,
            area,
            vegetation: None,
        }
    }

    /// Attach the zone's vegetation classification label.
    pub fn with_vegetation(mut self, label: impl Into<String>) -> Self {
        self.vegetation = Some(label.into());
        self
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn vegetation(&self) -> Option<&str> {
        self.vegetation.as_deref()
    }

    /// Whether `point` lies inside the zone or on its boundary.
    pub fn covers(&self, point: &Point<f64>) -> bool {
        self.geometry.intersects(point)
    }
}

#[derive(Debug, Clone)]
struct ZoneEnvelope {
    idx: usize, // Index of the zone in input order
    bbox: Rect<f64>,
}

impl RTreeObject for ZoneEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// The zones of one assessment run, indexed for point location.
#[derive(Debug, Clone)]
pub struct ZoneSet {
    zones: Vec<Zone>,
    rtree: RTree<ZoneEnvelope>,
    by_id: HashMap<ZoneId, usize>,
    bounds: Rect<f64>,
}

impl ZoneSet {
    /// Index a set of zones.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `zones` is empty (nothing to assess)
    /// - Two zones share an id
    /// - A zone has empty geometry
    pub fn new(zones: Vec<Zone>) -> Result<Self> {
        if zones.is_empty() {
            return Err(ApzError::MissingInput("zone polygons"));
        }

        let mut by_id = HashMap::with_capacity(zones.len());
        let mut envelopes = Vec::with_capacity(zones.len());
        for (idx, zone) in zones.iter().enumerate() {
            if by_id.insert(zone.id, idx).is_some() {
                return Err(ApzError::DuplicateZone { id: zone.id });
            }
            let bbox = zone
                .geometry
                .bounding_rect()
                .ok_or_else(|| ApzError::InvalidGeometry {
                    message: format!("zone {} has empty geometry", zone.id),
                })?;
            envelopes.push(ZoneEnvelope { idx, bbox });
        }

        let bounds = envelopes
            .iter()
            .map(|e| e.bbox)
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
            .ok_or(ApzError::MissingInput("zone polygons"))?;

        Ok(Self {
            zones,
            rtree: RTree::bulk_load(envelopes),
            by_id,
            bounds,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zones in input order.
    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    pub fn as_slice(&self) -> &[Zone] {
        &self.zones
    }

    pub fn get(&self, id: ZoneId) -> Option<&Zone> {
        self.by_id.get(&id).map(|&idx| &self.zones[idx])
    }

    /// Bounding box of all zones.
    pub fn bounds(&self) -> Rect<f64> {
        self.bounds
    }

    /// The first zone (in input order) covering `point`.
    pub fn locate(&self, point: &Point<f64>) -> Option<&Zone> {
        let probe = AABB::from_point([point.x(), point.y()]);
        self.rtree
            .locate_in_envelope_intersecting(&probe)
            .filter(|e| self.zones[e.idx].covers(point))
            .map(|e| e.idx)
            .min()
            .map(|idx| &self.zones[idx])
    }
}

/// A structure footprint that defensible space is measured from.
#[derive(Debug, Clone)]
pub struct Structure {
    pub id: i64,
    pub footprint: Polygon<f64>,
}

impl Structure {
    pub fn new(id: i64, footprint: Polygon<f64>) -> Self {
        Self { id, footprint }
    }
}
