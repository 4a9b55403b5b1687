//! Defensible-space geometry.
//!
//! For every assessed region with a positive distance, the structure
//! footprints are buffered by that distance, overlapping buffers are merged
//! and the result is clipped to the region. The clipped polygons are kept as
//! per-region pieces and the clipped buffer outlines as boundary segments. Once every region is done, the pieces
//! are dissolved into one protection zone.
//!
//! Each region's buffers and clips are built and dropped inside its own task;
//! only the final pieces and segments leave it.

use std::collections::{BTreeSet, HashMap};

use geo::{
    Area, BooleanOps, BoundingRect, Buffer, Intersects, LineString, MultiLineString, MultiPolygon,
    Rect,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::elevation::{dissolve, ElevationPartition, PartitionRegion};
use crate::fuel::FuelClass;
use crate::manifest::{SkipReason, SkippedZone};
use crate::resolve::ZoneAssessment;
use crate::table::EffectiveSlopeBucket;
use crate::zone::{Structure, ZoneId};

/// Attribution carried by every piece and segment of a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ApzAttributes {
    pub zone_id: ZoneId,
    pub partition: ElevationPartition,
    pub apz_distance_m: f64,
    pub fuel_class: FuelClass,
    pub effective_slope_bucket: Option<EffectiveSlopeBucket>,
}

/// Buffered structures clipped to one region.
#[derive(Debug, Clone)]
pub struct DefensiblePiece {
    pub attributes: ApzAttributes,
    pub polygon: MultiPolygon<f64>,
}

/// Part of a buffer outline lying inside one region.
#[derive(Debug, Clone)]
pub struct BoundarySegment {
    pub attributes: ApzAttributes,
    pub line: LineString<f64>,
}

/// The dissolved protection zone.
#[derive(Debug, Clone)]
pub struct ProtectionZone {
    pub polygon: MultiPolygon<f64>,
    /// Zones that contributed a piece, ascending.
    pub zone_ids: Vec<ZoneId>,
    pub max_distance_m: f64,
    pub area_m2: f64,
}

/// Output of [`generate_defensible_space`].
#[derive(Debug, Clone, Default)]
pub struct DefensibleSpace {
    /// Per-region pieces in region order.
    pub pieces: Vec<DefensiblePiece>,
    /// `None` when no region produced a piece.
    pub unified: Option<ProtectionZone>,
    pub boundary: Vec<BoundarySegment>,
    pub skipped: Vec<SkippedZone>,
}

enum RegionOutcome {
    Skipped(SkipReason),
    Clipped {
        piece: Option<DefensiblePiece>,
        segments: Vec<BoundarySegment>,
        skipped: Vec<SkipReason>,
    },
}

fn expand(rect: Rect<f64>, by: f64) -> Rect<f64> {
    Rect::new(
        (rect.min().x - by, rect.min().y - by),
        (rect.max().x + by, rect.max().y + by),
    )
}

fn outlines(buffer: &MultiPolygon<f64>) -> MultiLineString<f64> {
    MultiLineString::new(
        buffer
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .cloned()
            .collect(),
    )
}

fn clip_region(
    structures: &[Structure],
    region: &MultiPolygon<f64>,
    attributes: ApzAttributes,
) -> RegionOutcome {
    let distance = attributes.apz_distance_m;
    let Some(region_bbox) = region.bounding_rect() else {
        return RegionOutcome::Skipped(SkipReason::EmptyClip);
    };

    let buffers: Vec<MultiPolygon<f64>> = structures
        .iter()
        .filter(|structure| {
            structure
                .footprint
                .bounding_rect()
                .is_some_and(|bbox| expand(bbox, distance).intersects(&region_bbox))
        })
        .map(|structure| structure.footprint.buffer(distance))
        .collect();

    // Members of a multipolygon must not overlap.
    let buffer = dissolve(buffers);
    let piece = buffer.intersection(region);
    let lines: Vec<LineString<f64>> = region.clip(&outlines(&buffer), false).0;
    let mut skipped = Vec::new();

    let piece = if piece.unsigned_area() > 0.0 {
        Some(DefensiblePiece {
            attributes,
            polygon: piece,
        })
    } else {
        skipped.push(SkipReason::EmptyClip);
        None
    };

    let segments: Vec<BoundarySegment> = lines
        .into_iter()
        .filter(|line| line.0.len() >= 2)
        .map(|line| BoundarySegment { attributes, line })
        .collect();
    if segments.is_empty() {
        skipped.push(SkipReason::EmptyBoundary);
    }

    RegionOutcome::Clipped {
        piece,
        segments,
        skipped,
    }
}

/// Build defensible-space geometry for assessed regions.
///
/// `regions` supplies the geometry of each assessment's `(zone, partition)`.
/// Assessments without a distance, with a non-positive distance or without a
/// matching region are skipped and recorded.
pub fn generate_defensible_space(
    structures: &[Structure],
    assessments: &[ZoneAssessment],
    regions: &[PartitionRegion],
) -> DefensibleSpace {
    let geometry: HashMap<(ZoneId, ElevationPartition), &MultiPolygon<f64>> = regions
        .iter()
        .map(|r| ((r.zone_id, r.partition), &r.region))
        .collect();

    let outcomes: Vec<(ZoneId, ElevationPartition, RegionOutcome)> = assessments
        .par_iter()
        .map(|a| {
            let outcome = match (a.distance_m, geometry.get(&(a.zone_id, a.partition))) {
                (None, _) => RegionOutcome::Skipped(SkipReason::MissingDistance),
                (Some(0), _) => RegionOutcome::Skipped(SkipReason::NonPositiveDistance),
                (Some(_), None) => RegionOutcome::Skipped(SkipReason::EmptyClip),
                (Some(distance), Some(region)) => clip_region(
                    structures,
                    region,
                    ApzAttributes {
                        zone_id: a.zone_id,
                        partition: a.partition,
                        apz_distance_m: distance as f64,
                        fuel_class: a.fuel_class,
                        effective_slope_bucket: a.bucket,
                    },
                ),
            };
            (a.zone_id, a.partition, outcome)
        })
        .collect();

    let mut space = DefensibleSpace::default();
    for (zone_id, partition, outcome) in outcomes {
        match outcome {
            RegionOutcome::Skipped(reason) => {
                debug!(zone = zone_id, partition = %partition, %reason, "no defensible-space geometry");
                space.skipped.push(SkippedZone::region(zone_id, partition, reason));
            }
            RegionOutcome::Clipped {
                piece,
                segments,
                skipped,
            } => {
                space.pieces.extend(piece);
                space.boundary.extend(segments);
                space
                    .skipped
                    .extend(skipped.into_iter().map(|r| SkippedZone::region(zone_id, partition, r)));
            }
        }
    }

    space.unified = unify(&space.pieces);
    if let Some(unified) = &space.unified {
        info!(
            pieces = space.pieces.len(),
            segments = space.boundary.len(),
            area_m2 = unified.area_m2,
            "merged protection zone"
        );
    }
    space
}

/// Dissolve all pieces into one protection zone.
///
/// Every member polygon is unioned on its own, so the result is valid even if
/// a piece carries overlapping members.
pub fn unify(pieces: &[DefensiblePiece]) -> Option<ProtectionZone> {
    if pieces.is_empty() {
        return None;
    }
    let polygon = dissolve(pieces.par_iter().flat_map_iter(|p| {
        p.polygon
            .iter()
            .map(|polygon| MultiPolygon::new(vec![polygon.clone()]))
    }));
    let zone_ids: BTreeSet<ZoneId> = pieces.iter().map(|p| p.attributes.zone_id).collect();
    let max_distance_m = pieces
        .iter()
        .map(|p| p.attributes.apz_distance_m)
        .fold(0.0, f64::max);
    let area_m2 = polygon.unsigned_area();

    Some(ProtectionZone {
        polygon,
        zone_ids: zone_ids.into_iter().collect(),
        max_distance_m,
        area_m2,
    })
}
