//! Elevation threshold partitioning.
//!
//! Elevation cells overlapping each zone are vectorised into polygon pieces
//! (horizontal runs of equal-valued cells), split against a threshold and
//! dissolved into one region per zone and [`ElevationPartition`]. Cells at or below the
//! threshold are `UpslopeOrFlat`; cells above it are `Downslope`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use geo::{Area, BooleanOps, BoundingRect, Centroid, Intersects, MultiPolygon, Polygon};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProcessingEnv;
use crate::grid::{Grid, GridTransform};
use crate::sampler::SampledPoint;
use crate::zone::{Structure, Zone, ZoneId, ZoneSet};

/// Side of the elevation threshold a region lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElevationPartition {
    /// Elevation at or below the threshold.
    UpslopeOrFlat,
    /// Elevation above the threshold.
    Downslope,
}

impl ElevationPartition {
    pub const ALL: [ElevationPartition; 2] =
        [ElevationPartition::UpslopeOrFlat, ElevationPartition::Downslope];

    /// Partition of a cell with `elevation`. Equality counts as `UpslopeOrFlat`.
    pub fn for_elevation(elevation: f64, threshold: f64) -> Self {
        if elevation > threshold {
            ElevationPartition::Downslope
        } else {
            ElevationPartition::UpslopeOrFlat
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ElevationPartition::UpslopeOrFlat => "UpslopeOrFlat",
            ElevationPartition::Downslope => "Downslope",
        }
    }
}

impl fmt::Display for ElevationPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A run of equal-valued elevation cells within one zone row.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationPiece {
    pub zone_id: ZoneId,
    pub elevation: f64,
    pub cell_count: usize,
    pub polygon: Polygon<f64>,
}

/// Vectorise the elevation cells under every zone into run polygons.
///
/// A zone takes every valid cell that overlaps it with positive area, so a cell
/// cut by a shared boundary goes to both zones; [`classify_elevation`] clips
/// each region back to its zone. Zone statistics sample by cell centre instead.
/// Consecutive cells in a row with equal values are merged into one piece.
/// Pieces are in zone input order, row-major within a zone.
pub fn vectorize_elevation(grid: &Grid, zones: &ZoneSet, env: &ProcessingEnv) -> Vec<ElevationPiece> {
    let transform = grid.transform();
    zones
        .as_slice()
        .par_iter()
        .flat_map_iter(|zone| {
            // (row, first col, end col, value)
            let mut runs: Vec<(usize, usize, usize, f64)> = Vec::new();
            let window = zone
                .geometry()
                .bounding_rect()
                .and_then(|bbox| transform.cell_cover(&bbox));
            if let Some((rows, cols)) = window {
                for row in rows {
                    for col in cols.clone() {
                        let Some(value) = grid.get(row, col) else {
                            continue;
                        };
                        if !cell_overlaps(zone, transform, env, row, col) {
                            continue;
                        }
                        if let Some((r, _, end, v)) = runs.last_mut() {
                            if *r == row && *end == col && *v == value {
                                *end += 1;
                                continue;
                            }
                        }
                        runs.push((row, col, col + 1, value));
                    }
                }
            }

            let zone_id = zone.id();
            runs.into_iter().map(move |(row, col_start, col_end, value)| ElevationPiece {
                zone_id,
                elevation: value,
                cell_count: col_end - col_start,
                polygon: transform.run_rect(row, col_start, col_end).to_polygon(),
            })
        })
        .collect()
}

fn cell_overlaps(zone: &Zone, transform: &GridTransform, env: &ProcessingEnv, row: usize, col: usize) -> bool {
    let center = transform.cell_center(row, col);
    if !env.admits(&center) {
        return false;
    }
    if zone.covers(&center) {
        return true;
    }
    let cell = transform.cell_rect(row, col);
    zone.geometry().intersects(&cell)
        && MultiPolygon::new(vec![cell.to_polygon()])
            .intersection(zone.geometry())
            .unsigned_area()
            > 0.0
}

/// Dissolved region of one zone on one side of the threshold.
#[derive(Debug, Clone)]
pub struct PartitionRegion {
    pub zone_id: ZoneId,
    pub partition: ElevationPartition,
    /// Dissolved cells, clipped to the zone boundary.
    pub region: MultiPolygon<f64>,
    pub cell_count: usize,
    pub area_m2: f64,
}

/// Union polygons by pairwise reduction.
pub(crate) fn dissolve<I>(polygons: I) -> MultiPolygon<f64>
where
    I: IntoParallelIterator<Item = MultiPolygon<f64>>,
{
    polygons
        .into_par_iter()
        .reduce_with(|a, b| a.union(&b))
        .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Split elevation pieces at `threshold` and dissolve each side per zone.
///
/// Regions are returned in zone input order, `UpslopeOrFlat` before
/// `Downslope`. A side with no cells is absent; a zone with no pieces has no
/// regions at all.
pub fn classify_elevation(zones: &ZoneSet, pieces: &[ElevationPiece], threshold: f64) -> Vec<PartitionRegion> {
    let mut groups: HashMap<(ZoneId, ElevationPartition), (Vec<MultiPolygon<f64>>, usize)> = HashMap::new();
    for piece in pieces {
        let key = (piece.zone_id, ElevationPartition::for_elevation(piece.elevation, threshold));
        let entry = groups.entry(key).or_default();
        entry.0.push(MultiPolygon::new(vec![piece.polygon.clone()]));
        entry.1 += piece.cell_count;
    }

    let ordered: Vec<_> = zones
        .iter()
        .flat_map(|zone| ElevationPartition::ALL.map(|partition| (zone, partition)))
        .filter_map(|(zone, partition)| {
            groups
                .remove(&(zone.id(), partition))
                .map(|(polygons, cells)| (zone, partition, polygons, cells))
        })
        .collect();

    let regions: Vec<PartitionRegion> = ordered
        .into_par_iter()
        .map(|(zone, partition, polygons, cell_count)| {
            let region = dissolve(polygons).intersection(zone.geometry());
            let area_m2 = region.unsigned_area();
            PartitionRegion {
                zone_id: zone.id(),
                partition,
                region,
                cell_count,
                area_m2,
            }
        })
        .collect();

    debug!(regions = regions.len(), threshold, "classified elevation partitions");
    regions
}

/// Partition of every elevation cell, keyed by `(row, col)`.
pub fn partition_cells(
    elevation: &[SampledPoint],
    threshold: f64,
) -> HashMap<(usize, usize), ElevationPartition> {
    elevation
        .iter()
        .map(|p| ((p.row, p.col), ElevationPartition::for_elevation(p.value, threshold)))
        .collect()
}

/// Maximum slope per zone and partition.
///
/// A slope cell counts towards the partition of the elevation cell at the same
/// position; slope cells without elevation are ignored.
pub fn max_slope_by_partition(
    elevation: &[SampledPoint],
    slope: &[SampledPoint],
    threshold: f64,
) -> BTreeMap<(ZoneId, ElevationPartition), f64> {
    let partitions = partition_cells(elevation, threshold);
    let mut max_slope: BTreeMap<(ZoneId, ElevationPartition), f64> = BTreeMap::new();
    for p in slope {
        let Some(&partition) = partitions.get(&(p.row, p.col)) else {
            continue;
        };
        max_slope
            .entry((p.zone_id, partition))
            .and_modify(|m| *m = m.max(p.value))
            .or_insert(p.value);
    }
    max_slope
}

/// Mean elevation under the structure footprints.
///
/// Uses the valid cells whose centres lie inside any footprint, each cell
/// counted once. When no centre falls inside a footprint (footprints smaller
/// than a cell), uses the cells containing the footprint centroids instead.
/// Returns `None` when neither yields a valid elevation.
pub fn structure_threshold(grid: &Grid, structures: &[Structure], env: &ProcessingEnv) -> Option<f64> {
    let transform = grid.transform();

    let mut cells = BTreeSet::new();
    for structure in structures {
        let Some(window) = structure
            .footprint
            .bounding_rect()
            .and_then(|bbox| transform.cell_window(&bbox))
        else {
            continue;
        };
        let (rows, cols) = window;
        for row in rows {
            for col in cols.clone() {
                let center = transform.cell_center(row, col);
                if env.admits(&center) && structure.footprint.intersects(&center) {
                    cells.insert((row, col));
                }
            }
        }
    }

    let values: Vec<f64> = cells
        .iter()
        .filter_map(|&(row, col)| grid.get(row, col))
        .collect();
    if !values.is_empty() {
        return Some(values.iter().sum::<f64>() / values.len() as f64);
    }

    let values: Vec<f64> = structures
        .iter()
        .filter_map(|s| s.footprint.centroid())
        .filter_map(|c| grid.value_at(c.x(), c.y()))
        .collect();
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
