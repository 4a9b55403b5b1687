//! Per-zone statistics over sampled terrain values.
//!
//! Each aggregator is an [`Accumulator`]: samples are folded into per-zone
//! partials on worker threads and the partials are merged pairwise. No
//! aggregator shares mutable state across zones or threads.

pub mod circular;
pub mod linear;
pub mod slope_class;

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::sampler::{CellAssignment, SampledPoint};
use crate::zone::{ZoneId, ZoneSet};

pub use circular::{CircularAccumulator, CircularStats};
pub use linear::{LinearAccumulator, LinearStats};
pub use slope_class::{tabulate_slope_classes, SlopeClass, SlopeClassAreas};

/// Mergeable partial aggregate of one zone's samples.
pub trait Accumulator: Default + Send {
    type Output;

    /// Add one sample.
    fn push(&mut self, value: f64);

    /// Combine two partials built from disjoint samples.
    fn merge(self, other: Self) -> Self;

    /// Final figures, or `None` when no usable sample was pushed.
    fn finish(self) -> Option<Self::Output>;
}

fn merge_zone_maps<A: Accumulator>(
    mut left: BTreeMap<ZoneId, A>,
    right: BTreeMap<ZoneId, A>,
) -> BTreeMap<ZoneId, A> {
    for (zone_id, part) in right {
        let merged = match left.remove(&zone_id) {
            Some(existing) => existing.merge(part),
            None => part,
        };
        left.insert(zone_id, merged);
    }
    left
}

/// Fold samples into one partial per zone (map-then-reduce).
pub fn accumulate_by_zone<A: Accumulator>(points: &[SampledPoint]) -> BTreeMap<ZoneId, A> {
    points
        .par_iter()
        .fold(BTreeMap::new, |mut acc: BTreeMap<ZoneId, A>, point| {
            acc.entry(point.zone_id).or_default().push(point.value);
            acc
        })
        .reduce(BTreeMap::new, merge_zone_maps)
}

/// Final per-zone figures; zones without usable samples are absent.
pub fn aggregate_by_zone<A: Accumulator>(points: &[SampledPoint]) -> BTreeMap<ZoneId, A::Output> {
    accumulate_by_zone::<A>(points)
        .into_iter()
        .filter_map(|(zone_id, acc)| acc.finish().map(|out| (zone_id, out)))
        .collect()
}

/// Aggregated terrain statistics for one zone. `None` marks missing data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatistics {
    pub zone_id: ZoneId,
    pub area_m2: f64,
    pub elevation: Option<LinearStats>,
    pub slope: Option<LinearStats>,
    pub aspect: Option<CircularStats>,
    pub slope_classes: Option<SlopeClassAreas>,
}

/// Samples feeding [`compute_zone_statistics`]. Slope and aspect are optional.
#[derive(Debug, Clone, Copy)]
pub struct SampledFields<'a> {
    pub elevation: &'a [SampledPoint],
    pub slope: Option<&'a [SampledPoint]>,
    pub aspect: Option<&'a [SampledPoint]>,
}

/// Compute statistics for every zone, in zone input order.
///
/// The linear, circular and slope-class aggregations read the same samples
/// and run concurrently.
pub fn compute_zone_statistics(
    zones: &ZoneSet,
    assignment: &CellAssignment,
    fields: SampledFields<'_>,
) -> Vec<ZoneStatistics> {
    let ((mut elevation, mut slope), (mut aspect, mut classes)) = rayon::join(
        || {
            rayon::join(
                || aggregate_by_zone::<LinearAccumulator>(fields.elevation),
                || fields.slope.map(aggregate_by_zone::<LinearAccumulator>),
            )
        },
        || {
            rayon::join(
                || fields.aspect.map(aggregate_by_zone::<CircularAccumulator>),
                || {
                    fields
                        .slope
                        .map(|points| tabulate_slope_classes(assignment, points, zones))
                },
            )
        },
    );

    zones
        .iter()
        .map(|zone| {
            let id = zone.id();
            ZoneStatistics {
                zone_id: id,
                area_m2: zone.area(),
                elevation: elevation.remove(&id),
                slope: slope.as_mut().and_then(|m| m.remove(&id)),
                aspect: aspect.as_mut().and_then(|m| m.remove(&id)),
                slope_classes: classes.as_mut().and_then(|m| m.remove(&id)),
            }
        })
        .collect()
}

/// One flat row of the zone statistics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStatisticsRow {
    pub zone_id: ZoneId,
    pub area_m2: f64,
    pub elev_min: Option<f64>,
    pub elev_max: Option<f64>,
    pub elev_mean: Option<f64>,
    pub elev_std: Option<f64>,
    pub elev_median: Option<f64>,
    pub elev_count: Option<usize>,
    pub slope_min: Option<f64>,
    pub slope_max: Option<f64>,
    pub slope_mean: Option<f64>,
    pub slope_std: Option<f64>,
    pub slope_median: Option<f64>,
    pub slope_count: Option<usize>,
    pub aspect_mean_deg: Option<f64>,
    pub aspect_circ_std_deg: Option<f64>,
    pub aspect_count: Option<usize>,
    pub slope_0_5_m2: Option<f64>,
    pub slope_5_15_m2: Option<f64>,
    pub slope_15_30_m2: Option<f64>,
    pub slope_30_45_m2: Option<f64>,
    pub slope_45_plus_m2: Option<f64>,
    pub slope_0_5_pct: Option<f64>,
    pub slope_5_15_pct: Option<f64>,
    pub slope_15_30_pct: Option<f64>,
    pub slope_30_45_pct: Option<f64>,
    pub slope_45_plus_pct: Option<f64>,
}

impl ZoneStatistics {
    /// Flatten into a table row with empty fields for missing data.
    pub fn to_row(&self) -> ZoneStatisticsRow {
        let e = self.elevation.as_ref();
        let s = self.slope.as_ref();
        let a = self.aspect.as_ref();
        let area = |i: usize| self.slope_classes.map(|c| c.areas_m2[i]);
        let pct = |i: usize| self.slope_classes.map(|c| c.percents[i]);

        ZoneStatisticsRow {
            zone_id: self.zone_id,
            area_m2: self.area_m2,
            elev_min: e.map(|x| x.min),
            elev_max: e.map(|x| x.max),
            elev_mean: e.map(|x| x.mean),
            elev_std: e.map(|x| x.std_dev),
            elev_median: e.map(|x| x.median),
            elev_count: e.map(|x| x.count),
            slope_min: s.map(|x| x.min),
            slope_max: s.map(|x| x.max),
            slope_mean: s.map(|x| x.mean),
            slope_std: s.map(|x| x.std_dev),
            slope_median: s.map(|x| x.median),
            slope_count: s.map(|x| x.count),
            aspect_mean_deg: a.map(|x| x.mean_direction_deg),
            aspect_circ_std_deg: a.map(|x| x.circular_std_dev_deg),
            aspect_count: a.map(|x| x.sample_count),
            slope_0_5_m2: area(0),
            slope_5_15_m2: area(1),
            slope_15_30_m2: area(2),
            slope_30_45_m2: area(3),
            slope_45_plus_m2: area(4),
            slope_0_5_pct: pct(0),
            slope_5_15_pct: pct(1),
            slope_15_30_pct: pct(2),
            slope_30_45_pct: pct(3),
            slope_45_plus_pct: pct(4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingEnv;
    use crate::grid::{Grid, GridTransform};
    use crate::zone::Zone;
    use geo::Rect;

    fn zones() -> ZoneSet {
        ZoneSet::new(vec![
            Zone::new(1, Rect::new((0.0, 0.0), (20.0, 40.0)).to_polygon()),
            Zone::new(2, Rect::new((20.0, 0.0), (40.0, 40.0)).to_polygon()),
            Zone::new(3, Rect::new((100.0, 100.0), (120.0, 120.0)).to_polygon()),
        ])
        .unwrap()
    }

    #[test]
    fn test_accumulate_groups_by_zone() {
        let points: Vec<SampledPoint> = (0..100)
            .map(|i| SampledPoint {
                zone_id: (i % 3) as ZoneId,
                row: 0,
                col: i,
                location: geo::Point::new(0.0, 0.0),
                value: i as f64,
            })
            .collect();

        let stats = aggregate_by_zone::<LinearAccumulator>(&points);
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[&0].count, 34);
        assert_eq!(stats[&1].count, 33);
        assert_eq!(stats[&2].min, 2.0);
        assert_eq!(stats[&2].max, 98.0);
    }

    #[test]
    fn test_zone_statistics_in_input_order_with_missing_data() {
        let zones = zones();
        let t = GridTransform::new(0.0, 40.0, 10.0, 4, 4);
        let elevation = Grid::from_fn(t, None, |row, _| 100.0 - row as f64);
        let aspect = Grid::from_fn(t, None, |_, col| if col < 2 { 90.0 } else { -1.0 });

        let assignment = CellAssignment::build(&t, &zones, &ProcessingEnv::default()).unwrap();
        let elevation_points = assignment.sample(&elevation).unwrap();
        let aspect_points = assignment.sample(&aspect).unwrap();

        let stats = compute_zone_statistics(
            &zones,
            &assignment,
            SampledFields {
                elevation: &elevation_points,
                slope: None,
                aspect: Some(&aspect_points),
            },
        );

        let ids: Vec<ZoneId> = stats.iter().map(|s| s.zone_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(stats[0].elevation.unwrap().count, 8);
        assert_eq!(stats[0].elevation.unwrap().max, 100.0);
        assert_eq!(stats[0].aspect.unwrap().sample_count, 8);
        assert!(stats[0].slope.is_none());
        assert!(stats[0].slope_classes.is_none());

        // Zone 2 only has flat-sentinel aspect cells
        assert!(stats[1].aspect.is_none());

        // Zone 3 lies outside the grid
        assert!(stats[2].elevation.is_none());
        assert_eq!(stats[2].area_m2, 400.0);
    }

    #[test]
    fn test_row_flattening() {
        let stats = ZoneStatistics {
            zone_id: 4,
            area_m2: 250.0,
            elevation: None,
            slope: Some(LinearStats {
                min: 1.0,
                max: 9.0,
                mean: 5.0,
                std_dev: 2.0,
                median: 5.0,
                count: 3,
            }),
            aspect: None,
            slope_classes: None,
        };

        let row = stats.to_row();
        assert_eq!(row.zone_id, 4);
        assert_eq!(row.elev_mean, None);
        assert_eq!(row.slope_max, Some(9.0));
        assert_eq!(row.slope_count, Some(3));
        assert_eq!(row.slope_0_5_pct, None);
    }
}
