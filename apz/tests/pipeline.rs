//! End-to-end runs over a synthetic 200 m x 200 m site.
//!
//! Layout (10 m cells, north-west corner at (0, 200)):
//! - elevation rises 1 m per column from 100 m in the west
//! - zone 1 covers the northern half, zone 2 the southern half
//! - one 20 m house sits on the centre of the site

use apz::table::TableRow;
use apz::{
    run_assessment, ApzTable, Assessment, AssessmentConfig, AssessmentInputs, EffectiveSlopeBucket,
    ElevationPartition, FuelClass, Grid, GridTransform, SkipReason, SlopeClass, Structure,
    TerrainGrids, ThresholdMode, Zone, ZoneSet,
};
use approx::assert_abs_diff_eq;
use geo::{coord, Area, BooleanOps, BoundingRect, Buffer, Polygon, Rect};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
}

fn site() -> AssessmentInputs {
    let t = GridTransform::new(0.0, 200.0, 10.0, 20, 20);

    let elevation = Grid::from_fn(t, Some(-9999.0), |_, col| 100.0 + col as f64);
    let slope = Grid::from_fn(t, Some(-9999.0), |row, col| match (row, col) {
        (0..=9, _) => 22.0,
        (_, 0..=9) => 22.0,
        (_, 10..=14) => 3.0,
        _ => 7.0,
    });
    let aspect = Grid::from_fn(t, Some(-9999.0), |row, col| {
        if row < 10 {
            45.0
        } else if col % 2 == 0 {
            350.0
        } else {
            10.0
        }
    });

    AssessmentInputs {
        zones: ZoneSet::new(vec![
            Zone::new(1, rect(0.0, 100.0, 200.0, 200.0)).with_vegetation("Grassland"),
            Zone::new(2, rect(0.0, 0.0, 200.0, 100.0)).with_vegetation("Coastal Swamp Forest"),
        ])
        .unwrap(),
        structures: vec![Structure::new(1, rect(90.0, 90.0, 110.0, 110.0))],
        terrain: TerrainGrids::new(elevation, Some(slope), Some(aspect)).unwrap(),
    }
}

fn run(config: &AssessmentConfig) -> Assessment {
    run_assessment(&site(), config).unwrap()
}

fn distance(a: &Assessment, zone_id: i64, partition: ElevationPartition) -> Option<u32> {
    a.assessments
        .iter()
        .find(|x| x.zone_id == zone_id && x.partition == partition)
        .and_then(|x| x.distance_m)
}

#[test]
fn test_threshold_is_mean_under_house() {
    let a = run(&AssessmentConfig::default());
    // Columns 9 and 10 lie under the house: (109 + 110) / 2
    assert_abs_diff_eq!(a.threshold_m, 109.5, epsilon = 1e-9);
}

#[test]
fn test_zone_statistics() {
    let a = run(&AssessmentConfig::default());
    assert_eq!(a.statistics.len(), 2);

    let north = &a.statistics[0];
    assert_eq!(north.zone_id, 1);
    assert_abs_diff_eq!(north.area_m2, 20_000.0, epsilon = 1e-6);

    let elev = north.elevation.unwrap();
    assert_eq!(elev.count, 200);
    assert_eq!(elev.min, 100.0);
    assert_eq!(elev.max, 119.0);
    assert_abs_diff_eq!(elev.mean, 109.5, epsilon = 1e-9);

    let aspect = north.aspect.unwrap();
    assert_eq!(aspect.sample_count, 200);
    assert_abs_diff_eq!(aspect.mean_direction_deg, 45.0, epsilon = 1e-9);
    assert_abs_diff_eq!(aspect.circular_std_dev_deg, 0.0, epsilon = 1e-4);
}

#[test]
fn test_aspect_mean_wraps_through_north() {
    let a = run(&AssessmentConfig::default());
    let aspect = a.statistics[1].aspect.unwrap();

    // 350 and 10 average to north, not south
    let m = aspect.mean_direction_deg;
    assert!((0.0..360.0).contains(&m));
    assert!(m.min(360.0 - m) < 1e-6, "mean direction {}", m);
    assert!(aspect.circular_std_dev_deg < 15.0);
}

#[test]
fn test_slope_class_shares() {
    let a = run(&AssessmentConfig::default());
    for stats in &a.statistics {
        let classes = stats.slope_classes.unwrap();
        assert!(classes.total_percent() <= 100.0 + 1e-9);
    }

    let north = a.statistics[0].slope_classes.unwrap();
    assert_abs_diff_eq!(north.percent(SlopeClass::Deg15To30), 100.0, epsilon = 1e-9);

    let south = a.statistics[1].slope_classes.unwrap();
    assert_abs_diff_eq!(south.percent(SlopeClass::Deg0To5), 25.0, epsilon = 1e-9);
    assert_abs_diff_eq!(south.percent(SlopeClass::Deg5To15), 25.0, epsilon = 1e-9);
    assert_abs_diff_eq!(south.percent(SlopeClass::Deg15To30), 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(south.area(SlopeClass::Deg15To30), 10_000.0, epsilon = 1e-6);
}

#[test]
fn test_partitions_are_disjoint_and_exhaustive() {
    let a = run(&AssessmentConfig::default());
    assert_eq!(a.partitions.len(), 4);

    for zone_id in [1, 2] {
        let regions: Vec<_> = a.partitions.iter().filter(|r| r.zone_id == zone_id).collect();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].partition, ElevationPartition::UpslopeOrFlat);
        assert_eq!(regions[1].partition, ElevationPartition::Downslope);

        let total: f64 = regions.iter().map(|r| r.region.unsigned_area()).sum();
        assert_abs_diff_eq!(total, 20_000.0, epsilon = 1e-6);

        let overlap = regions[0].region.intersection(&regions[1].region);
        assert_abs_diff_eq!(overlap.unsigned_area(), 0.0, epsilon = 1e-6);
    }

    // West of the threshold column is upslope/flat
    let up = a.partitions[0].region.bounding_rect().unwrap();
    assert_abs_diff_eq!(up.min().x, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(up.max().x, 100.0, epsilon = 1e-9);
}

#[test]
fn test_distances_resolve_from_standard_table() {
    let a = run(&AssessmentConfig::default());
    assert_eq!(a.assessments.len(), 4);

    // Grassland upslope ignores its 22 degree slope
    let north_up = &a.assessments[0];
    assert_eq!(north_up.fuel_class, FuelClass::Grassland);
    assert_eq!(north_up.bucket, Some(EffectiveSlopeBucket::UpslopesAndFlat));
    assert_eq!(north_up.max_slope_deg, Some(22.0));
    assert_eq!(distance(&a, 1, ElevationPartition::UpslopeOrFlat), Some(36));
    assert_eq!(distance(&a, 1, ElevationPartition::Downslope), Some(55));

    // Coastal swamp forest is a Forest, not a wetland
    let south_down = &a.assessments[3];
    assert_eq!(south_down.fuel_class, FuelClass::Forest);
    assert_eq!(south_down.max_slope_deg, Some(7.0));
    assert_eq!(south_down.bucket, Some(EffectiveSlopeBucket::Downslope5To10));
    assert_eq!(distance(&a, 2, ElevationPartition::UpslopeOrFlat), Some(67));
    assert_eq!(distance(&a, 2, ElevationPartition::Downslope), Some(93));

    assert!(a.manifest.is_empty(), "{:?}", a.manifest);
}

#[test]
fn test_defensible_space_stays_in_region_and_range() {
    let a = run(&AssessmentConfig::default());
    let space = &a.defensible_space;
    assert_eq!(space.pieces.len(), 4);
    assert!(!space.boundary.is_empty());

    for piece in &space.pieces {
        let region = a
            .partitions
            .iter()
            .find(|r| r.zone_id == piece.attributes.zone_id && r.partition == piece.attributes.partition)
            .unwrap();
        let outside = piece.polygon.difference(&region.region);
        assert!(outside.unsigned_area() < 1e-3);

        let d = piece.attributes.apz_distance_m;
        let bbox = piece.polygon.bounding_rect().unwrap();
        assert!(bbox.min().x >= 90.0 - d - 1e-6);
        assert!(bbox.max().x <= 110.0 + d + 1e-6);
    }

    let unified = space.unified.as_ref().unwrap();
    assert_eq!(unified.zone_ids, vec![1, 2]);
    assert_eq!(unified.max_distance_m, 93.0);
    let summed: f64 = space.pieces.iter().map(|p| p.polygon.unsigned_area()).sum();
    assert_abs_diff_eq!(unified.area_m2, summed, epsilon = 0.5);
    assert!(unified.polygon.iter().all(|p| p.interiors().is_empty()));
}

#[test]
fn test_zone_boundary_inside_cells_leaves_no_gap() {
    let mut inputs = site();
    // x = 103 cuts column 10 of the grid
    inputs.zones = ZoneSet::new(vec![
        Zone::new(1, rect(0.0, 0.0, 103.0, 200.0)).with_vegetation("Grassland"),
        Zone::new(2, rect(103.0, 0.0, 200.0, 200.0)).with_vegetation("Grassland"),
    ])
    .unwrap();
    let config = AssessmentConfig::builder()
        .threshold(ThresholdMode::Fixed(1000.0))
        .build()
        .unwrap();
    let a = run_assessment(&inputs, &config).unwrap();

    assert_eq!(a.partitions.len(), 2);
    assert_abs_diff_eq!(a.partitions[0].area_m2, 20_600.0, epsilon = 1e-6);
    assert_abs_diff_eq!(a.partitions[1].area_m2, 19_400.0, epsilon = 1e-6);
    let overlap = a.partitions[0].region.intersection(&a.partitions[1].region);
    assert_abs_diff_eq!(overlap.unsigned_area(), 0.0, epsilon = 1e-6);

    // Both sides take 36 m, so the merged zone is the whole house buffer
    let house = inputs.structures[0].footprint.buffer(36.0);
    let unified = a.defensible_space.unified.unwrap();
    assert_eq!(unified.zone_ids, vec![1, 2]);
    assert_abs_diff_eq!(unified.area_m2, house.unsigned_area(), epsilon = 0.5);
}

#[test]
fn test_zero_distance_contributes_no_geometry() {
    let mut table = ApzTable::standard();
    table.rows.retain(|r| r.fuel_class != FuelClass::Grassland);
    table
        .rows
        .push(TableRow::complete(FuelClass::Grassland, [0, 40, 45, 50, 55]));
    table.validate().unwrap();

    let config = AssessmentConfig::builder().table(table).build().unwrap();
    let a = run(&config);

    assert_eq!(distance(&a, 1, ElevationPartition::UpslopeOrFlat), Some(0));
    assert!(a.manifest.contains(1, SkipReason::NonPositiveDistance));
    assert!(!a.defensible_space.pieces.iter().any(|p| {
        p.attributes.zone_id == 1 && p.attributes.partition == ElevationPartition::UpslopeOrFlat
    }));
    assert_eq!(a.defensible_space.pieces.len(), 3);
}

#[test]
fn test_fixed_threshold_moves_partition() {
    let config = AssessmentConfig::builder()
        .threshold(ThresholdMode::Fixed(200.0))
        .build()
        .unwrap();
    let a = run(&config);

    // Nothing lies above 200 m
    assert_eq!(a.threshold_m, 200.0);
    assert!(a
        .partitions
        .iter()
        .all(|r| r.partition == ElevationPartition::UpslopeOrFlat));
    assert_eq!(distance(&a, 2, ElevationPartition::UpslopeOrFlat), Some(67));
}

#[test]
fn test_standard_table_is_monotonic() {
    let table = ApzTable::standard();
    table.validate().unwrap();
    for row in &table.rows {
        let d = row.distances();
        assert!(d.iter().all(Option::is_some));
        assert!(d.windows(2).all(|w| w[0] <= w[1]), "{:?}", row.fuel_class);
    }
}
