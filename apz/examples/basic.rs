//! Basic example: assess a small synthetic hillside around one house.
//!
//! Run with: cargo run --example basic

use apz::{
    run_assessment, ApzError, AssessmentConfig, AssessmentInputs, Grid, GridTransform, Structure,
    TerrainGrids, Zone, ZoneSet,
};
use geo::{coord, Polygon, Rect};

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
}

fn main() -> Result<(), ApzError> {
    // 400 m square, 10 m cells, ground falling away to the east
    let t = GridTransform::new(0.0, 400.0, 10.0, 40, 40);
    let elevation = Grid::from_fn(t, None, |_, col| 150.0 - col as f64 * 1.5);
    let slope = Grid::from_fn(t, None, |_, col| if col < 20 { 4.0 } else { 12.0 });
    let aspect = Grid::from_fn(t, None, |_, _| 90.0);

    let inputs = AssessmentInputs {
        zones: ZoneSet::new(vec![
            Zone::new(1, rect(0.0, 0.0, 200.0, 400.0)).with_vegetation("Grassland"),
            Zone::new(2, rect(200.0, 0.0, 400.0, 400.0)).with_vegetation("Dry Sclerophyll Forest"),
        ])?,
        structures: vec![Structure::new(1, rect(185.0, 190.0, 205.0, 210.0))],
        terrain: TerrainGrids::new(elevation, Some(slope), Some(aspect))?,
    };

    let assessment = run_assessment(&inputs, &AssessmentConfig::default())?;

    println!("Elevation threshold: {:.1}m", assessment.threshold_m);
    println!();
    println!("Zone statistics:");
    println!("{:-<50}", "");
    for stats in &assessment.statistics {
        if let (Some(elev), Some(aspect)) = (stats.elevation, stats.aspect) {
            println!(
                "zone {}: {:.0}-{:.0}m, mean aspect {:.0} deg",
                stats.zone_id, elev.min, elev.max, aspect.mean_direction_deg
            );
        }
    }

    println!();
    println!("APZ distances:");
    println!("{:-<50}", "");
    for a in &assessment.assessments {
        match a.distance_m {
            Some(d) => println!(
                "zone {} {}: {} ({}) -> {}m",
                a.zone_id,
                a.partition,
                a.fuel_class.key(),
                a.bucket.map_or("-", |b| b.label()),
                d
            ),
            None => println!("zone {} {}: unresolved", a.zone_id, a.partition),
        }
    }

    if let Some(zone) = &assessment.defensible_space.unified {
        println!();
        println!("Protection zone: {:.0} m2, up to {}m", zone.area_m2, zone.max_distance_m);
    }
    for skipped in &assessment.manifest.skipped {
        println!("skipped zone {}: {}", skipped.zone_id, skipped.reason);
    }

    Ok(())
}
