use anyhow::{Context, Result};
use apz::geojson::{assessment_layer, boundary_layer, partitions_layer, protection_zone_layer};
use apz::{run_assessment, Assessment, AssessmentConfigBuilder, AssessmentInputs, ThresholdMode};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::input::{load_structures, spinner, SiteArgs};

pub fn run(
    site: SiteArgs,
    structures: PathBuf,
    threshold: Option<f64>,
    table: Option<PathBuf>,
    output: PathBuf,
) -> Result<()> {
    let pb = spinner("Loading inputs")?;
    let zones = site.load_zones()?;
    let structures = load_structures(&structures)?;
    let terrain = site.load_terrain()?;
    info!(zones = zones.len(), structures = structures.len(), "loaded inputs");

    let mut builder = site.configure(AssessmentConfigBuilder::new())?;
    if let Some(threshold) = threshold {
        builder = builder.threshold(ThresholdMode::Fixed(threshold));
    }
    if let Some(path) = table {
        builder = builder.table_path(path);
    }
    let config = builder.build().context("Invalid assessment configuration")?;

    pb.set_message("Assessing zones");
    let inputs = AssessmentInputs {
        zones,
        structures,
        terrain,
    };
    let assessment = run_assessment(&inputs, &config).context("Assessment failed")?;

    pb.set_message("Writing outputs");
    write_outputs(&assessment, &output)?;
    pb.finish_with_message("done");

    print_summary(&assessment, &output);
    Ok(())
}

fn write_outputs(assessment: &Assessment, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let csv_path = dir.join("zone_statistics.csv");
    let file = File::create(&csv_path).context("Failed to create statistics file")?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    for stats in &assessment.statistics {
        writer.serialize(stats.to_row())?;
    }
    writer.flush()?;

    write_json(
        &dir.join("elevation_partitions.geojson"),
        &partitions_layer(&assessment.partitions),
    )?;
    write_json(&dir.join("assessment.geojson"), &assessment_layer(assessment))?;
    write_json(
        &dir.join("apz_polygon.geojson"),
        &protection_zone_layer(assessment.defensible_space.unified.as_ref()),
    )?;
    write_json(
        &dir.join("apz_boundary.geojson"),
        &boundary_layer(&assessment.defensible_space.boundary),
    )?;
    write_json(&dir.join("manifest.json"), &assessment.manifest)?;

    info!(dir = %dir.display(), "wrote outputs");
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn print_summary(assessment: &Assessment, dir: &Path) {
    println!("Elevation threshold: {:.2}m", assessment.threshold_m);
    println!();
    println!(
        "{:>8}  {:<14}  {:<20}  {:<16}  {:>9}",
        "Zone", "Partition", "Fuel class", "Slope bucket", "APZ (m)"
    );
    for a in &assessment.assessments {
        println!(
            "{:>8}  {:<14}  {:<20}  {:<16}  {:>9}",
            a.zone_id,
            a.partition.label(),
            a.fuel_class.key(),
            a.bucket.map_or("-", |b| b.label()),
            a.distance_m.map_or_else(|| "-".to_string(), |d| d.to_string()),
        );
    }
    println!();

    match &assessment.defensible_space.unified {
        Some(zone) => println!(
            "Protection zone: {:.0} m2 from {} zone(s), max distance {}m",
            zone.area_m2,
            zone.zone_ids.len(),
            zone.max_distance_m
        ),
        None => println!("Protection zone: none"),
    }
    if !assessment.manifest.is_empty() {
        println!("Skipped: {} entries (see manifest.json)", assessment.manifest.len());
    }
    println!("Output written to: {}", dir.display());
}
