use anyhow::{Context, Result};
use apz::fuel::{classify_vegetation, matching_rule};
use apz::{ApzTable, AssessmentConfigBuilder, EffectiveSlopeBucket, ElevationPartition};
use serde::Serialize;
use std::path::PathBuf;

use crate::PartitionArg;

#[derive(Serialize)]
struct Classification<'a> {
    label: &'a str,
    fuel_class: &'static str,
    fuel_class_name: &'static str,
    rule: Option<&'static str>,
    partition: Option<&'static str>,
    max_slope_deg: Option<f64>,
    effective_slope_bucket: Option<&'static str>,
    apz_distance_m: Option<u32>,
}

pub fn run(
    label: &str,
    partition: Option<PartitionArg>,
    max_slope: Option<f64>,
    table: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let table = load_table(table)?;
    let fuel_class = classify_vegetation(label);
    let partition = partition.map(ElevationPartition::from);

    let bucket = partition.and_then(|p| EffectiveSlopeBucket::derive(p, max_slope));
    let distance = bucket.and_then(|b| table.resolve(fuel_class, b).distance());

    let result = Classification {
        label,
        fuel_class: fuel_class.key(),
        fuel_class_name: fuel_class.name(),
        rule: matching_rule(label).map(|r| r.name),
        partition: partition.map(|p| p.label()),
        max_slope_deg: max_slope,
        effective_slope_bucket: bucket.map(|b| b.label()),
        apz_distance_m: distance,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Label: {}", label);
    println!("Fuel class: {}", result.fuel_class_name);
    println!("Rule: {}", result.rule.unwrap_or("none"));
    if let Some(partition) = result.partition {
        println!("Partition: {}", partition);
        match result.effective_slope_bucket {
            Some(bucket) => {
                println!("Slope bucket: {}", bucket);
                match distance {
                    Some(d) => println!("APZ distance: {}m ({})", d, table.version),
                    None => println!("APZ distance: not defined in table {}", table.version),
                }
            }
            None => println!("Slope bucket: unknown, downslope ground needs --max-slope"),
        }
    }
    Ok(())
}

pub fn load_table(path: Option<PathBuf>) -> Result<ApzTable> {
    let builder = match path {
        Some(path) => AssessmentConfigBuilder::new().table_path(path),
        None => AssessmentConfigBuilder::new(),
    };
    Ok(builder.build().context("Failed to load APZ table")?.table)
}
