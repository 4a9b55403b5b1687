use anyhow::{Context, Result};
use apz::stats::{compute_zone_statistics, SampledFields};
use apz::{AssessmentConfigBuilder, CellAssignment};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use super::input::{spinner, SiteArgs};

pub fn run(site: SiteArgs, output: Option<PathBuf>, json: bool) -> Result<()> {
    let pb = spinner("Loading inputs")?;
    let zones = site.load_zones()?;
    let terrain = site.load_terrain()?;
    let config = site
        .configure(AssessmentConfigBuilder::new())?
        .build()
        .context("Invalid processing environment")?;

    pb.set_message("Sampling grids");
    let assignment = CellAssignment::build(terrain.transform(), &zones, &config.env)?;
    let elevation = assignment.sample(terrain.elevation())?;
    let slope = terrain.slope().map(|g| assignment.sample(g)).transpose()?;
    let aspect = terrain.aspect().map(|g| assignment.sample(g)).transpose()?;

    pb.set_message("Computing statistics");
    let rows: Vec<_> = compute_zone_statistics(
        &zones,
        &assignment,
        SampledFields {
            elevation: &elevation,
            slope: slope.as_deref(),
            aspect: aspect.as_deref(),
        },
    )
    .iter()
    .map(|s| s.to_row())
    .collect();
    pb.finish_and_clear();

    let out: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).context("Failed to create output file")?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    if json {
        let mut out = out;
        serde_json::to_writer_pretty(&mut out, &rows)?;
        writeln!(out)?;
        out.flush()?;
    } else {
        let mut writer = csv::Writer::from_writer(out);
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }

    if let Some(path) = output {
        eprintln!("Output written to: {}", path.display());
    }
    Ok(())
}
