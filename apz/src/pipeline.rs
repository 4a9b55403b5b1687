//! End-to-end assessment run.
//!
//! [`run_assessment`] takes zones, structure footprints and terrain grids
//! through sampling, statistics, elevation partitioning, distance resolution
//! and geometry generation. Missing required inputs abort the run before any
//! per-zone work; every other problem is confined to its zone and recorded in
//! the [`Manifest`].

use tracing::{info, warn};

use crate::config::{AssessmentConfig, ProcessingEnv, ThresholdMode};
use crate::defensible::{generate_defensible_space, DefensibleSpace};
use crate::elevation::{
    classify_elevation, max_slope_by_partition, structure_threshold, vectorize_elevation,
    PartitionRegion,
};
use crate::error::{ApzError, Result};
use crate::grid::{Grid, TerrainGrids};
use crate::manifest::{Manifest, SkipReason, SkippedZone};
use crate::resolve::{assess_regions, ZoneAssessment};
use crate::sampler::CellAssignment;
use crate::stats::{compute_zone_statistics, SampledFields, ZoneStatistics};
use crate::zone::{Structure, ZoneSet};

/// Inputs of one assessment run.
#[derive(Debug, Clone)]
pub struct AssessmentInputs {
    pub zones: ZoneSet,
    pub structures: Vec<Structure>,
    pub terrain: TerrainGrids,
}

/// Everything an assessment run produces.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Elevation threshold separating the partitions, in metres.
    pub threshold_m: f64,
    /// One entry per zone, in zone input order.
    pub statistics: Vec<ZoneStatistics>,
    /// Partition regions in zone input order.
    pub partitions: Vec<PartitionRegion>,
    /// One entry per partition region, in the same order.
    pub assessments: Vec<ZoneAssessment>,
    pub defensible_space: DefensibleSpace,
    pub manifest: Manifest,
}

/// Elevation threshold for a run.
///
/// # Errors
///
/// Returns [`ApzError::MissingInput`] when the structure-mean threshold finds
/// no valid elevation under or at any footprint.
pub fn resolve_threshold(
    mode: ThresholdMode,
    elevation: &Grid,
    structures: &[Structure],
    env: &ProcessingEnv,
) -> Result<f64> {
    match mode {
        ThresholdMode::Fixed(threshold) => Ok(threshold),
        ThresholdMode::StructureMean => structure_threshold(elevation, structures, env)
            .ok_or(ApzError::MissingInput("elevation under structure footprints")),
    }
}

/// Run a full assessment.
///
/// # Errors
///
/// Returns an error if:
/// - No structure footprints are given
/// - A grid violates the processing environment
/// - The elevation threshold cannot be derived
pub fn run_assessment(inputs: &AssessmentInputs, config: &AssessmentConfig) -> Result<Assessment> {
    let AssessmentInputs {
        zones,
        structures,
        terrain,
    } = inputs;

    if structures.is_empty() {
        return Err(ApzError::MissingInput("structure footprints"));
    }
    info!(
        zones = zones.len(),
        structures = structures.len(),
        table = %config.table.version,
        "starting assessment"
    );

    let assignment = CellAssignment::build(terrain.transform(), zones, &config.env)?;
    info!(cells = assignment.len(), "assigned grid cells to zones");
    if assignment.is_empty() {
        warn!("no grid cell centre falls inside any zone");
    }

    let elevation_points = assignment.sample(terrain.elevation())?;
    let slope_points = terrain.slope().map(|g| assignment.sample(g)).transpose()?;
    let aspect_points = terrain.aspect().map(|g| assignment.sample(g)).transpose()?;

    let threshold_m = resolve_threshold(config.threshold, terrain.elevation(), structures, &config.env)?;
    info!(threshold_m, mode = ?config.threshold, "elevation threshold");

    let statistics = compute_zone_statistics(
        zones,
        &assignment,
        SampledFields {
            elevation: &elevation_points,
            slope: slope_points.as_deref(),
            aspect: aspect_points.as_deref(),
        },
    );

    let mut manifest = Manifest::default();
    for stats in &statistics {
        let mut skip = |reason: SkipReason| {
            warn!(zone = stats.zone_id, %reason, "missing data");
            manifest.push(SkippedZone::zone(stats.zone_id, reason));
        };
        if stats.elevation.is_none() {
            skip(SkipReason::NoElevationSamples);
        }
        if stats.slope.is_none() {
            skip(SkipReason::NoSlopeSamples);
        } else if stats.slope_classes.is_none() {
            skip(SkipReason::NoSlopeCoverage);
        }
        if stats.aspect.is_none() {
            skip(SkipReason::NoAspectSamples);
        }
    }

    let pieces = vectorize_elevation(terrain.elevation(), zones, &config.env);
    let partitions = classify_elevation(zones, &pieces, threshold_m);
    info!(pieces = pieces.len(), regions = partitions.len(), "partitioned elevation");
    for zone in zones.iter() {
        if !partitions.iter().any(|r| r.zone_id == zone.id()) {
            manifest.push(SkippedZone::zone(zone.id(), SkipReason::NoClassifiedElevation));
        }
    }

    let max_slopes = slope_points
        .as_deref()
        .map(|slope| max_slope_by_partition(&elevation_points, slope, threshold_m))
        .unwrap_or_default();

    let (assessments, unresolved) = assess_regions(zones, &partitions, &max_slopes, &config.table);
    manifest.extend(unresolved);

    let defensible_space = generate_defensible_space(structures, &assessments, &partitions);
    manifest.extend(defensible_space.skipped.iter().copied());

    info!(
        assessed = assessments.len(),
        skipped = manifest.len(),
        protected = defensible_space.unified.is_some(),
        "assessment complete"
    );

    Ok(Assessment {
        threshold_m,
        statistics,
        partitions,
        assessments,
        defensible_space,
        manifest,
    })
}
