//! APZ distance resolution for partition regions.
//!
//! Each [`PartitionRegion`] gets one [`ZoneAssessment`]: the zone's vegetation
//! label is mapped to a fuel class, the region's partition and maximum slope
//! give the effective slope bucket, and the table gives the distance.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::elevation::{ElevationPartition, PartitionRegion};
use crate::fuel::{classify_vegetation, FuelClass};
use crate::manifest::{SkipReason, SkippedZone};
use crate::table::{ApzTable, EffectiveSlopeBucket, Resolution};
use crate::zone::{ZoneId, ZoneSet};

/// Resolved APZ attributes of one partition region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneAssessment {
    pub zone_id: ZoneId,
    pub partition: ElevationPartition,
    pub vegetation: Option<String>,
    pub fuel_class: FuelClass,
    /// Maximum slope in degrees over the region's cells.
    pub max_slope_deg: Option<f64>,
    pub bucket: Option<EffectiveSlopeBucket>,
    /// Required distance in metres; `None` when it could not be resolved.
    pub distance_m: Option<u32>,
}

/// Resolve one region.
///
/// Returns the assessment and, when no distance results, the reason.
pub fn assess_region(
    zone_id: ZoneId,
    partition: ElevationPartition,
    vegetation: Option<&str>,
    max_slope_deg: Option<f64>,
    table: &ApzTable,
) -> (ZoneAssessment, Option<SkipReason>) {
    let fuel_class = vegetation.map_or(FuelClass::NotClassified, classify_vegetation);
    let bucket = EffectiveSlopeBucket::derive(partition, max_slope_deg);

    let (distance_m, reason) = match (fuel_class, bucket) {
        (FuelClass::NotClassified, _) => {
            // The fallback applies whatever the bucket
            let bucket = bucket.unwrap_or(EffectiveSlopeBucket::UpslopesAndFlat);
            (table.resolve(fuel_class, bucket).distance(), None)
        }
        (_, None) => (None, Some(SkipReason::MissingSlope)),
        (_, Some(bucket)) => match table.resolve(fuel_class, bucket) {
            Resolution::Miss => (None, Some(SkipReason::LookupMiss { fuel_class, bucket })),
            resolved => (resolved.distance(), None),
        },
    };

    (
        ZoneAssessment {
            zone_id,
            partition,
            vegetation: vegetation.map(str::to_string),
            fuel_class,
            max_slope_deg,
            bucket,
            distance_m,
        },
        reason,
    )
}

/// Resolve every region, in region order.
///
/// `max_slopes` holds the maximum slope per zone and partition. Regions that
/// resolve to no distance still get an assessment; the reason goes to the
/// returned skip list.
pub fn assess_regions(
    zones: &ZoneSet,
    regions: &[PartitionRegion],
    max_slopes: &BTreeMap<(ZoneId, ElevationPartition), f64>,
    table: &ApzTable,
) -> (Vec<ZoneAssessment>, Vec<SkippedZone>) {
    let mut assessments = Vec::with_capacity(regions.len());
    let mut skipped = Vec::new();

    for region in regions {
        let vegetation = zones.get(region.zone_id).and_then(|z| z.vegetation());
        let max_slope = max_slopes.get(&(region.zone_id, region.partition)).copied();

        let (assessment, reason) =
            assess_region(region.zone_id, region.partition, vegetation, max_slope, table);

        match reason {
            Some(reason) => {
                warn!(zone = region.zone_id, partition = %region.partition, %reason, "no APZ distance");
                skipped.push(SkippedZone::region(region.zone_id, region.partition, reason));
            }
            None => debug!(
                zone = region.zone_id,
                partition = %region.partition,
                fuel_class = assessment.fuel_class.key(),
                distance_m = assessment.distance_m,
                "resolved APZ distance"
            ),
        }
        assessments.push(assessment);
    }

    (assessments, skipped)
}
