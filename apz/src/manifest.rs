//! Record of zones skipped during a run.

use std::fmt;

use serde::Serialize;

use crate::elevation::ElevationPartition;
use crate::fuel::FuelClass;
use crate::table::EffectiveSlopeBucket;
use crate::zone::ZoneId;

/// Why part of a zone produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// No elevation cell centre fell inside the zone.
    NoElevationSamples,
    /// No slope cell centre fell inside the zone.
    NoSlopeSamples,
    /// No aspect sample with a direction fell inside the zone.
    NoAspectSamples,
    /// No slope cell could be put in a slope class.
    NoSlopeCoverage,
    /// Neither elevation partition has any cells.
    NoClassifiedElevation,
    /// Downslope ground without a measured slope; the bucket is undetermined.
    MissingSlope,
    /// The table has no distance for this fuel class and bucket.
    LookupMiss {
        fuel_class: FuelClass,
        bucket: EffectiveSlopeBucket,
    },
    /// No distance was resolved, so no geometry was generated.
    MissingDistance,
    /// The resolved distance is zero or negative.
    NonPositiveDistance,
    /// The buffered structures do not reach the region.
    EmptyClip,
    /// No buffer outline lies inside the region.
    EmptyBoundary,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoElevationSamples => write!(f, "no elevation samples"),
            SkipReason::NoSlopeSamples => write!(f, "no slope samples"),
            SkipReason::NoAspectSamples => write!(f, "no aspect samples"),
            SkipReason::NoSlopeCoverage => write!(f, "no slope-class coverage"),
            SkipReason::NoClassifiedElevation => write!(f, "no classified elevation"),
            SkipReason::MissingSlope => write!(f, "downslope region without slope data"),
            SkipReason::LookupMiss { fuel_class, bucket } => {
                write!(f, "no table distance for {} at {}", fuel_class.key(), bucket)
            }
            SkipReason::MissingDistance => write!(f, "no resolved distance"),
            SkipReason::NonPositiveDistance => write!(f, "non-positive distance"),
            SkipReason::EmptyClip => write!(f, "buffer does not reach the region"),
            SkipReason::EmptyBoundary => write!(f, "no buffer outline inside the region"),
        }
    }
}

/// One manifest entry. `partition` is `None` for zone-wide reasons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkippedZone {
    pub zone_id: ZoneId,
    pub partition: Option<ElevationPartition>,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl SkippedZone {
    pub fn zone(zone_id: ZoneId, reason: SkipReason) -> Self {
        Self {
            zone_id,
            partition: None,
            reason,
        }
    }

    pub fn region(zone_id: ZoneId, partition: ElevationPartition, reason: SkipReason) -> Self {
        Self {
            zone_id,
            partition: Some(partition),
            reason,
        }
    }
}

/// Per-zone problems collected over a run, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    pub skipped: Vec<SkippedZone>,
}

impl Manifest {
    pub fn push(&mut self, entry: SkippedZone) {
        self.skipped.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = SkippedZone>) {
        self.skipped.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Entries for one zone.
    pub fn for_zone(&self, zone_id: ZoneId) -> impl Iterator<Item = &SkippedZone> {
        self.skipped.iter().filter(move |s| s.zone_id == zone_id)
    }

    pub fn contains(&self, zone_id: ZoneId, reason: SkipReason) -> bool {
        self.for_zone(zone_id).any(|s| s.reason == reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_serializes_flat_entries() {
        let mut manifest = Manifest::default();
        manifest.push(SkippedZone::zone(3, SkipReason::NoSlopeSamples));
        manifest.push(SkippedZone::region(
            4,
            ElevationPartition::Downslope,
            SkipReason::LookupMiss {
                fuel_class: FuelClass::Forest,
                bucket: EffectiveSlopeBucket::Downslope15To20,
            },
        ));

        let json = serde_json::to_value(&manifest).unwrap();
        let entries = json["skipped"].as_array().unwrap();
        assert_eq!(entries[0]["reason"], "no_slope_samples");
        assert!(entries[0]["partition"].is_null());
        assert_eq!(entries[1]["reason"], "lookup_miss");
        assert_eq!(entries[1]["fuel_class"], "forest");
        assert_eq!(entries[1]["bucket"], "15to20");
        assert_eq!(entries[1]["partition"], "Downslope");

        assert!(manifest.contains(3, SkipReason::NoSlopeSamples));
        assert!(!manifest.contains(4, SkipReason::NoSlopeSamples));
    }

    #[test]
    fn test_reason_display() {
        let reason = SkipReason::LookupMiss {
            fuel_class: FuelClass::Grassland,
            bucket: EffectiveSlopeBucket::Downslope0To5,
        };
        assert_eq!(reason.to_string(), "no table distance for grassland at 0to5");
    }
}
