//! Effective slope buckets and the APZ distance table.
//!
//! The table maps a fuel class and an effective slope bucket to the required
//! protection distance in metres. A built-in table ships with the crate; a
//! replacement can be loaded from JSON:
//!
//! ```json
//! {
//!   "version": "site-2024",
//!   "fallback_distance_m": 36,
//!   "rows": [
//!     { "fuel_class": "grassland", "upslopes_and_flat": 36, "downslope_0_to_5": 40,
//!       "downslope_5_to_10": 45, "downslope_10_to_15": 50, "downslope_15_to_20": 55 }
//!   ]
//! }
//! ```
//!
//! A bucket field left out of a row is undefined for that fuel class; looking
//! it up is a miss, not an error.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::elevation::ElevationPartition;
use crate::error::{ApzError, Result};
use crate::fuel::FuelClass;

/// Discretised slope severity used with the fuel class to index the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectiveSlopeBucket {
    #[serde(rename = "UpslopesAndFlat")]
    UpslopesAndFlat,
    #[serde(rename = "0to5")]
    Downslope0To5,
    #[serde(rename = "5to10")]
    Downslope5To10,
    #[serde(rename = "10to15")]
    Downslope10To15,
    #[serde(rename = "15to20")]
    Downslope15To20,
}

/// Slopes below this many degrees count as flat even on downslope ground.
pub const FLAT_SLOPE_DEG: f64 = 1.0;

impl EffectiveSlopeBucket {
    /// Buckets in increasing severity.
    pub const ALL: [EffectiveSlopeBucket; 5] = [
        EffectiveSlopeBucket::UpslopesAndFlat,
        EffectiveSlopeBucket::Downslope0To5,
        EffectiveSlopeBucket::Downslope5To10,
        EffectiveSlopeBucket::Downslope10To15,
        EffectiveSlopeBucket::Downslope15To20,
    ];

    /// Bucket for a downslope maximum slope in degrees.
    ///
    /// Slopes of 15° and above share the steepest bucket.
    pub fn from_downslope(max_slope_deg: f64) -> Self {
        match max_slope_deg {
            s if s < FLAT_SLOPE_DEG => EffectiveSlopeBucket::UpslopesAndFlat,
            s if s < 5.0 => EffectiveSlopeBucket::Downslope0To5,
            s if s < 10.0 => EffectiveSlopeBucket::Downslope5To10,
            s if s < 15.0 => EffectiveSlopeBucket::Downslope10To15,
            _ => EffectiveSlopeBucket::Downslope15To20,
        }
    }

    /// Bucket for a partition region.
    ///
    /// Upslope/flat ground is always [`UpslopesAndFlat`](Self::UpslopesAndFlat).
    /// Downslope ground needs a measured slope; without one the bucket is
    /// undetermined.
    pub fn derive(partition: ElevationPartition, max_slope_deg: Option<f64>) -> Option<Self> {
        match partition {
            ElevationPartition::UpslopeOrFlat => Some(EffectiveSlopeBucket::UpslopesAndFlat),
            ElevationPartition::Downslope => max_slope_deg.map(Self::from_downslope),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EffectiveSlopeBucket::UpslopesAndFlat => "UpslopesAndFlat",
            EffectiveSlopeBucket::Downslope0To5 => "0to5",
            EffectiveSlopeBucket::Downslope5To10 => "5to10",
            EffectiveSlopeBucket::Downslope10To15 => "10to15",
            EffectiveSlopeBucket::Downslope15To20 => "15to20",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EffectiveSlopeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Distances for one fuel class, one per bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub fuel_class: FuelClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upslopes_and_flat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downslope_0_to_5: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downslope_5_to_10: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downslope_10_to_15: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downslope_15_to_20: Option<u32>,
}

impl TableRow {
    /// A row with every bucket defined, distances in bucket order.
    pub fn complete(fuel_class: FuelClass, distances: [u32; 5]) -> Self {
        let [flat, d5, d10, d15, d20] = distances;
        Self {
            fuel_class,
            upslopes_and_flat: Some(flat),
            downslope_0_to_5: Some(d5),
            downslope_5_to_10: Some(d10),
            downslope_10_to_15: Some(d15),
            downslope_15_to_20: Some(d20),
        }
    }

    /// Distances in bucket order.
    pub fn distances(&self) -> [Option<u32>; 5] {
        [
            self.upslopes_and_flat,
            self.downslope_0_to_5,
            self.downslope_5_to_10,
            self.downslope_10_to_15,
            self.downslope_15_to_20,
        ]
    }

    pub fn get(&self, bucket: EffectiveSlopeBucket) -> Option<u32> {
        self.distances()[bucket.index()]
    }
}

/// Outcome of resolving a distance for one fuel class and bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Distance from the table.
    Table(u32),
    /// Unclassified vegetation; the fixed fallback distance.
    Fallback(u32),
    /// The fuel class has no distance for this bucket.
    Miss,
}

impl Resolution {
    pub fn distance(&self) -> Option<u32> {
        match self {
            Resolution::Table(d) | Resolution::Fallback(d) => Some(*d),
            Resolution::Miss => None,
        }
    }
}

/// Versioned lookup of fuel class × slope bucket → distance in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApzTable {
    pub version: String,
    /// Distance given to [`FuelClass::NotClassified`] zones.
    pub fallback_distance_m: u32,
    pub rows: Vec<TableRow>,
}

/// Version tag of [`ApzTable::standard`].
pub const STANDARD_TABLE_VERSION: &str = "apz-standard-1";

/// Fallback distance of the built-in table.
pub const STANDARD_FALLBACK_DISTANCE_M: u32 = 36;

impl Default for ApzTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ApzTable {
    /// The built-in table.
    pub fn standard() -> Self {
        use FuelClass::*;
        let rows = vec![
            TableRow::complete(Rainforest, [36, 40, 45, 50, 56]),
            TableRow::complete(Forest, [67, 79, 93, 100, 100]),
            TableRow::complete(GrassyWoodland, [42, 50, 58, 67, 79]),
            TableRow::complete(ForestedWetland, [57, 67, 79, 93, 100]),
            TableRow::complete(TallHeath, [50, 56, 61, 67, 72]),
            TableRow::complete(ShortHeath, [40, 43, 46, 50, 53]),
            TableRow::complete(AridShrubland, [36, 38, 41, 45, 48]),
            TableRow::complete(FreshwaterWetland, [36, 38, 41, 45, 48]),
            TableRow::complete(Grassland, [36, 40, 45, 50, 55]),
        ];
        Self {
            version: STANDARD_TABLE_VERSION.to_string(),
            fallback_distance_m: STANDARD_FALLBACK_DISTANCE_M,
            rows,
        }
    }

    /// Parse and validate a table from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let table: ApzTable = serde_json::from_str(text)?;
        table.validate()?;
        Ok(table)
    }

    /// Load and validate a table from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the table's construction rules.
    ///
    /// # Errors
    ///
    /// Returns [`ApzError::InvalidTable`] if:
    /// - A row uses `NotClassified` (it always takes the fallback)
    /// - Two rows share a fuel class
    /// - A row's defined distances decrease with slope severity
    /// - The fallback distance is zero
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ApzError::InvalidTable { message });

        if self.fallback_distance_m == 0 {
            return invalid("fallback distance must be positive".to_string());
        }

        let mut seen = BTreeSet::new();
        for row in &self.rows {
            if row.fuel_class == FuelClass::NotClassified {
                return invalid("NotClassified cannot have a table row".to_string());
            }
            if !seen.insert(row.fuel_class) {
                return invalid(format!("duplicate row for {}", row.fuel_class.key()));
            }

            let defined: Vec<(EffectiveSlopeBucket, u32)> = EffectiveSlopeBucket::ALL
                .iter()
                .filter_map(|&b| row.get(b).map(|d| (b, d)))
                .collect();
            for pair in defined.windows(2) {
                let ((lo_bucket, lo), (hi_bucket, hi)) = (pair[0], pair[1]);
                if hi < lo {
                    return invalid(format!(
                        "{}: distance for {} ({} m) is less than for {} ({} m)",
                        row.fuel_class.key(),
                        hi_bucket,
                        hi,
                        lo_bucket,
                        lo
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn row(&self, fuel_class: FuelClass) -> Option<&TableRow> {
        self.rows.iter().find(|r| r.fuel_class == fuel_class)
    }

    /// Raw table lookup; `None` for a missing row or undefined bucket.
    pub fn lookup(&self, fuel_class: FuelClass, bucket: EffectiveSlopeBucket) -> Option<u32> {
        self.row(fuel_class)?.get(bucket)
    }

    /// Resolve the distance for a fuel class and bucket.
    ///
    /// `NotClassified` bypasses the table and takes the fallback distance.
    pub fn resolve(&self, fuel_class: FuelClass, bucket: EffectiveSlopeBucket) -> Resolution {
        if fuel_class == FuelClass::NotClassified {
            return Resolution::Fallback(self.fallback_distance_m);
        }
        match self.lookup(fuel_class, bucket) {
            Some(distance) => Resolution::Table(distance),
            None => Resolution::Miss,
        }
    }
}
