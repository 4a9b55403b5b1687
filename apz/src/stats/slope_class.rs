//! Slope-class area tabulation.
//!
//! Slope cells are binned into five bands, `[0,5)`, `[5,15)`, `[15,30)`,
//! `[30,45)` and `[45,360)` degrees, and each band's area is reported per zone
//! together with its share of the zone.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{accumulate_by_zone, Accumulator};
use crate::sampler::{CellAssignment, SampledPoint};
use crate::zone::{ZoneId, ZoneSet};

/// A slope band in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SlopeClass {
    Deg0To5,
    Deg5To15,
    Deg15To30,
    Deg30To45,
    Deg45Plus,
}

impl SlopeClass {
    pub const ALL: [SlopeClass; 5] = [
        SlopeClass::Deg0To5,
        SlopeClass::Deg5To15,
        SlopeClass::Deg15To30,
        SlopeClass::Deg30To45,
        SlopeClass::Deg45Plus,
    ];

    /// Band containing `degrees`, or `None` for values outside `[0, 360)`.
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        match degrees {
            d if !(0.0..360.0).contains(&d) => None,
            d if d < 5.0 => Some(SlopeClass::Deg0To5),
            d if d < 15.0 => Some(SlopeClass::Deg5To15),
            d if d < 30.0 => Some(SlopeClass::Deg15To30),
            d if d < 45.0 => Some(SlopeClass::Deg30To45),
            _ => Some(SlopeClass::Deg45Plus),
        }
    }

    /// Inclusive lower and exclusive upper bound in degrees.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            SlopeClass::Deg0To5 => (0.0, 5.0),
            SlopeClass::Deg5To15 => (5.0, 15.0),
            SlopeClass::Deg15To30 => (15.0, 30.0),
            SlopeClass::Deg30To45 => (30.0, 45.0),
            SlopeClass::Deg45Plus => (45.0, 360.0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SlopeClass::Deg0To5 => "0-5",
            SlopeClass::Deg5To15 => "5-15",
            SlopeClass::Deg15To30 => "15-30",
            SlopeClass::Deg30To45 => "30-45",
            SlopeClass::Deg45Plus => "45+",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-band cell counts for one zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlopeClassCounts {
    pub counts: [usize; 5],
}

impl SlopeClassCounts {
    pub fn classified(&self) -> usize {
        self.counts.iter().sum()
    }
}

impl Accumulator for SlopeClassCounts {
    type Output = SlopeClassCounts;

    fn push(&mut self, degrees: f64) {
        if let Some(class) = SlopeClass::from_degrees(degrees) {
            self.counts[class.index()] += 1;
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.counts.iter_mut().zip(other.counts) {
            *a += b;
        }
        self
    }

    fn finish(self) -> Option<Self> {
        (self.classified() > 0).then_some(self)
    }
}

/// Area and share of each slope band within one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlopeClassAreas {
    /// Band areas in square metres, indexed like [`SlopeClass::ALL`].
    pub areas_m2: [f64; 5],
    /// Band shares of the zone in percent, indexed like [`SlopeClass::ALL`].
    pub percents: [f64; 5],
    /// Area of all classified cells.
    pub classified_area_m2: f64,
    /// Area of zone cells without a usable slope value.
    pub nodata_area_m2: f64,
}

impl SlopeClassAreas {
    pub fn area(&self, class: SlopeClass) -> f64 {
        self.areas_m2[class.index()]
    }

    pub fn percent(&self, class: SlopeClass) -> f64 {
        self.percents[class.index()]
    }

    pub fn total_percent(&self) -> f64 {
        self.percents.iter().sum()
    }
}

/// Tabulate slope-band areas for every zone with slope coverage.
///
/// `slope` must be sampled through `assignment`. Percentages are taken over the
/// zone's area minus its no-data cells; the denominator never drops below the
/// classified area, so the five shares sum to at most 100%. They reach exactly
/// 100% when the grid covers the zone and its boundary follows cell edges. A
/// boundary that cuts cells makes the counted cells differ from the zone area,
/// so the total can fall short of 100%. Zones without a single classified cell
/// are absent from the result.
pub fn tabulate_slope_classes(
    assignment: &CellAssignment,
    slope: &[SampledPoint],
    zones: &ZoneSet,
) -> BTreeMap<ZoneId, SlopeClassAreas> {
    let cell_area = assignment.transform().cell_area();

    let mut assigned: BTreeMap<ZoneId, usize> = BTreeMap::new();
    for cell in assignment.cells() {
        *assigned.entry(cell.zone_id).or_default() += 1;
    }

    accumulate_by_zone::<SlopeClassCounts>(slope)
        .into_iter()
        .filter_map(|(zone_id, counts)| {
            let counts = counts.finish()?;
            let zone = zones.get(zone_id)?;

            let classified = counts.classified();
            let nodata = assigned.get(&zone_id).copied().unwrap_or(0).saturating_sub(classified);

            let classified_area = classified as f64 * cell_area;
            let nodata_area = nodata as f64 * cell_area;
            let denominator = (zone.area() - nodata_area).max(classified_area);

            let areas_m2 = counts.counts.map(|n| n as f64 * cell_area);
            let percents = areas_m2.map(|a| a / denominator * 100.0);

            Some((
                zone_id,
                SlopeClassAreas {
                    areas_m2,
                    percents,
                    classified_area_m2: classified_area,
                    nodata_area_m2: nodata_area,
                },
            ))
        })
        .collect()
}
