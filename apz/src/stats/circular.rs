//! Circular statistics for compass-direction aspect.
//!
//! Aspects are averaged as unit vectors rather than as numbers, so 350° and 10°
//! average to 0° instead of 180°.
//!
//! For `n` valid samples θᵢ (radians):
//!
//! ```text
//! C = Σ cos θᵢ / n        S = Σ sin θᵢ / n
//! mean direction   = atan2(S, C), in degrees, normalised to [0, 360)
//! resultant length = R = √(C² + S²), clamped to [1e-12, 1]
//! circular std dev = degrees(√(−2 ln R))
//! ```

use serde::Serialize;

use super::Accumulator;

/// Lower clamp on the mean resultant length, keeping `ln R` finite.
pub const MIN_RESULTANT_LENGTH: f64 = 1e-12;

/// Vector sum of aspect samples for one zone.
///
/// Negative values are the "no direction" sentinel for flat cells and are not
/// counted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CircularAccumulator {
    pub sum_cos: f64,
    pub sum_sin: f64,
    pub count: usize,
}

impl Accumulator for CircularAccumulator {
    type Output = CircularStats;

    fn push(&mut self, degrees: f64) {
        if !degrees.is_finite() || degrees < 0.0 {
            return;
        }
        let radians = degrees.to_radians();
        self.sum_cos += radians.cos();
        self.sum_sin += radians.sin();
        self.count += 1;
    }

    fn merge(self, other: Self) -> Self {
        Self {
            sum_cos: self.sum_cos + other.sum_cos,
            sum_sin: self.sum_sin + other.sum_sin,
            count: self.count + other.count,
        }
    }

    fn finish(self) -> Option<CircularStats> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean_cos = self.sum_cos / n;
        let mean_sin = self.sum_sin / n;

        let mut mean_direction = mean_sin.atan2(mean_cos).to_degrees().rem_euclid(360.0);
        // rem_euclid of a tiny negative angle rounds up to exactly 360
        if mean_direction >= 360.0 {
            mean_direction = 0.0;
        }

        let resultant = (mean_cos * mean_cos + mean_sin * mean_sin)
            .sqrt()
            .clamp(MIN_RESULTANT_LENGTH, 1.0);
        let std_dev = (-2.0 * resultant.ln()).sqrt().to_degrees();

        Some(CircularStats {
            mean_direction_deg: mean_direction,
            circular_std_dev_deg: std_dev,
            mean_resultant_length: resultant,
            sample_count: self.count,
        })
    }
}

/// Directional statistics of aspect within one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CircularStats {
    /// Mean compass direction in [0, 360).
    pub mean_direction_deg: f64,
    pub circular_std_dev_deg: f64,
    /// R: 1 for perfectly aligned samples, near 0 for dispersed ones.
    pub mean_resultant_length: f64,
    pub sample_count: usize,
}
