//! Linear (arithmetic) statistics for elevation and slope.

use serde::Serialize;

use super::Accumulator;

/// Partial linear statistics for one zone.
///
/// Partials built from disjoint batches can be merged in any order; the final
/// figures are computed from the sorted sample list, so a merged accumulator
/// yields bit-identical results to a single pass over the same samples.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearAccumulator {
    min: f64,
    max: f64,
    samples: Vec<f64>,
}

impl Default for LinearAccumulator {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            samples: Vec::new(),
        }
    }
}

impl LinearAccumulator {
    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

impl Accumulator for LinearAccumulator {
    type Output = LinearStats;

    fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.samples.push(value);
    }

    fn merge(mut self, other: Self) -> Self {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.samples.extend(other.samples);
        self
    }

    fn finish(mut self) -> Option<LinearStats> {
        if self.samples.is_empty() {
            return None;
        }
        self.samples.sort_by(f64::total_cmp);

        let count = self.samples.len();
        let n = count as f64;
        let sum: f64 = self.samples.iter().sum();
        // Rounding can push the quotient a ulp past the extremes
        let mean = (sum / n).clamp(self.min, self.max);
        let variance = self
            .samples
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / n;

        let median = if count % 2 == 0 {
            (self.samples[count / 2 - 1] + self.samples[count / 2]) / 2.0
        } else {
            self.samples[count / 2]
        };

        Some(LinearStats {
            min: self.min,
            max: self.max,
            mean,
            std_dev: variance.sqrt(),
            median,
            count,
        })
    }
}

/// Linear statistics of a numeric field within one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub median: f64,
    pub count: usize,
}
