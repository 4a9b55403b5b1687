//! Run configuration.
//!
//! [`ProcessingEnv`] carries the raster processing settings (extent, mask and
//! expected cell size) as an explicit value passed to every grid-consuming
//! operation. [`AssessmentConfig`] bundles it with the threshold policy and
//! the APZ table, and is built through [`AssessmentConfigBuilder`].

use std::path::{Path, PathBuf};

use geo::{Intersects, MultiPolygon, Point, Rect};

use crate::error::{ApzError, Result};
use crate::grid::GridTransform;
use crate::table::ApzTable;

/// Raster processing settings for one run.
///
/// The default admits every cell and accepts any cell size.
#[derive(Debug, Clone, Default)]
pub struct ProcessingEnv {
    /// Only cell centres inside this rectangle are processed.
    pub extent: Option<Rect<f64>>,
    /// Only cell centres inside (or on the edge of) this mask are processed.
    pub mask: Option<MultiPolygon<f64>>,
    /// Grids must have exactly this cell size.
    pub cell_size: Option<f64>,
}

impl ProcessingEnv {
    pub fn with_extent(mut self, extent: Rect<f64>) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_mask(mut self, mask: MultiPolygon<f64>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = Some(cell_size);
        self
    }

    /// Check that a grid can be processed under this environment.
    ///
    /// # Errors
    ///
    /// Returns [`ApzError::GridMismatch`] if the grid's cell size differs from
    /// the expected one. Grids are never resampled.
    pub fn check_grid(&self, transform: &GridTransform) -> Result<()> {
        match self.cell_size {
            Some(expected) if !transform.has_cell_size(expected) => Err(ApzError::GridMismatch {
                message: format!(
                    "grid cell size {} differs from the configured cell size {}",
                    transform.cell_size, expected
                ),
            }),
            _ => Ok(()),
        }
    }

    /// Whether a cell centre at `point` is processed.
    pub fn admits(&self, point: &Point<f64>) -> bool {
        let in_extent = self
            .extent
            .map_or(true, |extent| extent.intersects(point));
        let in_mask = self.mask.as_ref().map_or(true, |mask| mask.intersects(point));
        in_extent && in_mask
    }
}

/// How the elevation threshold separating upslope from downslope is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ThresholdMode {
    /// A fixed elevation in metres.
    Fixed(f64),
    /// Mean elevation under the structure footprints.
    #[default]
    StructureMean,
}

/// Everything an assessment run needs besides its inputs.
#[derive(Debug, Clone, Default)]
pub struct AssessmentConfig {
    pub threshold: ThresholdMode,
    pub table: ApzTable,
    pub env: ProcessingEnv,
}

impl AssessmentConfig {
    pub fn builder() -> AssessmentConfigBuilder {
        AssessmentConfigBuilder::new()
    }
}

/// Builder for [`AssessmentConfig`].
///
/// # Example
///
/// ```
/// use apz::{AssessmentConfigBuilder, ThresholdMode};
///
/// let config = AssessmentConfigBuilder::new()
///     .threshold(ThresholdMode::Fixed(120.0))
///     .cell_size(5.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.threshold, ThresholdMode::Fixed(120.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AssessmentConfigBuilder {
    threshold: ThresholdMode,
    table: Option<ApzTable>,
    table_path: Option<PathBuf>,
    env: ProcessingEnv,
}

impl AssessmentConfigBuilder {
    /// Builder with the structure-mean threshold and the built-in table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `APZ_ELEVATION_THRESHOLD` | Fixed threshold in metres | Structure mean |
    /// | `APZ_TABLE` | Path to a JSON APZ table | Built-in table |
    /// | `APZ_CELL_SIZE` | Expected grid cell size | Unchecked |
    ///
    /// Unparsable numbers are ignored. The table file is read by [`build`](Self::build).
    pub fn from_env() -> Self {
        let mut builder = Self::new();

        if let Some(threshold) = std::env::var("APZ_ELEVATION_THRESHOLD")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
        {
            builder.threshold = ThresholdMode::Fixed(threshold);
        }

        if let Ok(path) = std::env::var("APZ_TABLE") {
            if !path.trim().is_empty() {
                builder.table_path = Some(PathBuf::from(path));
            }
        }

        builder.env.cell_size = std::env::var("APZ_CELL_SIZE")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok());

        builder
    }

    pub fn threshold(mut self, mode: ThresholdMode) -> Self {
        self.threshold = mode;
        self
    }

    /// Use `table` instead of the built-in table.
    pub fn table(mut self, table: ApzTable) -> Self {
        self.table = Some(table);
        self.table_path = None;
        self
    }

    /// Load the table from a JSON file at build time.
    pub fn table_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.table_path = Some(path.as_ref().to_path_buf());
        self.table = None;
        self
    }

    pub fn extent(mut self, extent: Rect<f64>) -> Self {
        self.env.extent = Some(extent);
        self
    }

    pub fn mask(mut self, mask: MultiPolygon<f64>) -> Self {
        self.env.mask = Some(mask);
        self
    }

    pub fn cell_size(mut self, cell_size: f64) -> Self {
        self.env.cell_size = Some(cell_size);
        self
    }

    /// Build the [`AssessmentConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the table file cannot be read or fails validation,
    /// or if a fixed threshold or cell size is not a positive finite number.
    pub fn build(self) -> Result<AssessmentConfig> {
        if let ThresholdMode::Fixed(t) = self.threshold {
            if !t.is_finite() {
                return Err(ApzError::InvalidInput {
                    message: format!("elevation threshold must be finite, got {}", t),
                });
            }
        }
        if let Some(cs) = self.env.cell_size {
            if !(cs.is_finite() && cs > 0.0) {
                return Err(ApzError::InvalidInput {
                    message: format!("cell size must be positive, got {}", cs),
                });
            }
        }

        let table = match (self.table, self.table_path) {
            (_, Some(path)) => ApzTable::from_json_file(path)?,
            (Some(table), None) => {
                table.validate()?;
                table
            }
            (None, None) => ApzTable::standard(),
        };

        Ok(AssessmentConfig {
            threshold: self.threshold,
            table,
            env: self.env,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuel::FuelClass;
    use crate::table::{EffectiveSlopeBucket, TableRow};
    use geo::{coord, Polygon};
    use tempfile::TempDir;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x0 + size, y: y0 + size }).to_polygon()
    }

    #[test]
    fn test_default_env_admits_everything() {
        let env = ProcessingEnv::default();
        assert!(env.admits(&Point::new(-1e9, 1e9)));
        assert!(env
            .check_grid(&GridTransform::new(0.0, 0.0, 7.0, 1, 1))
            .is_ok());
    }

    #[test]
    fn test_extent_and_mask() {
        let env = ProcessingEnv::default()
            .with_extent(Rect::new((0.0, 0.0), (100.0, 100.0)))
            .with_mask(MultiPolygon::new(vec![square(0.0, 0.0, 50.0)]));

        assert!(env.admits(&Point::new(25.0, 25.0)));
        assert!(env.admits(&Point::new(50.0, 25.0)), "mask edge is admitted");
        assert!(!env.admits(&Point::new(75.0, 25.0)), "outside mask");
        assert!(!env.admits(&Point::new(-5.0, 25.0)), "outside extent");
    }

    #[test]
    fn test_cell_size_check() {
        let env = ProcessingEnv::default().with_cell_size(5.0);
        assert!(env.check_grid(&GridTransform::new(0.0, 0.0, 5.0, 2, 2)).is_ok());
        assert!(matches!(
            env.check_grid(&GridTransform::new(0.0, 0.0, 10.0, 2, 2)),
            Err(ApzError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_builder_defaults() {
        let config = AssessmentConfigBuilder::new().build().unwrap();
        assert_eq!(config.threshold, ThresholdMode::StructureMean);
        assert_eq!(config.table, ApzTable::standard());
        assert!(config.env.extent.is_none());
    }

    #[test]
    fn test_builder_table_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.json");
        let table = ApzTable {
            version: "test".to_string(),
            fallback_distance_m: 20,
            rows: vec![TableRow::complete(FuelClass::Grassland, [10, 12, 14, 16, 18])],
        };
        std::fs::write(&path, serde_json::to_string(&table).unwrap()).unwrap();

        let config = AssessmentConfigBuilder::new().table_path(&path).build().unwrap();
        assert_eq!(config.table.version, "test");
        assert_eq!(
            config
                .table
                .lookup(FuelClass::Grassland, EffectiveSlopeBucket::Downslope15To20),
            Some(18)
        );

        let missing = AssessmentConfigBuilder::new()
            .table_path(dir.path().join("absent.json"))
            .build();
        assert!(matches!(missing, Err(ApzError::Io(_))));
    }

    #[test]
    fn test_builder_rejects_bad_numbers() {
        let result = AssessmentConfigBuilder::new()
            .threshold(ThresholdMode::Fixed(f64::NAN))
            .build();
        assert!(result.is_err());

        let result = AssessmentConfigBuilder::new().cell_size(0.0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_env() {
        // Single test touching these variables to avoid races between tests
        let saved: Vec<(&str, Option<String>)> = ["APZ_ELEVATION_THRESHOLD", "APZ_TABLE", "APZ_CELL_SIZE"]
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        std::env::set_var("APZ_ELEVATION_THRESHOLD", "152.5");
        std::env::remove_var("APZ_TABLE");
        std::env::set_var("APZ_CELL_SIZE", "not-a-number");

        let config = AssessmentConfigBuilder::from_env().build().unwrap();
        assert_eq!(config.threshold, ThresholdMode::Fixed(152.5));
        assert_eq!(config.env.cell_size, None);
        assert_eq!(config.table.version, crate::table::STANDARD_TABLE_VERSION);

        for (key, value) in saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}
