//! # APZ - Bushfire Asset Protection Zone Assessment
//!
//! Terrain and vegetation analysis that turns a site's elevation, slope and
//! aspect grids into per-zone statistics, required defensible-space distances
//! and the protection-zone geometry around structures.
//!
//! ## Features
//!
//! - **Zonal statistics**: linear statistics for elevation and slope, circular
//!   statistics for aspect, slope-class area tabulation
//! - **Elevation partitioning**: upslope/flat vs downslope regions around a
//!   threshold, dissolved per zone
//! - **Fuel classes**: ordered keyword rules mapping vegetation labels to fuel
//!   classes, resolved against a versioned distance table
//! - **Geometry**: buffered, clipped and dissolved protection zones with
//!   attributed boundary lines
//! - **Parallel**: per-zone work runs on `rayon` with associative merges
//!
//! ## Quick Start
//!
//! ```ignore
//! use apz::{run_assessment, AssessmentConfig, AssessmentInputs, Grid, TerrainGrids};
//!
//! let terrain = TerrainGrids::new(
//!     Grid::from_path("dem.asc")?,
//!     Some(Grid::from_path("slope.asc")?),
//!     Some(Grid::from_path("aspect.asc")?),
//! )?;
//! let inputs = AssessmentInputs { zones, structures, terrain };
//!
//! let assessment = run_assessment(&inputs, &AssessmentConfig::default())?;
//! for a in &assessment.assessments {
//!     println!("zone {} {}: {:?} m", a.zone_id, a.partition, a.distance_m);
//! }
//! ```
//!
//! ## Grid Formats
//!
//! - **ESRI ASCII grid** (`.asc`)
//! - **ESRI binary float grid** (`.flt` with a `.hdr` header), memory-mapped
//!
//! Grids must be co-registered: same cell size, origin and shape.
//!
//! ## Optional Features
//!
//! - `geojson`: read zones and structures from GeoJSON and write the result
//!   layers as GeoJSON

pub mod config;
pub mod defensible;
pub mod elevation;
pub mod error;
pub mod fuel;
pub mod grid;
pub mod manifest;
pub mod pipeline;
pub mod resolve;
pub mod sampler;
pub mod stats;
pub mod table;
pub mod zone;

#[cfg(feature = "geojson")]
pub mod geojson;

// Re-export main types at crate root for convenience
pub use config::{AssessmentConfig, AssessmentConfigBuilder, ProcessingEnv, ThresholdMode};
pub use defensible::{BoundarySegment, DefensiblePiece, DefensibleSpace, ProtectionZone};
pub use elevation::{ElevationPartition, PartitionRegion};
pub use error::{ApzError, Result};
pub use fuel::{classify_vegetation, FuelClass};
pub use grid::{Grid, GridTransform, TerrainGrids};
pub use manifest::{Manifest, SkipReason, SkippedZone};
pub use pipeline::{run_assessment, Assessment, AssessmentInputs};
pub use resolve::ZoneAssessment;
pub use sampler::{CellAssignment, SampledPoint};
pub use stats::{CircularStats, LinearStats, SlopeClass, SlopeClassAreas, ZoneStatistics};
pub use table::{ApzTable, EffectiveSlopeBucket};
pub use zone::{Structure, Zone, ZoneId, ZoneSet};
