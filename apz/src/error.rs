//! Error types for the APZ library.

use std::path::PathBuf;
use thiserror::Error;

use crate::zone::ZoneId;

/// Errors that abort an assessment or fail an input load.
///
/// Per-zone problems (no samples, lookup misses, empty clips) are not errors;
/// they are recorded as [`SkipReason`](crate::manifest::SkipReason)s in the
/// run manifest.
#[derive(Error, Debug)]
pub enum ApzError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A grid header is missing a key or carries an unparsable value.
    #[error("Invalid grid header in {path}: {message}")]
    InvalidGridHeader { path: PathBuf, message: String },

    /// Grid cell data could not be parsed or has the wrong length.
    #[error("Invalid grid data: {message}")]
    InvalidGridData { message: String },

    /// Binary grid file size doesn't match its header.
    #[error("Invalid file size: {size} bytes (expected {expected} for a {rows}x{cols} float grid)")]
    InvalidFileSize {
        size: usize,
        expected: usize,
        rows: usize,
        cols: usize,
    },

    /// Grids do not share cell size and extent, or violate the processing environment.
    #[error("Grid mismatch: {message}")]
    GridMismatch { message: String },

    /// Two zones were supplied with the same id.
    #[error("Duplicate zone id: {id}")]
    DuplicateZone { id: ZoneId },

    /// A required input is absent; the run cannot start.
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    /// An input geometry has an unsupported type or is empty.
    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    /// A configuration value is out of range.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The APZ distance table is malformed.
    #[error("Invalid APZ table: {message}")]
    InvalidTable { message: String },

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GeoJSON parse or conversion failure.
    #[cfg(feature = "geojson")]
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] Box<geojson::Error>),
}

#[cfg(feature = "geojson")]
impl From<geojson::Error> for ApzError {
    fn from(err: geojson::Error) -> Self {
        ApzError::GeoJson(Box::new(err))
    }
}

/// Result type alias using [`ApzError`].
pub type Result<T> = std::result::Result<T, ApzError>;
