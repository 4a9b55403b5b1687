//! Dense terrain grids and the formats they are read from.
//!
//! This module provides [`Grid`], a row-major raster of `f64` samples placed on
//! the ground by a [`GridTransform`], and [`TerrainGrids`], the co-registered
//! elevation/slope/aspect set consumed by an assessment run.
//!
//! # Supported Formats
//!
//! - **ESRI ASCII grid** (`.asc`): text header followed by whitespace-separated
//!   values, north row first.
//! - **ESRI binary float grid** (`.flt` + `.hdr`): 32-bit floats, row-major,
//!   north row first. The `.flt` file is memory-mapped.
//!
//! Row 0 is the north edge and column 0 is the west edge.

use std::fs::{self, File};
use std::ops::Range;
use std::path::Path;

use geo::{coord, Point, Rect};
use memmap2::Mmap;
use tracing::debug;

use crate::error::{ApzError, Result};

/// Relative tolerance used when comparing origins and cell sizes of two grids.
const REGISTRATION_TOLERANCE: f64 = 1e-9;

/// Bytes per sample in an ESRI binary float grid.
const FLT_SAMPLE_BYTES: usize = 4;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= REGISTRATION_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Placement of a grid on the ground: north-west corner, square cell size and shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    /// X coordinate of the west edge.
    pub origin_x: f64,
    /// Y coordinate of the north edge.
    pub origin_y: f64,
    /// Side length of a (square) cell in map units.
    pub cell_size: f64,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl GridTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_size: f64, rows: usize, cols: usize) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_size,
            rows,
            cols,
        }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Area of a single cell in square map units.
    pub fn cell_area(&self) -> f64 {
        self.cell_size * self.cell_size
    }

    /// Centre of the cell at `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> Point<f64> {
        Point::new(
            self.origin_x + (col as f64 + 0.5) * self.cell_size,
            self.origin_y - (row as f64 + 0.5) * self.cell_size,
        )
    }

    /// Footprint of the cell at `(row, col)`.
    pub fn cell_rect(&self, row: usize, col: usize) -> Rect<f64> {
        self.run_rect(row, col, col + 1)
    }

    /// Footprint of the horizontal run of cells `[col_start, col_end)` in `row`.
    pub fn run_rect(&self, row: usize, col_start: usize, col_end: usize) -> Rect<f64> {
        let west = self.origin_x + col_start as f64 * self.cell_size;
        let east = self.origin_x + col_end as f64 * self.cell_size;
        let north = self.origin_y - row as f64 * self.cell_size;
        let south = north - self.cell_size;
        Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north })
    }

    /// Full extent covered by the grid.
    pub fn extent(&self) -> Rect<f64> {
        Rect::new(
            coord! {
                x: self.origin_x,
                y: self.origin_y - self.rows as f64 * self.cell_size,
            },
            coord! {
                x: self.origin_x + self.cols as f64 * self.cell_size,
                y: self.origin_y,
            },
        )
    }

    /// Cell containing `(x, y)`, or `None` outside the grid.
    ///
    /// West and north edges belong to the cell; east and south edges belong to
    /// the neighbour.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let col = ((x - self.origin_x) / self.cell_size).floor();
        let row = ((self.origin_y - y) / self.cell_size).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    /// Rows and columns whose cell centres can fall inside `rect`.
    ///
    /// Returns `None` when the window is empty.
    pub fn cell_window(&self, rect: &Rect<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let cs = self.cell_size;
        let col_start = ((rect.min().x - self.origin_x) / cs - 0.5).ceil().max(0.0);
        let col_end = ((rect.max().x - self.origin_x) / cs - 0.5).floor() + 1.0;
        let row_start = ((self.origin_y - rect.max().y) / cs - 0.5).ceil().max(0.0);
        let row_end = ((self.origin_y - rect.min().y) / cs - 0.5).floor() + 1.0;

        let col_end = col_end.clamp(0.0, self.cols as f64) as usize;
        let row_end = row_end.clamp(0.0, self.rows as f64) as usize;
        let (col_start, row_start) = (col_start as usize, row_start as usize);

        (col_start < col_end && row_start < row_end)
            .then_some((row_start..row_end, col_start..col_end))
    }

    /// Rows and columns of every cell whose rectangle touches `rect`.
    ///
    /// Returns `None` when the window is empty.
    pub fn cell_cover(&self, rect: &Rect<f64>) -> Option<(Range<usize>, Range<usize>)> {
        let cs = self.cell_size;
        let col_start = ((rect.min().x - self.origin_x) / cs).floor().max(0.0) as usize;
        let col_end = ((rect.max().x - self.origin_x) / cs).ceil();
        let row_start = ((self.origin_y - rect.max().y) / cs).floor().max(0.0) as usize;
        let row_end = ((self.origin_y - rect.min().y) / cs).ceil();

        let col_end = col_end.clamp(0.0, self.cols as f64) as usize;
        let row_end = row_end.clamp(0.0, self.rows as f64) as usize;

        (col_start < col_end && row_start < row_end)
            .then_some((row_start..row_end, col_start..col_end))
    }

    /// Whether `other` has the same shape, cell size and origin.
    pub fn is_co_registered(&self, other: &GridTransform) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && approx_eq(self.cell_size, other.cell_size)
            && approx_eq(self.origin_x, other.origin_x)
            && approx_eq(self.origin_y, other.origin_y)
    }

    /// Whether the cell size matches `cell_size` within tolerance.
    pub fn has_cell_size(&self, cell_size: f64) -> bool {
        approx_eq(self.cell_size, cell_size)
    }
}

/// Byte order of an ESRI binary float grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Lsb,
    Msb,
}

/// Parsed ESRI grid header (shared by `.asc` and `.hdr`).
#[derive(Debug)]
struct GridHeader {
    transform: GridTransform,
    nodata: Option<f64>,
    byte_order: ByteOrder,
}

impl GridHeader {
    /// Parse header pairs, returning the header and any trailing data lines.
    fn parse<'a>(text: &'a str, source: &Path) -> Result<(Self, Vec<&'a str>)> {
        let header_err = |message: String| ApzError::InvalidGridHeader {
            path: source.to_path_buf(),
            message,
        };

        let mut ncols = None;
        let mut nrows = None;
        let mut xll = None;
        let mut yll = None;
        let mut centered = false;
        let mut cellsize = None;
        let mut nodata = None;
        let mut byte_order = ByteOrder::Lsb;
        let mut data_lines = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let starts_alpha = trimmed
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic());
            if !data_lines.is_empty() || !starts_alpha {
                data_lines.push(trimmed);
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let key = parts.next().unwrap_or_default().to_ascii_lowercase();
            let value = parts
                .next()
                .ok_or_else(|| header_err(format!("key '{}' has no value", key)))?;
            let number = || {
                value
                    .parse::<f64>()
                    .map_err(|_| header_err(format!("invalid value '{}' for '{}'", value, key)))
            };

            match key.as_str() {
                "ncols" => ncols = Some(number()? as usize),
                "nrows" => nrows = Some(number()? as usize),
                "xllcorner" => xll = Some(number()?),
                "yllcorner" => yll = Some(number()?),
                "xllcenter" => {
                    xll = Some(number()?);
                    centered = true;
                }
                "yllcenter" => {
                    yll = Some(number()?);
                    centered = true;
                }
                "cellsize" => cellsize = Some(number()?),
                "nodata_value" => nodata = Some(number()?),
                "byteorder" => {
                    byte_order = match value.to_ascii_uppercase().as_str() {
                        "MSBFIRST" => ByteOrder::Msb,
                        _ => ByteOrder::Lsb,
                    }
                }
                // .hdr files also carry layout keys (nbits, nbands, ...)
                _ => debug!(key = %key, path = %source.display(), "ignoring grid header key"),
            }
        }

        let ncols = ncols.ok_or_else(|| header_err("missing ncols".to_string()))?;
        let nrows = nrows.ok_or_else(|| header_err("missing nrows".to_string()))?;
        let cellsize = cellsize.ok_or_else(|| header_err("missing cellsize".to_string()))?;
        let mut xll = xll.ok_or_else(|| header_err("missing xllcorner".to_string()))?;
        let mut yll = yll.ok_or_else(|| header_err("missing yllcorner".to_string()))?;

        if cellsize <= 0.0 || !cellsize.is_finite() {
            return Err(header_err(format!("cellsize must be positive, got {}", cellsize)));
        }
        if centered {
            xll -= cellsize / 2.0;
            yll -= cellsize / 2.0;
        }

        let transform = GridTransform::new(xll, yll + nrows as f64 * cellsize, cellsize, nrows, ncols);
        Ok((
            Self {
                transform,
                nodata,
                byte_order,
            },
            data_lines,
        ))
    }
}

/// A dense raster of terrain samples.
///
/// # Example
///
/// ```ignore
/// use apz::Grid;
///
/// let dem = Grid::from_path("site_dem.asc")?;
/// if let Some(elevation) = dem.value_at(305_120.0, 6_250_480.0) {
///     println!("Elevation: {}m", elevation);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Grid {
    transform: GridTransform,
    /// Row-major samples, north row first.
    values: Vec<f64>,
    /// Sentinel marking cells without data.
    nodata: Option<f64>,
}

impl Grid {
    /// Create a grid from row-major values.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` does not hold exactly `rows × cols` samples
    /// or the cell size is not positive.
    pub fn new(transform: GridTransform, values: Vec<f64>, nodata: Option<f64>) -> Result<Self> {
        if transform.cell_size <= 0.0 || !transform.cell_size.is_finite() {
            return Err(ApzError::InvalidGridData {
                message: format!("cell size must be positive, got {}", transform.cell_size),
            });
        }
        if values.len() != transform.len() {
            return Err(ApzError::InvalidGridData {
                message: format!(
                    "expected {} values for a {}x{} grid, got {}",
                    transform.len(),
                    transform.rows,
                    transform.cols,
                    values.len()
                ),
            });
        }
        Ok(Self {
            transform,
            values,
            nodata,
        })
    }

    /// Build a grid by evaluating `f(row, col)` for every cell.
    pub fn from_fn(
        transform: GridTransform,
        nodata: Option<f64>,
        mut f: impl FnMut(usize, usize) -> f64,
    ) -> Self {
        let mut values = Vec::with_capacity(transform.len());
        for row in 0..transform.rows {
            for col in 0..transform.cols {
                values.push(f(row, col));
            }
        }
        Self {
            transform,
            values,
            nodata,
        }
    }

    /// Load a grid, choosing the reader from the file extension.
    ///
    /// `.asc`/`.txt` are read as ESRI ASCII grids, `.flt` as ESRI binary float
    /// grids with a sibling `.hdr` header.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "asc" | "txt" => Self::from_ascii_file(path),
            "flt" => Self::from_flt_file(path),
            _ => Err(ApzError::InvalidGridHeader {
                path: path.to_path_buf(),
                message: format!("unsupported grid format '.{}' (use .asc or .flt)", extension),
            }),
        }
    }

    /// Load an ESRI ASCII grid.
    pub fn from_ascii_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path)?;
        Self::from_ascii_str(&text, path.as_ref())
    }

    /// Parse ESRI ASCII grid text. `source` is only used in error messages.
    pub fn from_ascii_str(text: &str, source: &Path) -> Result<Self> {
        let (header, data_lines) = GridHeader::parse(text, source)?;

        let mut values = Vec::with_capacity(header.transform.len());
        for token in data_lines.iter().flat_map(|line| line.split_whitespace()) {
            let value = token.parse::<f64>().map_err(|_| ApzError::InvalidGridData {
                message: format!("invalid sample '{}' in {}", token, source.display()),
            })?;
            values.push(value);
        }

        Self::new(header.transform, values, header.nodata)
    }

    /// Load an ESRI binary float grid (`.flt`) and its `.hdr` header.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The header or data file cannot be opened or memory-mapped
    /// - The file size doesn't match `nrows × ncols × 4` bytes
    pub fn from_flt_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let header_path = path.with_extension("hdr");
        let header_text = fs::read_to_string(&header_path)?;
        let (header, _) = GridHeader::parse(&header_text, &header_path)?;

        let file = File::open(path)?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and drop the mapping here.
        let mmap = unsafe { Mmap::map(&file)? };

        let transform = header.transform;
        let expected = transform.len() * FLT_SAMPLE_BYTES;
        if mmap.len() != expected {
            return Err(ApzError::InvalidFileSize {
                size: mmap.len(),
                expected,
                rows: transform.rows,
                cols: transform.cols,
            });
        }

        let values = mmap
            .chunks_exact(FLT_SAMPLE_BYTES)
            .map(|b| {
                let bytes = [b[0], b[1], b[2], b[3]];
                let sample = match header.byte_order {
                    ByteOrder::Lsb => f32::from_le_bytes(bytes),
                    ByteOrder::Msb => f32::from_be_bytes(bytes),
                };
                sample as f64
            })
            .collect();

        // Samples went through f32, so the sentinel must too.
        let nodata = header.nodata.map(|v| v as f32 as f64);
        Self::new(transform, values, nodata)
    }

    /// Placement and shape of this grid.
    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// The no-data sentinel, if any.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Sample at `(row, col)`.
    ///
    /// Returns `None` for no-data cells, NaN samples and indices outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.transform.rows || col >= self.transform.cols {
            return None;
        }
        let value = self.values[row * self.transform.cols + col];
        if value.is_nan() || self.nodata == Some(value) {
            None
        } else {
            Some(value)
        }
    }

    /// Sample of the cell containing `(x, y)`.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let (row, col) = self.transform.cell_at(x, y)?;
        self.get(row, col)
    }
}

/// Co-registered elevation, slope and aspect grids for one site.
///
/// Slope is in degrees; aspect is in compass degrees with negative values
/// marking flat cells. Only elevation is mandatory.
#[derive(Debug, Clone)]
pub struct TerrainGrids {
    elevation: Grid,
    slope: Option<Grid>,
    aspect: Option<Grid>,
}

impl TerrainGrids {
    /// Bundle grids, checking that slope and aspect share the elevation grid's placement.
    pub fn new(elevation: Grid, slope: Option<Grid>, aspect: Option<Grid>) -> Result<Self> {
        for (name, grid) in [("slope", &slope), ("aspect", &aspect)] {
            if let Some(grid) = grid {
                if !grid.transform().is_co_registered(elevation.transform()) {
                    return Err(ApzError::GridMismatch {
                        message: format!(
                            "{} grid {:?} is not co-registered with elevation grid {:?}",
                            name,
                            grid.transform(),
                            elevation.transform()
                        ),
                    });
                }
            }
        }
        Ok(Self {
            elevation,
            slope,
            aspect,
        })
    }

    pub fn elevation(&self) -> &Grid {
        &self.elevation
    }

    pub fn slope(&self) -> Option<&Grid> {
        self.slope.as_ref()
    }

    pub fn aspect(&self) -> Option<&Grid> {
        self.aspect.as_ref()
    }

    pub fn transform(&self) -> &GridTransform {
        self.elevation.transform()
    }
}
