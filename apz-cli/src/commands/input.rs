//! Input loading shared by the `assess` and `stats` commands.

use anyhow::{bail, Context, Result};
use apz::geojson::{read_structures, read_zones, ZoneFields};
use apz::{AssessmentConfigBuilder, Grid, Structure, TerrainGrids, ZoneSet};
use clap::Args;
use geo::{coord, Rect};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Zones, grids and processing environment of one site.
#[derive(Args)]
pub struct SiteArgs {
    /// Zone polygons (GeoJSON)
    #[arg(long)]
    pub zones: PathBuf,

    /// Elevation grid (.asc or .flt)
    #[arg(long)]
    pub elevation: PathBuf,

    /// Slope grid in degrees (.asc or .flt)
    #[arg(long)]
    pub slope: Option<PathBuf>,

    /// Aspect grid in compass degrees (.asc or .flt)
    #[arg(long)]
    pub aspect: Option<PathBuf>,

    /// Zone property holding the numeric zone id
    #[arg(long, default_value = "zone_id")]
    pub id_field: String,

    /// Zone property holding the vegetation label
    #[arg(long, default_value = "vegetation")]
    pub vegetation_field: String,

    /// Processing extent as "minx,miny,maxx,maxy"
    #[arg(long)]
    pub extent: Option<String>,

    /// Expected grid cell size; grids with another cell size are rejected
    #[arg(long, env = "APZ_CELL_SIZE")]
    pub cell_size: Option<f64>,
}

impl SiteArgs {
    pub fn load_zones(&self) -> Result<ZoneSet> {
        let text = std::fs::read_to_string(&self.zones)
            .with_context(|| format!("Failed to read zones from {}", self.zones.display()))?;
        let fields = ZoneFields {
            id: self.id_field.clone(),
            vegetation: self.vegetation_field.clone(),
        };
        let zones = read_zones(&text, &fields).context("Failed to parse zones")?;
        ZoneSet::new(zones).context("Invalid zone set")
    }

    pub fn load_terrain(&self) -> Result<TerrainGrids> {
        let elevation = load_grid(&self.elevation)?;
        let slope = self.slope.as_deref().map(load_grid).transpose()?;
        let aspect = self.aspect.as_deref().map(load_grid).transpose()?;
        TerrainGrids::new(elevation, slope, aspect).context("Grids are not co-registered")
    }

    /// Apply the extent and cell size to a config builder.
    pub fn configure(&self, mut builder: AssessmentConfigBuilder) -> Result<AssessmentConfigBuilder> {
        if let Some(extent) = &self.extent {
            builder = builder.extent(parse_extent(extent)?);
        }
        if let Some(cell_size) = self.cell_size {
            builder = builder.cell_size(cell_size);
        }
        Ok(builder)
    }
}

pub fn load_grid(path: &Path) -> Result<Grid> {
    Grid::from_path(path).with_context(|| format!("Failed to load grid {}", path.display()))
}

pub fn load_structures(path: &Path) -> Result<Vec<Structure>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read structures from {}", path.display()))?;
    read_structures(&text).context("Failed to parse structures")
}

/// Parse "minx,miny,maxx,maxy".
pub fn parse_extent(text: &str) -> Result<Rect<f64>> {
    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid extent '{}'", text))?;
    let &[min_x, min_y, max_x, max_y] = values.as_slice() else {
        bail!("Extent needs four values minx,miny,maxx,maxy, got '{}'", text);
    };
    if min_x >= max_x || min_y >= max_y {
        bail!("Extent '{}' is empty", text);
    }
    Ok(Rect::new(
        coord! { x: min_x, y: min_y },
        coord! { x: max_x, y: max_y },
    ))
}

/// Spinner for one pipeline stage.
pub fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
