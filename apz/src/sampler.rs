//! Zone sampling of terrain grids.
//!
//! Every grid cell centre is assigned to the zone that covers it (see
//! [`ZoneSet::locate`] for the boundary tie-break). The assignment depends only
//! on the grid placement, the zones and the [`ProcessingEnv`], so it is built
//! once per run and reused for the elevation, slope and aspect grids.

use geo::{Point, Rect};
use rayon::prelude::*;
use tracing::debug;

use crate::config::ProcessingEnv;
use crate::error::{ApzError, Result};
use crate::grid::{Grid, GridTransform};
use crate::zone::{ZoneId, ZoneSet};

/// A grid cell whose centre falls inside a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedCell {
    pub zone_id: ZoneId,
    pub row: usize,
    pub col: usize,
}

/// A terrain value at a cell centre, tagged with its enclosing zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledPoint {
    pub zone_id: ZoneId,
    pub row: usize,
    pub col: usize,
    /// Cell centre.
    pub location: Point<f64>,
    pub value: f64,
}

/// Cell-to-zone assignment for one grid placement.
#[derive(Debug, Clone)]
pub struct CellAssignment {
    transform: GridTransform,
    /// Assigned cells in row-major order.
    cells: Vec<AssignedCell>,
}

fn intersect_rects(a: &Rect<f64>, b: &Rect<f64>) -> Option<Rect<f64>> {
    let min_x = a.min().x.max(b.min().x);
    let min_y = a.min().y.max(b.min().y);
    let max_x = a.max().x.min(b.max().x);
    let max_y = a.max().y.min(b.max().y);
    (min_x <= max_x && min_y <= max_y).then(|| Rect::new((min_x, min_y), (max_x, max_y)))
}

impl CellAssignment {
    /// Assign every admitted cell centre of `transform` to its enclosing zone.
    ///
    /// Cells outside all zones, or outside the environment's extent or mask,
    /// are dropped. If nothing overlaps the result is empty, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid's cell size differs from the one the
    /// environment expects.
    pub fn build(transform: &GridTransform, zones: &ZoneSet, env: &ProcessingEnv) -> Result<Self> {
        env.check_grid(transform)?;

        let mut window = Some(zones.bounds());
        if let Some(extent) = env.extent {
            window = window.and_then(|w| intersect_rects(&w, &extent));
        }
        let Some((rows, cols)) = window.and_then(|w| transform.cell_window(&w)) else {
            debug!("no grid cells overlap the zones");
            return Ok(Self {
                transform: *transform,
                cells: Vec::new(),
            });
        };

        let cells: Vec<AssignedCell> = rows
            .into_par_iter()
            .flat_map_iter(|row| {
                cols.clone().filter_map(move |col| {
                    let center = transform.cell_center(row, col);
                    if !env.admits(&center) {
                        return None;
                    }
                    zones.locate(&center).map(|zone| AssignedCell {
                        zone_id: zone.id(),
                        row,
                        col,
                    })
                })
            })
            .collect();

        debug!(cells = cells.len(), zones = zones.len(), "assigned grid cells to zones");
        Ok(Self {
            transform: *transform,
            cells,
        })
    }

    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Assigned cells in row-major order.
    pub fn cells(&self) -> &[AssignedCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read `grid` at every assigned cell, dropping no-data cells.
    ///
    /// # Errors
    ///
    /// Returns an error if `grid` is not co-registered with this assignment.
    pub fn sample(&self, grid: &Grid) -> Result<Vec<SampledPoint>> {
        if !grid.transform().is_co_registered(&self.transform) {
            return Err(ApzError::GridMismatch {
                message: format!(
                    "grid {:?} does not match the sampled placement {:?}",
                    grid.transform(),
                    self.transform
                ),
            });
        }

        Ok(self
            .cells
            .iter()
            .filter_map(|cell| {
                grid.get(cell.row, cell.col).map(|value| SampledPoint {
                    zone_id: cell.zone_id,
                    row: cell.row,
                    col: cell.col,
                    location: self.transform.cell_center(cell.row, cell.col),
                    value,
                })
            })
            .collect())
    }
}

/// Sample a single grid against `zones`.
pub fn sample_grid(grid: &Grid, zones: &ZoneSet, env: &ProcessingEnv) -> Result<Vec<SampledPoint>> {
    CellAssignment::build(grid.transform(), zones, env)?.sample(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::Zone;
    use geo::{coord, MultiPolygon, Polygon};

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x0 + size, y: y0 + size }).to_polygon()
    }

    /// 10×10 grid of 10 m cells over [0, 100]²; value = row * 10 + col.
    fn test_grid() -> Grid {
        let t = GridTransform::new(0.0, 100.0, 10.0, 10, 10);
        Grid::from_fn(t, Some(-9999.0), |row, col| (row * 10 + col) as f64)
    }

    fn two_zones() -> ZoneSet {
        ZoneSet::new(vec![
            Zone::new(1, square(0.0, 0.0, 50.0)),
            Zone::new(2, square(50.0, 0.0, 50.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_sample_assigns_cells_to_zones() {
        let points = sample_grid(&test_grid(), &two_zones(), &ProcessingEnv::default()).unwrap();

        assert_eq!(points.iter().filter(|p| p.zone_id == 1).count(), 25);
        assert_eq!(points.iter().filter(|p| p.zone_id == 2).count(), 25);

        // Row 5, col 0 is the north-west cell of zone 1
        let first = points.iter().find(|p| p.zone_id == 1).unwrap();
        assert_eq!((first.row, first.col), (5, 0));
        assert_eq!(first.value, 50.0);
        assert_eq!(first.location, Point::new(5.0, 45.0));
    }

    #[test]
    fn test_uncontained_and_nodata_cells_dropped() {
        let t = GridTransform::new(0.0, 100.0, 10.0, 10, 10);
        let grid = Grid::from_fn(t, Some(-9999.0), |row, _| if row == 9 { -9999.0 } else { 1.0 });
        let zones = ZoneSet::new(vec![Zone::new(1, square(0.0, 0.0, 20.0))]).unwrap();

        let points = sample_grid(&grid, &zones, &ProcessingEnv::default()).unwrap();
        // 2×2 cells inside the zone, bottom row is no-data
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.row == 8));
    }

    #[test]
    fn test_no_overlap_yields_empty_sequence() {
        let zones = ZoneSet::new(vec![Zone::new(1, square(500.0, 500.0, 10.0))]).unwrap();
        let points = sample_grid(&test_grid(), &zones, &ProcessingEnv::default()).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_deterministic_assignment() {
        let grid = test_grid();
        let zones = two_zones();
        let env = ProcessingEnv::default();

        let a = CellAssignment::build(grid.transform(), &zones, &env).unwrap();
        let b = CellAssignment::build(grid.transform(), &zones, &env).unwrap();
        assert_eq!(a.cells(), b.cells());
    }

    #[test]
    fn test_extent_and_mask_restrict_sampling() {
        let grid = test_grid();
        let zones = two_zones();

        let env = ProcessingEnv {
            extent: Some(Rect::new((0.0, 0.0), (30.0, 30.0))),
            ..Default::default()
        };
        let points = sample_grid(&grid, &zones, &env).unwrap();
        assert_eq!(points.len(), 9);

        let env = ProcessingEnv {
            mask: Some(MultiPolygon::new(vec![square(60.0, 0.0, 20.0)])),
            ..Default::default()
        };
        let points = sample_grid(&grid, &zones, &env).unwrap();
        assert_eq!(points.len(), 4);
        assert!(points.iter().all(|p| p.zone_id == 2));
    }

    #[test]
    fn test_cell_size_mismatch() {
        let env = ProcessingEnv {
            cell_size: Some(5.0),
            ..Default::default()
        };
        let result = sample_grid(&test_grid(), &two_zones(), &env);
        assert!(matches!(result, Err(ApzError::GridMismatch { .. })));
    }

    #[test]
    fn test_sample_rejects_foreign_grid() {
        let grid = test_grid();
        let assignment =
            CellAssignment::build(grid.transform(), &two_zones(), &ProcessingEnv::default())
                .unwrap();

        let other = Grid::from_fn(GridTransform::new(0.0, 100.0, 20.0, 5, 5), None, |_, _| 0.0);
        assert!(assignment.sample(&other).is_err());
    }
}
