//! Explicit processing frame threaded through every stage.

use serde::Serialize;

use crate::coords::{CellSize, Extent, GeoTransform, SpatialRef};
use crate::error::{Result, RiskError};
use crate::raster::Raster;

/// Spatial frame shared by all derived rasters: output cell size, processing
/// extent, analysis mask and snap grid.
///
/// Built once from the aligned rainfall raster. Stages take it as an argument
/// instead of reading ambient settings, so each stage's frame is visible at
/// the call site.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingContext {
    pub cell_size: CellSize,
    pub extent: Extent,
    /// Cells outside the mask are written as nodata.
    pub mask: Extent,
    /// Reference grid every output is snapped to.
    pub snap: GeoTransform,
    pub spatial_ref: Option<SpatialRef>,
}

impl ProcessingContext {
    pub fn from_raster(reference: &Raster) -> Self {
        let extent = reference.extent();
        Self {
            cell_size: reference.cell_size(),
            extent,
            mask: extent,
            snap: reference.transform,
            spatial_ref: reference.spatial_ref,
        }
    }

    /// Check that `raster` lies on the snap grid at the context cell size.
    pub fn ensure_aligned(&self, raster: &Raster) -> Result<()> {
        if !raster.cell_size().approx_eq(self.cell_size) {
            return Err(RiskError::GridMismatch {
                name: raster.name.clone(),
                reason: format!("cell size {} != {}", raster.cell_size(), self.cell_size),
            });
        }
        if !raster.transform.snaps_to(&self.snap) {
            return Err(RiskError::GridMismatch {
                name: raster.name.clone(),
                reason: format!(
                    "origin ({}, {}) is off the snap grid",
                    raster.transform.origin_x, raster.transform.origin_y
                ),
            });
        }
        Ok(())
    }

    /// Smallest window of whole snap-grid cells covering `area`, clamped to
    /// the processing extent. Returns the window transform and its size.
    pub fn snapped_window(&self, area: &Extent) -> Option<(GeoTransform, usize, usize)> {
        let bounds = self.extent.intersection(area)?;
        let snap = &self.snap;

        // Nudge by a tiny epsilon so edges that sit exactly on grid lines do
        // not pull in an extra row or column.
        let col0 = ((bounds.min_x - snap.origin_x) / snap.cell.x + 1e-9).floor();
        let col1 = ((bounds.max_x - snap.origin_x) / snap.cell.x - 1e-9).ceil();
        let row0 = ((snap.origin_y - bounds.max_y) / snap.cell.y + 1e-9).floor();
        let row1 = ((snap.origin_y - bounds.min_y) / snap.cell.y - 1e-9).ceil();

        let width = (col1 - col0).max(0.0) as usize;
        let height = (row1 - row0).max(0.0) as usize;
        if width == 0 || height == 0 {
            return None;
        }
        let transform = GeoTransform::new(
            snap.origin_x + col0 * snap.cell.x,
            snap.origin_y - row0 * snap.cell.y,
            snap.cell,
        );
        Some((transform, width, height))
    }
}
