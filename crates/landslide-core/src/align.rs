//! Resolution alignment of the DEM and rainfall inputs.
//!
//! Both rasters are brought to the coarsest cell dimension present across the
//! pair (never upsampled), spatial references are compared (report only, no
//! reprojection), and the processing context is taken from the rainfall grid.

use crate::context::ProcessingContext;
use crate::coords::{CellSize, GeoTransform, GRID_EPS};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::maybe_rayon::*;
use crate::raster::Raster;

/// Cell value interpolation used when changing resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleMethod {
    /// Categorical data: take the value of the source cell under the new centre.
    Nearest,
    /// Continuous data: bilinear between the four surrounding source centres.
    Bilinear,
}

/// Both inputs on a common resolution plus the frame derived from rainfall.
#[derive(Debug, Clone)]
pub struct Aligned {
    pub dem: Raster,
    pub rainfall: Raster,
    pub context: ProcessingContext,
    pub resampled: bool,
}

/// Square cell size both rasters must be resampled to, or `None` when all four
/// cell dimensions already agree.
pub fn target_cell_size(dem: &Raster, rainfall: &Raster) -> Option<CellSize> {
    let (a, b) = (dem.cell_size(), rainfall.cell_size());
    let dims = [a.x, a.y, b.x, b.y];
    let coarsest = dims.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let finest = dims.iter().cloned().fold(f64::INFINITY, f64::min);
    if coarsest - finest <= GRID_EPS {
        None
    } else {
        Some(CellSize::square(coarsest))
    }
}

/// Resample `raster` to `cell`, keeping the upper-left corner fixed.
///
/// The output covers the source extent rounded to whole target cells; output
/// centres that fall outside the source become nodata.
pub fn resample(raster: &Raster, cell: CellSize, method: ResampleMethod) -> Result<Raster> {
    let extent = raster.extent();
    let width = (extent.width() / cell.x).round().max(1.0) as usize;
    let height = (extent.height() / cell.y).round().max(1.0) as usize;
    let transform = GeoTransform::new(raster.transform.origin_x, raster.transform.origin_y, cell);

    let data: Vec<f32> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            (0..width)
                .map(|col| {
                    let (x, y) = transform.cell_center(row, col);
                    let v = match method {
                        ResampleMethod::Nearest => raster.sample_cell(x, y),
                        ResampleMethod::Bilinear => raster.sample_bilinear(x, y),
                    };
                    v.unwrap_or(f32::NAN)
                })
                .collect::<Vec<f32>>()
        })
        .collect();

    Ok(Raster::from_vec(format!("{}_resampled", raster.name), data, width, height, transform)?
        .with_spatial_ref(raster.spatial_ref))
}

/// Align DEM and rainfall to a common resolution and build the processing
/// context from the (aligned) rainfall raster.
pub fn align(dem: Raster, rainfall: Raster, diag: &mut Diagnostics) -> Result<Aligned> {
    diag.info(format!(
        "Checking cell sizes: DEM {} / rainfall {}",
        dem.cell_size(),
        rainfall.cell_size()
    ));

    let (dem, rainfall, resampled) = match target_cell_size(&dem, &rainfall) {
        None => {
            diag.info("Cell sizes match; no resampling needed");
            (dem, rainfall, false)
        }
        Some(cell) => {
            // DEM and rainfall are both continuous surfaces.
            let (dem, dem_resampled) = resample_if_needed(dem, cell)?;
            let (rainfall, rain_resampled) = resample_if_needed(rainfall, cell)?;
            let which = match (dem_resampled, rain_resampled) {
                (true, true) => "DEM and rainfall",
                (true, false) => "DEM",
                _ => "rainfall",
            };
            diag.info(format!("Resampled {which} to the coarsest cell size {cell} (bilinear)"));
            (dem, rainfall, true)
        }
    };

    check_spatial_refs(&dem, &rainfall, diag);

    let context = ProcessingContext::from_raster(&rainfall);
    diag.info(format!(
        "Processing context from rainfall: cell size {}, extent {}",
        context.cell_size, context.extent
    ));

    Ok(Aligned { dem, rainfall, context, resampled })
}

/// Returns the raster and whether it was resampled.
fn resample_if_needed(raster: Raster, cell: CellSize) -> Result<(Raster, bool)> {
    if raster.cell_size().approx_eq(cell) {
        Ok((raster, false))
    } else {
        Ok((resample(&raster, cell, ResampleMethod::Bilinear)?, true))
    }
}

/// Compare spatial references. Mismatches are reported, never corrected.
fn check_spatial_refs(dem: &Raster, rainfall: &Raster, diag: &mut Diagnostics) {
    match (dem.spatial_ref, rainfall.spatial_ref) {
        (Some(a), Some(b)) if a == b => diag.info(format!("Spatial references match ({a})")),
        (Some(a), Some(b)) => diag.warn(format!(
            "Spatial reference mismatch: DEM {a} vs rainfall {b}; inputs are not reprojected"
        )),
        (None, Some(b)) => diag.warn(format!(
            "DEM has no spatial reference; cannot confirm it matches rainfall {b}"
        )),
        (Some(a), None) => diag.warn(format!(
            "Rainfall has no spatial reference; cannot confirm it matches DEM {a}"
        )),
        (None, None) => diag.warn("Neither input declares a spatial reference"),
    }
}
