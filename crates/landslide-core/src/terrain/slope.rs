//! Per-cell slope surface (Horn method).
//!
//! Computes slope at every interior cell using Horn's (1981) 3×3 weighted
//! finite-difference gradient. Border cells, and cells with a nodata centre
//! or neighbour, are nodata in the output.
use super::gradient::{cell_size_m, horn_gradient};
use crate::error::Result;
use crate::maybe_rayon::*;
use crate::raster::Raster;

/// Output units for slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// 0–90.
    #[default]
    Degrees,
    /// rise/run × 100.
    Percent,
}

/// Derive a slope raster from `dem`.
///
///   slope = atan(√(dz_dx² + dz_dy²))
///
/// Elevation is assumed to be in metres; cell sizes of geographic DEMs are
/// converted to metres per row (see `gradient::cell_size_m`).
pub fn derive_slope(dem: &Raster, units: SlopeUnits) -> Result<Raster> {
    let (w, h) = (dem.width, dem.height);

    let data: Vec<f32> = (0..h)
        .into_par_iter()
        .flat_map(|r| {
            let mut row = vec![f32::NAN; w];
            if r == 0 || r + 1 >= h || w < 3 {
                return row;
            }
            let (cx, cy) = cell_size_m(dem, r);
            for c in 1..w - 1 {
                if let Some((dz_dx, dz_dy)) = horn_gradient(dem, r, c, cx, cy) {
                    let rise = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();
                    row[c] = match units {
                        SlopeUnits::Degrees => rise.atan().to_degrees() as f32,
                        SlopeUnits::Percent => (rise * 100.0) as f32,
                    };
                }
            }
            row
        })
        .collect();

    Ok(dem.derive("slope", data))
}
