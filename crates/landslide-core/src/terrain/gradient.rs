//! Shared Horn (1981) 3×3 gradient helpers.
//! `pub(crate)` only — not re-exported from terrain/mod.rs.

use crate::raster::Raster;

/// Metres per degree of latitude.
const M_PER_DEG: f64 = 111_320.0;

/// Ground cell size `(x, y)` in metres for cells on `row`.
///
/// Projected rasters use the transform cell size as is. Geographic rasters
/// (degree cells) are converted with 111 320 m/° on y and the same scaled by
/// cos(latitude of the row centre) on x.
pub(crate) fn cell_size_m(dem: &Raster, row: usize) -> (f64, f64) {
    let cell = dem.cell_size();
    match dem.spatial_ref {
        Some(sr) if sr.is_geographic() => {
            let (_, lat) = dem.transform.cell_center(row, 0);
            let cy = cell.y * M_PER_DEG;
            let cx = cell.x * M_PER_DEG * lat.to_radians().cos();
            (cx.max(1e-3), cy)
        }
        _ => (cell.x, cell.y),
    }
}

/// Horn (1981) weighted 3×3 gradient at interior cell `(r, c)`.
///
/// Returns `(dz_dx, dz_dy)` — dimensionless rise/run values — or `None` when
/// the centre or any neighbour is nodata.
///
/// 3×3 neighbourhood layout (row 0 = north):
/// ```text
///   NW(-1,-1)  N(-1, 0)  NE(-1,+1)
///   W ( 0,-1)  *         E ( 0,+1)
///   SW(+1,-1)  S(+1, 0)  SE(+1,+1)
/// ```
///
/// `dz/dx = ((NE + 2E + SE) − (NW + 2W + SW)) / (8 · cx)`
/// `dz/dy = ((NW + 2N + NE) − (SW + 2S + SE)) / (8 · cy)`
///
/// Caller must ensure `1 ≤ r ≤ height−2` and `1 ≤ c ≤ width−2`.
pub(crate) fn horn_gradient(dem: &Raster, r: usize, c: usize, cx: f64, cy: f64) -> Option<(f64, f64)> {
    dem.value(r, c)?;
    let v = |dr: usize, dc: usize| dem.value(r + dr - 1, c + dc - 1).map(f64::from);

    let nw = v(0, 0)?;
    let n  = v(0, 1)?;
    let ne = v(0, 2)?;
    let w  = v(1, 0)?;
    let e  = v(1, 2)?;
    let sw = v(2, 0)?;
    let s  = v(2, 1)?;
    let se = v(2, 2)?;

    let dz_dx = ((ne + 2.0 * e + se) - (nw + 2.0 * w + sw)) / (8.0 * cx);
    let dz_dy = ((nw + 2.0 * n + ne) - (sw + 2.0 * s + se)) / (8.0 * cy);
    Some((dz_dx, dz_dy))
}
