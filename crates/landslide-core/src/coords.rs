/// Planar georeferencing types: spatial reference ids, cell sizes, extents and
/// the north-up affine transform shared by every raster.
/// All coordinate math uses f64 for precision.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing cell sizes and grid origins.
pub const GRID_EPS: f64 = 1e-9;

/// Spatial reference identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpatialRef(pub u16);

impl SpatialRef {
    pub const WGS84: SpatialRef = SpatialRef(4326);

    pub fn epsg(self) -> u16 {
        self.0
    }

    /// Geographic 2D systems live in the EPSG 4001–4999 block (WGS84, NAD83,
    /// ETRS89, ...). Their cell sizes are in degrees rather than metres.
    pub fn is_geographic(self) -> bool {
        (4001..=4999).contains(&self.0)
    }
}

impl fmt::Display for SpatialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Ground dimensions of one cell, in CRS units. Both components are positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub x: f64,
    pub y: f64,
}

impl CellSize {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn square(size: f64) -> Self {
        Self { x: size, y: size }
    }

    pub fn max_dim(self) -> f64 {
        self.x.max(self.y)
    }

    pub fn approx_eq(self, other: CellSize) -> bool {
        (self.x - other.x).abs() <= GRID_EPS && (self.y - other.y).abs() <= GRID_EPS
    }
}

impl fmt::Display for CellSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when the two rectangles share a region of positive area.
    /// Touching edges do not count.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }
        Some(Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Closed containment test: points on the boundary are inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// North-up affine transform.
///
/// `(origin_x, origin_y)` is the upper-left corner of cell (0, 0); rows grow
/// southwards, so `y = origin_y - row * cell.y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell: CellSize,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell: CellSize) -> Self {
        Self { origin_x, origin_y, cell }
    }

    /// Bounding rectangle of a `width`×`height` grid on this transform.
    pub fn extent(&self, width: usize, height: usize) -> Extent {
        Extent {
            min_x: self.origin_x,
            max_x: self.origin_x + width as f64 * self.cell.x,
            min_y: self.origin_y - height as f64 * self.cell.y,
            max_y: self.origin_y,
        }
    }

    /// Map coordinates of the centre of cell `(row, col)`.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell.x,
            self.origin_y - (row as f64 + 0.5) * self.cell.y,
        )
    }

    /// Fractional `(col, row)` of a map coordinate, measured from the upper-left
    /// corner. Cell `(r, c)` spans `[c, c + 1) × [r, r + 1)`.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.cell.x,
            (self.origin_y - y) / self.cell.y,
        )
    }

    /// Cell containing `(x, y)` on a `width`×`height` grid, if any.
    pub fn cell_of(&self, x: f64, y: f64, width: usize, height: usize) -> Option<(usize, usize)> {
        let (fc, fr) = self.to_pixel(x, y);
        if !fc.is_finite() || !fr.is_finite() || fc < 0.0 || fr < 0.0 {
            return None;
        }
        // The far (east/south) edge belongs to the last column/row.
        let index = |f: f64, n: usize| -> Option<usize> {
            let i = f.floor() as usize;
            if i < n {
                Some(i)
            } else if n > 0 && f - n as f64 <= GRID_EPS {
                Some(n - 1)
            } else {
                None
            }
        };
        Some((index(fr, height)?, index(fc, width)?))
    }

    /// True when both transforms share cell size and their origins differ by a
    /// whole number of cells.
    pub fn snaps_to(&self, other: &GeoTransform) -> bool {
        if !self.cell.approx_eq(other.cell) {
            return false;
        }
        let dc = (self.origin_x - other.origin_x) / other.cell.x;
        let dr = (other.origin_y - self.origin_y) / other.cell.y;
        (dc - dc.round()).abs() <= 1e-6 && (dr - dr.round()).abs() <= 1e-6
    }
}
