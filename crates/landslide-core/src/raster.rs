use serde::{Deserialize, Serialize};

use crate::coords::{CellSize, Extent, GeoTransform, SpatialRef};
use crate::error::{Result, RiskError};

/// Pixel datatype of the dataset a raster was decoded from.
/// Values are always held as f32 in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

/// A georeferenced grid of cell values stored as f32, row-major, row 0 = north.
///
/// NaN is always treated as nodata; `nodata` additionally names the sentinel
/// the source dataset used. Rasters are never modified by the pipeline stages:
/// every stage returns a new `Raster` with its own `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Raster {
    /// Identity of this dataset (file stem or stage name).
    pub name: String,
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub spatial_ref: Option<SpatialRef>,
    pub nodata: Option<f32>,
    pub pixel_type: PixelType,
}

impl Raster {
    /// Create a new f32 raster filled with the given value.
    pub fn new(name: impl Into<String>, width: usize, height: usize, transform: GeoTransform, fill: f32) -> Self {
        Self {
            name: name.into(),
            data: vec![fill; width * height],
            width,
            height,
            transform,
            spatial_ref: None,
            nodata: Some(f32::NAN),
            pixel_type: PixelType::F32,
        }
    }

    /// Wrap existing row-major values. Fails when `data` does not hold exactly
    /// `width * height` cells.
    pub fn from_vec(
        name: impl Into<String>,
        data: Vec<f32>,
        width: usize,
        height: usize,
        transform: GeoTransform,
    ) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(RiskError::InvalidDimensions { width, height });
        }
        Ok(Self {
            name: name.into(),
            data,
            width,
            height,
            transform,
            spatial_ref: None,
            nodata: Some(f32::NAN),
            pixel_type: PixelType::F32,
        })
    }

    pub fn with_spatial_ref(mut self, spatial_ref: Option<SpatialRef>) -> Self {
        self.spatial_ref = spatial_ref;
        self
    }

    /// A new raster on the same grid and spatial reference, holding `data`.
    /// Derived rasters use NaN as nodata.
    pub fn derive(&self, name: impl Into<String>, data: Vec<f32>) -> Raster {
        debug_assert_eq!(data.len(), self.width * self.height);
        Raster {
            name: name.into(),
            data,
            width: self.width,
            height: self.height,
            transform: self.transform,
            spatial_ref: self.spatial_ref,
            nodata: Some(f32::NAN),
            pixel_type: PixelType::F32,
        }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn is_nodata(&self, v: f32) -> bool {
        v.is_nan() || self.nodata.is_some_and(|nd| !nd.is_nan() && v == nd)
    }

    /// Cell value, or `None` for nodata.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> Option<f32> {
        let v = self.get(row, col);
        (!self.is_nodata(v)).then_some(v)
    }

    pub fn cell_size(&self) -> CellSize {
        self.transform.cell
    }

    pub fn extent(&self) -> Extent {
        self.transform.extent(self.width, self.height)
    }

    /// True when `other` has the same dimensions and an identical transform.
    pub fn same_grid(&self, other: &Raster) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.transform.snaps_to(&other.transform)
            && (self.transform.origin_x - other.transform.origin_x).abs() <= 1e-6 * self.transform.cell.x
            && (self.transform.origin_y - other.transform.origin_y).abs() <= 1e-6 * self.transform.cell.y
    }

    /// Value of the cell containing `(x, y)`. `None` outside the grid or on nodata.
    pub fn sample_cell(&self, x: f64, y: f64) -> Option<f32> {
        let (row, col) = self.transform.cell_of(x, y, self.width, self.height)?;
        self.value(row, col)
    }

    /// Sample at `(x, y)` using bilinear interpolation between cell centres.
    ///
    /// Points within half a cell of the border clamp to the edge cells. When
    /// any of the four neighbours is nodata the nearest cell is returned
    /// instead, so nodata never bleeds into valid values.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> Option<f32> {
        if !self.extent().contains(x, y) {
            return None;
        }

        let (pc, pr) = self.transform.to_pixel(x, y);
        let fx = (pc - 0.5).clamp(0.0, (self.width - 1) as f64);
        let fy = (pr - 0.5).clamp(0.0, (self.height - 1) as f64);

        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let tx = (fx - x0 as f64) as f32;
        let ty = (fy - y0 as f64) as f32;

        match (self.value(y0, x0), self.value(y0, x1), self.value(y1, x0), self.value(y1, x1)) {
            (Some(v00), Some(v10), Some(v01), Some(v11)) => Some(
                v00 * (1.0 - tx) * (1.0 - ty)
                    + v10 * tx * (1.0 - ty)
                    + v01 * (1.0 - tx) * ty
                    + v11 * tx * ty,
            ),
            _ => self.sample_cell(x, y),
        }
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// (min, max) over valid cells; `None` when every cell is nodata.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|&&v| !self.is_nodata(v))
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
