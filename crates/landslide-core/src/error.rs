//! Error types for the risk pipeline.

use thiserror::Error;

use crate::reclass::Factor;

/// Fatal pipeline errors.
///
/// Resolution and spatial-reference mismatches, unclassified gap cells and
/// out-of-extent query points are *not* errors; they are reported through
/// [`crate::diagnostics::Diagnostics`].
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF codec error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("Raster {0} has no usable georeference (pixel scale / tiepoint tags)")]
    MissingGeoreference(String),

    #[error("Study area contains no polygon geometry")]
    EmptyStudyArea,

    #[error("Study area {area} does not intersect raster {raster} extent {extent}")]
    ClipExtentDisjoint {
        raster: String,
        area: String,
        extent: String,
    },

    #[error("{factor} value {value} lies outside every breakpoint interval")]
    OutOfDomain { factor: Factor, value: f32 },

    #[error("Cannot parse {axis} coordinate {input:?} as a number")]
    CoordinateParse { axis: &'static str, input: String },

    #[error("Raster {name} is not on the processing grid ({reason})")]
    GridMismatch { name: String, reason: String },

    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RiskError>;
