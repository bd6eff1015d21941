//! Terrain derivatives computed from the clipped DEM.
mod gradient;
pub mod slope;

pub use slope::{derive_slope, SlopeUnits};
