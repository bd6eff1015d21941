//! Landslide susceptibility from a DEM, a rainfall surface and a study-area
//! polygon: align, clip, derive slope, reclassify three factors onto a 1–5
//! scale, combine them with fixed weights and bucket the score into risk
//! categories.

pub mod align;
pub mod clip;
pub mod composite;
pub mod context;
pub mod coords;
pub mod diagnostics;
pub mod error;
pub mod io;
mod maybe_rayon;
pub mod pipeline;
pub mod query;
pub mod raster;
pub mod reclass;
pub mod terrain;

pub use composite::{categorize, RiskCategory, WEIGHTS};
pub use context::ProcessingContext;
pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use error::{Result, RiskError};
pub use pipeline::{run, run_with, Inputs, RunConfig, RunReport};
pub use query::{QueryOutcome, QueryPoint};
pub use raster::Raster;
pub use reclass::{DomainPolicy, Factor};
