//! Run orchestrator: sequences every stage and records a diagnostic at each
//! stage boundary.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info_span;

use crate::align::align;
use crate::clip::{clip, StudyArea};
use crate::composite::{categorize_raster, category_counts, compose, RiskCategory, Weights, WEIGHTS};
use crate::context::ProcessingContext;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, RiskError};
use crate::io::{
    read_raster, read_study_area, RasterStore, Workspace, CATEGORY_RASTER, DEM_CLIP, RAINFALL_CLIP, RESULT_RASTER,
};
use crate::query::{parse_query_point, query_point, QueryOutcome, QueryPoint};
use crate::raster::Raster;
use crate::reclass::{reclassify, BreakpointTable, DomainPolicy, Factor, Reclassified};
use crate::terrain::{derive_slope, SlopeUnits};

// ── Configuration ────────────────────────────────────────────────────────────

/// Parameters of one run. Loadable from JSON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub dem: PathBuf,
    pub rainfall: PathBuf,
    /// GeoJSON polygon(s) bounding the analysis.
    pub study_area: PathBuf,
    /// Output workspace directory.
    pub output: PathBuf,
    /// Optional query coordinate, as entered.
    pub x: Option<String>,
    pub y: Option<String>,
    pub domain_policy: DomainPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dem: PathBuf::from("dem.tif"),
            rainfall: PathBuf::from("rainfall.tif"),
            study_area: PathBuf::from("study_area.geojson"),
            output: PathBuf::from("output"),
            x: None,
            y: None,
            domain_policy: DomainPolicy::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RiskError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("dem", &self.dem),
            ("rainfall", &self.rainfall),
            ("study_area", &self.study_area),
            ("output", &self.output),
        ] {
            if path.as_os_str().is_empty() {
                return Err(RiskError::InvalidConfig(format!("{field} path is empty")));
            }
        }
        Ok(())
    }
}

// ── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct FactorSummary {
    pub factor: Factor,
    pub classified: usize,
    pub unclassified: usize,
    pub out_of_domain: usize,
}

impl From<&Reclassified> for FactorSummary {
    fn from(r: &Reclassified) -> Self {
        Self {
            factor: r.factor,
            classified: r.classified,
            unclassified: r.unclassified,
            out_of_domain: r.out_of_domain,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Score raster; its presence marks success.
    pub result_path: PathBuf,
    pub category_path: PathBuf,
    pub context: ProcessingContext,
    pub resampled: bool,
    pub weights: Weights,
    pub scored_cells: usize,
    pub categories: BTreeMap<RiskCategory, usize>,
    pub factors: Vec<FactorSummary>,
    pub query: Option<QueryOutcome>,
    pub diagnostics: Diagnostics,
}

/// In-memory inputs of a run.
#[derive(Debug, Clone)]
pub struct Inputs {
    pub dem: Raster,
    pub rainfall: Raster,
    pub study_area: StudyArea,
    pub query: Option<QueryPoint>,
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Load the configured datasets and run every stage into the output workspace.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    let _span = info_span!("run", output = %config.output.display()).entered();
    config.validate()?;

    let store = Workspace::open(&config.output)?;
    let mut diag = Diagnostics::new();
    clear_stale_result(&store, &mut diag)?;

    // Coordinates are parsed before any raster work so malformed text fails
    // the run without touching the workspace further.
    let query = parse_query_point(config.x.as_deref(), config.y.as_deref())?;
    let inputs = Inputs {
        dem: read_raster(&config.dem)?,
        rainfall: read_raster(&config.rainfall)?,
        study_area: read_study_area(&config.study_area)?,
        query,
    };
    diag.info(format!(
        "Loaded DEM {} ({}x{}), rainfall {} ({}x{}), study area {}",
        inputs.dem.name,
        inputs.dem.width,
        inputs.dem.height,
        inputs.rainfall.name,
        inputs.rainfall.width,
        inputs.rainfall.height,
        inputs.study_area.name
    ));

    process(&store, inputs, config.domain_policy, diag)
}

/// Run every stage on already-loaded inputs.
pub fn run_with<S: RasterStore>(store: &S, inputs: Inputs, policy: DomainPolicy) -> Result<RunReport> {
    let mut diag = Diagnostics::new();
    clear_stale_result(store, &mut diag)?;
    process(store, inputs, policy, diag)
}

fn clear_stale_result<S: RasterStore>(store: &S, diag: &mut Diagnostics) -> Result<()> {
    if store.remove(RESULT_RASTER)? {
        diag.info(format!("Removed result {RESULT_RASTER} left by a previous run"));
    }
    Ok(())
}

fn process<S: RasterStore>(
    store: &S,
    inputs: Inputs,
    policy: DomainPolicy,
    mut diag: Diagnostics,
) -> Result<RunReport> {
    let Inputs { dem, rainfall, study_area, query } = inputs;

    // ── 1. Resolution alignment ──────────────────────────────────────────
    let aligned = align(dem, rainfall, &mut diag)?;
    let ctx = aligned.context;

    // ── 2. Clip and materialize ──────────────────────────────────────────
    let dem_clip = clip(&aligned.dem, &study_area, &ctx, DEM_CLIP)?;
    let dem_clip = store.materialize(&dem_clip, DEM_CLIP)?;
    diag.info(clip_message("DEM", &dem_clip, &study_area));

    let rain_clip = clip(&aligned.rainfall, &study_area, &ctx, RAINFALL_CLIP)?;
    let rain_clip = store.materialize(&rain_clip, RAINFALL_CLIP)?;
    diag.info(clip_message("rainfall", &rain_clip, &study_area));

    // ── 3. Slope ─────────────────────────────────────────────────────────
    let slope = derive_slope(&dem_clip, SlopeUnits::Degrees)?;
    match slope.value_range() {
        Some((lo, hi)) => diag.info(format!(
            "Derived slope in degrees for {} cells (range {lo:.2} to {hi:.2})",
            slope.valid_count()
        )),
        None => diag.warn("Derived slope has no valid cells; the clipped DEM is too small or all nodata"),
    }

    // ── 4. Reclassify ────────────────────────────────────────────────────
    let slope_c = reclassify(&slope, &BreakpointTable::slope(), policy)?;
    let rain_c = reclassify(&rain_clip, &BreakpointTable::rainfall(), policy)?;
    let elev_c = reclassify(&dem_clip, &BreakpointTable::elevation(), policy)?;
    for r in [&slope_c, &rain_c, &elev_c] {
        report_reclass(r, &mut diag);
    }

    // ── 5. Weighted overlay ──────────────────────────────────────────────
    let composite = compose(&slope_c.raster, &rain_c.raster, &elev_c.raster, &ctx, &WEIGHTS)?;
    diag.info(format!(
        "Weighted overlay (slope {}, rainfall {}, elevation {}): {} cells scored",
        WEIGHTS.slope, WEIGHTS.rainfall, WEIGHTS.elevation, composite.scored
    ));
    if composite.unclassified > 0 {
        diag.warn(format!(
            "{} cells have an unclassified factor and were left without a score",
            composite.unclassified
        ));
    }
    let categories = category_counts(&composite.score);
    for (cat, n) in &categories {
        diag.info(format!("{cat}: {n} cells"));
    }

    // ── 6. Persist; the result raster is written last ────────────────────
    let category_path = store.write(&categorize_raster(&composite.score), CATEGORY_RASTER)?;
    let result_path = store.write(&composite.score, RESULT_RASTER)?;
    diag.info(format!("Saved risk score raster to {}", result_path.display()));

    // ── 7. Point query ───────────────────────────────────────────────────
    let study_extent = dem_clip.extent();
    let query = match query {
        Some(point) => {
            let outcome = query_point(&composite.score, point, &study_extent);
            match outcome {
                QueryOutcome::Category { category, score } => {
                    diag.info(format!("Risk at {point}: {category} (score {score:.2})"))
                }
                QueryOutcome::NotInExtent => {
                    diag.warn(format!("Point {point} is not within the study extent {study_extent}"))
                }
                QueryOutcome::NoData => diag.warn(format!("No risk score at {point}")),
            }
            Some(outcome)
        }
        None => {
            diag.info("No query coordinates supplied; point lookup skipped");
            None
        }
    };

    Ok(RunReport {
        result_path,
        category_path,
        context: ctx,
        resampled: aligned.resampled,
        weights: WEIGHTS,
        scored_cells: composite.scored,
        categories,
        factors: [&slope_c, &rain_c, &elev_c].into_iter().map(FactorSummary::from).collect(),
        query,
        diagnostics: diag,
    })
}

fn clip_message(label: &str, clipped: &Raster, area: &StudyArea) -> String {
    format!(
        "Clipped {label} to {}: {}x{} cells, {} valid, extent {}",
        area.name,
        clipped.width,
        clipped.height,
        clipped.valid_count(),
        clipped.extent()
    )
}

fn report_reclass(r: &Reclassified, diag: &mut Diagnostics) {
    diag.info(format!("Reclassified {}: {} cells classified", r.factor, r.classified));
    if r.unclassified > 0 {
        diag.warn(format!(
            "{} {} cells fall in an unclassified breakpoint gap",
            r.unclassified, r.factor
        ));
    }
    if r.out_of_domain > 0 {
        diag.warn(format!(
            "{} {} cells lie outside every breakpoint interval and were set to nodata",
            r.out_of_domain, r.factor
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg = RunConfig::from_json(r#"{"dem": "in/dem.tif", "x": "10", "domain_policy": "fail"}"#).unwrap();
        assert_eq!(cfg.dem, PathBuf::from("in/dem.tif"));
        assert_eq!(cfg.rainfall, PathBuf::from("rainfall.tif"));
        assert_eq!(cfg.x.as_deref(), Some("10"));
        assert_eq!(cfg.y, None);
        assert_eq!(cfg.domain_policy, DomainPolicy::Fail);
    }

    #[test]
    fn malformed_config_is_reported() {
        assert!(matches!(RunConfig::from_json("{ nope"), Err(RiskError::InvalidConfig(_))));
        let cfg = RunConfig { output: PathBuf::new(), ..RunConfig::default() };
        assert!(matches!(cfg.validate(), Err(RiskError::InvalidConfig(m)) if m.contains("output")));
    }
}
