//! Weighted overlay of the three factor classes and risk categorisation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ProcessingContext;
use crate::error::{Result, RiskError};
use crate::maybe_rayon::*;
use crate::raster::Raster;
use crate::reclass::UNCLASSIFIED;

/// Linear combination weights for the factor classes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Weights {
    pub slope: f64,
    pub rainfall: f64,
    pub elevation: f64,
}

/// Fixed weighting: slope 0.5, rainfall 0.3, elevation 0.2.
pub const WEIGHTS: Weights = Weights { slope: 0.5, rainfall: 0.3, elevation: 0.2 };

impl Weights {
    /// Score for one cell. Computed in f64 and rounded once to f32, so sums
    /// that land on a category boundary (1.0, 3.0, 5.0) come out exact.
    pub fn score(&self, slope: f32, rainfall: f32, elevation: f32) -> f32 {
        (self.slope * f64::from(slope) + self.rainfall * f64::from(rainfall) + self.elevation * f64::from(elevation))
            as f32
    }

    /// Lowest and highest attainable score for classes in 1–5.
    pub fn score_range(&self) -> (f32, f32) {
        (self.score(1.0, 1.0, 1.0), self.score(5.0, 5.0, 5.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
}

impl RiskCategory {
    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::Low => "Low Risk",
            RiskCategory::Moderate => "Moderate Risk",
            RiskCategory::High => "High Risk",
        }
    }

    /// Cell code used in the category raster.
    pub fn code(self) -> u8 {
        match self {
            RiskCategory::Low => 1,
            RiskCategory::Moderate => 2,
            RiskCategory::High => 3,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score buckets: `[0, 1)` Low, `[1, 3)` Moderate, `[3, 5]` High.
/// The High bucket closes at 5.0, the maximum attainable score.
pub const CATEGORY_TABLE: [(f32, f32, RiskCategory); 3] = [
    (0.0, 1.0, RiskCategory::Low),
    (1.0, 3.0, RiskCategory::Moderate),
    (3.0, 5.0, RiskCategory::High),
];

/// Bucket a continuous score. `None` for NaN or scores outside `[0, 5]`.
pub fn categorize(score: f32) -> Option<RiskCategory> {
    let last = CATEGORY_TABLE.len() - 1;
    CATEGORY_TABLE
        .iter()
        .enumerate()
        .find(|(i, (lo, hi, _))| score >= *lo && (score < *hi || (*i == last && score == *hi)))
        .map(|(_, (_, _, cat))| *cat)
}

/// Categories whose bucket overlaps the attainable score range.
/// With the fixed weights the minimum score is 1.0, so Low never occurs.
pub fn reachable_categories(weights: &Weights) -> Vec<RiskCategory> {
    let (lo, hi) = weights.score_range();
    CATEGORY_TABLE
        .iter()
        .filter(|(min, max, _)| lo < *max && hi >= *min)
        .map(|(_, _, cat)| *cat)
        .collect()
}

/// Continuous score raster plus cell accounting.
#[derive(Debug, Clone)]
pub struct Composite {
    pub score: Raster,
    pub scored: usize,
    /// Cells where at least one factor was unclassified.
    pub unclassified: usize,
}

/// Combine the three class rasters into a continuous risk score.
///
/// All inputs must sit on the context grid with identical dimensions. A cell
/// is scored only when all three classes are valid ordinal values; nodata or
/// unclassified in any factor yields nodata.
pub fn compose(
    slope: &Raster,
    rainfall: &Raster,
    elevation: &Raster,
    ctx: &ProcessingContext,
    weights: &Weights,
) -> Result<Composite> {
    for r in [slope, rainfall, elevation] {
        ctx.ensure_aligned(r)?;
        if !r.same_grid(slope) {
            return Err(RiskError::GridMismatch {
                name: r.name.clone(),
                reason: format!(
                    "{}x{} at extent {} differs from {} {}x{} at {}",
                    r.width,
                    r.height,
                    r.extent(),
                    slope.name,
                    slope.width,
                    slope.height,
                    slope.extent()
                ),
            });
        }
    }

    let (w, h) = (slope.width, slope.height);
    let cells: Vec<(f32, bool)> = (0..w * h)
        .into_par_iter()
        .map(|i| {
            let (row, col) = (i / w, i % w);
            let (x, y) = slope.transform.cell_center(row, col);
            if !ctx.mask.contains(x, y) {
                return (f32::NAN, false);
            }
            match (slope.value(row, col), rainfall.value(row, col), elevation.value(row, col)) {
                (Some(s), Some(r), Some(e)) => {
                    if s == UNCLASSIFIED || r == UNCLASSIFIED || e == UNCLASSIFIED {
                        (f32::NAN, true)
                    } else {
                        (weights.score(s, r, e), false)
                    }
                }
                _ => (f32::NAN, false),
            }
        })
        .collect();

    let unclassified = cells.iter().filter(|(_, gap)| *gap).count();
    let data: Vec<f32> = cells.into_iter().map(|(v, _)| v).collect();
    let score = slope.derive("risk_score", data);
    let scored = score.valid_count();

    Ok(Composite { score, scored, unclassified })
}

/// Category codes (1 Low, 2 Moderate, 3 High) for every scored cell.
pub fn categorize_raster(score: &Raster) -> Raster {
    let data = score
        .data
        .iter()
        .map(|&v| {
            if score.is_nodata(v) {
                f32::NAN
            } else {
                categorize(v).map_or(f32::NAN, |c| f32::from(c.code()))
            }
        })
        .collect();
    score.derive("risk_category", data)
}

/// Number of scored cells in each category.
pub fn category_counts(score: &Raster) -> BTreeMap<RiskCategory, usize> {
    let mut counts = BTreeMap::new();
    for &v in &score.data {
        if score.is_nodata(v) {
            continue;
        }
        if let Some(cat) = categorize(v) {
            *counts.entry(cat).or_insert(0) += 1;
        }
    }
    counts
}
