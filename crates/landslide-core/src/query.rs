//! Point lookup against the continuous score raster.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::composite::{categorize, RiskCategory};
use crate::coords::Extent;
use crate::error::{Result, RiskError};
use crate::raster::Raster;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryPoint {
    pub x: f64,
    pub y: f64,
}

impl QueryPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for QueryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Parse optional coordinate text.
///
/// Returns `Ok(None)` unless both coordinates are present and non-blank; a
/// lone x or y is treated the same as neither. Malformed or non-finite text
/// is a [`RiskError::CoordinateParse`].
pub fn parse_query_point(x: Option<&str>, y: Option<&str>) -> Result<Option<QueryPoint>> {
    fn present(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }
    match (present(x), present(y)) {
        (Some(x), Some(y)) => Ok(Some(QueryPoint::new(parse_axis("x", x)?, parse_axis("y", y)?))),
        _ => Ok(None),
    }
}

fn parse_axis(axis: &'static str, text: &str) -> Result<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RiskError::CoordinateParse { axis, input: text.to_string() })
}

/// Result of a point lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Category { category: RiskCategory, score: f32 },
    /// The point lies outside the clipped study extent; nothing was sampled.
    NotInExtent,
    /// Inside the extent, but the cell under the point has no score.
    NoData,
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Category { category, score } => write!(f, "{category} (score {score:.2})"),
            QueryOutcome::NotInExtent => f.write_str("not in study extent"),
            QueryOutcome::NoData => f.write_str("no data at point"),
        }
    }
}

/// Extent check first, then `sample`. `sample` is only invoked for points
/// inside `study_extent`.
pub fn query_with<F>(point: QueryPoint, study_extent: &Extent, sample: F) -> QueryOutcome
where
    F: FnOnce(f64, f64) -> Option<f32>,
{
    if !study_extent.contains(point.x, point.y) {
        return QueryOutcome::NotInExtent;
    }
    match sample(point.x, point.y) {
        Some(score) => match categorize(score) {
            Some(category) => QueryOutcome::Category { category, score },
            None => QueryOutcome::NoData,
        },
        None => QueryOutcome::NoData,
    }
}

/// Categorical risk at `point`, re-bucketed from the continuous score.
pub fn query_point(score: &Raster, point: QueryPoint, study_extent: &Extent) -> QueryOutcome {
    query_with(point, study_extent, |x, y| score.sample_cell(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{CellSize, GeoTransform};

    fn score_raster() -> Raster {
        let gt = GeoTransform::new(0.0, 40.0, CellSize::square(10.0));
        let mut r = Raster::new("risk_score", 4, 4, gt, 1.4);
        r.set(0, 3, 5.0);
        r.set(3, 0, f32::NAN);
        r
    }

    #[test]
    fn both_coordinates_required() {
        assert_eq!(parse_query_point(None, None).unwrap(), None);
        assert_eq!(parse_query_point(Some("10"), None).unwrap(), None);
        assert_eq!(parse_query_point(Some(""), Some("  ")).unwrap(), None);
        assert_eq!(
            parse_query_point(Some(" 12.5 "), Some("-3")).unwrap(),
            Some(QueryPoint::new(12.5, -3.0))
        );
    }

    #[test]
    fn malformed_coordinate_is_an_error() {
        let err = parse_query_point(Some("12,5"), Some("3")).unwrap_err();
        assert!(matches!(err, RiskError::CoordinateParse { axis: "x", .. }));
        let err = parse_query_point(Some("1"), Some("inf")).unwrap_err();
        assert!(matches!(err, RiskError::CoordinateParse { axis: "y", .. }));
    }

    #[test]
    fn outside_extent_never_samples() {
        let extent = Extent::new(0.0, 0.0, 40.0, 40.0);
        let out = query_with(QueryPoint::new(50.0, 5.0), &extent, |_, _| {
            panic!("sampled a point outside the study extent")
        });
        assert_eq!(out, QueryOutcome::NotInExtent);
    }

    #[test]
    fn study_extent_is_checked_not_raster_extent() {
        // The raster has a valid cell here, but the study area is smaller.
        let r = score_raster();
        let study = Extent::new(0.0, 0.0, 20.0, 20.0);
        assert_eq!(query_point(&r, QueryPoint::new(35.0, 35.0), &study), QueryOutcome::NotInExtent);
    }

    #[test]
    fn inside_point_is_rebucketed_from_score() {
        let r = score_raster();
        let extent = r.extent();
        assert_eq!(
            query_point(&r, QueryPoint::new(15.0, 15.0), &extent),
            QueryOutcome::Category { category: RiskCategory::Moderate, score: 1.4 }
        );
        assert_eq!(
            query_point(&r, QueryPoint::new(35.0, 35.0), &extent),
            QueryOutcome::Category { category: RiskCategory::High, score: 5.0 }
        );
        assert_eq!(query_point(&r, QueryPoint::new(5.0, 5.0), &extent), QueryOutcome::NoData);
    }
}
