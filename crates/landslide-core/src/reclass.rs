//! Breakpoint reclassification of continuous factors onto the 1–5 ordinal scale.
//!
//! Intervals are half-open `[min, max)`: a value equal to an interval's upper
//! bound belongs to the next interval. A table's last interval may close its
//! upper bound (the slope table ends at `[45, 90]`).
//!
//! Two kinds of cells get no ordinal class:
//! - values inside the table's domain that hit a gap (the slope table leaves
//!   `[30, 35)` unclassified) become [`UNCLASSIFIED`];
//! - values outside the table's domain follow the [`DomainPolicy`]: nodata, or
//!   a fatal [`RiskError::OutOfDomain`].
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};
use crate::maybe_rayon::*;
use crate::raster::Raster;

/// Cell value written for in-domain values that match no ordinal class.
pub const UNCLASSIFIED: f32 = 0.0;

/// The three risk factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Factor {
    Slope,
    Rainfall,
    Elevation,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Factor::Slope => "slope",
            Factor::Rainfall => "rainfall",
            Factor::Elevation => "elevation",
        })
    }
}

/// What to do with values outside every breakpoint interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    /// Write nodata and count the cell.
    #[default]
    MapToNodata,
    /// Abort the run on the first such value.
    Fail,
}

/// Output of one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassValue {
    Class(u8),
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
    pub max_inclusive: bool,
    pub class: ClassValue,
}

impl Interval {
    pub fn new(min: f64, max: f64, class: u8) -> Self {
        Self { min, max, max_inclusive: false, class: ClassValue::Class(class) }
    }

    pub fn gap(min: f64, max: f64) -> Self {
        Self { min, max, max_inclusive: false, class: ClassValue::Unclassified }
    }

    pub fn closed(mut self) -> Self {
        self.max_inclusive = true;
        self
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && (v < self.max || (self.max_inclusive && v == self.max))
    }
}

/// Result of looking a single value up in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Class(u8),
    Unclassified,
    OutOfDomain,
}

/// Ordered, non-overlapping interval table for one factor.
#[derive(Debug, Clone)]
pub struct BreakpointTable {
    pub factor: Factor,
    intervals: Vec<Interval>,
}

impl BreakpointTable {
    /// Validate and build a table. Intervals must be non-empty, sorted,
    /// non-overlapping and emit classes in 1–5.
    pub fn new(factor: Factor, intervals: Vec<Interval>) -> Result<Self> {
        let invalid = |msg: String| RiskError::InvalidConfig(format!("{factor} breakpoint table: {msg}"));
        if intervals.is_empty() {
            return Err(invalid("no intervals".into()));
        }
        for (i, iv) in intervals.iter().enumerate() {
            if !(iv.min < iv.max) {
                return Err(invalid(format!("interval {i} has min {} >= max {}", iv.min, iv.max)));
            }
            if let ClassValue::Class(c) = iv.class {
                if !(1..=5).contains(&c) {
                    return Err(invalid(format!("interval {i} emits class {c}, expected 1-5")));
                }
            }
            if iv.max_inclusive && i + 1 != intervals.len() {
                return Err(invalid(format!("only the last interval may close its upper bound (interval {i})")));
            }
        }
        for pair in intervals.windows(2) {
            if pair[1].min < pair[0].max {
                return Err(invalid(format!(
                    "intervals [{}, {}) and [{}, {}) overlap or are unsorted",
                    pair[0].min, pair[0].max, pair[1].min, pair[1].max
                )));
            }
        }
        Ok(Self { factor, intervals })
    }

    /// Slope in degrees. `[30, 35)` is deliberately left unclassified.
    pub fn slope() -> Self {
        Self {
            factor: Factor::Slope,
            intervals: vec![
                Interval::new(0.0, 15.0, 1),
                Interval::new(15.0, 25.0, 2),
                Interval::new(25.0, 30.0, 3),
                Interval::gap(30.0, 35.0),
                Interval::new(35.0, 45.0, 4),
                Interval::new(45.0, 90.0, 5).closed(),
            ],
        }
    }

    /// Rainfall in millimetres.
    pub fn rainfall() -> Self {
        Self {
            factor: Factor::Rainfall,
            intervals: vec![
                Interval::new(0.0, 75.0, 1),
                Interval::new(75.0, 150.0, 2),
                Interval::new(150.0, 225.0, 3),
                Interval::new(225.0, 300.0, 4),
                Interval::new(300.0, 10_000.0, 5),
            ],
        }
    }

    /// Elevation in metres.
    pub fn elevation() -> Self {
        Self {
            factor: Factor::Elevation,
            intervals: vec![
                Interval::new(-500.0, 500.0, 1),
                Interval::new(500.0, 1000.0, 2),
                Interval::new(1000.0, 1500.0, 3),
                Interval::new(1500.0, 2000.0, 4),
                Interval::new(2000.0, 11_000.0, 5),
            ],
        }
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Lower bound of the first interval and upper bound of the last.
    pub fn domain(&self) -> (f64, f64) {
        (self.intervals[0].min, self.intervals[self.intervals.len() - 1].max)
    }

    pub fn lookup(&self, v: f64) -> Lookup {
        match self.intervals.iter().find(|iv| iv.contains(v)) {
            Some(Interval { class: ClassValue::Class(c), .. }) => Lookup::Class(*c),
            Some(Interval { class: ClassValue::Unclassified, .. }) => Lookup::Unclassified,
            None => {
                // Holes between intervals are gaps, not out-of-domain.
                let (lo, hi) = self.domain();
                if v >= lo && v < hi {
                    Lookup::Unclassified
                } else {
                    Lookup::OutOfDomain
                }
            }
        }
    }
}

/// A reclassified factor raster and its cell accounting.
#[derive(Debug, Clone)]
pub struct Reclassified {
    pub factor: Factor,
    pub raster: Raster,
    pub classified: usize,
    pub unclassified: usize,
    pub out_of_domain: usize,
}

/// Map every valid cell of `raster` through `table`.
///
/// Output cells hold the class (1–5) as f32, [`UNCLASSIFIED`] for gap values,
/// and NaN for input nodata and (under [`DomainPolicy::MapToNodata`])
/// out-of-domain values.
pub fn reclassify(raster: &Raster, table: &BreakpointTable, policy: DomainPolicy) -> Result<Reclassified> {
    let lookups: Vec<Option<Lookup>> = (&raster.data)
        .into_par_iter()
        .map(|&v| (!raster.is_nodata(v)).then(|| table.lookup(f64::from(v))))
        .collect();

    let (mut classified, mut unclassified, mut out_of_domain) = (0usize, 0usize, 0usize);
    let mut data = Vec::with_capacity(lookups.len());
    for (i, lookup) in lookups.into_iter().enumerate() {
        data.push(match lookup {
            None => f32::NAN,
            Some(Lookup::Class(c)) => {
                classified += 1;
                f32::from(c)
            }
            Some(Lookup::Unclassified) => {
                unclassified += 1;
                UNCLASSIFIED
            }
            Some(Lookup::OutOfDomain) => {
                if policy == DomainPolicy::Fail {
                    return Err(RiskError::OutOfDomain { factor: table.factor, value: raster.data[i] });
                }
                out_of_domain += 1;
                f32::NAN
            }
        });
    }

    Ok(Reclassified {
        factor: table.factor,
        raster: raster.derive(format!("{}_class", table.factor), data),
        classified,
        unclassified,
        out_of_domain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{CellSize, GeoTransform};

    fn row_raster(values: &[f32]) -> Raster {
        let gt = GeoTransform::new(0.0, 1.0, CellSize::square(1.0));
        Raster::from_vec("in", values.to_vec(), values.len(), 1, gt).unwrap()
    }

    #[test]
    fn slope_boundaries_belong_to_upper_interval() {
        let t = BreakpointTable::slope();
        assert_eq!(t.lookup(0.0), Lookup::Class(1));
        assert_eq!(t.lookup(15.0), Lookup::Class(2));
        assert_eq!(t.lookup(25.0), Lookup::Class(3));
        assert_eq!(t.lookup(30.0), Lookup::Unclassified);
        assert_eq!(t.lookup(35.0), Lookup::Class(4));
        assert_eq!(t.lookup(45.0), Lookup::Class(5));
        assert_eq!(t.lookup(90.0), Lookup::Class(5));
        assert_eq!(t.lookup(24.999), Lookup::Class(2));
    }

    #[test]
    fn slope_gap_is_unclassified_not_neighbour() {
        let t = BreakpointTable::slope();
        assert_eq!(t.lookup(32.0), Lookup::Unclassified);
        assert_eq!(t.lookup(34.999), Lookup::Unclassified);
    }

    #[test]
    fn rainfall_and_elevation_boundaries() {
        let rain = BreakpointTable::rainfall();
        for (v, c) in [(0.0, 1), (75.0, 2), (150.0, 3), (225.0, 4), (300.0, 5), (9_999.0, 5)] {
            assert_eq!(rain.lookup(v), Lookup::Class(c), "rainfall {v}");
        }
        assert_eq!(rain.lookup(10_000.0), Lookup::OutOfDomain);
        assert_eq!(rain.lookup(-1.0), Lookup::OutOfDomain);

        let elev = BreakpointTable::elevation();
        for (v, c) in [(-500.0, 1), (500.0, 2), (1000.0, 3), (1500.0, 4), (2000.0, 5)] {
            assert_eq!(elev.lookup(v), Lookup::Class(c), "elevation {v}");
        }
        assert_eq!(elev.lookup(-500.1), Lookup::OutOfDomain);
        assert_eq!(elev.lookup(11_000.0), Lookup::OutOfDomain);
    }

    #[test]
    fn reclassify_counts_and_sentinels() {
        let r = row_raster(&[10.0, 32.0, f32::NAN, 50.0, 25.0]);
        let out = reclassify(&r, &BreakpointTable::slope(), DomainPolicy::MapToNodata).unwrap();
        assert_eq!(out.raster.name, "slope_class");
        assert_eq!(out.raster.get(0, 0), 1.0);
        assert_eq!(out.raster.get(0, 1), UNCLASSIFIED);
        assert!(out.raster.get(0, 2).is_nan());
        assert_eq!(out.raster.get(0, 3), 5.0);
        assert_eq!(out.raster.get(0, 4), 3.0);
        assert_eq!((out.classified, out.unclassified, out.out_of_domain), (3, 1, 0));
    }

    #[test]
    fn out_of_domain_policy_nodata_vs_fail() {
        let r = row_raster(&[50.0, -20.0]);
        let mapped = reclassify(&r, &BreakpointTable::rainfall(), DomainPolicy::MapToNodata).unwrap();
        assert!(mapped.raster.get(0, 1).is_nan());
        assert_eq!(mapped.out_of_domain, 1);

        let err = reclassify(&r, &BreakpointTable::rainfall(), DomainPolicy::Fail).unwrap_err();
        assert!(matches!(
            err,
            RiskError::OutOfDomain { factor: Factor::Rainfall, value } if value == -20.0
        ));
    }

    #[test]
    fn interior_holes_count_as_gaps() {
        let t = BreakpointTable::new(
            Factor::Elevation,
            vec![Interval::new(0.0, 10.0, 1), Interval::new(20.0, 30.0, 2)],
        )
        .unwrap();
        assert_eq!(t.lookup(15.0), Lookup::Unclassified);
        assert_eq!(t.lookup(30.0), Lookup::OutOfDomain);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let overlapping = vec![Interval::new(0.0, 10.0, 1), Interval::new(5.0, 20.0, 2)];
        assert!(BreakpointTable::new(Factor::Slope, overlapping).is_err());
        let bad_class = vec![Interval::new(0.0, 10.0, 7)];
        assert!(BreakpointTable::new(Factor::Slope, bad_class).is_err());
        let early_closed = vec![Interval::new(0.0, 10.0, 1).closed(), Interval::new(10.0, 20.0, 2)];
        assert!(BreakpointTable::new(Factor::Slope, early_closed).is_err());
        assert!(BreakpointTable::new(Factor::Slope, BreakpointTable::slope().intervals().to_vec()).is_ok());
    }
}
