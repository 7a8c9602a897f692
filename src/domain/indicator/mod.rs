//! Band indicator types.
//!
//! - `BandPoint`: one band entry, index-aligned with the candle it annotates
//! - `BandSeries`: the full band series plus the parameters that produced it
//!
//! Undefined entries (warmup, or shifted out of range by the offset) are kept
//! in place with `valid == false` so that `values[i]` always annotates
//! `candles[i]`.

pub mod bollinger;

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct BandPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandPoint {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// A zero-width band carries no breakout information.
    pub fn has_width(&self) -> bool {
        self.width() > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandSeries {
    pub period: usize,
    pub std_dev: f64,
    pub offset: i64,
    pub values: Vec<BandPoint>,
}

impl BandSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The band at `index` if it is defined.
    pub fn get(&self, index: usize) -> Option<&BandPoint> {
        self.values.get(index).filter(|p| p.valid)
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|p| p.valid).count()
    }
}

impl fmt::Display for BandSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BOLLINGER({},{}", self.period, self.std_dev)?;
        if self.offset != 0 {
            write!(f, ",{:+}", self.offset)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(valid: bool, upper: f64, middle: f64, lower: f64) -> BandPoint {
        BandPoint {
            timestamp: DateTime::from_timestamp(0, 0).unwrap(),
            valid,
            upper,
            middle,
            lower,
        }
    }

    #[test]
    fn get_hides_undefined_entries() {
        let series = BandSeries {
            period: 2,
            std_dev: 2.0,
            offset: 0,
            values: vec![point(false, 0.0, 0.0, 0.0), point(true, 12.0, 10.0, 8.0)],
        };
        assert!(series.get(0).is_none());
        assert_eq!(series.get(1).map(|p| p.middle), Some(10.0));
        assert!(series.get(2).is_none());
        assert_eq!(series.defined_count(), 1);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn width_and_has_width() {
        assert!((point(true, 12.0, 10.0, 8.0).width() - 4.0).abs() < f64::EPSILON);
        assert!(point(true, 12.0, 10.0, 8.0).has_width());
        assert!(!point(true, 10.0, 10.0, 10.0).has_width());
    }

    #[test]
    fn display_includes_offset_only_when_set() {
        let mut series = BandSeries {
            period: 20,
            std_dev: 2.5,
            offset: 0,
            values: Vec::new(),
        };
        assert_eq!(series.to_string(), "BOLLINGER(20,2.5)");
        series.offset = -3;
        assert_eq!(series.to_string(), "BOLLINGER(20,2.5,-3)");
        series.offset = 2;
        assert_eq!(series.to_string(), "BOLLINGER(20,2.5,+2)");
    }
}
