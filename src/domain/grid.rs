//! Parameter grid for the optimizer.
//!
//! Combinations are enumerated period (outer), std_dev, offset, leverage
//! (inner). A combination's index is its position in that order, so every
//! (period, std_dev, offset) group owns a contiguous run of indices, one per
//! leverage candidate.

use std::fmt;

use super::error::BandtraderError;
use super::metrics::Metrics;
use super::trading_config::TradingConfig;

const FLOAT_STEP_TOLERANCE: f64 = 1e-9;

/// Most combinations a grid may hold. Also bounds the candidates of any
/// single range, so a range is rejected before its values are materialised.
pub const MAX_COMBINATIONS: usize = 1_000_000;

fn check_candidate_count(name: &str, count: f64) -> Result<(), BandtraderError> {
    if !count.is_finite() || count > MAX_COMBINATIONS as f64 {
        return Err(BandtraderError::invalid(
            name,
            format!("range yields more than {MAX_COMBINATIONS} candidates"),
        ));
    }
    Ok(())
}

/// Inclusive `[min, max]` range walked in `step` increments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange<T> {
    pub min: T,
    pub max: T,
    pub step: T,
}

impl<T> ParamRange<T> {
    pub fn new(min: T, max: T, step: T) -> Self {
        ParamRange { min, max, step }
    }
}

impl<T: Copy> ParamRange<T> {
    /// A range holding exactly one value.
    pub fn fixed(value: T, step: T) -> Self {
        ParamRange {
            min: value,
            max: value,
            step,
        }
    }
}

impl ParamRange<usize> {
    pub fn validate(&self, name: &str) -> Result<(), BandtraderError> {
        if self.step == 0 {
            return Err(BandtraderError::invalid(name, "step must be positive"));
        }
        if self.min > self.max {
            return Err(BandtraderError::invalid(
                name,
                format!("min {} exceeds max {}", self.min, self.max),
            ));
        }
        check_candidate_count(name, ((self.max - self.min) / self.step) as f64 + 1.0)
    }

    pub fn values(&self) -> Vec<usize> {
        if self.validate("range").is_err() {
            return Vec::new();
        }
        (self.min..=self.max).step_by(self.step).collect()
    }
}

impl ParamRange<i64> {
    pub fn validate(&self, name: &str) -> Result<(), BandtraderError> {
        if self.step <= 0 {
            return Err(BandtraderError::invalid(
                name,
                format!("step must be positive, got {}", self.step),
            ));
        }
        if self.min > self.max {
            return Err(BandtraderError::invalid(
                name,
                format!("min {} exceeds max {}", self.min, self.max),
            ));
        }
        let span = self.max as f64 - self.min as f64;
        check_candidate_count(name, (span / self.step as f64).floor() + 1.0)
    }

    pub fn values(&self) -> Vec<i64> {
        if self.validate("range").is_err() {
            return Vec::new();
        }
        let Ok(step) = usize::try_from(self.step) else {
            return Vec::new();
        };
        (self.min..=self.max).step_by(step).collect()
    }
}

impl ParamRange<f64> {
    pub fn validate(&self, name: &str) -> Result<(), BandtraderError> {
        if !self.min.is_finite() || !self.max.is_finite() || !self.step.is_finite() {
            return Err(BandtraderError::invalid(name, "range bounds must be finite"));
        }
        if self.step <= 0.0 {
            return Err(BandtraderError::invalid(
                name,
                format!("step must be positive, got {}", self.step),
            ));
        }
        if self.min > self.max {
            return Err(BandtraderError::invalid(
                name,
                format!("min {} exceeds max {}", self.min, self.max),
            ));
        }
        check_candidate_count(name, self.candidate_count())
    }

    fn candidate_count(&self) -> f64 {
        ((self.max - self.min) / self.step + FLOAT_STEP_TOLERANCE).floor() + 1.0
    }

    /// `min + i * step` for every `i` that stays within `max`. Values are
    /// computed from the index, never accumulated, so the grid is identical
    /// on every run.
    pub fn values(&self) -> Vec<f64> {
        if self.validate("range").is_err() {
            return Vec::new();
        }
        let count = self.candidate_count() as usize;
        (0..count).map(|i| self.min + i as f64 * self.step).collect()
    }
}

/// Why a tested combination was left out of the ranked results.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    BelowMinTrades { trades: usize, required: usize },
    BelowMinReturn { total_return: f64, required: f64 },
    AboveMaxDrawdown { max_drawdown: f64, allowed: f64 },
    /// The combination itself could not be evaluated.
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BelowMinTrades { trades, required } => {
                write!(f, "{trades} trades, need at least {required}")
            }
            SkipReason::BelowMinReturn {
                total_return,
                required,
            } => write!(f, "return {total_return:.4} below {required:.4}"),
            SkipReason::AboveMaxDrawdown {
                max_drawdown,
                allowed,
            } => write!(f, "drawdown {max_drawdown:.4} above {allowed:.4}"),
            SkipReason::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Narrower search ranges and result thresholds for one optimizer run.
/// Unset ranges fall back to the default grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptimizationFilters {
    pub period: Option<ParamRange<usize>>,
    pub std_dev: Option<ParamRange<f64>>,
    pub offset: Option<ParamRange<i64>>,
    pub leverage: Option<ParamRange<f64>>,
    pub min_trades: Option<usize>,
    pub min_total_return: Option<f64>,
    pub max_drawdown: Option<f64>,
}

impl OptimizationFilters {
    pub fn validate(&self) -> Result<(), BandtraderError> {
        if self.min_total_return.is_some_and(|r| !r.is_finite()) {
            return Err(BandtraderError::invalid(
                "min_total_return",
                "threshold must be finite",
            ));
        }
        if let Some(max_dd) = self.max_drawdown.filter(|dd| !dd.is_finite() || *dd < 0.0) {
            return Err(BandtraderError::invalid(
                "max_drawdown",
                format!("threshold must be a non-negative fraction, got {max_dd}"),
            ));
        }
        Ok(())
    }

    /// The first threshold `metrics` fails, if any.
    pub fn rejection(&self, metrics: &Metrics) -> Option<SkipReason> {
        if let Some(required) = self.min_trades.filter(|&r| metrics.total_trades < r) {
            return Some(SkipReason::BelowMinTrades {
                trades: metrics.total_trades,
                required,
            });
        }
        if let Some(required) = self.min_total_return.filter(|&r| metrics.total_return < r) {
            return Some(SkipReason::BelowMinReturn {
                total_return: metrics.total_return,
                required,
            });
        }
        if let Some(allowed) = self.max_drawdown.filter(|&a| metrics.max_drawdown > a) {
            return Some(SkipReason::AboveMaxDrawdown {
                max_drawdown: metrics.max_drawdown,
                allowed,
            });
        }
        None
    }
}

pub fn default_period_range() -> ParamRange<usize> {
    ParamRange::new(10, 50, 5)
}

pub fn default_std_dev_range() -> ParamRange<f64> {
    ParamRange::new(1.0, 3.0, 0.25)
}

pub fn default_offset_range() -> ParamRange<i64> {
    ParamRange::new(-5, 5, 1)
}

pub fn default_leverage_range(max_leverage: f64) -> ParamRange<f64> {
    ParamRange::new(1.0, max_leverage, 1.0)
}

/// One point in the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combination {
    pub index: usize,
    pub period: usize,
    pub std_dev: f64,
    pub offset: i64,
    pub leverage: f64,
}

impl Combination {
    /// The base config with this combination's parameters swapped in.
    pub fn apply(&self, base: &TradingConfig) -> TradingConfig {
        TradingConfig {
            period: self.period,
            std_dev: self.std_dev,
            offset: self.offset,
            leverage: self.leverage,
            ..base.clone()
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} period={} std_dev={} offset={} leverage={}",
            self.index, self.period, self.std_dev, self.offset, self.leverage
        )
    }
}

/// Combinations sharing one band series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandGroup {
    pub first_index: usize,
    pub period: usize,
    pub std_dev: f64,
    pub offset: i64,
}

impl BandGroup {
    pub fn combinations<'a>(&self, leverages: &'a [f64]) -> impl Iterator<Item = Combination> + 'a {
        let group = *self;
        leverages
            .iter()
            .enumerate()
            .map(move |(j, &leverage)| Combination {
                index: group.first_index + j,
                period: group.period,
                std_dev: group.std_dev,
                offset: group.offset,
                leverage,
            })
    }
}

/// Candidate values per parameter, fixed before the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub periods: Vec<usize>,
    pub std_devs: Vec<f64>,
    pub offsets: Vec<i64>,
    pub leverages: Vec<f64>,
}

impl ParameterGrid {
    /// Build the grid from `filters`, falling back to the defaults for any
    /// range not supplied. Malformed ranges are rejected, never clamped.
    pub fn from_filters(
        base: &TradingConfig,
        filters: Option<&OptimizationFilters>,
    ) -> Result<Self, BandtraderError> {
        let period = filters
            .and_then(|f| f.period)
            .unwrap_or_else(default_period_range);
        let std_dev = filters
            .and_then(|f| f.std_dev)
            .unwrap_or_else(default_std_dev_range);
        let offset = filters
            .and_then(|f| f.offset)
            .unwrap_or_else(default_offset_range);
        let leverage = filters
            .and_then(|f| f.leverage)
            .unwrap_or_else(|| default_leverage_range(base.max_leverage));

        period.validate("period")?;
        std_dev.validate("std_dev")?;
        offset.validate("offset")?;
        leverage.validate("leverage")?;

        if period.min == 0 {
            return Err(BandtraderError::invalid("period", "periods must be positive"));
        }
        if std_dev.min <= 0.0 {
            return Err(BandtraderError::invalid(
                "std_dev",
                format!("multipliers must be positive, got min {}", std_dev.min),
            ));
        }
        if leverage.min < 1.0 || leverage.max > base.max_leverage {
            return Err(BandtraderError::invalid(
                "leverage",
                format!(
                    "range [{}, {}] must lie within [1, {}]",
                    leverage.min, leverage.max, base.max_leverage
                ),
            ));
        }

        let grid = ParameterGrid {
            periods: period.values(),
            std_devs: std_dev.values(),
            offsets: offset.values(),
            leverages: leverage.values(),
        };
        match grid.checked_total() {
            Some(total) if total <= MAX_COMBINATIONS => Ok(grid),
            total => Err(BandtraderError::invalid(
                "grid",
                format!(
                    "{} combinations exceed the limit of {MAX_COMBINATIONS}",
                    total.map_or_else(|| "more than usize::MAX".to_string(), |t| t.to_string())
                ),
            )),
        }
    }

    fn checked_total(&self) -> Option<usize> {
        self.periods
            .len()
            .checked_mul(self.std_devs.len())?
            .checked_mul(self.offsets.len())?
            .checked_mul(self.leverages.len())
    }

    /// Grids built by [`ParameterGrid::from_filters`] never saturate.
    pub fn total_combinations(&self) -> usize {
        self.checked_total().unwrap_or(usize::MAX)
    }

    /// Every (period, std_dev, offset) group in grid order.
    pub fn band_groups(&self) -> Vec<BandGroup> {
        let per_group = self.leverages.len();
        let mut groups =
            Vec::with_capacity(self.periods.len() * self.std_devs.len() * self.offsets.len());
        for &period in &self.periods {
            for &std_dev in &self.std_devs {
                for &offset in &self.offsets {
                    groups.push(BandGroup {
                        first_index: groups.len() * per_group,
                        period,
                        std_dev,
                        offset,
                    });
                }
            }
        }
        groups
    }

    pub fn combinations(&self) -> impl Iterator<Item = Combination> + '_ {
        self.band_groups()
            .into_iter()
            .flat_map(move |group| group.combinations(&self.leverages).collect::<Vec<_>>())
    }
}
