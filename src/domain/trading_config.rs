//! Trading configuration for a single backtest run.

use crate::domain::error::BandtraderError;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

/// Fee and slippage model applied on both legs of every trade.
///
/// commission = commission_per_trade + notional * commission_pct / 100
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl FeeSchedule {
    pub fn is_zero(&self) -> bool {
        self.commission_per_trade == 0.0 && self.commission_pct == 0.0 && self.slippage_pct == 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub period: usize,
    pub std_dev: f64,
    pub offset: i64,
    pub leverage: f64,
    pub max_leverage: f64,
    pub initial_capital: f64,
    pub enable_long_positions: bool,
    pub enable_short_positions: bool,
    pub fees: FeeSchedule,
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            period: 20,
            std_dev: 2.0,
            offset: 0,
            leverage: 1.0,
            max_leverage: 10.0,
            initial_capital: 10_000.0,
            enable_long_positions: true,
            enable_short_positions: true,
            fees: FeeSchedule::default(),
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

impl TradingConfig {
    /// Reject out-of-range values before any computation. Nothing is clamped.
    pub fn validate(&self) -> Result<(), BandtraderError> {
        if self.period == 0 {
            return Err(BandtraderError::invalid("period", "period must be positive"));
        }
        if !self.std_dev.is_finite() || self.std_dev <= 0.0 {
            return Err(BandtraderError::invalid(
                "std_dev",
                format!("std_dev must be positive, got {}", self.std_dev),
            ));
        }
        if !self.max_leverage.is_finite() || self.max_leverage < 1.0 {
            return Err(BandtraderError::invalid(
                "max_leverage",
                format!("max_leverage must be at least 1, got {}", self.max_leverage),
            ));
        }
        if !self.leverage.is_finite() || self.leverage < 1.0 || self.leverage > self.max_leverage {
            return Err(BandtraderError::invalid(
                "leverage",
                format!(
                    "leverage must be within [1, {}], got {}",
                    self.max_leverage, self.leverage
                ),
            ));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(BandtraderError::invalid(
                "initial_capital",
                "initial_capital must be positive",
            ));
        }
        for (field, value) in [
            ("commission_per_trade", self.fees.commission_per_trade),
            ("commission_pct", self.fees.commission_pct),
            ("slippage_pct", self.fees.slippage_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BandtraderError::invalid(field, format!("{field} must be non-negative")));
            }
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(BandtraderError::invalid(
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(BandtraderError::invalid(
                "periods_per_year",
                "periods_per_year must be positive",
            ));
        }
        Ok(())
    }
}
