//! Backtest engine: replays a price series against precomputed bands.
//!
//! Signal rules (classic breakout):
//! - Long entry: close crosses above the upper band
//!   (`close[i-1] <= upper[i-1]` and `close[i] > upper[i]`)
//! - Short entry: close crosses below the lower band
//! - Long exit: close crosses below the middle band, or a short entry fires
//! - Short exit: close crosses above the middle band, or a long entry fires
//!
//! Both bars of a crossing need a defined band. Entry breakouts are ignored
//! when either band has zero width. After an exit, a new position may open
//! on the same bar. A position still open on the last bar is force-closed
//! at that bar's close.

use tracing::debug;

use super::account::{Account, EquityPoint};
use super::candle::Candle;
use super::error::BandtraderError;
use super::execution::{EntryResult, close_position, open_position};
use super::indicator::{BandPoint, BandSeries};
use super::metrics::Metrics;
use super::position::{Direction, ExitReason, Trade};
use super::trading_config::TradingConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub metrics: Metrics,
}

impl BacktestResult {
    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

/// Crossings observed between two consecutive bars.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Crossings {
    long_entry: bool,
    short_entry: bool,
    below_middle: bool,
    above_middle: bool,
}

fn detect_crossings(prev_close: f64, close: f64, prev: &BandPoint, curr: &BandPoint) -> Crossings {
    let has_width = prev.has_width() && curr.has_width();
    Crossings {
        long_entry: has_width && prev_close <= prev.upper && close > curr.upper,
        short_entry: has_width && prev_close >= prev.lower && close < curr.lower,
        below_middle: prev_close >= prev.middle && close < curr.middle,
        above_middle: prev_close <= prev.middle && close > curr.middle,
    }
}

fn exit_reason(direction: Direction, crossings: &Crossings) -> Option<ExitReason> {
    match direction {
        Direction::Long if crossings.short_entry => Some(ExitReason::Reversal),
        Direction::Long if crossings.below_middle => Some(ExitReason::MiddleCross),
        Direction::Short if crossings.long_entry => Some(ExitReason::Reversal),
        Direction::Short if crossings.above_middle => Some(ExitReason::MiddleCross),
        _ => None,
    }
}

/// Run one deterministic pass over `candles` with index-aligned `bands`.
///
/// A pure function of its inputs: no state survives between calls.
pub fn run_backtest(
    candles: &[Candle],
    bands: &BandSeries,
    config: &TradingConfig,
) -> Result<BacktestResult, BandtraderError> {
    config.validate()?;
    if bands.len() != candles.len() {
        return Err(BandtraderError::MisalignedSeries {
            candles: candles.len(),
            bands: bands.len(),
        });
    }

    let fees = &config.fees;
    let last_index = candles.len().saturating_sub(1);
    let mut account = Account::new(config.initial_capital);

    for (i, candle) in candles.iter().enumerate() {
        let crossings = match (i.checked_sub(1), bands.get(i)) {
            (Some(prev_i), Some(curr)) => bands
                .get(prev_i)
                .map(|prev| detect_crossings(candles[prev_i].close, candle.close, prev, curr)),
            _ => None,
        };

        if let Some(crossings) = crossings {
            let reason = account
                .position
                .as_ref()
                .and_then(|pos| exit_reason(pos.direction, &crossings));
            if let Some(reason) = reason {
                close_position(&mut account, candle, i, reason, fees);
            }

            if account.is_flat() {
                let direction = if crossings.long_entry && config.enable_long_positions {
                    Some(Direction::Long)
                } else if crossings.short_entry && config.enable_short_positions {
                    Some(Direction::Short)
                } else {
                    None
                };
                if let Some(direction) = direction {
                    match open_position(&mut account, direction, candle, i, config.leverage, fees) {
                        EntryResult::Entered { .. } => {}
                        rejected => {
                            debug!(index = i, %direction, result = ?rejected, "Entry rejected")
                        }
                    }
                }
            }
        }

        if i == last_index {
            close_position(&mut account, candle, i, ExitReason::EndOfData, fees);
        }

        let equity = account.total_equity(candle.close);
        if !equity.is_finite() {
            return Err(BandtraderError::ComputationFault {
                index: i,
                reason: format!("equity became {equity}"),
            });
        }
        account.record_equity(candle.timestamp, equity);
    }

    let final_capital = account.capital;
    let metrics = Metrics::compute(
        &account.equity_curve,
        &account.trades,
        config.initial_capital,
        final_capital,
        config.risk_free_rate,
        config.periods_per_year,
    );

    Ok(BacktestResult {
        trades: account.trades,
        equity_curve: account.equity_curve,
        initial_capital: config.initial_capital,
        final_capital,
        metrics,
    })
}
