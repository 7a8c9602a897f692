//! Trade execution and fill simulation.
//!
//! Fills happen at the bar close, adjusted by slippage against the trader.
//! Commission is charged on both legs and netted out of the trade's pnl when
//! the position closes.

use super::account::Account;
use super::candle::Candle;
use super::position::{Direction, ExitReason, Position, Trade};
use super::trading_config::FeeSchedule;

/// Calculate commission: flat_fee + (notional * pct / 100).
pub fn calculate_commission(notional: f64, fees: &FeeSchedule) -> f64 {
    fees.commission_per_trade + (notional * fees.commission_pct / 100.0)
}

/// Slippage on entry: longs buy higher, shorts sell lower.
pub fn apply_entry_slippage(market_price: f64, direction: Direction, slippage_pct: f64) -> f64 {
    market_price * (1.0 + direction.sign() * slippage_pct / 100.0)
}

/// Slippage on exit: longs sell lower, shorts buy back higher.
pub fn apply_exit_slippage(market_price: f64, direction: Direction, slippage_pct: f64) -> f64 {
    market_price * (1.0 - direction.sign() * slippage_pct / 100.0)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        size: f64,
        execution_price: f64,
        commission: f64,
    },
    InsufficientCapital,
    InvalidPrice,
}

/// Open a position sized as `capital * leverage / execution_price`.
///
/// Rejected when the account has no capital left or the fill price is not a
/// positive finite number. The caller guarantees the account is flat.
pub fn open_position(
    account: &mut Account,
    direction: Direction,
    candle: &Candle,
    index: usize,
    leverage: f64,
    fees: &FeeSchedule,
) -> EntryResult {
    if account.capital.is_nan() || account.capital <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let execution_price = apply_entry_slippage(candle.close, direction, fees.slippage_pct);
    if !execution_price.is_finite() || execution_price <= 0.0 {
        return EntryResult::InvalidPrice;
    }

    let size = account.capital * leverage / execution_price;
    let commission = calculate_commission(size * execution_price, fees);

    account.open(Position {
        direction,
        entry_price: execution_price,
        entry_time: candle.timestamp,
        entry_index: index,
        size,
        leverage,
        margin: account.capital,
        entry_commission: commission,
    });

    EntryResult::Entered {
        size,
        execution_price,
        commission,
    }
}

/// Close the open position at `candle`'s close, record the trade and
/// compound its pnl into capital. Returns `None` when the account is flat.
pub fn close_position(
    account: &mut Account,
    candle: &Candle,
    index: usize,
    reason: ExitReason,
    fees: &FeeSchedule,
) -> Option<Trade> {
    let position = account.take_position()?;

    let exit_price = apply_exit_slippage(candle.close, position.direction, fees.slippage_pct);
    let exit_commission = calculate_commission(position.notional(exit_price), fees);

    let price_pnl = position.unrealized_pnl(exit_price);
    let pnl = price_pnl - position.entry_commission - exit_commission;

    let trade = Trade {
        entry_time: position.entry_time,
        exit_time: candle.timestamp,
        direction: position.direction,
        entry_price: position.entry_price,
        exit_price,
        size: position.size,
        leverage: position.leverage,
        pnl,
        pnl_percent: pnl / position.margin * 100.0,
        bars_held: index.saturating_sub(position.entry_index),
        exit_reason: reason,
    };

    account.record_trade(trade.clone());
    Some(trade)
}
