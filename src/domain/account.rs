//! Account state and equity tracking for one backtest run.

use chrono::{DateTime, Utc};

use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Realised capital, the (at most one) open position, the trade ledger and
/// the equity curve. Owned by a single backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub capital: f64,
    pub initial_capital: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Account {
    pub fn new(initial_capital: f64) -> Self {
        Account {
            capital: initial_capital,
            initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn open(&mut self, position: Position) {
        self.position = Some(position);
    }

    pub fn take_position(&mut self) -> Option<Position> {
        self.position.take()
    }

    /// Append a closed trade and compound its pnl into capital.
    pub fn record_trade(&mut self, trade: Trade) {
        self.capital += trade.pnl;
        self.trades.push(trade);
    }

    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, equity: f64) {
        self.equity_curve.push(EquityPoint { timestamp, equity });
    }

    /// Mark-to-market equity: capital plus unrealised pnl net of the entry
    /// commission already owed.
    pub fn total_equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => self.capital + pos.unrealized_pnl(price) - pos.entry_commission,
            None => self.capital,
        }
    }
}
