//! Open position and closed trade records.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Price crossed back through the middle band.
    MiddleCross,
    /// The opposite breakout fired while the position was open.
    Reversal,
    /// Force-closed at the last available bar.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::MiddleCross => write!(f, "middle-cross"),
            ExitReason::Reversal => write!(f, "reversal"),
            ExitReason::EndOfData => write!(f, "end-of-data"),
        }
    }
}

/// The single open position. A flat account holds no `Position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_index: usize,
    pub size: f64,
    pub leverage: f64,
    /// Account capital at the moment of entry.
    pub margin: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn notional(&self, price: f64) -> f64 {
        self.size * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.direction.sign() * self.size * (price - self.entry_price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub leverage: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub bars_held: usize,
    pub exit_reason: ExitReason,
}
