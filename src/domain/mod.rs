//! Core domain types and logic.

pub mod candle;
pub mod indicator;
pub mod trading_config;
pub mod position;
pub mod account;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod grid;
pub mod scoring;
pub mod optimizer;
pub mod config_validation;
pub mod error;
