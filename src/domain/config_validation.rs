//! Configuration loading and validation.
//!
//! Reads the `[backtest]` and `[optimizer]` sections through a
//! [`ConfigPort`], rejecting unparseable values instead of silently falling
//! back to defaults, then checks ranges with the same rules the domain
//! applies on entry.

use crate::domain::error::BandtraderError;
use crate::domain::grid::{
    OptimizationFilters, ParamRange, ParameterGrid, default_leverage_range, default_offset_range,
    default_period_range, default_std_dev_range,
};
use crate::domain::optimizer::{DEFAULT_BATCH_SIZE, OptimizerSettings};
use crate::domain::scoring::ScoreMetric;
use crate::domain::trading_config::{FeeSchedule, TradingConfig};
use crate::ports::config_port::ConfigPort;

pub const BACKTEST_SECTION: &str = "backtest";
pub const OPTIMIZER_SECTION: &str = "optimizer";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    let trading = load_trading_config(config)?;
    trading
        .validate()
        .map_err(|e| in_section(BACKTEST_SECTION, e))
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), BandtraderError> {
    let base = load_trading_config(config)?;
    load_optimizer_settings(config)?;
    let filters = load_filters(config)?;
    filters
        .validate()
        .and_then(|_| ParameterGrid::from_filters(&base, Some(&filters)))
        .map(|_| ())
        .map_err(|e| in_section(OPTIMIZER_SECTION, e))
}

/// Build a [`TradingConfig`] from `[backtest]`, defaulting absent keys.
pub fn load_trading_config(config: &dyn ConfigPort) -> Result<TradingConfig, BandtraderError> {
    let defaults = TradingConfig::default();
    let s = BACKTEST_SECTION;
    Ok(TradingConfig {
        period: read_usize(config, s, "period", defaults.period)?,
        std_dev: read_double(config, s, "std_dev", defaults.std_dev)?,
        offset: read_int(config, s, "offset", defaults.offset)?,
        leverage: read_double(config, s, "leverage", defaults.leverage)?,
        max_leverage: read_double(config, s, "max_leverage", defaults.max_leverage)?,
        initial_capital: read_double(config, s, "initial_capital", defaults.initial_capital)?,
        enable_long_positions: read_bool(config, s, "enable_long", true)?,
        enable_short_positions: read_bool(config, s, "enable_short", true)?,
        fees: FeeSchedule {
            commission_per_trade: read_double(config, s, "commission_per_trade", 0.0)?,
            commission_pct: read_double(config, s, "commission_pct", 0.0)?,
            slippage_pct: read_double(config, s, "slippage_pct", 0.0)?,
        },
        risk_free_rate: read_double(config, s, "risk_free_rate", defaults.risk_free_rate)?,
        periods_per_year: read_double(config, s, "periods_per_year", defaults.periods_per_year)?,
    })
}

/// Ranges and thresholds from `[optimizer]`. A range whose three keys are
/// all absent is left unset so the default grid applies; a partially given
/// range takes the missing bounds from the default.
pub fn load_filters(config: &dyn ConfigPort) -> Result<OptimizationFilters, BandtraderError> {
    let max_leverage = read_double(
        config,
        BACKTEST_SECTION,
        "max_leverage",
        TradingConfig::default().max_leverage,
    )?;
    let s = OPTIMIZER_SECTION;

    let min_trades = if is_set(config, s, "min_trades") {
        Some(read_usize(config, s, "min_trades", 0)?)
    } else {
        None
    };
    let min_total_return = if is_set(config, s, "min_total_return") {
        Some(read_double(config, s, "min_total_return", 0.0)?)
    } else {
        None
    };
    let max_drawdown = if is_set(config, s, "max_drawdown") {
        Some(read_double(config, s, "max_drawdown", 1.0)?)
    } else {
        None
    };

    Ok(OptimizationFilters {
        period: read_range(config, "period", default_period_range(), read_usize)?,
        std_dev: read_range(config, "std_dev", default_std_dev_range(), read_double)?,
        offset: read_range(config, "offset", default_offset_range(), read_int)?,
        leverage: read_range(
            config,
            "leverage",
            default_leverage_range(max_leverage),
            read_double,
        )?,
        min_trades,
        min_total_return,
        max_drawdown,
    })
}

pub fn load_optimizer_settings(
    config: &dyn ConfigPort,
) -> Result<OptimizerSettings, BandtraderError> {
    let s = OPTIMIZER_SECTION;
    let score = match config.get_string(s, "score") {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<ScoreMetric>()
            .map_err(|e| in_section(s, e))?,
        _ => ScoreMetric::default(),
    };

    let batch_size = read_usize(config, s, "batch_size", DEFAULT_BATCH_SIZE)?;
    if batch_size == 0 {
        return Err(invalid_value(s, "batch_size", "batch_size must be at least 1"));
    }

    let workers = match read_usize(config, s, "workers", 0)? {
        0 => None,
        n => Some(n),
    };

    Ok(OptimizerSettings {
        score,
        batch_size,
        workers,
    })
}

fn read_range<T: Copy>(
    config: &dyn ConfigPort,
    name: &str,
    default: ParamRange<T>,
    read: fn(&dyn ConfigPort, &str, &str, T) -> Result<T, BandtraderError>,
) -> Result<Option<ParamRange<T>>, BandtraderError> {
    let min_key = format!("{name}_min");
    let max_key = format!("{name}_max");
    let step_key = format!("{name}_step");
    let s = OPTIMIZER_SECTION;

    if ![&min_key, &max_key, &step_key]
        .iter()
        .any(|k| is_set(config, s, k))
    {
        return Ok(None);
    }

    Ok(Some(ParamRange {
        min: read(config, s, &min_key, default.min)?,
        max: read(config, s, &max_key, default.max)?,
        step: read(config, s, &step_key, default.step)?,
    }))
}

fn is_set(config: &dyn ConfigPort, section: &str, key: &str) -> bool {
    config
        .get_string(section, key)
        .is_some_and(|v| !v.trim().is_empty())
}

fn raw_value(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, BandtraderError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid_value(section, key, format!("expected a number, got '{raw}'"))),
    }
}

pub fn read_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, BandtraderError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| invalid_value(section, key, format!("expected an integer, got '{raw}'"))),
    }
}

pub fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, BandtraderError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            invalid_value(
                section,
                key,
                format!("expected a non-negative integer, got '{raw}'"),
            )
        }),
    }
}

pub fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, BandtraderError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(invalid_value(
                section,
                key,
                format!("expected true or false, got '{raw}'"),
            )),
        },
    }
}

fn invalid_value(section: &str, key: &str, reason: impl Into<String>) -> BandtraderError {
    BandtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Re-home a domain validation error onto the INI section it came from.
fn in_section(section: &str, err: BandtraderError) -> BandtraderError {
    match err {
        BandtraderError::InvalidConfiguration { field, reason } => BandtraderError::ConfigInvalid {
            section: section.to_string(),
            key: field,
            reason,
        },
        other => other,
    }
}
