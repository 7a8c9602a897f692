//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_progress_adapter::LogProgressAdapter;
use crate::domain::backtest::{BacktestResult, run_backtest};
use crate::domain::config_validation::{
    load_filters, load_optimizer_settings, load_trading_config, validate_backtest_config,
    validate_optimizer_config,
};
use crate::domain::error::BandtraderError;
use crate::domain::indicator::bollinger::compute_bands;
use crate::domain::optimizer::{CancellationToken, OptimizationReport, StrategyOptimizer};
use crate::domain::position::Trade;
use crate::domain::trading_config::TradingConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::progress_port::ProgressPort;

#[derive(Parser, Debug)]
#[command(
    name = "bandtrader",
    about = "Bollinger band breakout backtester and grid optimizer"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one parameter set
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        period: Option<usize>,
        #[arg(long)]
        std_dev: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<i64>,
        #[arg(long)]
        leverage: Option<f64>,
        /// Print every closed trade
        #[arg(long)]
        trades: bool,
    },
    /// Search the parameter grid for the best-scoring configuration
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Number of ranked results to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Cancel the search after this many seconds and keep partial results
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line replacements for `[backtest]` values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BacktestOverrides {
    pub period: Option<usize>,
    pub std_dev: Option<f64>,
    pub offset: Option<i64>,
    pub leverage: Option<f64>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            period,
            std_dev,
            offset,
            leverage,
            trades,
        } => {
            let overrides = BacktestOverrides {
                period,
                std_dev,
                offset,
                leverage,
            };
            run_backtest_command(&config, &data, &overrides, trades)
        }
        Command::Optimize {
            config,
            data,
            top,
            timeout,
        } => run_optimize(&config, &data, top, timeout.map(Duration::from_secs)),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: BandtraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// `[backtest]` values with any command-line overrides applied, validated.
pub fn build_trading_config(
    adapter: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<TradingConfig, BandtraderError> {
    let mut config = load_trading_config(adapter)?;
    if let Some(period) = overrides.period {
        config.period = period;
    }
    if let Some(std_dev) = overrides.std_dev {
        config.std_dev = std_dev;
    }
    if let Some(offset) = overrides.offset {
        config.offset = offset;
    }
    if let Some(leverage) = overrides.leverage {
        config.leverage = leverage;
    }
    config.validate()?;
    Ok(config)
}

/// Fetch candles, compute bands and run one backtest.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &TradingConfig,
) -> Result<BacktestResult, BandtraderError> {
    let candles = data_port.fetch_candles()?;
    info!(candles = candles.len(), "Loaded price data");

    let bands = compute_bands(&candles, config.period, config.std_dev, config.offset)?;
    info!(
        bands = %bands,
        defined = bands.defined_count(),
        "Computed bands"
    );
    if bands.defined_count() == 0 {
        warn!(
            period = config.period,
            candles = candles.len(),
            "Not enough data for a single band value; no trades will be taken"
        );
    }

    let result = run_backtest(&candles, &bands, config)?;
    info!(
        trades = result.trade_count(),
        final_capital = result.final_capital,
        "Backtest complete"
    );
    Ok(result)
}

/// Fetch candles and run the grid search configured in `adapter`.
pub fn run_optimize_pipeline(
    data_port: &dyn DataPort,
    adapter: &dyn ConfigPort,
    progress: &dyn ProgressPort,
    cancel: &CancellationToken,
) -> Result<OptimizationReport, BandtraderError> {
    let base = load_trading_config(adapter)?;
    let filters = load_filters(adapter)?;
    let settings = load_optimizer_settings(adapter)?;

    let candles = data_port.fetch_candles()?;
    info!(candles = candles.len(), "Loaded price data");

    StrategyOptimizer::new(&candles, base)
        .with_settings(settings)
        .optimize_all_combinations(Some(&filters), progress, cancel)
}

fn run_backtest_command(
    config_path: &Path,
    data_path: &Path,
    overrides: &BacktestOverrides,
    show_trades: bool,
) -> ExitCode {
    info!(path = %config_path.display(), "Loading config");
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    let config = match build_trading_config(&adapter, overrides) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(data_path);
    let result = match run_backtest_pipeline(&data_port, &config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_config(&config);
    print_metrics(&result);
    if show_trades {
        print_trades(&result.trades);
    }
    ExitCode::SUCCESS
}

fn run_optimize(
    config_path: &Path,
    data_path: &Path,
    top: usize,
    timeout: Option<Duration>,
) -> ExitCode {
    info!(path = %config_path.display(), "Loading config");
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_optimizer_config(&adapter) {
        return fail(e);
    }

    let cancel = CancellationToken::new();
    let _watchdog = timeout.map(|t| spawn_watchdog(t, cancel.clone()));

    let data_port = CsvAdapter::new(data_path);
    let progress = LogProgressAdapter::default();
    let report = match run_optimize_pipeline(&data_port, &adapter, &progress, &cancel) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_report(&report, top);
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    info!(path = %config_path.display(), "Validating config");
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(e);
    }
    if let Err(e) = validate_optimizer_config(&adapter) {
        return fail(e);
    }

    let grid_size = load_trading_config(&adapter).and_then(|base| {
        let filters = load_filters(&adapter)?;
        StrategyOptimizer::new(&[], base).total_combinations(Some(&filters))
    });
    match grid_size {
        Ok(total) => {
            println!("Configuration is valid ({total} optimizer combinations).");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Cancels `token` once `timeout` elapses. Dropping the returned sender
/// stops the watchdog early.
fn spawn_watchdog(timeout: Duration, token: CancellationToken) -> Sender<()> {
    let (done_tx, done_rx) = mpsc::channel::<()>();
    thread::spawn(move || {
        if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
            warn!(timeout_secs = timeout.as_secs(), "Timeout reached, cancelling search");
            token.cancel();
        }
    });
    done_tx
}

fn print_config(config: &TradingConfig) {
    println!("\n=== Configuration ===");
    println!(
        "Bands:            period {}, std dev {}, offset {}",
        config.period, config.std_dev, config.offset
    );
    println!(
        "Leverage:         {}x (max {}x)",
        config.leverage, config.max_leverage
    );
    println!(
        "Directions:       long {}, short {}",
        on_off(config.enable_long_positions),
        on_off(config.enable_short_positions)
    );
    if !config.fees.is_zero() {
        println!(
            "Fees:             {} per trade + {}%, slippage {}%",
            config.fees.commission_per_trade, config.fees.commission_pct, config.fees.slippage_pct
        );
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn print_metrics(result: &BacktestResult) {
    let metrics = &result.metrics;
    println!("\n=== Results ===");
    println!("Initial Capital:  {:.2}", result.initial_capital);
    println!("Final Capital:    {:.2}", result.final_capital);
    println!("Net PnL:          {:.2}", result.total_pnl());
    println!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    println!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    println!("Total Trades:     {}", metrics.total_trades);
    println!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", metrics.profit_factor);
    println!("Avg Bars Held:    {:.1}", metrics.avg_bars_held);
}

fn print_trades(trades: &[Trade]) {
    if trades.is_empty() {
        return;
    }
    println!("\n=== Trades ===");
    for t in trades {
        let pnl_sign = if t.pnl >= 0.0 { "+" } else { "" };
        println!(
            "  {} {} @ {:.4} -> {} @ {:.4}  {}{:.2} ({}{:.2}%)  [{}]",
            t.direction,
            t.entry_time.format("%Y-%m-%d %H:%M"),
            t.entry_price,
            t.exit_time.format("%Y-%m-%d %H:%M"),
            t.exit_price,
            pnl_sign,
            t.pnl,
            pnl_sign,
            t.pnl_percent,
            t.exit_reason,
        );
    }
}

fn print_report(report: &OptimizationReport, top: usize) {
    println!("\n=== Optimization ===");
    println!(
        "Tested:           {} of {} combinations in {:.1}s",
        report.combinations_tested,
        report.total_combinations,
        report.elapsed.as_secs_f64()
    );
    println!(
        "Kept / Skipped:   {} / {}",
        report.results.len(),
        report.skipped.len()
    );
    if report.is_cancelled() {
        println!("Status:           cancelled (partial results)");
    }

    if report.results.is_empty() {
        println!("\nNo combination passed the filters.");
        return;
    }

    println!(
        "\n{:>4}  {:>6}  {:>7}  {:>6}  {:>8}  {:>10}  {:>9}  {:>6}  {:>7}",
        "rank", "period", "std_dev", "offset", "leverage", "score", "return%", "dd%", "trades"
    );
    for (rank, r) in report.results.iter().take(top).enumerate() {
        println!(
            "{:>4}  {:>6}  {:>7.2}  {:>6}  {:>8.1}  {:>10.4}  {:>9.2}  {:>6.1}  {:>7}",
            rank + 1,
            r.period,
            r.std_dev,
            r.offset,
            r.leverage,
            r.score,
            r.metrics.total_return * 100.0,
            r.metrics.max_drawdown * 100.0,
            r.metrics.total_trades,
        );
    }
}
