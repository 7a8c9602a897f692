//! CLI integration tests for config handling and command orchestration.
//!
//! Tests cover:
//! - Config parsing with command-line overrides (build_trading_config)
//! - Backtest and optimize pipelines with MockDataPort
//! - Exit codes of full `run` invocations against INI and CSV files on disk

mod common;

use bandtrader::adapters::file_config_adapter::FileConfigAdapter;
use bandtrader::cli::{self, BacktestOverrides, Cli};
use bandtrader::domain::error::BandtraderError;
use bandtrader::domain::optimizer::{CancellationToken, RunStatus};
use bandtrader::domain::scoring::ScoreMetric;
use bandtrader::ports::progress_port::NoProgress;
use clap::Parser;
use common::*;
use std::process::ExitCode;

const VALID_INI: &str = r#"
[backtest]
initial_capital = 10000.0
period = 10
std_dev = 2.0
offset = 0
leverage = 1
max_leverage = 5
enable_long = true
enable_short = true
commission_per_trade = 0.0
commission_pct = 0.0
slippage_pct = 0.0

[optimizer]
period_min = 10
period_max = 20
period_step = 5
std_dev_min = 1.5
std_dev_max = 2.5
std_dev_step = 0.5
offset_min = 0
offset_max = 0
offset_step = 1
leverage_min = 1
leverage_max = 1
leverage_step = 1
score = sharpe
batch_size = 4
"#;

fn code_of(code: ExitCode) -> String {
    format!("{:?}", code)
}

fn expect_code(code: ExitCode, expected: u8) {
    assert_eq!(code_of(code), code_of(ExitCode::from(expected)));
}

mod config_loading {
    use super::*;

    #[test]
    fn build_trading_config_reads_backtest_section() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_trading_config(&adapter, &BacktestOverrides::default()).unwrap();
        assert_eq!(config.period, 10);
        assert_eq!(config.std_dev, 2.0);
        assert_eq!(config.max_leverage, 5.0);
        assert_eq!(config.initial_capital, 10_000.0);
        assert!(config.fees.is_zero());
    }

    #[test]
    fn overrides_replace_config_values() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let overrides = BacktestOverrides {
            period: Some(30),
            std_dev: Some(1.5),
            offset: Some(-2),
            leverage: Some(3.0),
        };
        let config = cli::build_trading_config(&adapter, &overrides).unwrap();
        assert_eq!(config.period, 30);
        assert_eq!(config.std_dev, 1.5);
        assert_eq!(config.offset, -2);
        assert_eq!(config.leverage, 3.0);
    }

    #[test]
    fn override_above_max_leverage_is_rejected() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let overrides = BacktestOverrides {
            leverage: Some(8.0),
            ..Default::default()
        };
        let err = cli::build_trading_config(&adapter, &overrides).unwrap_err();
        assert!(matches!(err, BandtraderError::InvalidConfiguration { .. }));
    }

    #[test]
    fn unparseable_value_is_config_invalid() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nperiod = twenty\n").unwrap();
        let err = cli::build_trading_config(&adapter, &BacktestOverrides::default()).unwrap_err();
        assert!(matches!(err, BandtraderError::ConfigInvalid { .. }));
    }
}

mod pipelines {
    use super::*;

    #[test]
    fn backtest_pipeline_runs_breakout() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_trading_config(&adapter, &BacktestOverrides::default()).unwrap();
        let port = MockDataPort::new(breakout_series());

        let result = cli::run_backtest_pipeline(&port, &config).unwrap();
        assert_eq!(result.trade_count(), 1);
        assert!(result.final_capital < config.initial_capital);
    }

    #[test]
    fn backtest_pipeline_propagates_data_errors() {
        let port = MockDataPort::failing("disk on fire");
        let err = cli::run_backtest_pipeline(&port, &sample_config()).unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn backtest_pipeline_with_too_few_bars_has_no_trades() {
        let port = MockDataPort::new(wave_series(5));
        let result = cli::run_backtest_pipeline(&port, &sample_config()).unwrap();
        assert_eq!(result.trade_count(), 0);
        assert_eq!(result.final_capital, 10_000.0);
    }

    #[test]
    fn optimize_pipeline_uses_optimizer_section() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let port = MockDataPort::new(wave_series(200));

        let report =
            cli::run_optimize_pipeline(&port, &adapter, &NoProgress, &CancellationToken::new())
                .unwrap();
        assert_eq!(report.total_combinations, 9);
        assert_eq!(report.combinations_tested, 9);
        assert_eq!(report.status, RunStatus::Completed);

        let expected_best = report
            .results
            .iter()
            .map(|r| ScoreMetric::SharpeRatio.score(&r.metrics))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(report.best().unwrap().score, expected_best);
    }

    #[test]
    fn optimize_pipeline_rejects_inverted_range() {
        let ini = VALID_INI.replace("period_max = 20", "period_max = 5");
        let adapter = FileConfigAdapter::from_string(&ini).unwrap();
        let port = MockDataPort::new(wave_series(50));
        let err =
            cli::run_optimize_pipeline(&port, &adapter, &NoProgress, &CancellationToken::new())
                .unwrap_err();
        assert!(matches!(err, BandtraderError::InvalidConfiguration { .. }));
    }

    #[test]
    fn pre_cancelled_optimize_returns_empty_partial_report() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let port = MockDataPort::new(wave_series(100));
        let token = CancellationToken::new();
        token.cancel();

        let report = cli::run_optimize_pipeline(&port, &adapter, &NoProgress, &token).unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert_eq!(report.combinations_tested, 0);
        assert!(report.results.is_empty());
    }
}

mod commands {
    use super::*;

    fn run_args(args: &[&str]) -> ExitCode {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        cli::run(cli)
    }

    #[test]
    fn backtest_command_succeeds() {
        let ini = write_temp_file(VALID_INI);
        let csv = write_temp_file(&candles_to_csv(&wave_series(120)));
        let code = run_args(&[
            "bandtrader",
            "backtest",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            csv.path().to_str().unwrap(),
            "--offset",
            "-1",
            "--trades",
        ]);
        expect_code(code, 0);
    }

    #[test]
    fn optimize_command_succeeds() {
        let ini = write_temp_file(VALID_INI);
        let csv = write_temp_file(&candles_to_csv(&wave_series(120)));
        let code = run_args(&[
            "bandtrader",
            "optimize",
            "--config",
            ini.path().to_str().unwrap(),
            "--data",
            csv.path().to_str().unwrap(),
            "--top",
            "3",
        ]);
        expect_code(code, 0);
    }

    #[test]
    fn validate_command_succeeds_for_valid_config() {
        let ini = write_temp_file(VALID_INI);
        let code = run_args(&["bandtrader", "validate", "-c", ini.path().to_str().unwrap()]);
        expect_code(code, 0);
    }

    #[test]
    fn validate_command_flags_bad_config() {
        let ini = write_temp_file("[backtest]\nperiod = 0\n");
        let code = run_args(&["bandtrader", "validate", "-c", ini.path().to_str().unwrap()]);
        expect_code(code, 2);
    }

    #[test]
    fn validate_command_flags_tiny_step() {
        let ini = write_temp_file(&VALID_INI.replace("std_dev_step = 0.5", "std_dev_step = 1e-300"));
        let code = run_args(&["bandtrader", "validate", "-c", ini.path().to_str().unwrap()]);
        expect_code(code, 2);
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let code = run_args(&["bandtrader", "validate", "-c", "/nonexistent/bandtrader.ini"]);
        expect_code(code, 2);
    }

    #[test]
    fn missing_data_file_is_data_error() {
        let ini = write_temp_file(VALID_INI);
        let code = run_args(&[
            "bandtrader",
            "backtest",
            "-c",
            ini.path().to_str().unwrap(),
            "-d",
            "/nonexistent/prices.csv",
        ]);
        expect_code(code, 3);
    }

    #[test]
    fn unknown_subcommand_fails_to_parse() {
        assert!(Cli::try_parse_from(["bandtrader", "trade"]).is_err());
    }
}
