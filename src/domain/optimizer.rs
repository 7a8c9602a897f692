//! Brute-force grid optimizer.
//!
//! Every combination in the [`ParameterGrid`] is backtested against the same
//! read-only candle series. Work is spread over a rayon pool one batch at a
//! time; the calling thread is the only writer of the result collection and
//! is where progress is reported and cancellation observed. Bands are
//! computed once per (period, std_dev, offset) group and shared by all of
//! that group's leverage candidates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use super::backtest::run_backtest;
use super::candle::Candle;
use super::error::BandtraderError;
use super::grid::{BandGroup, Combination, OptimizationFilters, ParameterGrid, SkipReason};
use super::indicator::BandSeries;
use super::indicator::bollinger::compute_bands;
use super::metrics::Metrics;
use super::scoring::{ScoreMetric, compare_results, rank_results};
use super::trading_config::TradingConfig;
use crate::ports::progress_port::ProgressPort;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OptimizerSettings {
    pub score: ScoreMetric,
    /// Approximate number of combinations evaluated between progress events.
    pub batch_size: usize,
    /// Worker threads; `None` uses one per CPU.
    pub workers: Option<usize>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            score: ScoreMetric::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: None,
        }
    }
}

/// A tested combination that passed every filter.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub index: usize,
    pub period: usize,
    pub std_dev: f64,
    pub offset: i64,
    pub leverage: f64,
    pub score: f64,
    pub metrics: Metrics,
    pub final_capital: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCombination {
    pub combination: Combination,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationProgress {
    pub combinations_tested: usize,
    pub total_combinations: usize,
    pub best_result: Option<OptimizationResult>,
    pub elapsed: Duration,
}

impl OptimizationProgress {
    pub fn fraction_complete(&self) -> f64 {
        if self.total_combinations == 0 {
            1.0
        } else {
            self.combinations_tested as f64 / self.total_combinations as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    /// Ranked best first.
    pub results: Vec<OptimizationResult>,
    /// In combination order.
    pub skipped: Vec<SkippedCombination>,
    pub status: RunStatus,
    pub combinations_tested: usize,
    pub total_combinations: usize,
    pub elapsed: Duration,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&OptimizationResult> {
        self.results.first()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }
}

enum Outcome {
    Kept(OptimizationResult),
    Skipped(SkippedCombination),
}

pub struct StrategyOptimizer<'a> {
    candles: &'a [Candle],
    base: TradingConfig,
    settings: OptimizerSettings,
}

impl<'a> StrategyOptimizer<'a> {
    pub fn new(candles: &'a [Candle], base: TradingConfig) -> Self {
        StrategyOptimizer {
            candles,
            base,
            settings: OptimizerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OptimizerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }

    /// Size of the grid `filters` would produce, without running anything.
    pub fn total_combinations(
        &self,
        filters: Option<&OptimizationFilters>,
    ) -> Result<usize, BandtraderError> {
        Ok(ParameterGrid::from_filters(&self.base, filters)?.total_combinations())
    }

    /// Backtest every combination of the grid and rank the survivors.
    ///
    /// Configuration faults (invalid base config, malformed ranges or
    /// thresholds) abort before any work starts. A combination that fails on
    /// its own is recorded as skipped and the run carries on. When `cancel`
    /// fires, the partial results collected so far are returned with
    /// [`RunStatus::Cancelled`].
    pub fn optimize_all_combinations(
        &self,
        filters: Option<&OptimizationFilters>,
        progress: &dyn ProgressPort,
        cancel: &CancellationToken,
    ) -> Result<OptimizationReport, BandtraderError> {
        self.base.validate()?;
        if self.settings.batch_size == 0 {
            return Err(BandtraderError::invalid(
                "batch_size",
                "batch_size must be positive",
            ));
        }
        if let Some(f) = filters {
            f.validate()?;
        }
        let grid = ParameterGrid::from_filters(&self.base, filters)?;
        let total = grid.total_combinations();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers.unwrap_or(0))
            .build()
            .map_err(|e| BandtraderError::WorkerPool {
                reason: e.to_string(),
            })?;

        info!(
            total_combinations = total,
            candles = self.candles.len(),
            workers = pool.current_num_threads(),
            score = %self.settings.score,
            "Starting grid search"
        );

        let start = Instant::now();
        let mut results: Vec<OptimizationResult> = Vec::new();
        let mut skipped: Vec<SkippedCombination> = Vec::new();
        let mut best: Option<OptimizationResult> = None;
        let mut tested = 0usize;

        progress.report(&OptimizationProgress {
            combinations_tested: 0,
            total_combinations: total,
            best_result: None,
            elapsed: start.elapsed(),
        });

        let groups = grid.band_groups();
        let groups_per_batch = groups_per_batch(
            self.settings.batch_size,
            grid.leverages.len(),
            pool.current_num_threads(),
        );

        for batch in groups.chunks(groups_per_batch) {
            if cancel.is_cancelled() {
                break;
            }

            let outcomes: Vec<Vec<Outcome>> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|group| {
                        if cancel.is_cancelled() {
                            Vec::new()
                        } else {
                            self.evaluate_group(group, &grid.leverages, filters)
                        }
                    })
                    .collect()
            });

            for outcome in outcomes.into_iter().flatten() {
                tested += 1;
                match outcome {
                    Outcome::Kept(result) => {
                        let improves = best
                            .as_ref()
                            .is_none_or(|b| compare_results(&result, b).is_lt());
                        if improves {
                            best = Some(result.clone());
                        }
                        results.push(result);
                    }
                    Outcome::Skipped(skip) => {
                        debug!(combination = %skip.combination, reason = %skip.reason, "Skipped");
                        skipped.push(skip);
                    }
                }
            }

            debug!(tested, total, "Batch complete");
            progress.report(&OptimizationProgress {
                combinations_tested: tested,
                total_combinations: total,
                best_result: best.clone(),
                elapsed: start.elapsed(),
            });
        }

        let status = if tested < total {
            info!(tested, total, "Grid search cancelled");
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        rank_results(&mut results);
        skipped.sort_by_key(|s| s.combination.index);
        let elapsed = start.elapsed();

        info!(
            tested,
            kept = results.len(),
            skipped = skipped.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Grid search finished"
        );

        Ok(OptimizationReport {
            results,
            skipped,
            status,
            combinations_tested: tested,
            total_combinations: total,
            elapsed,
        })
    }

    fn evaluate_group(
        &self,
        group: &BandGroup,
        leverages: &[f64],
        filters: Option<&OptimizationFilters>,
    ) -> Vec<Outcome> {
        let bands = compute_bands(self.candles, group.period, group.std_dev, group.offset);
        group
            .combinations(leverages)
            .map(|combination| match &bands {
                Ok(bands) => self.evaluate(combination, bands, filters),
                Err(e) => Outcome::Skipped(SkippedCombination {
                    combination,
                    reason: SkipReason::Failed(e.to_string()),
                }),
            })
            .collect()
    }

    fn evaluate(
        &self,
        combination: Combination,
        bands: &BandSeries,
        filters: Option<&OptimizationFilters>,
    ) -> Outcome {
        let config = combination.apply(&self.base);
        let result = match run_backtest(self.candles, bands, &config) {
            Ok(result) => result,
            Err(e) => {
                return Outcome::Skipped(SkippedCombination {
                    combination,
                    reason: SkipReason::Failed(e.to_string()),
                });
            }
        };

        if let Some(reason) = filters.and_then(|f| f.rejection(&result.metrics)) {
            return Outcome::Skipped(SkippedCombination {
                combination,
                reason,
            });
        }

        Outcome::Kept(OptimizationResult {
            index: combination.index,
            period: combination.period,
            std_dev: combination.std_dev,
            offset: combination.offset,
            leverage: combination.leverage,
            score: self.settings.score.score(&result.metrics),
            metrics: result.metrics,
            final_capital: result.final_capital,
        })
    }
}

/// Band groups per parallel batch. Never fewer than the pool has threads, so
/// a small `batch_size` cannot leave workers idle.
fn groups_per_batch(batch_size: usize, per_group: usize, threads: usize) -> usize {
    (batch_size / per_group.max(1)).max(threads).max(1)
}
