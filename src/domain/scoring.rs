//! Scoring and ranking of optimizer results.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::BandtraderError;
use super::metrics::Metrics;
use super::optimizer::OptimizationResult;

/// The single metric optimizer results are ranked by, higher is better.
#[derive(Debug, Clone, Copy, Default)]
pub enum ScoreMetric {
    #[default]
    TotalReturn,
    SharpeRatio,
    SortinoRatio,
    ProfitFactor,
    WinRate,
    /// Caller-supplied scoring function.
    Custom(fn(&Metrics) -> f64),
}

impl ScoreMetric {
    pub fn score(&self, metrics: &Metrics) -> f64 {
        match self {
            ScoreMetric::TotalReturn => metrics.total_return,
            ScoreMetric::SharpeRatio => metrics.sharpe_ratio,
            ScoreMetric::SortinoRatio => metrics.sortino_ratio,
            ScoreMetric::ProfitFactor => metrics.profit_factor,
            ScoreMetric::WinRate => metrics.win_rate,
            ScoreMetric::Custom(f) => f(metrics),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoreMetric::TotalReturn => "total_return",
            ScoreMetric::SharpeRatio => "sharpe",
            ScoreMetric::SortinoRatio => "sortino",
            ScoreMetric::ProfitFactor => "profit_factor",
            ScoreMetric::WinRate => "win_rate",
            ScoreMetric::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScoreMetric {
    type Err = BandtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "total_return" | "return" => Ok(ScoreMetric::TotalReturn),
            "sharpe" | "sharpe_ratio" => Ok(ScoreMetric::SharpeRatio),
            "sortino" | "sortino_ratio" => Ok(ScoreMetric::SortinoRatio),
            "profit_factor" => Ok(ScoreMetric::ProfitFactor),
            "win_rate" => Ok(ScoreMetric::WinRate),
            other => Err(BandtraderError::invalid(
                "score",
                format!(
                    "unknown score metric '{other}' \
                     (expected total_return, sharpe, sortino, profit_factor or win_rate)"
                ),
            )),
        }
    }
}

/// Descending by score with NaN last.
fn by_score_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Total order over results: score descending, then lower drawdown, then
/// lower combination index. Independent of evaluation order.
pub fn compare_results(a: &OptimizationResult, b: &OptimizationResult) -> Ordering {
    by_score_desc(a.score, b.score)
        .then_with(|| a.metrics.max_drawdown.total_cmp(&b.metrics.max_drawdown))
        .then_with(|| a.index.cmp(&b.index))
}

pub fn rank_results(results: &mut [OptimizationResult]) {
    results.sort_by(compare_results);
}
