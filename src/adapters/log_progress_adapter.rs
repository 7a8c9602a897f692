//! Progress adapter that reports through `tracing`.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use crate::domain::optimizer::OptimizationProgress;
use crate::ports::progress_port::ProgressPort;

/// Logs a line whenever another `step_percent` of the grid has been tested,
/// plus the first and final events.
pub struct LogProgressAdapter {
    step_percent: usize,
    last_logged: AtomicUsize,
}

impl LogProgressAdapter {
    pub fn new(step_percent: usize) -> Self {
        Self {
            step_percent: step_percent.clamp(1, 100),
            last_logged: AtomicUsize::new(usize::MAX),
        }
    }

    /// The percentage bucket this event falls in, when it should be logged.
    fn bucket_to_log(&self, progress: &OptimizationProgress) -> Option<usize> {
        let percent = (progress.fraction_complete() * 100.0).floor() as usize;
        let bucket = percent / self.step_percent * self.step_percent;
        let last = self.last_logged.load(Ordering::Relaxed);
        let finished = progress.combinations_tested == progress.total_combinations;
        if last == usize::MAX || bucket > last || (finished && last < 100) {
            self.last_logged.store(bucket, Ordering::Relaxed);
            Some(bucket)
        } else {
            None
        }
    }
}

impl Default for LogProgressAdapter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ProgressPort for LogProgressAdapter {
    fn report(&self, progress: &OptimizationProgress) {
        let Some(percent) = self.bucket_to_log(progress) else {
            return;
        };
        match &progress.best_result {
            Some(best) => info!(
                tested = progress.combinations_tested,
                total = progress.total_combinations,
                percent,
                best_score = best.score,
                best_period = best.period,
                best_std_dev = best.std_dev,
                best_offset = best.offset,
                best_leverage = best.leverage,
                elapsed_ms = progress.elapsed.as_millis() as u64,
                "Optimization progress"
            ),
            None => info!(
                tested = progress.combinations_tested,
                total = progress.total_combinations,
                percent,
                "Optimization progress"
            ),
        }
    }
}
