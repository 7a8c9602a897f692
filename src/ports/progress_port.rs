//! Optimizer progress port trait.

use std::sync::mpsc::Sender;

use crate::domain::optimizer::OptimizationProgress;

/// Receives progress events from a running optimization. Called from the
/// aggregating thread only, between batches.
pub trait ProgressPort {
    fn report(&self, progress: &OptimizationProgress);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressPort for NoProgress {
    fn report(&self, _progress: &OptimizationProgress) {}
}

/// Streams events over a channel. A disconnected receiver is ignored so the
/// run keeps going when nobody is listening.
impl ProgressPort for Sender<OptimizationProgress> {
    fn report(&self, progress: &OptimizationProgress) {
        let _ = self.send(progress.clone());
    }
}
