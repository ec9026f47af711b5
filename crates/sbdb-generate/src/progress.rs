use serde::Serialize;
use tracing::info;

/// Counters observed after each processed combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn succeeded(&self) -> usize {
        self.processed - self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total
    }
}

/// Fire-and-forget receiver of batch progress. It cannot influence the run.
pub trait ProgressSink {
    fn record(&mut self, progress: BatchProgress);
}

impl<F> ProgressSink for F
where
    F: FnMut(BatchProgress),
{
    fn record(&mut self, progress: BatchProgress) {
        self(progress)
    }
}

/// Logs a progress line every `interval` objects and once at completion.
#[derive(Debug, Clone)]
pub struct LogProgress {
    interval: usize,
}

impl LogProgress {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
        }
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl ProgressSink for LogProgress {
    fn record(&mut self, progress: BatchProgress) {
        if progress.processed % self.interval == 0 || progress.is_complete() {
            info!(
                processed = progress.processed,
                failed = progress.failed,
                total = progress.total,
                "objects completed"
            );
        }
    }
}
