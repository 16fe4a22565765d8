use crate::metrics::backend::{MetricsBackend, TaskOutcome};

/// Metrics backend that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_task_submitted(&self, _: &str) {}

    #[inline(always)]
    fn record_task_completed(&self, _: &str, _: TaskOutcome, _: u64) {}

    #[inline(always)]
    fn record_submission_error(&self, _: &str, _: &str) {}

    #[inline(always)]
    fn record_queue_state(&self, _: &str, _: usize, _: usize) {}
}
