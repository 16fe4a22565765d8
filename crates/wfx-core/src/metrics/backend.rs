use std::sync::Arc;

/// Terminal outcome of a task, for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Task completed successfully.
    Success,
    /// Submission, polling or execution failed.
    Failure,
    /// Task was cancelled.
    Aborted,
}

impl TaskOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::Failure => "failure",
            TaskOutcome::Aborted => "aborted",
        }
    }
}

/// Metrics sink fed by the scheduler loop.
///
/// Implementations are injected with [`crate::PollingScheduler::with_metrics`].
pub trait MetricsBackend: Send + Sync + 'static {
    /// A task was accepted by its backend and entered the running set.
    fn record_task_submitted(&self, backend: &str);
    /// A task was reported terminal.
    ///
    /// `run_time_ms` is zero for tasks that never started.
    fn record_task_completed(&self, backend: &str, outcome: TaskOutcome, run_time_ms: u64);
    /// A submission call failed. `error_kind` is [`crate::HandlerError::kind`].
    fn record_submission_error(&self, backend: &str, error_kind: &str);
    /// Current queue sizes of a scheduler.
    fn record_queue_state(&self, scheduler: &str, pending: usize, running: usize);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
