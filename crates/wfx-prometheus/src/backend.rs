use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use wfx_core::metrics::{MetricsBackend, TaskOutcome};

const NAMESPACE: &str = "wfx";

/// Scheduler metrics in a prometheus [`Registry`].
///
/// ## Metrics
/// - `wfx_tasks_submitted_total{backend}`
/// - `wfx_tasks_completed_total{backend, outcome}`
/// - `wfx_task_run_seconds{backend}` (histogram of backend run time)
/// - `wfx_submission_errors_total{backend, error_kind}`
/// - `wfx_pending_tasks{scheduler}`, `wfx_running_tasks{scheduler}` (gauges)
///
/// Every label is low-cardinality: backend and scheduler names, outcome and error kind labels.
#[derive(Clone)]
pub struct PrometheusMetrics {
    tasks_submitted: CounterVec,
    tasks_completed: CounterVec,
    run_time: HistogramVec,
    submission_errors: CounterVec,
    pending: IntGaugeVec,
    running: IntGaugeVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let tasks_submitted = CounterVec::new(
            Opts::new("tasks_submitted_total", "Tasks accepted by their backend").namespace(NAMESPACE),
            &["backend"],
        )?;
        registry.register(Box::new(tasks_submitted.clone()))?;

        let tasks_completed = CounterVec::new(
            Opts::new("tasks_completed_total", "Tasks that reached a terminal status").namespace(NAMESPACE),
            &["backend", "outcome"],
        )?;
        registry.register(Box::new(tasks_completed.clone()))?;

        let run_time = HistogramVec::new(
            HistogramOpts::new("task_run_seconds", "Time tasks spent running on the backend")
                .namespace(NAMESPACE)
                .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 4.0 * 3600.0, 24.0 * 3600.0]),
            &["backend"],
        )?;
        registry.register(Box::new(run_time.clone()))?;

        let submission_errors = CounterVec::new(
            Opts::new("submission_errors_total", "Failed submission calls").namespace(NAMESPACE),
            &["backend", "error_kind"],
        )?;
        registry.register(Box::new(submission_errors.clone()))?;

        let pending = IntGaugeVec::new(
            Opts::new("pending_tasks", "Tasks waiting for admission").namespace(NAMESPACE),
            &["scheduler"],
        )?;
        registry.register(Box::new(pending.clone()))?;

        let running = IntGaugeVec::new(
            Opts::new("running_tasks", "Tasks in the running set").namespace(NAMESPACE),
            &["scheduler"],
        )?;
        registry.register(Box::new(running.clone()))?;

        Ok(Self {
            tasks_submitted,
            tasks_completed,
            run_time,
            submission_errors,
            pending,
            running,
            registry,
        })
    }

    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render all metrics in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_task_submitted(&self, backend: &str) {
        self.tasks_submitted.with_label_values(&[backend]).inc();
    }

    fn record_task_completed(&self, backend: &str, outcome: TaskOutcome, run_time_ms: u64) {
        self.tasks_completed
            .with_label_values(&[backend, outcome.as_label()])
            .inc();
        // Tasks that never started would only skew the distribution.
        if run_time_ms > 0 {
            self.run_time
                .with_label_values(&[backend])
                .observe(run_time_ms as f64 / 1000.0);
        }
    }

    fn record_submission_error(&self, backend: &str, error_kind: &str) {
        self.submission_errors
            .with_label_values(&[backend, error_kind])
            .inc();
    }

    fn record_queue_state(&self, scheduler: &str, pending: usize, running: usize) {
        self.pending.with_label_values(&[scheduler]).set(pending as i64);
        self.running.with_label_values(&[scheduler]).set(running as i64);
    }
}
