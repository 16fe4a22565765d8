//! Metrics abstraction for schedulers.
//!
//! Backends (prometheus, statsd, ...) implement [`MetricsBackend`]; the default is [`NoOpMetrics`].
mod backend;
pub use backend::{MetricsBackend, MetricsHandle, TaskOutcome};

mod noop;
pub use noop::NoOpMetrics;

