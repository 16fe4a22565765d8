use serde::{Deserialize, Serialize};

use crate::IntervalMs;

/// Per-executor scheduler overrides, keyed by executor name in [`crate::SessionConfig`].
///
/// Every field is optional: anything left unset falls back to the defaults
/// applied when the scheduler is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorSettings {
    /// Delay between two poll cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<IntervalMs>,
    /// Delay between two diagnostic dumps of the scheduler state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_interval_ms: Option<IntervalMs>,
    /// Maximum number of tasks admitted at once (`0` = unbounded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Consecutive transient status-check failures tolerated before a task is failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_poll_failures: Option<u32>,
    /// Run submissions on a worker pool instead of the poll loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_submit: Option<bool>,
}
