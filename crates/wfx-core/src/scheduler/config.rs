use std::time::Duration;

use wfx_model::ExecutorSettings;

use crate::error::CoreError;

/// Diagnostic dump period used when the executor section does not set one.
pub const DEFAULT_DUMP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Consecutive transient status-check failures tolerated before a task fails.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 3;

/// Resolved, immutable configuration of one scheduler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Delay between poll cycles.
    pub poll_interval: Duration,
    /// Delay between diagnostic dumps; `None` disables them.
    pub dump_interval: Option<Duration>,
    /// Maximum tasks admitted at once; `0` means unbounded.
    pub capacity: usize,
    pub max_poll_failures: u32,
    /// Submit on a worker pool instead of the poll loop.
    pub parallel_submit: bool,
}

impl SchedulerConfig {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            dump_interval: Some(DEFAULT_DUMP_INTERVAL),
            capacity: 0,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            parallel_submit: false,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_dump_interval(mut self, dump_interval: Option<Duration>) -> Self {
        self.dump_interval = dump_interval;
        self
    }

    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max;
        self
    }

    pub fn with_parallel_submit(mut self, parallel: bool) -> Self {
        self.parallel_submit = parallel;
        self
    }

    /// Apply executor overrides on top of the defaults.
    ///
    /// `dumpIntervalMs: 0` disables dumps. A zero poll interval or a zero failure
    /// budget is rejected.
    pub fn resolve(
        settings: Option<&ExecutorSettings>,
        default_poll_interval: Duration,
    ) -> Result<Self, CoreError> {
        let mut cfg = Self::new(default_poll_interval);
        if let Some(s) = settings {
            if let Some(ms) = s.poll_interval_ms {
                cfg.poll_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = s.dump_interval_ms {
                cfg.dump_interval = (ms > 0).then(|| Duration::from_millis(ms));
            }
            if let Some(capacity) = s.capacity {
                cfg.capacity = capacity;
            }
            if let Some(max) = s.max_poll_failures {
                cfg.max_poll_failures = max;
            }
            if let Some(parallel) = s.parallel_submit {
                cfg.parallel_submit = parallel;
            }
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::InvalidConfig("poll interval must be greater than zero".into()));
        }
        if self.max_poll_failures == 0 {
            return Err(CoreError::InvalidConfig("max poll failures must be at least 1".into()));
        }
        Ok(())
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity > 0
    }
}
