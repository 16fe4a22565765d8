//! Execution core: capacity-bounded polling scheduler with pluggable submission.
pub mod error;
pub mod handler;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod submit;

#[cfg(test)]
pub(crate) mod testing;

pub use error::CoreError;
pub use handler::{HandlerError, PollStatus, TaskHandle, TaskHandler};
pub use report::{Failure, FailureKind, TaskReport};
pub use scheduler::{PollingScheduler, SchedulerConfig, SchedulerSnapshot};
pub use session::{LocalSession, Session, ShutdownHook};

pub mod prelude {
    pub use crate::error::CoreError;
    pub use crate::handler::{HandlerError, PollStatus, TaskHandle, TaskHandler};
    pub use crate::metrics::{MetricsBackend, MetricsHandle, TaskOutcome};
    pub use crate::report::{Failure, FailureKind, TaskReport};
    pub use crate::scheduler::{PollingScheduler, SchedulerConfig, SchedulerSnapshot};
    pub use crate::session::{LocalSession, Session, ShutdownHook};
    pub use crate::submit::{InlineSubmission, PooledSubmission, SubmissionMode, SubmissionStrategy};
}
