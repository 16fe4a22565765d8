//! Submission strategies: how the poll loop hands an admitted task to its backend.
//!
//! [`InlineSubmission`] awaits the call on the loop itself; [`PooledSubmission`] runs it
//! on a worker and returns the result through a channel so polling never waits on it.
mod inline;
pub use inline::InlineSubmission;

mod pooled;
pub use pooled::PooledSubmission;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    handler::{HandlerError, TaskHandle},
    session::Session,
};

/// Result of one submission call.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub task: TaskHandle,
    pub result: Result<(), HandlerError>,
}

/// Channel through which deferred submissions report back to the loop.
pub type SubmitSink = mpsc::UnboundedSender<SubmitOutcome>;

/// What a strategy did with a submission.
#[derive(Debug)]
pub enum Dispatch {
    /// The call already finished.
    Done(SubmitOutcome),
    /// The call runs elsewhere; its outcome will arrive on the [`SubmitSink`].
    Deferred,
}

#[async_trait]
pub trait SubmissionStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Submit `task`, which is already in [`wfx_model::TaskStatus::Submitting`].
    async fn execute_submission(&self, task: TaskHandle, sink: &SubmitSink) -> Dispatch;

    /// Stop accepting work and wait for outstanding submissions. Idempotent.
    async fn shutdown(&self);

    /// Register any teardown the strategy needs with the session.
    fn register_shutdown(&self, _session: &dyn Session) {}
}

/// Strategy selected from configuration (`parallelSubmit`).
#[derive(Debug, Clone)]
pub enum SubmissionMode {
    Inline(InlineSubmission),
    Pooled(PooledSubmission),
}

impl SubmissionMode {
    pub fn from_parallel(parallel: bool, scheduler: &str) -> Self {
        if parallel {
            SubmissionMode::Pooled(PooledSubmission::new(scheduler))
        } else {
            SubmissionMode::Inline(InlineSubmission)
        }
    }
}

#[async_trait]
impl SubmissionStrategy for SubmissionMode {
    fn name(&self) -> &'static str {
        match self {
            SubmissionMode::Inline(s) => s.name(),
            SubmissionMode::Pooled(s) => s.name(),
        }
    }

    async fn execute_submission(&self, task: TaskHandle, sink: &SubmitSink) -> Dispatch {
        match self {
            SubmissionMode::Inline(s) => s.execute_submission(task, sink).await,
            SubmissionMode::Pooled(s) => s.execute_submission(task, sink).await,
        }
    }

    async fn shutdown(&self) {
        match self {
            SubmissionMode::Inline(s) => s.shutdown().await,
            SubmissionMode::Pooled(s) => s.shutdown().await,
        }
    }

    fn register_shutdown(&self, session: &dyn Session) {
        match self {
            SubmissionMode::Inline(s) => s.register_shutdown(session),
            SubmissionMode::Pooled(s) => s.register_shutdown(session),
        }
    }
}
