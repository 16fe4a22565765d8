use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use super::{Dispatch, SubmissionStrategy, SubmitOutcome, SubmitSink};
use crate::{
    handler::{HandlerError, TaskHandle},
    session::{Session, ShutdownHook},
};

/// Runs every submission on its own runtime task.
///
/// Workers come from the tokio runtime, so the pool grows with demand and reuses
/// idle threads. A [`TaskTracker`] keeps count of outstanding workers; once closed
/// the pool rejects new submissions with [`HandlerError::Rejected`].
#[derive(Debug, Clone)]
pub struct PooledSubmission {
    scheduler: String,
    workers: TaskTracker,
}

impl PooledSubmission {
    pub fn new(scheduler: impl Into<String>) -> Self {
        Self {
            scheduler: scheduler.into(),
            workers: TaskTracker::new(),
        }
    }

    /// Number of submissions currently running on workers.
    pub fn in_flight(&self) -> usize {
        self.workers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.workers.is_closed()
    }

    async fn close_and_wait(workers: &TaskTracker, scheduler: &str) {
        workers.close();
        if !workers.is_empty() {
            debug!(scheduler, outstanding = workers.len(), "waiting for submission workers");
        }
        workers.wait().await;
    }
}

#[async_trait]
impl SubmissionStrategy for PooledSubmission {
    fn name(&self) -> &'static str {
        "pooled"
    }

    async fn execute_submission(&self, task: TaskHandle, sink: &SubmitSink) -> Dispatch {
        if self.workers.is_closed() {
            let result = Err(HandlerError::Rejected("submission pool is shut down".into()));
            return Dispatch::Done(SubmitOutcome { task, result });
        }

        let sink = sink.clone();
        self.workers.spawn(async move {
            trace!(task = %task.id(), "submitting on worker");
            let result = task.submit_guarded().await;
            if sink.send(SubmitOutcome { task, result }).is_err() {
                debug!("poll loop gone before submission finished");
            }
        });
        Dispatch::Deferred
    }

    async fn shutdown(&self) {
        Self::close_and_wait(&self.workers, &self.scheduler).await;
    }

    fn register_shutdown(&self, session: &dyn Session) {
        let workers = self.workers.clone();
        let scheduler = self.scheduler.clone();
        session.on_shutdown(ShutdownHook::new(
            format!("submission-pool:{}", self.scheduler),
            move || async move { Self::close_and_wait(&workers, &scheduler).await },
        ));
    }
}
