use async_trait::async_trait;

use super::{Dispatch, SubmissionStrategy, SubmitOutcome, SubmitSink};
use crate::handler::TaskHandle;

/// Submits on the poll loop; the loop waits for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSubmission;

#[async_trait]
impl SubmissionStrategy for InlineSubmission {
    fn name(&self) -> &'static str {
        "inline"
    }

    async fn execute_submission(&self, task: TaskHandle, _sink: &SubmitSink) -> Dispatch {
        let result = task.submit_guarded().await;
        Dispatch::Done(SubmitOutcome { task, result })
    }

    async fn shutdown(&self) {}
}
