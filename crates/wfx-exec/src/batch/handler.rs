use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, instrument};
use wfx_core::{HandlerError, PollStatus, TaskHandler};
use wfx_model::{TaskId, TaskResources};

use super::{BatchClient, BatchJob, BatchState, JobId};
use crate::{
    BACKEND_BATCH,
    error::{ExecError, SpecError},
};

/// Runs a task as one batch job.
pub struct BatchHandler {
    id: TaskId,
    job: BatchJob,
    client: Arc<dyn BatchClient>,
    job_id: Mutex<Option<JobId>>,
}

impl BatchHandler {
    pub fn new(id: TaskId, job: BatchJob, client: Arc<dyn BatchClient>) -> Self {
        Self {
            id,
            job,
            client,
            job_id: Mutex::new(None),
        }
    }

    pub fn from_resources(res: &TaskResources, client: Arc<dyn BatchClient>) -> Result<Self, SpecError> {
        Ok(Self::new(TaskId::new(res.name.clone()), BatchJob::from_resources(res)?, client))
    }

    /// Identifier assigned at submission.
    pub fn job_id(&self) -> Option<JobId> {
        match self.job_id.lock() {
            Ok(id) => id.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TaskHandler for BatchHandler {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn backend(&self) -> &'static str {
        BACKEND_BATCH
    }

    #[instrument(level = "debug", skip(self), fields(task = %self.id))]
    async fn submit(&self) -> Result<(), HandlerError> {
        if self.job_id().is_some() {
            return Err(HandlerError::Rejected("job already submitted".into()));
        }
        let id = self.client.submit(&self.job).await?;
        debug!(job = %id, "batch job accepted");
        match self.job_id.lock() {
            Ok(mut slot) => *slot = Some(id),
            Err(poisoned) => *poisoned.into_inner() = Some(id),
        }
        Ok(())
    }

    async fn check_status(&self) -> Result<PollStatus, HandlerError> {
        let id = self.job_id().ok_or(ExecError::NotSubmitted)?;
        match self.client.state(&id).await? {
            BatchState::Active => Ok(PollStatus::Running),
            BatchState::Completed => Ok(PollStatus::Completed),
            BatchState::Failed { reason } => Ok(PollStatus::Failed { reason }),
            BatchState::Unknown => Err(HandlerError::Transient(format!("job {id} is unknown to the batch system"))),
        }
    }

    async fn kill(&self) -> Result<(), HandlerError> {
        if let Some(id) = self.job_id() {
            self.client.cancel(&id).await?;
            debug!(task = %self.id, job = %id, "batch job cancelled");
        }
        Ok(())
    }
}
