use std::fmt;

use async_trait::async_trait;

use super::BatchJob;
use crate::error::ExecError;

/// Identifier assigned by the batch system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job state reduced to what the scheduler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    /// Queued, running, or otherwise not finished.
    Active,
    Completed,
    Failed { reason: String },
    /// The batch system no longer knows the job.
    Unknown,
}

#[async_trait]
pub trait BatchClient: Send + Sync + 'static {
    async fn submit(&self, job: &BatchJob) -> Result<JobId, ExecError>;
    async fn state(&self, job: &JobId) -> Result<BatchState, ExecError>;
    async fn cancel(&self, job: &JobId) -> Result<(), ExecError>;
}
