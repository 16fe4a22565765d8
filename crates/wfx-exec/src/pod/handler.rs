use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, instrument};
use wfx_core::{HandlerError, PollStatus, TaskHandler};
use wfx_model::{TaskId, TaskResources};

use super::{PodApi, PodPhase, PodSpecBuilder, VolumeNameCounter};
use crate::{BACKEND_POD, error::ExecError};

/// Runs a task as a single pod.
///
/// The payload is built at submission, so an invalid declaration fails the
/// submission with [`HandlerError::InvalidTaskSpec`] before the API is called.
pub struct PodHandler {
    id: TaskId,
    builder: PodSpecBuilder,
    counter: VolumeNameCounter,
    api: Arc<dyn PodApi>,
    /// `(namespace, name)` of the created pod.
    created: Mutex<Option<(Option<String>, String)>>,
}

impl PodHandler {
    pub fn new(id: TaskId, builder: PodSpecBuilder, api: Arc<dyn PodApi>) -> Self {
        Self {
            id,
            builder,
            counter: VolumeNameCounter::shared(),
            api,
            created: Mutex::new(None),
        }
    }

    pub fn from_resources(res: &TaskResources, api: Arc<dyn PodApi>) -> Self {
        Self::new(TaskId::new(res.name.clone()), PodSpecBuilder::from_resources(res), api)
    }

    /// Use a dedicated volume-name counter instead of the process-wide one.
    pub fn with_counter(mut self, counter: VolumeNameCounter) -> Self {
        self.counter = counter;
        self
    }

    fn created(&self) -> Option<(Option<String>, String)> {
        match self.created.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl TaskHandler for PodHandler {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn backend(&self) -> &'static str {
        BACKEND_POD
    }

    #[instrument(level = "debug", skip(self), fields(task = %self.id))]
    async fn submit(&self) -> Result<(), HandlerError> {
        let payload = self.builder.build(&self.counter)?;
        self.api.create_pod(&payload).await?;

        let created = (payload.metadata.namespace.clone(), payload.metadata.name.clone());
        match self.created.lock() {
            Ok(mut slot) => *slot = Some(created),
            Err(poisoned) => *poisoned.into_inner() = Some(created),
        }
        debug!(pod = %payload.name(), volumes = payload.spec.volumes.len(), "pod created");
        Ok(())
    }

    async fn check_status(&self) -> Result<PollStatus, HandlerError> {
        let (namespace, name) = self.created().ok_or(ExecError::NotSubmitted)?;
        match self.api.pod_phase(namespace.as_deref(), &name).await? {
            PodPhase::Pending | PodPhase::Running => Ok(PollStatus::Running),
            PodPhase::Succeeded => Ok(PollStatus::Completed),
            PodPhase::Failed { reason } => Ok(PollStatus::Failed { reason }),
            PodPhase::Unknown => Err(HandlerError::Transient(format!("phase of pod '{name}' is unknown"))),
        }
    }

    async fn kill(&self) -> Result<(), HandlerError> {
        if let Some((namespace, name)) = self.created() {
            self.api.delete_pod(namespace.as_deref(), &name).await?;
        }
        Ok(())
    }
}
