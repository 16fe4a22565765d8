use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tracing::{debug, info};

use super::PodPayload;
use crate::error::ExecError;

/// Phase of a pod as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed { reason: String },
    Unknown,
}

/// Minimal orchestrator API needed to run one pod per task.
#[async_trait]
pub trait PodApi: Send + Sync + 'static {
    async fn create_pod(&self, payload: &PodPayload) -> Result<(), ExecError>;
    async fn pod_phase(&self, namespace: Option<&str>, name: &str) -> Result<PodPhase, ExecError>;
    async fn delete_pod(&self, namespace: Option<&str>, name: &str) -> Result<(), ExecError>;
}

/// Logs payloads instead of talking to a cluster; every created pod succeeds.
#[derive(Debug, Clone, Default)]
pub struct DryRunPodApi {
    pods: Arc<Mutex<HashMap<String, PodPhase>>>,
}

impl DryRunPodApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: Option<&str>, name: &str) -> String {
        format!("{}/{name}", namespace.unwrap_or("default"))
    }

    fn pods(&self) -> std::sync::MutexGuard<'_, HashMap<String, PodPhase>> {
        match self.pods.lock() {
            Ok(pods) => pods,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of pods created and not deleted.
    pub fn len(&self) -> usize {
        self.pods().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PodApi for DryRunPodApi {
    async fn create_pod(&self, payload: &PodPayload) -> Result<(), ExecError> {
        let json = payload.to_json().map_err(|e| ExecError::Api(e.to_string()))?;
        info!(pod = %payload.name(), "dry-run pod create\n{json}");

        let key = Self::key(payload.metadata.namespace.as_deref(), payload.name());
        let mut pods = self.pods();
        if pods.contains_key(&key) {
            return Err(ExecError::Command {
                program: "create pod".into(),
                reason: format!("pod '{key}' already exists"),
            });
        }
        pods.insert(key, PodPhase::Succeeded);
        Ok(())
    }

    async fn pod_phase(&self, namespace: Option<&str>, name: &str) -> Result<PodPhase, ExecError> {
        Ok(self
            .pods()
            .get(&Self::key(namespace, name))
            .cloned()
            .unwrap_or(PodPhase::Unknown))
    }

    async fn delete_pod(&self, namespace: Option<&str>, name: &str) -> Result<(), ExecError> {
        let key = Self::key(namespace, name);
        if self.pods().remove(&key).is_some() {
            debug!(pod = %key, "dry-run pod deleted");
        }
        Ok(())
    }
}
