use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ExecutorSettings;

/// Session-wide configuration: named executor sections.
///
/// ```json
/// { "executors": { "local": { "capacity": 4 }, "k8s": { "pollIntervalMs": 5000 } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    pub executors: BTreeMap<String, ExecutorSettings>,
}

impl SessionConfig {
    pub fn executor(&self, name: &str) -> Option<&ExecutorSettings> {
        self.executors.get(name)
    }

    /// Add or replace the settings of one executor.
    pub fn with_executor(mut self, name: impl Into<String>, settings: ExecutorSettings) -> Self {
        self.executors.insert(name.into(), settings);
        self
    }
}
