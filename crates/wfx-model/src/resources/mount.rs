use serde::{Deserialize, Serialize};

/// Where the data of a mount comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MountSource {
    /// Persistent volume claim, referenced by claim name.
    #[serde(rename_all = "camelCase")]
    VolumeClaim { claim_name: String },
    /// Config map, referenced by name.
    ConfigMap { name: String },
    /// Directory or file on the node running the task.
    HostPath { path: String },
    /// Secret, referenced by name.
    #[serde(rename_all = "camelCase")]
    Secret { secret_name: String },
}

impl MountSource {
    pub fn kind(&self) -> &'static str {
        match self {
            MountSource::VolumeClaim { .. } => "volumeClaim",
            MountSource::ConfigMap { .. } => "configMap",
            MountSource::HostPath { .. } => "hostPath",
            MountSource::Secret { .. } => "secret",
        }
    }

    /// Name of the referenced object (claim, config map, secret) or the host path.
    pub fn reference(&self) -> &str {
        match self {
            MountSource::VolumeClaim { claim_name } => claim_name,
            MountSource::ConfigMap { name } => name,
            MountSource::HostPath { path } => path,
            MountSource::Secret { secret_name } => secret_name,
        }
    }
}

/// A declared mount: a source exposed inside the task at `mount_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mount {
    pub source: MountSource,
    pub mount_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_path: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl Mount {
    pub fn volume_claim(claim: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self::new(
            MountSource::VolumeClaim {
                claim_name: claim.into(),
            },
            mount_path,
        )
    }

    pub fn config_map(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self::new(MountSource::ConfigMap { name: name.into() }, mount_path)
    }

    pub fn host_path(path: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self::new(MountSource::HostPath { path: path.into() }, mount_path)
    }

    pub fn secret(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self::new(
            MountSource::Secret {
                secret_name: name.into(),
            },
            mount_path,
        )
    }

    fn new(source: MountSource, mount_path: impl Into<String>) -> Self {
        Self {
            source,
            mount_path: mount_path.into(),
            sub_path: None,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }
}
