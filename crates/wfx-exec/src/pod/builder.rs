use std::collections::BTreeMap;

use wfx_model::{Env, LABEL_APP, LABEL_TASK_ID, Labels, Mount, MountSource, TaskResources};

use super::{
    VolumeNameCounter,
    payload::{
        ClaimSource, ConfigMapSource, Container, EnvEntry, HostPathSource, ObjectMeta, PodPayload,
        PodSpec, ResourceRequirements, SecretSource, Volume, VolumeMount, VolumeSource,
    },
};
use crate::error::SpecError;

const MIB: u64 = 1024 * 1024;
const APP_NAME: &str = "wfx";

/// Staged builder turning a resource declaration into a [`PodPayload`].
///
/// [`PodSpecBuilder::build`] validates and can be called any number of times;
/// each call draws fresh volume names from the given counter.
#[derive(Debug, Clone, Default)]
pub struct PodSpecBuilder {
    name: String,
    namespace: Option<String>,
    image: String,
    command: Vec<String>,
    work_dir: Option<String>,
    cpus: Option<u32>,
    memory_bytes: Option<u64>,
    env: Env,
    labels: Vec<(String, String)>,
    service_account: Option<String>,
    mounts: Vec<Mount>,
}

impl PodSpecBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_resources(res: &TaskResources) -> Self {
        Self {
            name: res.name.clone(),
            namespace: res.namespace.clone(),
            image: res.image.clone(),
            command: res.command.clone(),
            work_dir: res.work_dir.clone(),
            cpus: res.cpus,
            memory_bytes: res.memory_bytes,
            env: res.env.clone(),
            labels: res
                .labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            service_account: res.service_account.clone(),
            mounts: res.mounts.clone(),
        }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<String>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn cpus(mut self, cpus: u32) -> Self {
        self.cpus = Some(cpus);
        self
    }

    pub fn memory_bytes(mut self, bytes: u64) -> Self {
        self.memory_bytes = Some(bytes);
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.set(name, value);
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    pub fn mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check required fields without generating anything.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::MissingName);
        }
        if self.image.trim().is_empty() {
            return Err(SpecError::MissingImage);
        }
        if self.command.first().is_none_or(|c| c.trim().is_empty()) {
            return Err(SpecError::MissingCommand);
        }
        Ok(())
    }

    pub fn build(&self, counter: &VolumeNameCounter) -> Result<PodPayload, SpecError> {
        self.validate()?;

        let mut labels = Labels::new();
        labels.insert(LABEL_APP, APP_NAME)?;
        labels.insert(LABEL_TASK_ID, &self.name)?;
        for (k, v) in &self.labels {
            labels.insert(k, v)?;
        }

        let mut volumes = Vec::with_capacity(self.mounts.len());
        let mut volume_mounts = Vec::with_capacity(self.mounts.len());
        for mount in &self.mounts {
            let name = counter.next_name();
            volumes.push(Volume {
                name: name.clone(),
                source: volume_source(mount),
            });
            volume_mounts.push(VolumeMount {
                name,
                mount_path: mount.mount_path.clone(),
                sub_path: mount.sub_path.clone(),
                read_only: mount.read_only,
            });
        }

        let container = Container {
            name: self.name.clone(),
            image: self.image.clone(),
            command: self.command.clone(),
            working_dir: self.work_dir.clone(),
            env: self
                .env
                .iter()
                .map(|v| EnvEntry {
                    name: v.name.clone(),
                    value: v.value.clone(),
                })
                .collect(),
            resources: self.resources(),
            volume_mounts,
        };

        Ok(PodPayload {
            api_version: "v1".into(),
            kind: "Pod".into(),
            metadata: ObjectMeta {
                name: self.name.clone(),
                namespace: self.namespace.clone(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
            spec: PodSpec {
                restart_policy: "Never".into(),
                service_account_name: self.service_account.clone(),
                containers: vec![container],
                volumes,
            },
        })
    }

    /// Requests and limits are identical.
    fn resources(&self) -> ResourceRequirements {
        let mut amounts = BTreeMap::new();
        if let Some(cpus) = self.cpus {
            amounts.insert("cpu".to_string(), cpus.to_string());
        }
        if let Some(bytes) = self.memory_bytes {
            amounts.insert("memory".to_string(), format!("{}Mi", bytes.div_ceil(MIB)));
        }
        ResourceRequirements {
            requests: amounts.clone(),
            limits: amounts,
        }
    }
}

fn volume_source(mount: &Mount) -> VolumeSource {
    match &mount.source {
        MountSource::VolumeClaim { claim_name } => VolumeSource::PersistentVolumeClaim(ClaimSource {
            claim_name: claim_name.clone(),
            read_only: mount.read_only,
        }),
        MountSource::ConfigMap { name } => VolumeSource::ConfigMap(ConfigMapSource { name: name.clone() }),
        MountSource::HostPath { path } => VolumeSource::HostPath(HostPathSource { path: path.clone() }),
        MountSource::Secret { secret_name } => VolumeSource::Secret(SecretSource {
            secret_name: secret_name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn align() -> PodSpecBuilder {
        PodSpecBuilder::new("align-sample-1")
            .image("biocontainers/bwa:0.7.17")
            .command(["bwa", "mem", "ref.fa", "reads.fq"])
            .work_dir("/work")
    }

    #[test]
    fn claims_and_secret_get_distinct_volume_pairs() {
        let counter = VolumeNameCounter::new();
        let payload = align()
            .mount(Mount::volume_claim("ref-data", "/ref").read_only())
            .mount(Mount::volume_claim("scratch", "/scratch"))
            .mount(Mount::secret("s3-creds", "/secrets"))
            .build(&counter)
            .unwrap();

        let container = payload.container().unwrap();
        assert_eq!(container.image, "biocontainers/bwa:0.7.17");
        assert_eq!(container.command, ["bwa", "mem", "ref.fa", "reads.fq"]);
        assert_eq!(container.working_dir.as_deref(), Some("/work"));

        assert_eq!(payload.spec.volumes.len(), 3);
        assert_eq!(container.volume_mounts.len(), 3);
        let names: HashSet<_> = payload.spec.volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names.len(), 3);

        for (volume, mount) in payload.spec.volumes.iter().zip(&container.volume_mounts) {
            assert_eq!(volume.name, mount.name);
        }
        let paths: Vec<_> = container.volume_mounts.iter().map(|m| m.mount_path.as_str()).collect();
        assert_eq!(paths, ["/ref", "/scratch", "/secrets"]);

        assert!(matches!(
            &payload.spec.volumes[0].source,
            VolumeSource::PersistentVolumeClaim(c) if c.claim_name == "ref-data" && c.read_only
        ));
        assert!(matches!(
            &payload.spec.volumes[2].source,
            VolumeSource::Secret(s) if s.secret_name == "s3-creds"
        ));
    }

    #[test]
    fn missing_required_fields_fail_fast() {
        let counter = VolumeNameCounter::new();
        assert_eq!(
            PodSpecBuilder::new(" ").image("x").command(["true"]).build(&counter),
            Err(SpecError::MissingName)
        );
        assert_eq!(
            PodSpecBuilder::new("a").command(["true"]).build(&counter),
            Err(SpecError::MissingImage)
        );
        assert_eq!(
            PodSpecBuilder::new("a").image("x").build(&counter),
            Err(SpecError::MissingCommand)
        );
        // Failed builds consume no names.
        assert_eq!(counter.next_name(), "vol-1");
    }

    #[test]
    fn identical_inputs_differ_only_in_volume_names() {
        let counter = VolumeNameCounter::new();
        let builder = align()
            .cpus(2)
            .memory_bytes(512 * MIB)
            .env("THREADS", "2")
            .mount(Mount::host_path("/data", "/data"));

        let a = builder.build(&counter).unwrap();
        let mut b = builder.build(&counter).unwrap();
        assert_ne!(a.spec.volumes[0].name, b.spec.volumes[0].name);

        b.spec.volumes[0].name = a.spec.volumes[0].name.clone();
        b.spec.containers[0].volume_mounts[0].name = a.spec.volumes[0].name.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn payload_serializes_to_pod_shape() {
        let payload = align()
            .namespace("genomics")
            .service_account("runner")
            .cpus(4)
            .memory_bytes(1536 * MIB + 1)
            .env("SAMPLE", "s1")
            .label("team", "seq core")
            .mount(Mount::config_map("pipeline-cfg", "/etc/pipeline"))
            .build(&VolumeNameCounter::new())
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        assert_eq!(json["apiVersion"], "v1");
        assert_eq!(json["kind"], "Pod");
        assert_eq!(json["metadata"]["namespace"], "genomics");
        assert_eq!(json["metadata"]["labels"]["app"], "wfx");
        assert_eq!(json["metadata"]["labels"]["wfx/task-id"], "align-sample-1");
        assert_eq!(json["metadata"]["labels"]["team"], "seq_core");
        assert_eq!(json["spec"]["restartPolicy"], "Never");
        assert_eq!(json["spec"]["serviceAccountName"], "runner");

        let c = &json["spec"]["containers"][0];
        assert_eq!(c["workingDir"], "/work");
        assert_eq!(c["resources"]["requests"]["cpu"], "4");
        assert_eq!(c["resources"]["limits"]["memory"], "1537Mi");
        assert_eq!(c["env"][0]["name"], "SAMPLE");
        assert_eq!(c["volumeMounts"][0]["mountPath"], "/etc/pipeline");

        let v = &json["spec"]["volumes"][0];
        assert_eq!(v["name"], "vol-1");
        assert_eq!(v["configMap"]["name"], "pipeline-cfg");
    }
}
