use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use wfx_core::{LocalSession, PollingScheduler, Session, TaskHandler, TaskReport};
use wfx_exec::{
    local::{LocalProcessConfig, LocalProcessHandler},
    pod::{DryRunPodApi, PodApi, PodHandler},
};
use wfx_model::{ExecutorSettings, Mount, SessionConfig, TaskId, TaskResources};
use wfx_observe::{LoggerConfig, init_logger};
use wfx_prometheus::PrometheusMetrics;

/// Agent configuration file (JSON). Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AgentConfig {
    logger: LoggerConfig,
    session: Option<SessionConfig>,
}

impl AgentConfig {
    fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_else(|| {
            SessionConfig::default()
                .with_executor(
                    "local",
                    ExecutorSettings {
                        capacity: Some(2),
                        poll_interval_ms: Some(200),
                        ..Default::default()
                    },
                )
                .with_executor(
                    "k8s",
                    ExecutorSettings {
                        capacity: Some(4),
                        parallel_submit: Some(true),
                        ..Default::default()
                    },
                )
        })
    }
}

fn local_tasks() -> Vec<Arc<dyn TaskHandler>> {
    let sh = |id: &str, script: &str| -> Arc<dyn TaskHandler> {
        Arc::new(LocalProcessHandler::new(
            TaskId::from(id),
            LocalProcessConfig::new("sh").args(["-c", script]),
        ))
    };
    vec![
        sh("demo-ls", "ls /tmp"),
        sh("demo-date", "date"),
        sh("demo-sleep", "sleep 2"),
        sh("demo-fail", "echo giving up >&2; exit 2"),
    ]
}

fn pod_tasks(api: &Arc<dyn PodApi>) -> Vec<Arc<dyn TaskHandler>> {
    let align = TaskResources {
        name: "demo-align".into(),
        namespace: Some("genomics".into()),
        image: "biocontainers/bwa:0.7.17".into(),
        command: vec!["bwa".into(), "mem".into(), "/ref/hg38.fa".into(), "/data/reads.fq".into()],
        work_dir: Some("/data".into()),
        cpus: Some(4),
        memory_bytes: Some(8 * 1024 * 1024 * 1024),
        mounts: vec![
            Mount::volume_claim("reference", "/ref").read_only(),
            Mount::volume_claim("samples", "/data"),
            Mount::secret("registry-creds", "/secrets"),
        ],
        ..Default::default()
    };
    // No image: rejected at submission.
    let broken = TaskResources {
        name: "demo-broken".into(),
        command: vec!["true".into()],
        ..Default::default()
    };

    [align, broken]
        .iter()
        .map(|res| Arc::new(PodHandler::from_resources(res, Arc::clone(api))) as Arc<dyn TaskHandler>)
        .collect()
}

fn log_report(report: &TaskReport) {
    match &report.failure {
        None => info!(task = %report.id(), backend = report.backend(), "report: completed"),
        Some(f) => warn!(
            task = %report.id(),
            backend = report.backend(),
            status = %report.status,
            kind = %f.kind,
            started = report.started,
            "report: {}", f.reason
        ),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // 1) config + logger
    let path = std::env::args().nth(1);
    let cfg = AgentConfig::load(path.as_deref().map(Path::new))?;
    init_logger(&cfg.logger)?;
    info!("logger initialized");

    // 2) session + metrics
    let (session, mut reports) = LocalSession::new(cfg.session());
    let metrics = PrometheusMetrics::new()?;
    let session_dyn: Arc<dyn Session> = session.clone();

    // 3) schedulers
    let local = PollingScheduler::create(Arc::clone(&session_dyn), "local", Duration::from_millis(500))?
        .with_metrics(Arc::new(metrics.clone()));
    let k8s = PollingScheduler::create(Arc::clone(&session_dyn), "k8s", Duration::from_millis(500))?
        .with_metrics(Arc::new(metrics.clone()));
    local.start()?;
    k8s.start()?;

    // 4) tasks
    let pod_api: Arc<dyn PodApi> = Arc::new(DryRunPodApi::new());
    let mut expected = 0;
    for task in local_tasks() {
        local.schedule(task)?;
        expected += 1;
    }
    for task in pod_tasks(&pod_api) {
        k8s.schedule(task)?;
        expected += 1;
    }
    info!(expected, local = %local.snapshot(), k8s = %k8s.snapshot(), "tasks scheduled");

    // 5) reports
    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);
    let mut received = 0;
    while received < expected {
        tokio::select! {
            Some(report) = reports.recv() => {
                log_report(&report);
                received += 1;
            }
            _ = &mut deadline => {
                warn!(received, expected, "timed out waiting for reports");
                break;
            }
        }
    }

    // 6) shutdown
    session.shutdown().await;
    println!("{}", metrics.encode_text()?);
    Ok(())
}
