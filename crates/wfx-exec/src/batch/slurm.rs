use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, trace};

use super::{BatchClient, BatchJob, BatchState, JobId};
use crate::error::ExecError;

/// [`BatchClient`] driving the Slurm command line tools.
#[derive(Debug, Clone)]
pub struct SlurmClient {
    /// Optional `--partition` for every submission.
    partition: Option<String>,
    /// Directory holding the Slurm binaries; `PATH` lookup when `None`.
    bin_dir: Option<String>,
}

impl Default for SlurmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SlurmClient {
    pub fn new() -> Self {
        Self {
            partition: None,
            bin_dir: None,
        }
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    pub fn with_bin_dir(mut self, dir: impl Into<String>) -> Self {
        self.bin_dir = Some(dir.into());
        self
    }

    fn program(&self, name: &str) -> String {
        match &self.bin_dir {
            Some(dir) => format!("{}/{name}", dir.trim_end_matches('/')),
            None => name.to_string(),
        }
    }

    async fn run(&self, name: &str, args: &[&str], stdin: Option<&str>) -> Result<String, ExecError> {
        let program = self.program(name);
        trace!(program = %program, ?args, "running batch command");

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let out = child.wait_with_output().await?;
        if !out.status.success() {
            return Err(ExecError::Command {
                program,
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

#[async_trait]
impl BatchClient for SlurmClient {
    async fn submit(&self, job: &BatchJob) -> Result<JobId, ExecError> {
        let partition = self.partition.as_ref().map(|p| format!("--partition={p}"));
        let mut args = vec!["--parsable"];
        if let Some(p) = &partition {
            args.push(p.as_str());
        }
        let out = self.run("sbatch", &args, Some(&job.script())).await?;
        let id = parse_sbatch(&out)?;
        debug!(job = %id, name = %job.name, "batch job submitted");
        Ok(id)
    }

    async fn state(&self, job: &JobId) -> Result<BatchState, ExecError> {
        let id = job.0.as_str();
        // squeue forgets finished jobs and errors on unknown ids; sacct keeps history.
        if let Ok(out) = self.run("squeue", &["-h", "-j", id, "-o", "%T"], None).await {
            if let Some(state) = first_token(&out) {
                return Ok(parse_state(state));
            }
        }
        let out = self
            .run("sacct", &["-n", "-X", "-P", "-j", id, "-o", "State"], None)
            .await?;
        Ok(first_token(&out).map(parse_state).unwrap_or(BatchState::Unknown))
    }

    async fn cancel(&self, job: &JobId) -> Result<(), ExecError> {
        self.run("scancel", &[job.0.as_str()], None).await.map(|_| ())
    }
}

/// `sbatch --parsable` prints `<id>` or `<id>;<cluster>`.
pub fn parse_sbatch(out: &str) -> Result<JobId, ExecError> {
    let id = out.trim().split(';').next().unwrap_or_default().trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit() || c == '_') {
        return Err(ExecError::Parse(format!("sbatch printed '{}'", out.trim())));
    }
    Ok(JobId(id.to_string()))
}

fn first_token(out: &str) -> Option<&str> {
    out.split_whitespace().next()
}

/// Map a Slurm job state (`squeue %T` / `sacct State`) to a [`BatchState`].
pub fn parse_state(raw: &str) -> BatchState {
    // sacct prints e.g. "CANCELLED by 1000".
    let state = raw.split_whitespace().next().unwrap_or_default().trim_end_matches('+');
    match state {
        "PENDING" | "RUNNING" | "CONFIGURING" | "COMPLETING" | "SUSPENDED" | "REQUEUED"
        | "RESIZING" | "STAGE_OUT" | "SIGNALING" => BatchState::Active,
        "COMPLETED" => BatchState::Completed,
        "" => BatchState::Unknown,
        other => BatchState::Failed {
            reason: format!("job ended in state {other}"),
        },
    }
}
