use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::{process::Command, sync::Mutex};
use tracing::{debug, instrument};
use wfx_core::{HandlerError, PollStatus, TaskHandler};
use wfx_model::{TaskId, TaskResources};

use super::LocalProcessConfig;
use crate::{
    BACKEND_LOCAL,
    error::{ExecError, SpecError},
    output::{LogConfig, Stream, spawn_line_logger},
};

/// Runs a task as a child process of this one.
///
/// The child is killed when the handler is dropped.
pub struct LocalProcessHandler {
    id: TaskId,
    config: LocalProcessConfig,
    log: LogConfig,
    child: Mutex<Option<tokio::process::Child>>,
}

impl LocalProcessHandler {
    pub fn new(id: TaskId, config: LocalProcessConfig) -> Self {
        Self {
            id,
            config,
            log: LogConfig::default(),
            child: Mutex::new(None),
        }
    }

    pub fn from_resources(res: &TaskResources) -> Result<Self, SpecError> {
        Ok(Self::new(TaskId::new(res.name.clone()), LocalProcessConfig::from_resources(res)?))
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        for var in self.config.env.iter() {
            cmd.env(&var.name, &var.value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn classify(&self, status: ExitStatus) -> PollStatus {
        if status.success() || !self.config.fail_on_non_zero {
            return PollStatus::Completed;
        }
        let reason = match status.code() {
            Some(code) => format!("process exited with non-zero code: {code}"),
            None => "process terminated by signal".to_string(),
        };
        PollStatus::Failed { reason }
    }
}

#[async_trait]
impl TaskHandler for LocalProcessHandler {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn backend(&self) -> &'static str {
        BACKEND_LOCAL
    }

    #[instrument(level = "debug", skip(self), fields(task = %self.id))]
    async fn submit(&self) -> Result<(), HandlerError> {
        self.config.validate()?;
        self.config.trace_state(self.id.as_str());

        let mut slot = self.child.lock().await;
        if slot.is_some() {
            return Err(HandlerError::Rejected("process already started".into()));
        }

        let mut child = self.command().spawn().map_err(ExecError::from)?;
        if let Some(out) = child.stdout.take() {
            spawn_line_logger(out, self.id.clone(), Stream::Stdout, self.log);
        }
        if let Some(err) = child.stderr.take() {
            spawn_line_logger(err, self.id.clone(), Stream::Stderr, self.log);
        }
        debug!(pid = ?child.id(), "process spawned");
        *slot = Some(child);
        Ok(())
    }

    async fn check_status(&self) -> Result<PollStatus, HandlerError> {
        let mut slot = self.child.lock().await;
        let child = slot.as_mut().ok_or(ExecError::NotSubmitted)?;
        match child.try_wait()? {
            Some(status) => Ok(self.classify(status)),
            None => Ok(PollStatus::Running),
        }
    }

    async fn kill(&self) -> Result<(), HandlerError> {
        let mut slot = self.child.lock().await;
        let Some(child) = slot.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        debug!(task = %self.id, "killing process");
        child.start_kill()?;
        Ok(())
    }
}
