use std::{fmt, path::PathBuf};

use tracing::trace;
use wfx_model::{Env, TaskResources};

use crate::error::SpecError;

/// Process launch parameters of a local task.
#[derive(Debug, Clone)]
pub struct LocalProcessConfig {
    /// Program to execute (e.g. `"ls"`, `"/usr/bin/python"`).
    pub command: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: Env,
    /// Working directory; inherits the parent's when `None`.
    pub cwd: Option<PathBuf>,
    /// Treat a non-zero exit code as a task failure.
    pub fail_on_non_zero: bool,
}

impl LocalProcessConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Env::new(),
            cwd: None,
            fail_on_non_zero: true,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.set(name, value);
        self
    }

    pub fn allow_non_zero(mut self) -> Self {
        self.fail_on_non_zero = false;
        self
    }

    /// First command element is the program, the rest are its arguments.
    /// Image, mounts and resource amounts have no local meaning and are ignored.
    pub fn from_resources(res: &TaskResources) -> Result<Self, SpecError> {
        let (program, args) = res.command.split_first().ok_or(SpecError::MissingCommand)?;
        let mut cfg = Self::new(program.clone()).args(args.iter().cloned());
        cfg.env = res.env.clone();
        cfg.cwd = res.work_dir.as_ref().map(PathBuf::from);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rules:
    /// - `command` is not empty or whitespace-only.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.command.trim().is_empty() {
            return Err(SpecError::MissingCommand);
        }
        Ok(())
    }

    pub fn trace_state(&self, task: &str) {
        trace!(
            task,
            command = %self.command,
            args = ?self.args,
            cwd = ?self.cwd,
            env_len = self.env.len(),
            fail_on_non_zero = self.fail_on_non_zero,
            "local process config resolved"
        );
    }
}

impl fmt::Display for LocalProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LocalProcess(cmd='{}', args={}, env={}, cwd={:?})",
            self.command,
            self.args.len(),
            self.env.len(),
            self.cwd,
        )
    }
}
