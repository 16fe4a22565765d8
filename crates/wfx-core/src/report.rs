//! Terminal notifications delivered to the session.
use std::{fmt, time::Duration};

use wfx_model::{TaskId, TaskStatus};

use crate::{handler::TaskHandle, metrics::TaskOutcome};

/// Failure taxonomy attached to non-successful reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The submission call failed; the task never started on the backend.
    Submission,
    /// Status checks kept failing, or failed with a non-transient error.
    Poll,
    /// The backend ran the task and reported it as failed.
    Execution,
    /// The task was cancelled, or dropped when its scheduler stopped.
    Aborted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Submission => "submission",
            FailureKind::Poll => "poll",
            FailureKind::Execution => "execution",
            FailureKind::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Aborted, reason)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// One-time report that a task reached a terminal status.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Handle of the finished task.
    pub handle: TaskHandle,
    /// Terminal status (`Completed`, `Failed` or `Aborted`).
    pub status: TaskStatus,
    /// Classified failure; `None` for completed tasks.
    pub failure: Option<Failure>,
    /// Whether the backend ever accepted the task.
    ///
    /// `false` for submission failures and for tasks aborted before submission,
    /// which lets a resume layer tell "failed before running" apart.
    pub started: bool,
    /// Time spent running on the backend (zero if it never started).
    pub run_time: Duration,
}

impl TaskReport {
    pub(crate) fn new(handle: TaskHandle, failure: Option<Failure>) -> Self {
        let status = match &failure {
            None => TaskStatus::Completed,
            Some(f) if f.kind == FailureKind::Aborted => TaskStatus::Aborted,
            Some(_) => TaskStatus::Failed,
        };
        Self {
            status,
            started: handle.has_started(),
            run_time: handle.run_time().unwrap_or_default(),
            handle,
            failure,
        }
    }

    pub fn id(&self) -> &TaskId {
        self.handle.id()
    }

    pub fn backend(&self) -> &'static str {
        self.handle.backend()
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    pub fn outcome(&self) -> TaskOutcome {
        match self.status {
            TaskStatus::Completed => TaskOutcome::Success,
            TaskStatus::Aborted => TaskOutcome::Aborted,
            _ => TaskOutcome::Failure,
        }
    }
}
