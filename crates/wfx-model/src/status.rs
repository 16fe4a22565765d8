use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Lifecycle status of a task handed to a scheduler.
///
/// ```text
/// New ──► Submitting ──► Running ──► Completed
///   │          │            │    └──► Failed
///   │          └──► Failed  │
///   └──────────┴────────────┴──► Aborted
/// ```
///
/// `Completed`, `Failed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum TaskStatus {
    /// Created and waiting in the pending queue.
    New = 0,
    /// Popped from the pending queue; submission call in flight.
    Submitting = 1,
    /// Accepted by the backend and polled every cycle.
    Running = 2,
    /// Finished successfully.
    Completed = 3,
    /// Submission, polling or the task itself failed.
    Failed = 4,
    /// Cancelled on request.
    Aborted = 5,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Aborted
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub const fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (New, Submitting)
                | (New, Aborted)
                | (Submitting, Running)
                | (Submitting, Failed)
                | (Submitting, Aborted)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Aborted)
        )
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`TaskStatus::as_u8`].
    pub const fn from_u8(raw: u8) -> Option<TaskStatus> {
        match raw {
            0 => Some(TaskStatus::New),
            1 => Some(TaskStatus::Submitting),
            2 => Some(TaskStatus::Running),
            3 => Some(TaskStatus::Completed),
            4 => Some(TaskStatus::Failed),
            5 => Some(TaskStatus::Aborted),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::New => "new",
            TaskStatus::Submitting => "submitting",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(TaskStatus::New),
            "submitting" => Ok(TaskStatus::Submitting),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "aborted" => Ok(TaskStatus::Aborted),
            other => Err(ModelError::UnknownStatus(other.to_string())),
        }
    }
}
