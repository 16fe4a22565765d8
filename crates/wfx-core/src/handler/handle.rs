use std::{
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;
use tracing::trace;
use wfx_model::{TaskId, TaskStatus};

use super::{HandlerError, PollStatus, TaskHandler, guarded};

/// Scheduler-side view of a handler: the handler plus its lifecycle status.
///
/// Cheap to clone; every clone observes the same status. The scheduler loop drives
/// all transitions except [`TaskHandle::abort`], which may be called from anywhere.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<Inner>,
}

struct Inner {
    handler: Arc<dyn TaskHandler>,
    status: AtomicU8,
    reported: AtomicBool,
    started_at: OnceLock<Instant>,
}

impl TaskHandle {
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler,
                status: AtomicU8::new(TaskStatus::New.as_u8()),
                reported: AtomicBool::new(false),
                started_at: OnceLock::new(),
            }),
        }
    }

    pub fn id(&self) -> &TaskId {
        self.inner.handler.id()
    }

    pub fn backend(&self) -> &'static str {
        self.inner.handler.backend()
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.inner.status.load(Ordering::Acquire)).unwrap_or(TaskStatus::Failed)
    }

    /// Time the backend has been running the task, if it ever started.
    pub fn run_time(&self) -> Option<Duration> {
        self.inner.started_at.get().map(|t| t.elapsed())
    }

    pub fn has_started(&self) -> bool {
        self.inner.started_at.get().is_some()
    }

    /// Request cancellation.
    ///
    /// Returns `true` only for the call that actually moved the task to
    /// [`TaskStatus::Aborted`]; repeated or late calls return `false`.
    /// The scheduler notices the new status on its next cycle, kills the
    /// backend work if needed and reports the task.
    pub fn abort(&self) -> bool {
        let mut current = self.inner.status.load(Ordering::Acquire);
        loop {
            let Some(status) = TaskStatus::from_u8(current) else {
                return false;
            };
            if !status.can_transition_to(TaskStatus::Aborted) {
                return false;
            }
            match self.inner.status.compare_exchange(
                current,
                TaskStatus::Aborted.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    trace!(task = %self.id(), from = %status, "abort requested");
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Move from `from` to `to` if the status is still `from` and the state machine allows it.
    pub(crate) fn transition(&self, from: TaskStatus, to: TaskStatus) -> bool {
        if !from.can_transition_to(to) {
            return false;
        }
        let moved = self
            .inner
            .status
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if moved && to == TaskStatus::Running {
            let _ = self.inner.started_at.set(Instant::now());
        }
        moved
    }

    /// Claim the single terminal notification of this task.
    pub(crate) fn claim_report(&self) -> bool {
        !self.inner.reported.swap(true, Ordering::AcqRel)
    }

    pub(crate) async fn submit_guarded(&self) -> Result<(), HandlerError> {
        let handler = Arc::clone(&self.inner.handler);
        guarded(async move { handler.submit().await }).await
    }

    pub(crate) async fn check_status_guarded(&self) -> Result<PollStatus, HandlerError> {
        let handler = Arc::clone(&self.inner.handler);
        guarded(async move { handler.check_status().await }).await
    }

    pub(crate) async fn kill_guarded(&self) -> Result<(), HandlerError> {
        let handler = Arc::clone(&self.inner.handler);
        guarded(async move { handler.kill().await }).await
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", self.id())
            .field("backend", &self.backend())
            .field("status", &self.status())
            .finish()
    }
}
