//! Session contract: configuration source, report sink and shutdown owner.
mod hook;
pub use hook::ShutdownHook;

mod local;
pub use local::LocalSession;

use wfx_model::ExecutorSettings;

use crate::report::TaskReport;

/// Environment a scheduler runs in.
///
/// The session supplies per-executor settings, receives every terminal report,
/// and sequences process shutdown through registered [`ShutdownHook`]s.
pub trait Session: Send + Sync + 'static {
    /// Settings registered for the executor `name`, if any.
    fn executor_settings(&self, name: &str) -> Option<ExecutorSettings>;

    /// Deliver the terminal report of a task. Called exactly once per task.
    fn notify_task_complete(&self, report: TaskReport);

    /// Register a teardown callback run when the session shuts down.
    fn on_shutdown(&self, hook: ShutdownHook);
}
