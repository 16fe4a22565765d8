//! Task handler abstraction: one live unit of work against a backend.
//!
//! Backends (local processes, batch schedulers, container orchestrators) implement
//! [`TaskHandler`]; the scheduler only talks to that capability set.
mod error;
pub use error::HandlerError;

mod handle;
pub use handle::TaskHandle;

use std::{any::Any, future::Future};

use async_trait::async_trait;
use wfx_model::TaskId;

/// Backend status observed by a single status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Accepted by the backend and not finished yet (queued counts as running).
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed { reason: String },
}

/// Capability set implemented once per backend.
///
/// Implementations must be cheap to poll: [`TaskHandler::check_status`] runs on the
/// scheduler loop and a call that never returns stalls every other task of that scheduler.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Unique task identifier.
    fn id(&self) -> &TaskId;

    /// Backend name used in logs and metrics (e.g. `"local"`, `"k8s"`).
    fn backend(&self) -> &'static str;

    /// Hand the task to the backend.
    async fn submit(&self) -> Result<(), HandlerError>;

    /// Non-blocking status check.
    async fn check_status(&self) -> Result<PollStatus, HandlerError>;

    /// Ask the backend to stop the task.
    async fn kill(&self) -> Result<(), HandlerError>;
}

/// Run a handler call on its own task so a panic is turned into [`HandlerError::Panicked`].
pub(crate) async fn guarded<T, F>(fut: F) -> Result<T, HandlerError>
where
    F: Future<Output = Result<T, HandlerError>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(res) => res,
        Err(e) if e.is_panic() => Err(HandlerError::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(HandlerError::Fatal(format!("handler call cancelled: {e}"))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
