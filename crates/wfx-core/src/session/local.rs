use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{OnceCell, mpsc};
use tracing::{debug, info, warn};
use wfx_model::{ExecutorSettings, SessionConfig};

use super::{Session, ShutdownHook};
use crate::report::TaskReport;

/// In-process [`Session`] backed by a [`SessionConfig`].
///
/// Reports are delivered through the channel returned by [`LocalSession::new`].
/// Hooks run once, newest first, on [`LocalSession::shutdown`].
pub struct LocalSession {
    config: SessionConfig,
    reports: mpsc::UnboundedSender<TaskReport>,
    // `None` once shutdown has begun.
    hooks: Mutex<Option<Vec<ShutdownHook>>>,
    shutdown: OnceCell<()>,
}

impl LocalSession {
    pub fn new(config: SessionConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<TaskReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            config,
            reports: tx,
            hooks: Mutex::new(Some(Vec::new())),
            shutdown: OnceCell::new(),
        });
        (session, rx)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.initialized()
    }

    fn lock_hooks(&self) -> MutexGuard<'_, Option<Vec<ShutdownHook>>> {
        match self.hooks.lock() {
            Ok(hooks) => hooks,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run every registered hook in reverse registration order.
    ///
    /// Concurrent callers wait for the same shutdown; later calls return immediately.
    pub async fn shutdown(&self) {
        self.shutdown
            .get_or_init(|| async {
                let hooks = self.lock_hooks().take().unwrap_or_default();
                info!(hooks = hooks.len(), "session shutting down");
                for hook in hooks.iter().rev() {
                    hook.run().await;
                }
                debug!("session shutdown complete");
            })
            .await;
    }
}

impl Session for LocalSession {
    fn executor_settings(&self, name: &str) -> Option<ExecutorSettings> {
        self.config.executor(name).cloned()
    }

    fn notify_task_complete(&self, report: TaskReport) {
        if self.reports.send(report).is_err() {
            debug!("report receiver dropped");
        }
    }

    fn on_shutdown(&self, hook: ShutdownHook) {
        if let Some(hooks) = self.lock_hooks().as_mut() {
            hooks.push(hook);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                debug!(hook = %hook.name(), "session already shut down, running hook now");
                rt.spawn(async move { hook.run().await });
            }
            Err(_) => warn!(hook = %hook.name(), "session already shut down and no runtime to run hook"),
        }
    }
}
