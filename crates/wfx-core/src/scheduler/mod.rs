//! Capacity-bounded polling scheduler.
//! - Owns the pending queue and the running set through a single loop task.
//! - Admits pending tasks in FIFO order up to `capacity`.
//! - Delegates the submission call to a [`SubmissionStrategy`].
//! - Delivers exactly one [`crate::TaskReport`] per task to the [`Session`].
mod config;
pub use config::{DEFAULT_DUMP_INTERVAL, DEFAULT_MAX_POLL_FAILURES, SchedulerConfig};

mod poll_loop;
use poll_loop::PollLoop;

#[cfg(test)]
mod tests;

use std::{
    fmt,
    sync::{
        Arc, Mutex, OnceLock, Weak,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
    error::CoreError,
    handler::{TaskHandle, TaskHandler},
    metrics::{MetricsBackend, MetricsHandle, NoOpMetrics},
    session::{Session, ShutdownHook},
    submit::{SubmissionMode, SubmissionStrategy},
};

pub(crate) enum Command {
    Schedule(TaskHandle),
    Stop,
}

/// Point-in-time queue sizes of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerSnapshot {
    /// Tasks waiting for admission (including ones not yet picked up by the loop).
    pub pending: usize,
    /// Tasks whose deferred submission has not returned yet.
    pub submitting: usize,
    pub running: usize,
    /// `0` means unbounded.
    pub capacity: usize,
}

impl fmt::Display for SchedulerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pending={} submitting={} running={} capacity={}",
            self.pending, self.submitting, self.running, self.capacity
        )?;
        if self.capacity == 0 {
            f.write_str(" (unbounded)")?;
        }
        Ok(())
    }
}

/// Queue sizes published by the loop for [`PollingScheduler::snapshot`].
#[derive(Default)]
pub(crate) struct LoopStats {
    /// Scheduled but not yet received by the loop.
    pub(crate) queued: AtomicUsize,
    pub(crate) pending: AtomicUsize,
    pub(crate) submitting: AtomicUsize,
    pub(crate) running: AtomicUsize,
}

/// State shared by the public handle and the loop task.
pub(crate) struct Core<S> {
    pub(crate) name: String,
    pub(crate) config: SchedulerConfig,
    pub(crate) session: Arc<dyn Session>,
    pub(crate) strategy: S,
    pub(crate) metrics: OnceLock<MetricsHandle>,
    pub(crate) stats: LoopStats,
    /// Cancelled when the loop has exited.
    pub(crate) finished: CancellationToken,
}

impl<S> Core<S> {
    pub(crate) fn metrics(&self) -> &dyn MetricsBackend {
        match self.metrics.get() {
            Some(m) => m.as_ref(),
            None => &NoOpMetrics,
        }
    }
}

struct Shared<S> {
    core: Arc<Core<S>>,
    commands: mpsc::UnboundedSender<Command>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    started: AtomicBool,
    closed: AtomicBool,
}

/// Polling scheduler over a [`SubmissionStrategy`].
///
/// Cheap to clone. The loop is spawned by [`PollingScheduler::start`] and keeps
/// running until [`PollingScheduler::stop`], the owning session shuts down, or
/// every handle to the scheduler is dropped.
pub struct PollingScheduler<S: SubmissionStrategy> {
    inner: Arc<Shared<S>>,
}

impl<S: SubmissionStrategy> Clone for PollingScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PollingScheduler<SubmissionMode> {
    /// Create a scheduler configured from the session's executor section `name`.
    ///
    /// Unset fields fall back to defaults: `capacity` 0 (unbounded), `pollInterval`
    /// to `default_poll_interval`. `parallelSubmit` selects pooled submission.
    pub fn create(
        session: Arc<dyn Session>,
        name: impl Into<String>,
        default_poll_interval: Duration,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        let settings = session.executor_settings(&name);
        let config = SchedulerConfig::resolve(settings.as_ref(), default_poll_interval)?;
        let strategy = SubmissionMode::from_parallel(config.parallel_submit, &name);
        Self::new(session, name, config, strategy)
    }
}

impl<S: SubmissionStrategy> PollingScheduler<S> {
    /// Build a scheduler and register its teardown with `session`.
    ///
    /// The strategy registers first so session shutdown (newest hook first)
    /// stops this scheduler before tearing down its submission workers.
    pub fn new(
        session: Arc<dyn Session>,
        name: impl Into<String>,
        config: SchedulerConfig,
        strategy: S,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();

        strategy.register_shutdown(session.as_ref());

        let inner = Arc::new(Shared {
            core: Arc::new(Core {
                name: name.clone(),
                config,
                session: Arc::clone(&session),
                strategy,
                metrics: OnceLock::new(),
                stats: LoopStats::default(),
                finished: CancellationToken::new(),
            }),
            commands: tx,
            receiver: Mutex::new(Some(rx)),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let weak: Weak<Shared<S>> = Arc::downgrade(&inner);
        session.on_shutdown(ShutdownHook::new(format!("scheduler:{name}"), move || async move {
            if let Some(inner) = weak.upgrade() {
                PollingScheduler { inner }.stop().await;
            }
        }));

        debug!(scheduler = %name, strategy = inner.core.strategy.name(), "scheduler created");
        Ok(Self { inner })
    }

    /// Attach a metrics backend. Only the first call has an effect.
    pub fn with_metrics(self, metrics: MetricsHandle) -> Self {
        let _ = self.inner.core.metrics.set(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.core.name
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.core.config
    }

    pub fn strategy(&self) -> &S {
        &self.inner.core.strategy
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Enqueue a task for admission. Never blocks.
    ///
    /// The returned handle observes the task status and can [`TaskHandle::abort`] it.
    pub fn schedule(&self, handler: Arc<dyn TaskHandler>) -> Result<TaskHandle, CoreError> {
        if self.is_closed() {
            return Err(CoreError::SchedulerClosed(self.name().to_string()));
        }
        let task = TaskHandle::new(handler);
        let stats = &self.inner.core.stats;
        stats.queued.fetch_add(1, Ordering::AcqRel);
        if self.inner.commands.send(Command::Schedule(task.clone())).is_err() {
            stats.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(CoreError::SchedulerClosed(self.name().to_string()));
        }
        debug!(scheduler = %self.name(), task = %task.id(), backend = task.backend(), "task scheduled");
        Ok(task)
    }

    /// Spawn the poll loop. Returns immediately.
    pub fn start(&self) -> Result<(), CoreError> {
        if self.is_closed() {
            return Err(CoreError::SchedulerClosed(self.name().to_string()));
        }
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(CoreError::AlreadyStarted(self.name().to_string()));
        }
        self.spawn_loop();
        info!(
            scheduler = %self.name(),
            strategy = self.inner.core.strategy.name(),
            capacity = self.config().capacity,
            poll_interval_ms = self.config().poll_interval.as_millis() as u64,
            "scheduler started"
        );
        Ok(())
    }

    /// Stop admitting tasks and wait for running ones to finish.
    ///
    /// Pending tasks are reported as aborted. Safe to call repeatedly and
    /// concurrently; every caller returns once the loop has exited.
    #[instrument(level = "debug", skip(self), fields(scheduler = %self.name()))]
    pub async fn stop(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            if !self.inner.started.swap(true, Ordering::AcqRel) {
                // Never started: run the loop anyway so queued tasks get reported.
                self.spawn_loop();
            }
            let _ = self.inner.commands.send(Command::Stop);
            debug!("stop requested");
        }
        self.inner.core.finished.cancelled().await;
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let stats = &self.inner.core.stats;
        SchedulerSnapshot {
            pending: stats.queued.load(Ordering::Acquire) + stats.pending.load(Ordering::Acquire),
            submitting: stats.submitting.load(Ordering::Acquire),
            running: stats.running.load(Ordering::Acquire),
            capacity: self.inner.core.config.capacity,
        }
    }

    fn spawn_loop(&self) {
        let receiver = match self.inner.receiver.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(commands) = receiver {
            let core = Arc::clone(&self.inner.core);
            tokio::spawn(PollLoop::new(core, commands).run());
        }
    }
}

impl<S: SubmissionStrategy> fmt::Debug for PollingScheduler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("name", &self.name())
            .field("strategy", &self.inner.core.strategy.name())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
