use std::{
    collections::VecDeque,
    sync::{Arc, atomic::Ordering},
};

use tokio::{
    sync::mpsc,
    time::{Instant, Interval, MissedTickBehavior, interval_at},
};
use tracing::{debug, info, warn};
use wfx_model::TaskStatus;

use super::{Command, Core, SchedulerSnapshot};
use crate::{
    handler::{PollStatus, TaskHandle},
    report::{Failure, FailureKind, TaskReport},
    submit::{Dispatch, SubmissionStrategy, SubmitOutcome, SubmitSink},
};

const STOPPED: &str = "scheduler stopped";
const ABORTED: &str = "aborted by request";

struct Running {
    task: TaskHandle,
    /// Consecutive transient status-check failures.
    poll_failures: u32,
}

/// The single mutator of the pending queue and the running set.
pub(super) struct PollLoop<S> {
    core: Arc<Core<S>>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    outcomes_tx: SubmitSink,
    outcomes_rx: mpsc::UnboundedReceiver<SubmitOutcome>,
    pending: VecDeque<TaskHandle>,
    running: Vec<Running>,
    in_flight: usize,
    draining: bool,
}

impl<S: SubmissionStrategy> PollLoop<S> {
    pub(super) fn new(core: Arc<Core<S>>, commands: mpsc::UnboundedReceiver<Command>) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            core,
            commands,
            commands_open: true,
            outcomes_tx,
            outcomes_rx,
            pending: VecDeque::new(),
            running: Vec::new(),
            in_flight: 0,
            draining: false,
        }
    }

    pub(super) async fn run(mut self) {
        let finished = self.core.finished.clone();
        let _finished = finished.drop_guard();

        let period = self.core.config.poll_interval;
        let mut poll = tokio::time::interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut dump = self.core.config.dump_interval.map(|every| {
            let mut dump = interval_at(Instant::now() + every, every);
            dump.set_missed_tick_behavior(MissedTickBehavior::Delay);
            dump
        });

        loop {
            if self.draining && self.running.is_empty() && self.in_flight == 0 {
                break;
            }

            tokio::select! {
                biased;

                cmd = self.commands.recv(), if self.commands_open => match cmd {
                    Some(Command::Schedule(task)) => self.on_schedule(task),
                    Some(Command::Stop) => self.begin_drain(),
                    None => {
                        self.commands_open = false;
                        self.begin_drain();
                    }
                },
                Some(outcome) = self.outcomes_rx.recv() => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    self.on_submitted(outcome).await;
                    self.publish();
                }
                _ = poll.tick() => self.poll_cycle().await,
                _ = tick(&mut dump) => self.dump(),
            }
        }

        // Late schedules that raced with stop still get their report.
        self.commands.close();
        while let Ok(cmd) = self.commands.try_recv() {
            if let Command::Schedule(task) = cmd {
                self.on_schedule(task);
            }
        }

        self.core.strategy.shutdown().await;
        self.publish();
        info!(scheduler = %self.core.name, "scheduler stopped");
    }

    fn on_schedule(&mut self, task: TaskHandle) {
        self.core.stats.queued.fetch_sub(1, Ordering::AcqRel);
        if self.draining {
            task.abort();
            self.report(task, Some(Failure::aborted(STOPPED)));
        } else {
            self.pending.push_back(task);
        }
        self.publish();
    }

    fn begin_drain(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        info!(
            scheduler = %self.core.name,
            pending = self.pending.len(),
            running = self.running.len(),
            submitting = self.in_flight,
            "scheduler draining"
        );
        while let Some(task) = self.pending.pop_front() {
            task.abort();
            self.report(task, Some(Failure::aborted(STOPPED)));
        }
        self.publish();
    }

    /// Retire finished tasks, then admit pending ones up to capacity.
    async fn poll_cycle(&mut self) {
        self.sweep_aborted_pending();
        self.poll_running().await;
        if !self.draining {
            self.admit().await;
        }
        self.publish();
        self.core.metrics().record_queue_state(
            &self.core.name,
            self.pending.len(),
            self.running.len(),
        );
    }

    fn sweep_aborted_pending(&mut self) {
        let (aborted, kept): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|t| t.status() == TaskStatus::Aborted);
        self.pending = kept.into();
        for task in aborted {
            self.report(task, Some(Failure::aborted(ABORTED)));
        }
    }

    async fn poll_running(&mut self) {
        let max_failures = self.core.config.max_poll_failures;
        let running = std::mem::take(&mut self.running);

        for mut entry in running {
            let task = entry.task.clone();
            if task.status() == TaskStatus::Aborted {
                self.kill(&task).await;
                self.report(task, Some(Failure::aborted(ABORTED)));
                continue;
            }

            match task.check_status_guarded().await {
                Ok(PollStatus::Running) => {
                    entry.poll_failures = 0;
                    self.running.push(entry);
                }
                Ok(PollStatus::Completed) => self.finish(task, None),
                Ok(PollStatus::Failed { reason }) => {
                    self.finish(task, Some(Failure::new(FailureKind::Execution, reason)))
                }
                Err(e) if e.is_transient() => {
                    entry.poll_failures += 1;
                    if entry.poll_failures >= max_failures {
                        warn!(
                            scheduler = %self.core.name,
                            task = %task.id(),
                            failures = entry.poll_failures,
                            error = %e,
                            "status check keeps failing, giving up"
                        );
                        self.kill(&task).await;
                        let reason = format!("{} consecutive status check failures, last: {e}", entry.poll_failures);
                        self.finish(task, Some(Failure::new(FailureKind::Poll, reason)));
                    } else {
                        debug!(
                            scheduler = %self.core.name,
                            task = %task.id(),
                            failures = entry.poll_failures,
                            error = %e,
                            "transient status check failure, retrying next cycle"
                        );
                        self.running.push(entry);
                    }
                }
                Err(e) => {
                    warn!(scheduler = %self.core.name, task = %task.id(), error = %e, "status check failed");
                    self.kill(&task).await;
                    self.finish(task, Some(Failure::new(FailureKind::Poll, e.to_string())));
                }
            }
        }
    }

    fn has_room(&self) -> bool {
        let capacity = self.core.config.capacity;
        capacity == 0 || self.running.len() + self.in_flight < capacity
    }

    async fn admit(&mut self) {
        while self.has_room() {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            if !task.transition(TaskStatus::New, TaskStatus::Submitting) {
                // Aborted while waiting.
                self.report(task, Some(Failure::aborted(ABORTED)));
                continue;
            }
            debug!(scheduler = %self.core.name, task = %task.id(), "admitting task");

            match self.core.strategy.execute_submission(task, &self.outcomes_tx).await {
                Dispatch::Done(outcome) => self.on_submitted(outcome).await,
                Dispatch::Deferred => self.in_flight += 1,
            }
        }
    }

    async fn on_submitted(&mut self, outcome: SubmitOutcome) {
        let SubmitOutcome { task, result } = outcome;
        match result {
            Ok(()) => {
                if task.transition(TaskStatus::Submitting, TaskStatus::Running) {
                    debug!(scheduler = %self.core.name, task = %task.id(), "task running");
                    self.core.metrics().record_task_submitted(task.backend());
                    self.running.push(Running {
                        task,
                        poll_failures: 0,
                    });
                } else {
                    // Aborted while the submission was in flight.
                    self.kill(&task).await;
                    self.report(task, Some(Failure::aborted(ABORTED)));
                }
            }
            Err(e) => {
                warn!(scheduler = %self.core.name, task = %task.id(), error = %e, "submission failed");
                self.core.metrics().record_submission_error(task.backend(), e.kind());
                if task.transition(TaskStatus::Submitting, TaskStatus::Failed) {
                    self.report(task, Some(Failure::new(FailureKind::Submission, e.to_string())));
                } else {
                    self.report(task, Some(Failure::aborted(ABORTED)));
                }
            }
        }
    }

    /// Move a running task to its terminal status and report it.
    fn finish(&mut self, task: TaskHandle, failure: Option<Failure>) {
        let target = if failure.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };
        if task.transition(TaskStatus::Running, target) {
            self.report(task, failure);
        } else {
            self.report(task, Some(Failure::aborted(ABORTED)));
        }
    }

    async fn kill(&self, task: &TaskHandle) {
        if let Err(e) = task.kill_guarded().await {
            warn!(scheduler = %self.core.name, task = %task.id(), error = %e, "kill failed");
        }
    }

    fn report(&self, task: TaskHandle, failure: Option<Failure>) {
        if !task.claim_report() {
            return;
        }
        let report = TaskReport::new(task, failure);
        match &report.failure {
            None => info!(
                scheduler = %self.core.name,
                task = %report.id(),
                run_time_ms = report.run_time.as_millis() as u64,
                "task completed"
            ),
            Some(f) => info!(
                scheduler = %self.core.name,
                task = %report.id(),
                kind = %f.kind,
                reason = %f.reason,
                started = report.started,
                "task {}", report.status
            ),
        }
        self.core.metrics().record_task_completed(
            report.backend(),
            report.outcome(),
            report.run_time.as_millis() as u64,
        );
        self.core.session.notify_task_complete(report);
    }

    fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            pending: self.pending.len(),
            submitting: self.in_flight,
            running: self.running.len(),
            capacity: self.core.config.capacity,
        }
    }

    fn publish(&self) {
        let stats = &self.core.stats;
        stats.pending.store(self.pending.len(), Ordering::Release);
        stats.submitting.store(self.in_flight, Ordering::Release);
        stats.running.store(self.running.len(), Ordering::Release);
    }

    fn dump(&self) {
        info!(scheduler = %self.core.name, state = %self.snapshot(), "scheduler state");
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
