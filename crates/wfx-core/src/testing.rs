//! Scripted handlers for scheduler tests.
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use wfx_model::TaskId;

use crate::handler::{HandlerError, PollStatus, TaskHandler};

/// Ordered record of `submit:<id>` and `done:<id>` events.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn contains(&self, entry: &str) -> bool {
        self.0.lock().unwrap().iter().any(|e| e == entry)
    }
}

/// Live count of tasks the backend considers running, with its high-water mark.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    live: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

impl Probe {
    fn up(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn down(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedHandler {
    id: TaskId,
    journal: Journal,
    probe: Probe,
    submit_error: Option<HandlerError>,
    submit_delay: Option<Duration>,
    panic_on_submit: bool,
    /// Completes on this status check; `0` never completes.
    complete_after: u32,
    status_errors: Mutex<VecDeque<HandlerError>>,
    checks: AtomicU32,
    /// Checks that did not return a scripted error.
    answered: AtomicU32,
    kills: AtomicU32,
}

impl ScriptedHandler {
    pub(crate) fn new(id: &str, journal: &Journal) -> Self {
        Self {
            id: TaskId::from(id),
            journal: journal.clone(),
            probe: Probe::default(),
            submit_error: None,
            submit_delay: None,
            panic_on_submit: false,
            complete_after: 1,
            status_errors: Mutex::new(VecDeque::new()),
            checks: AtomicU32::new(0),
            answered: AtomicU32::new(0),
            kills: AtomicU32::new(0),
        }
    }

    pub(crate) fn probe(mut self, probe: &Probe) -> Self {
        self.probe = probe.clone();
        self
    }

    pub(crate) fn complete_after(mut self, checks: u32) -> Self {
        self.complete_after = checks;
        self
    }

    pub(crate) fn never_finish(self) -> Self {
        self.complete_after(0)
    }

    pub(crate) fn fail_submit(mut self, err: HandlerError) -> Self {
        self.submit_error = Some(err);
        self
    }

    pub(crate) fn submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    pub(crate) fn panic_on_submit(mut self) -> Self {
        self.panic_on_submit = true;
        self
    }

    /// Errors returned by the first status checks, in order.
    pub(crate) fn status_errors(self, errors: impl IntoIterator<Item = HandlerError>) -> Self {
        self.status_errors.lock().unwrap().extend(errors);
        self
    }

    pub(crate) fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    pub(crate) fn kills(&self) -> u32 {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandler for ScriptedHandler {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn backend(&self) -> &'static str {
        "scripted"
    }

    async fn submit(&self) -> Result<(), HandlerError> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on_submit {
            panic!("submit of {} blew up", self.id);
        }
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        self.journal.push(format!("submit:{}", self.id));
        self.probe.up();
        Ok(())
    }

    async fn check_status(&self) -> Result<PollStatus, HandlerError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.status_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        let answered = self.answered.fetch_add(1, Ordering::SeqCst) + 1;
        if self.complete_after != 0 && answered >= self.complete_after {
            self.journal.push(format!("done:{}", self.id));
            self.probe.down();
            return Ok(PollStatus::Completed);
        }
        Ok(PollStatus::Running)
    }

    async fn kill(&self) -> Result<(), HandlerError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
