use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{sync::mpsc, time::Instant};
use wfx_model::{ExecutorSettings, SessionConfig, TaskStatus};

use super::*;
use crate::{
    handler::HandlerError,
    report::{FailureKind, TaskReport},
    session::LocalSession,
    submit::{InlineSubmission, PooledSubmission},
    testing::{Journal, Probe, ScriptedHandler},
};

const POLL: Duration = Duration::from_millis(100);

fn session() -> (Arc<LocalSession>, mpsc::UnboundedReceiver<TaskReport>) {
    LocalSession::new(SessionConfig::default())
}

fn inline(session: &Arc<LocalSession>, capacity: usize) -> PollingScheduler<InlineSubmission> {
    let config = SchedulerConfig::new(POLL).with_capacity(capacity);
    PollingScheduler::new(session.clone(), "test", config, InlineSubmission).unwrap()
}

fn pooled(session: &Arc<LocalSession>, capacity: usize) -> PollingScheduler<PooledSubmission> {
    let config = SchedulerConfig::new(POLL).with_capacity(capacity);
    PollingScheduler::new(session.clone(), "test", config, PooledSubmission::new("test")).unwrap()
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<TaskReport>, n: usize) -> Vec<TaskReport> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let report = tokio::time::timeout(Duration::from_secs(120), rx.recv())
            .await
            .expect("report in time")
            .expect("session alive");
        out.push(report);
    }
    out
}

fn by_id(reports: Vec<TaskReport>) -> HashMap<String, TaskReport> {
    let mut map = HashMap::new();
    for r in reports {
        let id = r.id().to_string();
        assert!(map.insert(id.clone(), r).is_none(), "{id} reported twice");
    }
    map
}

#[tokio::test(start_paused = true)]
async fn capacity_two_admits_in_fifo_waves() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 2);

    for i in 1..=5 {
        let h = ScriptedHandler::new(&format!("h{i}"), &journal).complete_after(1);
        sched.schedule(Arc::new(h)).unwrap();
    }
    sched.start().unwrap();

    let reports = collect(&mut rx, 5).await;
    sched.stop().await;

    let ids: Vec<_> = reports.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, ["h1", "h2", "h3", "h4", "h5"]);
    assert!(reports.iter().all(|r| r.is_success() && r.started));
    assert_eq!(
        journal.entries(),
        [
            "submit:h1", "submit:h2", "done:h1", "done:h2", "submit:h3", "submit:h4", "done:h3",
            "done:h4", "submit:h5", "done:h5",
        ]
    );
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn running_set_never_exceeds_capacity() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let probe = Probe::default();
    let sched = inline(&session, 3);
    sched.start().unwrap();

    for i in 0..10u32 {
        let h = ScriptedHandler::new(&format!("t{i}"), &journal)
            .probe(&probe)
            .complete_after(i % 4 + 1);
        sched.schedule(Arc::new(h)).unwrap();
    }

    let reports = by_id(collect(&mut rx, 10).await);
    sched.stop().await;

    assert_eq!(reports.len(), 10);
    assert_eq!(probe.max(), 3);
    assert_eq!(probe.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_capacity_admits_everything() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let probe = Probe::default();
    let sched = inline(&session, 0);

    for i in 0..8 {
        let h = ScriptedHandler::new(&format!("t{i}"), &journal)
            .probe(&probe)
            .complete_after(2);
        sched.schedule(Arc::new(h)).unwrap();
    }
    sched.start().unwrap();

    collect(&mut rx, 8).await;
    sched.stop().await;
    assert_eq!(probe.max(), 8);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_is_reported_once_and_never_runs() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let probe = Probe::default();
    let sched = inline(&session, 1);

    let h1 = ScriptedHandler::new("h1", &journal)
        .probe(&probe)
        .fail_submit(HandlerError::BackendUnavailable("api down".into()));
    let h2 = ScriptedHandler::new("h2", &journal).probe(&probe);
    let t1 = sched.schedule(Arc::new(h1)).unwrap();
    sched.schedule(Arc::new(h2)).unwrap();
    sched.start().unwrap();

    let reports = by_id(collect(&mut rx, 2).await);
    sched.stop().await;

    let r1 = &reports["h1"];
    assert_eq!(r1.status, TaskStatus::Failed);
    assert_eq!(r1.failure_kind(), Some(FailureKind::Submission));
    assert!(!r1.started);
    assert!(r1.failure.as_ref().unwrap().reason.contains("api down"));
    assert_eq!(t1.status(), TaskStatus::Failed);
    assert!(!journal.contains("submit:h1"));

    assert!(reports["h2"].is_success());
    assert_eq!(probe.max(), 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn transient_poll_errors_are_retried() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 0);

    let h = Arc::new(
        ScriptedHandler::new("h1", &journal)
            .status_errors([
                HandlerError::Transient("timeout".into()),
                HandlerError::BackendUnavailable("503".into()),
            ])
            .complete_after(1),
    );
    sched.schedule(h.clone()).unwrap();
    sched.start().unwrap();

    let report = collect(&mut rx, 1).await.remove(0);
    sched.stop().await;

    assert!(report.is_success());
    assert_eq!(h.checks(), 3);
    assert_eq!(h.kills(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_poll_errors_escalate() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 0);

    let h = Arc::new(
        ScriptedHandler::new("h1", &journal)
            .status_errors((0..5).map(|_| HandlerError::Io("connection reset".into())))
            .never_finish(),
    );
    sched.schedule(h.clone()).unwrap();
    sched.start().unwrap();

    let report = collect(&mut rx, 1).await.remove(0);
    sched.stop().await;

    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.failure_kind(), Some(FailureKind::Poll));
    assert!(report.started);
    assert_eq!(h.checks(), DEFAULT_MAX_POLL_FAILURES);
    assert_eq!(h.kills(), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_poll_error_fails_immediately() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 0);

    let h = Arc::new(
        ScriptedHandler::new("h1", &journal)
            .status_errors([HandlerError::Fatal("job vanished".into())])
            .never_finish(),
    );
    sched.schedule(h.clone()).unwrap();
    sched.start().unwrap();

    let report = collect(&mut rx, 1).await.remove(0);
    sched.stop().await;

    assert_eq!(report.failure_kind(), Some(FailureKind::Poll));
    assert!(report.failure.unwrap().reason.contains("job vanished"));
    assert_eq!(h.checks(), 1);
    assert_eq!(h.kills(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_scheduler_rejects_work() {
    let (session, _rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 0);
    sched.stop().await;

    let err = sched
        .schedule(Arc::new(ScriptedHandler::new("late", &journal)))
        .unwrap_err();
    assert!(matches!(err, CoreError::SchedulerClosed(name) if name == "test"));
    assert!(matches!(sched.start(), Err(CoreError::SchedulerClosed(_))));
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected() {
    let (session, _rx) = session();
    let sched = inline(&session, 0);
    sched.start().unwrap();
    assert!(matches!(sched.start(), Err(CoreError::AlreadyStarted(_))));
    sched.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_reports_pending_as_aborted_and_lets_running_finish() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 1);

    sched
        .schedule(Arc::new(ScriptedHandler::new("h1", &journal).complete_after(2)))
        .unwrap();
    for id in ["h2", "h3"] {
        sched.schedule(Arc::new(ScriptedHandler::new(id, &journal))).unwrap();
    }
    sched.start().unwrap();
    tokio::time::sleep(POLL / 2).await;
    assert!(journal.contains("submit:h1"));

    sched.stop().await;
    let reports = by_id(collect(&mut rx, 3).await);

    assert!(reports["h1"].is_success());
    for id in ["h2", "h3"] {
        let r = &reports[id];
        assert_eq!(r.status, TaskStatus::Aborted);
        assert!(!r.started);
        assert_eq!(r.failure.as_ref().unwrap().reason, "scheduler stopped");
        assert!(!journal.contains(&format!("submit:{id}")));
    }
    assert_eq!(sched.snapshot(), SchedulerSnapshot { capacity: 1, ..Default::default() });
}

#[tokio::test(start_paused = true)]
async fn aborting_running_task_kills_it() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 0);

    let h = Arc::new(ScriptedHandler::new("h1", &journal).never_finish());
    let task = sched.schedule(h.clone()).unwrap();
    sched.start().unwrap();
    tokio::time::sleep(POLL * 2).await;
    assert_eq!(task.status(), TaskStatus::Running);

    assert!(task.abort());
    assert!(!task.abort());

    let report = collect(&mut rx, 1).await.remove(0);
    assert_eq!(report.status, TaskStatus::Aborted);
    assert_eq!(report.failure_kind(), Some(FailureKind::Aborted));
    assert!(report.started);
    assert_eq!(h.kills(), 1);

    sched.stop().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn aborted_pending_task_is_never_submitted() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 1);

    sched
        .schedule(Arc::new(ScriptedHandler::new("h1", &journal).complete_after(3)))
        .unwrap();
    let h2 = Arc::new(ScriptedHandler::new("h2", &journal));
    let t2 = sched.schedule(h2.clone()).unwrap();
    assert!(t2.abort());
    sched.start().unwrap();

    let reports = by_id(collect(&mut rx, 2).await);
    sched.stop().await;

    assert_eq!(reports["h2"].status, TaskStatus::Aborted);
    assert!(!reports["h2"].started);
    assert!(!journal.contains("submit:h2"));
    assert_eq!(h2.kills(), 0);
    assert!(reports["h1"].is_success());
}

#[tokio::test(start_paused = true)]
async fn panicking_submission_is_contained() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 0);

    sched
        .schedule(Arc::new(ScriptedHandler::new("h1", &journal).panic_on_submit()))
        .unwrap();
    sched.schedule(Arc::new(ScriptedHandler::new("h2", &journal))).unwrap();
    sched.start().unwrap();

    let reports = by_id(collect(&mut rx, 2).await);
    sched.stop().await;

    let r1 = &reports["h1"];
    assert_eq!(r1.failure_kind(), Some(FailureKind::Submission));
    assert!(r1.failure.as_ref().unwrap().reason.contains("blew up"));
    assert!(reports["h2"].is_success());
}

#[tokio::test(start_paused = true)]
async fn slow_pooled_submission_does_not_block_polling() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = pooled(&session, 0);

    sched
        .schedule(Arc::new(
            ScriptedHandler::new("slow", &journal).submit_delay(Duration::from_secs(10)),
        ))
        .unwrap();
    for id in ["h1", "h2"] {
        sched
            .schedule(Arc::new(ScriptedHandler::new(id, &journal).complete_after(2)))
            .unwrap();
    }

    let began = Instant::now();
    sched.start().unwrap();

    let first = collect(&mut rx, 2).await;
    assert!(began.elapsed() < Duration::from_secs(1), "{:?}", began.elapsed());
    let mut ids: Vec<_> = first.iter().map(|r| r.id().to_string()).collect();
    ids.sort();
    assert_eq!(ids, ["h1", "h2"]);
    assert_eq!(sched.snapshot().submitting, 1);

    let last = collect(&mut rx, 1).await.remove(0);
    assert_eq!(last.id().as_str(), "slow");
    assert!(last.is_success());
    sched.stop().await;
}

#[tokio::test(start_paused = true)]
async fn pooled_worker_failure_is_reported() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = pooled(&session, 2);

    sched
        .schedule(Arc::new(
            ScriptedHandler::new("bad", &journal)
                .fail_submit(HandlerError::InvalidTaskSpec("image is required".into())),
        ))
        .unwrap();
    sched
        .schedule(Arc::new(ScriptedHandler::new("boom", &journal).panic_on_submit()))
        .unwrap();
    sched.start().unwrap();

    let reports = by_id(collect(&mut rx, 2).await);
    sched.stop().await;

    for r in reports.values() {
        assert_eq!(r.status, TaskStatus::Failed);
        assert_eq!(r.failure_kind(), Some(FailureKind::Submission));
        assert!(!r.started);
    }
    assert!(sched.strategy().is_closed());
}

#[tokio::test(start_paused = true)]
async fn snapshot_tracks_queues() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = inline(&session, 1);

    let t1 = sched
        .schedule(Arc::new(ScriptedHandler::new("h1", &journal).never_finish()))
        .unwrap();
    sched.schedule(Arc::new(ScriptedHandler::new("h2", &journal))).unwrap();
    assert_eq!(sched.snapshot().pending, 2);

    sched.start().unwrap();
    tokio::time::sleep(POLL / 2).await;
    assert_eq!(
        sched.snapshot(),
        SchedulerSnapshot {
            pending: 1,
            submitting: 0,
            running: 1,
            capacity: 1
        }
    );
    assert_eq!(
        sched.snapshot().to_string(),
        "pending=1 submitting=0 running=1 capacity=1"
    );

    t1.abort();
    sched.stop().await;
    let reports = by_id(collect(&mut rx, 2).await);
    assert!(reports.values().all(|r| r.status == TaskStatus::Aborted));
}

#[tokio::test(start_paused = true)]
async fn session_shutdown_stops_created_scheduler() {
    let config = SessionConfig::default().with_executor(
        "pool",
        ExecutorSettings {
            poll_interval_ms: Some(100),
            capacity: Some(2),
            parallel_submit: Some(true),
            ..Default::default()
        },
    );
    let (session, mut rx) = LocalSession::new(config);
    let journal = Journal::default();

    let sched = PollingScheduler::create(session.clone(), "pool", Duration::from_secs(5)).unwrap();
    assert_eq!(sched.config().poll_interval, POLL);
    assert_eq!(sched.config().capacity, 2);
    assert!(matches!(sched.strategy(), SubmissionMode::Pooled(_)));

    for i in 0..4 {
        sched
            .schedule(Arc::new(ScriptedHandler::new(&format!("t{i}"), &journal).complete_after(1)))
            .unwrap();
    }
    sched.start().unwrap();
    tokio::time::sleep(POLL / 2).await;

    session.shutdown().await;

    assert!(sched.is_closed());
    assert!(matches!(
        sched.schedule(Arc::new(ScriptedHandler::new("late", &journal))),
        Err(CoreError::SchedulerClosed(_))
    ));
    match sched.strategy() {
        SubmissionMode::Pooled(pool) => assert!(pool.is_closed()),
        SubmissionMode::Inline(_) => unreachable!(),
    }

    let reports = by_id(collect(&mut rx, 4).await);
    assert_eq!(reports.len(), 4);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn pooled_admission_counts_in_flight_submissions() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let probe = Probe::default();
    let sched = pooled(&session, 2);

    // Later tasks submit faster, so completion order inside a wave is reversed.
    for i in 0..6u64 {
        let h = ScriptedHandler::new(&format!("t{i}"), &journal)
            .probe(&probe)
            .submit_delay(Duration::from_millis(60 - 10 * i));
        sched.schedule(Arc::new(h)).unwrap();
    }
    sched.start().unwrap();

    let reports = by_id(collect(&mut rx, 6).await);
    sched.stop().await;

    assert!(reports.values().all(|r| r.is_success()));
    assert_eq!(probe.max(), 2);
    assert_eq!(probe.live(), 0);

    let entries = journal.entries();
    let pos = |entry: String| entries.iter().position(|e| *e == entry).unwrap();
    let waves = [["t0", "t1"], ["t2", "t3"], ["t4", "t5"]];
    for pair in waves.windows(2) {
        for prev in pair[0] {
            for next in pair[1] {
                assert!(
                    pos(format!("done:{prev}")) < pos(format!("submit:{next}")),
                    "{next} submitted before {prev} finished: {entries:?}"
                );
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn abort_during_pooled_submission_is_reported_once() {
    let (session, mut rx) = session();
    let journal = Journal::default();
    let sched = pooled(&session, 0);

    let accepted = Arc::new(
        ScriptedHandler::new("accepted", &journal)
            .submit_delay(Duration::from_secs(1))
            .never_finish(),
    );
    let refused = Arc::new(
        ScriptedHandler::new("refused", &journal)
            .submit_delay(Duration::from_secs(1))
            .fail_submit(HandlerError::BackendUnavailable("quota exceeded".into())),
    );
    let t1 = sched.schedule(accepted.clone()).unwrap();
    let t2 = sched.schedule(refused.clone()).unwrap();
    sched.start().unwrap();

    tokio::time::sleep(POLL / 2).await;
    assert_eq!(t1.status(), TaskStatus::Submitting);
    assert_eq!(t2.status(), TaskStatus::Submitting);
    assert_eq!(sched.snapshot().submitting, 2);
    assert!(t1.abort());
    assert!(t2.abort());

    let reports = by_id(collect(&mut rx, 2).await);
    for r in reports.values() {
        assert_eq!(r.status, TaskStatus::Aborted);
        assert_eq!(r.failure_kind(), Some(FailureKind::Aborted));
        assert!(!r.started);
    }
    // The backend accepted the first task, so it has to be torn down.
    assert_eq!(accepted.kills(), 1);
    assert_eq!(refused.kills(), 0);
    assert_eq!(accepted.checks(), 0);
    assert_eq!(refused.checks(), 0);

    tokio::time::sleep(POLL * 2).await;
    let snap = sched.snapshot();
    assert_eq!((snap.submitting, snap.running), (0, 0));

    sched.stop().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn session_shutdown_waits_for_in_flight_submission() {
    let config = SessionConfig::default().with_executor(
        "pool",
        ExecutorSettings {
            poll_interval_ms: Some(100),
            capacity: Some(2),
            parallel_submit: Some(true),
            ..Default::default()
        },
    );
    let (session, mut rx) = LocalSession::new(config);
    let journal = Journal::default();
    let sched = PollingScheduler::create(session.clone(), "pool", Duration::from_secs(5)).unwrap();

    let slow = Arc::new(
        ScriptedHandler::new("slow", &journal).submit_delay(Duration::from_secs(5)),
    );
    sched.schedule(slow.clone()).unwrap();
    sched.schedule(Arc::new(ScriptedHandler::new("quick", &journal))).unwrap();
    sched.start().unwrap();

    tokio::time::sleep(POLL / 2).await;
    assert_eq!(sched.snapshot().submitting, 1);

    let began = Instant::now();
    session.shutdown().await;
    assert!(began.elapsed() >= Duration::from_secs(4), "{:?}", began.elapsed());

    let reports = by_id(collect(&mut rx, 2).await);
    let r = &reports["slow"];
    assert!(r.is_success());
    assert!(r.started);
    assert!(reports["quick"].is_success());
    assert_eq!(slow.kills(), 0);
    assert!(rx.try_recv().is_err());

    match sched.strategy() {
        SubmissionMode::Pooled(pool) => {
            assert!(pool.is_closed());
            assert_eq!(pool.in_flight(), 0);
        }
        SubmissionMode::Inline(_) => unreachable!(),
    }
}
