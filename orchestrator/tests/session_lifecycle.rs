//! Loop-level tests for full orchestrator runs.
//!
//! These tests drive `run_sessions` with scripted collaborators to verify the
//! three independent clocks (retry budget, reap cadence, checkpoint cadence)
//! and the terminal states of a run.

use orchestrator::core::types::{
    CheckpointOutcome, ProcessEntry, RunStop, SessionEvent, SessionMetrics, SessionOutcome,
};
use orchestrator::orchestrate::run_sessions;
use orchestrator::test_support::{
    FakeProcessTable, ScriptedCheckpoint, ScriptedRunner, ScriptedStep, Workspace,
};

fn succeeded(complete: bool) -> SessionOutcome {
    SessionOutcome::succeeded(SessionMetrics {
        all_work_complete: complete,
        ..SessionMetrics::default()
    })
}

fn failed() -> SessionOutcome {
    SessionOutcome::failed("worker crashed", Some(1))
}

/// Every attempt fails every retry: the run performs exactly N advances.
#[test]
fn all_failures_exhaust_every_session() {
    for max_sessions in 1..=4 {
        let ws = Workspace::new().expect("workspace");
        let mut config = ws.config();
        config.max_sessions = max_sessions;
        config.checkpoint_interval = 1;

        let runner = ScriptedRunner::repeating(failed());
        let mut processes = FakeProcessTable::new(Vec::new());
        let validator = ScriptedCheckpoint::passing();

        let mut advances = 0;
        let result = run_sessions(&config, &runner, &mut processes, &validator, |event| {
            if matches!(event, SessionEvent::Advanced { .. }) {
                advances += 1;
            }
        })
        .expect("run");

        assert_eq!(advances, max_sessions);
        assert_eq!(result.stop, RunStop::Exhausted);
        assert_eq!(result.sessions_attempted, max_sessions);
        assert_eq!(result.sessions_completed, 0);
        assert_eq!(result.sessions_failed, max_sessions);
        assert_eq!(result.attempts, max_sessions * 3);
        assert_eq!(result.success_rate, 0.0);
        // floor(advanced / interval) checkpoints, excluding the final slot.
        assert_eq!(validator.calls(), max_sessions - 1);
    }
}

/// Failed, Failed, Succeeded(false) on session 0, then Succeeded(true) on session 1.
#[test]
fn retried_session_then_completion_stops_early() {
    let ws = Workspace::new().expect("workspace");
    let mut config = ws.config();
    config.max_sessions = 3;
    config.checkpoint_interval = 1;

    let runner = ScriptedRunner::new(vec![
        ScriptedStep::Outcome(failed()),
        ScriptedStep::Outcome(failed()),
        ScriptedStep::Outcome(succeeded(false)),
        ScriptedStep::Outcome(succeeded(true)),
    ]);
    let mut processes = FakeProcessTable::new(Vec::new());
    let validator = ScriptedCheckpoint::passing();

    let result = run_sessions(&config, &runner, &mut processes, &validator, |_| {}).expect("run");

    assert!(result.success);
    assert!(result.all_work_complete);
    assert!(result.completed_early);
    assert_eq!(result.sessions_attempted, 2);
    assert!(result.sessions_attempted < config.max_sessions);
    assert_eq!(validator.calls(), 2);
    assert_eq!(runner.requests().len(), 4);
}

/// Retry count per sequence number never exceeds 2.
#[test]
fn retry_count_is_capped_per_sequence_number() {
    let ws = Workspace::new().expect("workspace");
    let mut config = ws.config();
    config.max_sessions = 3;

    let runner = ScriptedRunner::new(vec![
        ScriptedStep::Outcome(SessionOutcome::TimedOut),
        ScriptedStep::Outcome(SessionOutcome::TimedOut),
        ScriptedStep::Outcome(SessionOutcome::TimedOut),
        ScriptedStep::Outcome(failed()),
        ScriptedStep::Outcome(succeeded(false)),
        ScriptedStep::Outcome(succeeded(false)),
    ]);
    let mut processes = FakeProcessTable::new(Vec::new());
    let validator = ScriptedCheckpoint::passing();

    let mut attempts: Vec<(u32, u32)> = Vec::new();
    let result = run_sessions(&config, &runner, &mut processes, &validator, |event| {
        if let SessionEvent::AttemptFinished { seq, retry, .. } = event {
            attempts.push((*seq, *retry));
        }
    })
    .expect("run");

    assert_eq!(attempts, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (2, 0)]);
    assert!(attempts.iter().all(|(_, retry)| *retry <= 2));
    assert_eq!(result.sessions_failed, 1);
    assert_eq!(result.sessions_completed, 2);
}

/// Two retries then a success still reaps exactly once for that sequence number.
#[test]
fn reap_runs_once_per_advance() {
    let ws = Workspace::new().expect("workspace");
    let mut config = ws.config();
    config.max_sessions = 2;
    config.reaper.signatures = vec!["helper".to_string()];

    let runner = ScriptedRunner::new(vec![
        ScriptedStep::Outcome(failed()),
        ScriptedStep::Outcome(failed()),
        ScriptedStep::Outcome(succeeded(false)),
        ScriptedStep::Outcome(succeeded(false)),
    ]);
    let mut processes = FakeProcessTable::new(vec![
        ProcessEntry::new(9_000_101, "helper-agent"),
        ProcessEntry::new(9_000_202, "unrelated"),
    ]);
    let validator = ScriptedCheckpoint::passing();

    let mut reaps = Vec::new();
    let result = run_sessions(&config, &runner, &mut processes, &validator, |event| {
        if let SessionEvent::Reaped { count } = event {
            reaps.push(*count);
        }
    })
    .expect("run");

    assert_eq!(reaps, vec![1, 0]);
    assert_eq!(processes.list_calls(), 2);
    assert_eq!(processes.terminated(), vec![9_000_101]);
    assert_eq!(result.processes_reaped, 1);
}

/// Checkpoint failures never touch the retry budget or stop the loop.
#[test]
fn checkpoint_failures_are_advisory() {
    let ws = Workspace::new().expect("workspace");
    let mut config = ws.config();
    config.max_sessions = 7;
    config.checkpoint_interval = 3;

    let runner = ScriptedRunner::repeating(succeeded(false));
    let mut processes = FakeProcessTable::new(Vec::new());
    let validator = ScriptedCheckpoint::new(vec![
        CheckpointOutcome::fail("build failed: one"),
        CheckpointOutcome::fail("build failed: two"),
    ]);

    let mut checkpoint_indexes = Vec::new();
    let result = run_sessions(&config, &runner, &mut processes, &validator, |event| {
        if let SessionEvent::Checkpoint { index, .. } = event {
            checkpoint_indexes.push(*index);
        }
    })
    .expect("run");

    assert_eq!(checkpoint_indexes, vec![1, 2]);
    assert_eq!(result.stop, RunStop::Exhausted);
    assert_eq!(result.sessions_completed, 7);
    assert_eq!(result.retries, 0);
    assert_eq!(
        result.checkpoint_warnings,
        vec!["build failed: one", "build failed: two"]
    );
}

/// An unexpected runner error ends the run as fatal with partial counts.
#[test]
fn unexpected_error_is_folded_into_fatal_result() {
    let ws = Workspace::new().expect("workspace");
    let mut config = ws.config();
    config.max_sessions = 10;

    let runner = ScriptedRunner::new(vec![
        ScriptedStep::Outcome(succeeded(false)),
        ScriptedStep::Outcome(failed()),
        ScriptedStep::Error("output reader thread panicked".to_string()),
    ]);
    let mut processes = FakeProcessTable::new(Vec::new());
    let validator = ScriptedCheckpoint::passing();

    let result = run_sessions(&config, &runner, &mut processes, &validator, |_| {}).expect("run");

    assert!(!result.success);
    assert_eq!(result.stop, RunStop::Fatal);
    assert!(!result.completed_early);
    assert_eq!(result.sessions_attempted, 1);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.retries, 1);
    assert!(
        result
            .error
            .as_deref()
            .is_some_and(|err| err.contains("output reader thread panicked"))
    );
}

/// Completion reported by the final session ends the run as passed, not early.
#[test]
fn completion_on_last_slot_is_not_early() {
    let ws = Workspace::new().expect("workspace");
    let mut config = ws.config();
    config.max_sessions = 2;

    let runner = ScriptedRunner::new(vec![
        ScriptedStep::Outcome(succeeded(false)),
        ScriptedStep::Outcome(succeeded(true)),
    ]);
    let mut processes = FakeProcessTable::new(Vec::new());
    let validator = ScriptedCheckpoint::passing();

    let result = run_sessions(&config, &runner, &mut processes, &validator, |_| {}).expect("run");

    assert_eq!(result.stop, RunStop::AllPassed);
    assert!(result.all_work_complete);
    assert_eq!(result.sessions_attempted, config.max_sessions);
    assert!(!result.completed_early);
}
