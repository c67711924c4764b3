//! The session loop behind `orchestrator run`.
//!
//! One attempt runs at a time. After each attempt the outcome decides whether
//! the same sequence number is retried or the run advances; every advance is
//! followed by a reap pass and, on the checkpoint cadence, a checkpoint.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::core::machine::{Transition, checkpoint_due, next_transition};
use crate::core::summary::{RunResult, RunSummary};
use crate::core::types::{
    MAX_RETRIES_PER_SESSION, RunStop, SessionAttempt, SessionEvent, SessionOutcome,
};
use crate::io::checkpoint::{CheckpointRequest, CheckpointValidator};
use crate::io::config::RunConfig;
use crate::io::reaper::{ProcessTable, reap};
use crate::io::session_log::{AttemptRecord, SessionLog};
use crate::io::worker::{SessionRequest, SessionRunner};
use crate::preflight::check_preconditions;

/// Run sessions until the worker reports completion or `max_sessions` is used up.
///
/// Precondition failures (invalid config, missing workspace or manifest) are
/// returned as an error carrying [`crate::preflight::PreconditionError`] before
/// any session starts. Once the loop has started, every error is folded into a
/// [`RunStop::Fatal`] result that keeps the partial counters.
#[instrument(skip_all, fields(max_sessions = config.max_sessions, checkpoint_interval = config.checkpoint_interval))]
pub fn run_sessions<R, P, C, F>(
    config: &RunConfig,
    runner: &R,
    processes: &mut P,
    validator: &C,
    mut on_event: F,
) -> Result<RunResult>
where
    R: SessionRunner,
    P: ProcessTable,
    C: CheckpointValidator,
    F: FnMut(&SessionEvent),
{
    check_preconditions(config)?;

    let log = config.log_dir.as_deref().map(SessionLog::new);
    let started = Instant::now();
    let mut summary = RunSummary::default();

    let (stop, error) = match drive(
        config,
        runner,
        processes,
        validator,
        log.as_ref(),
        &mut summary,
        &mut on_event,
    ) {
        Ok(stop) => (stop, None),
        Err(err) => {
            let message = format!("{err:#}");
            error!(err = %message, "run aborted");
            (RunStop::Fatal, Some(message))
        }
    };

    let result = summary.finish(stop, config.max_sessions, started.elapsed(), error);
    info!(
        stop = ?result.stop,
        sessions = result.sessions_attempted,
        completed = result.sessions_completed,
        failed = result.sessions_failed,
        success_rate = result.success_rate,
        duration_ms = result.duration_ms,
        "run finished"
    );

    if let Some(log) = &log
        && let Err(err) = log.write_summary(&result)
    {
        warn!(err = %format!("{err:#}"), "failed to write run summary");
    }

    Ok(result)
}

fn drive<R, P, C, F>(
    config: &RunConfig,
    runner: &R,
    processes: &mut P,
    validator: &C,
    log: Option<&SessionLog>,
    summary: &mut RunSummary,
    on_event: &mut F,
) -> Result<RunStop>
where
    R: SessionRunner,
    P: ProcessTable,
    C: CheckpointValidator,
    F: FnMut(&SessionEvent),
{
    let mut seq = 0u32;
    let mut retry = 0u32;

    while seq < config.max_sessions {
        let attempt = SessionAttempt::new(seq, retry);
        let request = SessionRequest::for_attempt(config, &attempt)?;
        info!(
            session = seq + 1,
            max_sessions = config.max_sessions,
            retry,
            "starting session"
        );

        summary.record_attempt();
        let clock = Instant::now();
        let outcome = runner
            .run(&request)
            .with_context(|| format!("run {}", attempt.session_id()))?;
        let duration = clock.elapsed();

        if let Some(log) = log {
            write_attempt_record(log, &attempt, duration, &outcome);
        }
        on_event(&SessionEvent::AttemptFinished {
            seq,
            retry,
            outcome: outcome.clone(),
            duration,
        });

        let succeeded = match next_transition(&outcome, retry, MAX_RETRIES_PER_SESSION) {
            Transition::Retry { retry: next } => {
                warn!(
                    session = seq + 1,
                    outcome = %outcome.describe(),
                    retry = next,
                    max_retries = MAX_RETRIES_PER_SESSION,
                    "session failed, retrying"
                );
                summary.record_retry();
                retry = next;
                on_event(&SessionEvent::RetryScheduled { seq, retry });
                continue;
            }
            Transition::Advance { succeeded } => {
                if succeeded {
                    info!(session = seq + 1, "session completed");
                } else {
                    warn!(
                        session = seq + 1,
                        outcome = %outcome.describe(),
                        "max retries reached, continuing"
                    );
                }
                succeeded
            }
            Transition::Complete => {
                info!(session = seq + 1, "worker reports all work complete");
                summary.all_work_complete = true;
                true
            }
        };

        summary.record_advance(succeeded);
        on_event(&SessionEvent::Advanced { seq, succeeded });
        seq += 1;
        retry = 0;

        let reaped = reap(processes, &config.reaper.signatures);
        summary.record_reaped(reaped);
        on_event(&SessionEvent::Reaped { count: reaped });

        if checkpoint_due(seq, config.checkpoint_interval, config.max_sessions) {
            let index = seq / config.checkpoint_interval;
            info!(checkpoint = index, "running checkpoint");
            let checkpoint = validator
                .validate(&CheckpointRequest {
                    workspace: config.workspace.clone(),
                    timeout: config.checkpoint_timeout(),
                })
                .with_context(|| format!("run checkpoint {index}"))?;
            if !checkpoint.passed {
                warn!(checkpoint = index, warnings = ?checkpoint.warnings, "checkpoint reported warnings");
            }
            summary.record_checkpoint(&checkpoint);
            on_event(&SessionEvent::Checkpoint {
                index,
                outcome: checkpoint,
            });
        }

        if summary.all_work_complete {
            return Ok(RunStop::AllPassed);
        }
    }

    Ok(RunStop::Exhausted)
}

fn write_attempt_record(
    log: &SessionLog,
    attempt: &SessionAttempt,
    duration: std::time::Duration,
    outcome: &SessionOutcome,
) {
    if let Err(err) = log.write_attempt(&AttemptRecord::new(attempt, duration, outcome)) {
        warn!(err = %format!("{err:#}"), "failed to write session record");
    }
}
