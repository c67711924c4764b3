//! Run counters and the final run result.

use std::time::Duration;

use serde::Serialize;

use crate::core::machine::success_rate;
use crate::core::types::{CheckpointOutcome, RunStop};

/// Counters accumulated by the orchestrator while the loop runs.
///
/// `sessions_attempted` counts sequence numbers (advances), not spawns;
/// `attempts` counts every spawn including retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sessions_attempted: u32,
    pub sessions_completed: u32,
    pub sessions_failed: u32,
    pub attempts: u32,
    pub retries: u32,
    pub checkpoints_run: u32,
    pub checkpoint_warnings: Vec<String>,
    pub processes_reaped: usize,
    pub all_work_complete: bool,
}

impl RunSummary {
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn record_advance(&mut self, succeeded: bool) {
        self.sessions_attempted += 1;
        if succeeded {
            self.sessions_completed += 1;
        } else {
            self.sessions_failed += 1;
        }
    }

    pub fn record_checkpoint(&mut self, outcome: &CheckpointOutcome) {
        self.checkpoints_run += 1;
        if !outcome.passed {
            self.checkpoint_warnings
                .extend(outcome.warnings.iter().cloned());
        }
    }

    pub fn record_reaped(&mut self, count: usize) {
        self.processes_reaped += count;
    }

    /// Freeze the counters into a [`RunResult`].
    ///
    /// `max_sessions` is the run's budget; completion on the last slot is not early.
    pub fn finish(
        self,
        stop: RunStop,
        max_sessions: u32,
        duration: Duration,
        error: Option<String>,
    ) -> RunResult {
        RunResult {
            success: stop != RunStop::Fatal,
            stop,
            completed_early: stop == RunStop::AllPassed && self.sessions_attempted < max_sessions,
            all_work_complete: self.all_work_complete,
            sessions_attempted: self.sessions_attempted,
            sessions_completed: self.sessions_completed,
            sessions_failed: self.sessions_failed,
            success_rate: success_rate(self.sessions_completed, self.sessions_attempted),
            attempts: self.attempts,
            retries: self.retries,
            checkpoints_run: self.checkpoints_run,
            checkpoint_warnings: self.checkpoint_warnings,
            processes_reaped: self.processes_reaped,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            error,
        }
    }
}

/// Structured result returned to the caller of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    /// False only when the run ended in [`RunStop::Fatal`].
    pub success: bool,
    pub stop: RunStop,
    /// A session reported completion before `max_sessions` ran out.
    pub completed_early: bool,
    pub all_work_complete: bool,
    pub sessions_attempted: u32,
    pub sessions_completed: u32,
    pub sessions_failed: u32,
    pub success_rate: f64,
    pub attempts: u32,
    pub retries: u32,
    pub checkpoints_run: u32,
    pub checkpoint_warnings: Vec<String>,
    pub processes_reaped: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
