//! Shared deterministic types for the session orchestrator.
//!
//! These types are the contracts between the orchestrator and its leaf
//! components. They carry no handles to processes or files.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of retries per sequence number before the failure is absorbed.
pub const MAX_RETRIES_PER_SESSION: u32 = 2;

/// Structured record optionally printed by the worker on its last stdout line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Worker reports the whole work manifest as satisfied.
    #[serde(default, alias = "all_tests_passed")]
    pub all_work_complete: bool,
    /// Any other fields the worker reported, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Result of one worker attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Worker exited with status zero.
    Succeeded {
        /// Copied from `metrics.all_work_complete`.
        complete: bool,
        metrics: SessionMetrics,
    },
    /// Worker exited non-zero or could not be spawned.
    Failed {
        reason: String,
        exit_code: Option<i32>,
    },
    /// Worker outlived its timeout and was killed.
    TimedOut,
}

impl SessionOutcome {
    pub fn succeeded(metrics: SessionMetrics) -> Self {
        Self::Succeeded {
            complete: metrics.all_work_complete,
            metrics,
        }
    }

    pub fn failed(reason: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::Failed {
            reason: reason.into(),
            exit_code,
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Succeeded { complete, .. } => format!("succeeded (complete={complete})"),
            Self::Failed {
                reason,
                exit_code: Some(code),
            } => format!("failed with exit code {code}: {reason}"),
            Self::Failed {
                reason,
                exit_code: None,
            } => format!("failed: {reason}"),
            Self::TimedOut => "timed out".to_string(),
        }
    }
}

/// One spawn of the worker for a given sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAttempt {
    /// 0-based sequence number.
    pub seq: u32,
    /// Retries already spent on `seq` before this attempt (0..=2).
    pub retry: u32,
    pub started_at: DateTime<Utc>,
}

impl SessionAttempt {
    pub fn new(seq: u32, retry: u32) -> Self {
        Self {
            seq,
            retry,
            started_at: Utc::now(),
        }
    }

    /// Session identifier passed to the worker.
    pub fn session_id(&self) -> String {
        format!("session-{}", self.seq)
    }
}

/// Advisory result of a checkpoint validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointOutcome {
    pub passed: bool,
    pub warnings: Vec<String>,
}

impl CheckpointOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            warnings: Vec::new(),
        }
    }

    pub fn fail(warning: impl Into<String>) -> Self {
        Self {
            passed: false,
            warnings: vec![warning.into()],
        }
    }
}

/// A live process selected for termination during a reap pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperProcessRecord {
    pub pid: u32,
    pub signature: String,
}

/// A row from the host process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStop {
    /// A session reported the work manifest fully satisfied.
    AllPassed,
    /// `max_sessions` sequence numbers were consumed.
    Exhausted,
    /// An unexpected error escaped a component.
    Fatal,
}

/// Progress notifications emitted by the orchestrator while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AttemptFinished {
        seq: u32,
        retry: u32,
        outcome: SessionOutcome,
        duration: Duration,
    },
    RetryScheduled {
        seq: u32,
        retry: u32,
    },
    Advanced {
        seq: u32,
        succeeded: bool,
    },
    Reaped {
        count: usize,
    },
    Checkpoint {
        index: u32,
        outcome: CheckpointOutcome,
    },
}
