//! Session logging helpers for the optional `log_dir`.
//!
//! Layout:
//!
//! ```text
//! <log_dir>/sessions/<seq>-<retry>.json   one record per attempt
//! <log_dir>/summary.json                  final run result
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::summary::RunResult;
use crate::core::types::{SessionAttempt, SessionOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord<'a> {
    pub session_id: String,
    pub seq: u32,
    pub retry: u32,
    pub started_at: String,
    pub duration_ms: u64,
    pub outcome: &'a SessionOutcome,
}

impl<'a> AttemptRecord<'a> {
    pub fn new(attempt: &SessionAttempt, duration: Duration, outcome: &'a SessionOutcome) -> Self {
        Self {
            session_id: attempt.session_id(),
            seq: attempt.seq,
            retry: attempt.retry,
            started_at: attempt.started_at.to_rfc3339(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            outcome,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionLog {
    dir: PathBuf,
}

impl SessionLog {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn attempt_path(&self, seq: u32, retry: u32) -> PathBuf {
        self.dir.join("sessions").join(format!("{seq}-{retry}.json"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join("summary.json")
    }

    pub fn write_attempt(&self, record: &AttemptRecord<'_>) -> Result<PathBuf> {
        let path = self.attempt_path(record.seq, record.retry);
        write_json(&path, record)?;
        Ok(path)
    }

    pub fn write_summary(&self, result: &RunResult) -> Result<PathBuf> {
        let path = self.summary_path();
        write_json(&path, result)?;
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("log path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp log {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace log {}", path.display()))?;
    Ok(())
}
