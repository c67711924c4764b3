//! Checkpoint validator adapter for the workspace build command.
//!
//! Checkpoints are advisory: every way the command can go wrong is reduced to
//! a failing [`CheckpointOutcome`] with a bounded warning.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::text::bounded_prefix;
use crate::core::types::CheckpointOutcome;
use crate::io::process::run_command_with_timeout;

/// Characters of failure detail kept in a checkpoint warning.
pub const WARNING_DETAIL_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct CheckpointRequest {
    pub workspace: PathBuf,
    pub timeout: Duration,
}

/// Runs one checkpoint against the workspace.
///
/// An `Err` is reserved for unexpected conditions; command failures belong in
/// the returned outcome.
pub trait CheckpointValidator {
    fn validate(&self, request: &CheckpointRequest) -> Result<CheckpointOutcome>;
}

/// Validator that runs a configured command in the workspace root.
pub struct CommandCheckpoint {
    command: Vec<String>,
    output_limit_bytes: usize,
}

impl CommandCheckpoint {
    pub fn new(command: Vec<String>, output_limit_bytes: usize) -> Self {
        Self {
            command,
            output_limit_bytes,
        }
    }

    fn label(&self) -> String {
        self.command.join(" ")
    }
}

impl CheckpointValidator for CommandCheckpoint {
    #[instrument(skip_all, fields(command = %self.label(), timeout_secs = request.timeout.as_secs()))]
    fn validate(&self, request: &CheckpointRequest) -> Result<CheckpointOutcome> {
        Ok(self.run_command(&request.workspace, request.timeout))
    }
}

impl CommandCheckpoint {
    fn run_command(&self, workspace: &Path, timeout: Duration) -> CheckpointOutcome {
        let Some((program, args)) = self.command.split_first() else {
            return CheckpointOutcome::fail("checkpoint error: empty checkpoint command");
        };

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(workspace);

        let output = match run_command_with_timeout(cmd, timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                let detail = bounded_prefix(&format!("{err:#}"), WARNING_DETAIL_CHARS);
                warn!(%detail, "checkpoint could not run");
                return CheckpointOutcome::fail(format!("checkpoint error: {detail}"));
            }
        };

        if output.timed_out {
            warn!("checkpoint timed out");
            return CheckpointOutcome::fail(format!(
                "{} timed out after {timeout:?}",
                self.label()
            ));
        }
        if !output.status.success() {
            let mut detail = output.stderr_text();
            if detail.trim().is_empty() {
                detail = output.stdout_text();
            }
            let detail = bounded_prefix(&detail, WARNING_DETAIL_CHARS);
            warn!(exit_code = ?output.status.code(), %detail, "checkpoint failed");
            return CheckpointOutcome::fail(format!("{} failed: {detail}", self.label()));
        }

        info!("checkpoint passed");
        CheckpointOutcome::pass()
    }
}
