//! Worker invocation and outcome classification.
//!
//! The [`SessionRunner`] trait decouples the session loop from the actual
//! worker process. Tests use scripted runners that return predetermined
//! outcomes without spawning anything.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::metrics::metrics_or_default;
use crate::core::text::bounded_prefix;
use crate::core::types::{SessionAttempt, SessionOutcome};
use crate::io::config::RunConfig;
use crate::io::process::run_command_with_timeout;

/// Characters of stderr kept as the failure reason.
pub const FAILURE_REASON_CHARS: usize = 500;

/// A fully resolved worker invocation for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Must exist; a missing directory is reported as a failed attempt.
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl SessionRequest {
    /// Build the worker command line for `attempt` from the run configuration.
    pub fn for_attempt(config: &RunConfig, attempt: &SessionAttempt) -> Result<Self> {
        let (program, base_args) = config
            .worker
            .command
            .split_first()
            .ok_or_else(|| anyhow!("worker.command must be a non-empty array"))?;

        let mut args = base_args.to_vec();
        args.extend([
            "--session-id".to_string(),
            attempt.session_id(),
            "--workspace".to_string(),
            config.workspace.display().to_string(),
            "--manifest".to_string(),
            config.manifest.display().to_string(),
            "--max-iterations".to_string(),
            config.worker.max_iterations.to_string(),
            "--autonomous".to_string(),
        ]);

        Ok(Self {
            program: program.clone(),
            args,
            workdir: config.worker_workdir().to_path_buf(),
            timeout: config.worker_timeout(),
            output_limit_bytes: config.worker.output_limit_bytes,
        })
    }
}

/// Runs one worker attempt to completion.
///
/// Implementations convert every expected failure (spawn error, non-zero
/// exit, timeout) into a [`SessionOutcome`]. An `Err` means something
/// unexpected happened and ends the run.
pub trait SessionRunner {
    fn run(&self, request: &SessionRequest) -> Result<SessionOutcome>;
}

/// Runner that spawns the configured worker program.
pub struct CommandSessionRunner;

impl SessionRunner for CommandSessionRunner {
    #[instrument(skip_all, fields(program = %request.program, timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &SessionRequest) -> Result<SessionOutcome> {
        Ok(run_worker(request))
    }
}

/// Spawn the worker described by `request` and classify the result.
pub fn run_worker(request: &SessionRequest) -> SessionOutcome {
    if !request.workdir.is_dir() {
        warn!(workdir = %request.workdir.display(), "worker directory missing");
        return SessionOutcome::failed(
            format!("worker directory {} does not exist", request.workdir.display()),
            None,
        );
    }

    info!(args = ?request.args, workdir = %request.workdir.display(), "spawning worker");
    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args).current_dir(&request.workdir);

    let output =
        match run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "worker did not run");
                return SessionOutcome::failed(
                    bounded_prefix(&format!("{err:#}"), FAILURE_REASON_CHARS),
                    None,
                );
            }
        };

    if output.timed_out {
        warn!(timeout_secs = request.timeout.as_secs(), "worker timed out");
        return SessionOutcome::TimedOut;
    }
    if !output.status.success() {
        let exit_code = output.status.code();
        warn!(?exit_code, "worker failed");
        return SessionOutcome::failed(
            bounded_prefix(&output.stderr_text(), FAILURE_REASON_CHARS),
            exit_code,
        );
    }

    let metrics = metrics_or_default(&output.stdout_text());
    debug!(complete = metrics.all_work_complete, "worker succeeded");
    SessionOutcome::succeeded(metrics)
}
