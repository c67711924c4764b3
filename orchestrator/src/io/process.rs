//! Helpers for running child processes with timeouts and bounded output.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// How long pipes are still read after the child has exited or been killed.
///
/// Grandchildren that inherited stdout/stderr keep the pipes open; once this
/// elapses the readers are abandoned and whatever they captured is returned.
pub const PIPE_GRACE: Duration = Duration::from_millis(500);

/// Spawn `cmd`, wait at most `timeout`, and capture both output streams.
///
/// stdin is closed. Both pipes are drained on reader threads while the child
/// runs, so a chatty child cannot block on a full pipe. At most
/// `output_limit_bytes` per stream are kept; the rest is counted and dropped.
/// A child still running when `timeout` elapses is killed and reported with
/// `timed_out` set. The call returns within `timeout` plus [`PIPE_GRACE`]
/// even when descendants of the child hold the pipes open.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(%program, "spawning");
    let mut child = cmd.spawn().with_context(|| format!("spawn {program}"))?;

    let (done_tx, done_rx) = mpsc::channel();
    let stdout = spawn_reader(child.stdout.take(), output_limit_bytes, "stdout", &done_tx)?;
    let stderr = spawn_reader(child.stderr.take(), output_limit_bytes, "stderr", &done_tx)?;
    drop(done_tx);

    let waited = child.wait_timeout(timeout).context("wait for child")?;
    let timed_out = waited.is_none();
    let status = match waited {
        Some(status) => status,
        None => {
            warn!(%program, timeout = ?timeout, "deadline passed, killing child");
            // Exiting between the deadline and kill() is fine; wait() still collects it.
            if let Err(err) = child.kill() {
                warn!(%program, %err, "kill failed");
            }
            child.wait().context("wait for killed child")?
        }
    };

    if !await_readers(&done_rx, 2, PIPE_GRACE)? {
        warn!(%program, "output pipes still open after child exit, keeping partial output");
    }

    let (stdout, stdout_truncated) = take_captured(&stdout)?;
    let (stderr, stderr_truncated) = take_captured(&stderr)?;
    if stdout_truncated + stderr_truncated > 0 {
        debug!(stdout_truncated, stderr_truncated, "child output exceeded limit");
    }

    debug!(%program, exit_code = ?status.code(), timed_out, "child finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

/// Bytes kept from one stream and the count of bytes dropped past the limit.
#[derive(Debug, Default)]
struct Captured {
    kept: Vec<u8>,
    dropped: usize,
}

type SharedCapture = Arc<Mutex<Captured>>;
type ReaderDone = (&'static str, Result<()>);

fn spawn_reader<R>(
    pipe: Option<R>,
    limit: usize,
    name: &'static str,
    done: &mpsc::Sender<ReaderDone>,
) -> Result<SharedCapture>
where
    R: Read + Send + 'static,
{
    let pipe = pipe.ok_or_else(|| anyhow!("{name} was not piped"))?;
    let captured = SharedCapture::default();
    let sink = Arc::clone(&captured);
    let done = done.clone();
    thread::spawn(move || {
        let result = drain_bounded(pipe, limit, &sink);
        // The receiver is gone once the pipes were abandoned.
        let _ = done.send((name, result));
    });
    Ok(captured)
}

/// Wait up to `grace` for `readers` reader threads to reach EOF.
///
/// Returns `false` when the grace period ran out first.
fn await_readers(
    done: &mpsc::Receiver<ReaderDone>,
    readers: usize,
    grace: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + grace;
    for _ in 0..readers {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok((name, result)) => result.with_context(|| format!("read {name}"))?,
            Err(mpsc::RecvTimeoutError::Timeout) => return Ok(false),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        }
    }
    Ok(true)
}

fn take_captured(captured: &SharedCapture) -> Result<(Vec<u8>, usize)> {
    let mut captured = captured
        .lock()
        .map_err(|_| anyhow!("output buffer poisoned"))?;
    let Captured { kept, dropped } = std::mem::take(&mut *captured);
    Ok((kept, dropped))
}

/// Read `reader` to EOF into `sink`, keeping the first `limit` bytes.
fn drain_bounded<R: Read>(mut reader: R, limit: usize, sink: &Mutex<Captured>) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        let mut captured = sink.lock().map_err(|_| anyhow!("output buffer poisoned"))?;
        let take = n.min(limit.saturating_sub(captured.kept.len()));
        captured.kept.extend_from_slice(&chunk[..take]);
        captured.dropped += n - take;
    }
}
