//! Reclaiming stray helper processes between sessions.
//!
//! Reaping is always two steps: enumerate the process table, then terminate
//! each selected pid on its own. There is no kill-by-name operation.

use anyhow::{Result, anyhow};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, instrument, warn};

use crate::core::signatures::select_candidates;
use crate::core::types::ProcessEntry;

/// Host process enumeration and single-pid termination.
pub trait ProcessTable {
    fn list(&mut self) -> Result<Vec<ProcessEntry>>;
    fn terminate(&mut self, pid: u32) -> Result<()>;
}

/// [`ProcessTable`] backed by the live host process list.
///
/// Only processes are listed. Threads are left out, including the
/// orchestrator's own.
pub struct SystemProcessTable {
    sys: System,
}

impl SystemProcessTable {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }
}

impl Default for SystemProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SystemProcessTable {
    fn list(&mut self) -> Result<Vec<ProcessEntry>> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        Ok(self
            .sys
            .processes()
            .iter()
            // Linux reports every task; thread ids are never termination targets.
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry::new(pid.as_u32(), process.name().to_string_lossy()))
            .collect())
    }

    fn terminate(&mut self, pid: u32) -> Result<()> {
        let process = self
            .sys
            .process(Pid::from_u32(pid))
            .ok_or_else(|| anyhow!("process {pid} not found"))?;
        if process.kill() {
            Ok(())
        } else {
            Err(anyhow!("failed to kill process {pid}"))
        }
    }
}

/// Terminate every process whose name matches one of `signatures`.
///
/// Returns the number of processes terminated. A listing failure ends the pass
/// with zero; a termination failure for one pid is logged and skipped.
#[instrument(skip_all, fields(signatures = signatures.len()))]
pub fn reap<T: ProcessTable>(table: &mut T, signatures: &[String]) -> usize {
    let processes = match table.list() {
        Ok(processes) => processes,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "could not list processes, skipping reap");
            return 0;
        }
    };

    let candidates = select_candidates(&processes, signatures, std::process::id());
    if candidates.is_empty() {
        debug!("no helper processes found");
        return 0;
    }

    let mut terminated = 0usize;
    for candidate in &candidates {
        match table.terminate(candidate.pid) {
            Ok(()) => {
                debug!(pid = candidate.pid, signature = %candidate.signature, "terminated helper process");
                terminated += 1;
            }
            Err(err) => {
                // Usually the process exited on its own since listing.
                debug!(pid = candidate.pid, err = %err, "could not terminate helper process");
            }
        }
    }

    info!(
        found = candidates.len(),
        terminated, "helper process cleanup complete"
    );
    terminated
}
