//! Helper-process signature matching.

use crate::core::types::{HelperProcessRecord, ProcessEntry};

/// Select processes whose name contains any signature (case-insensitive).
///
/// `exclude_pid` is never selected; callers pass their own pid. Empty
/// signatures are ignored so a blank entry can never match every process.
/// The first matching signature is recorded for each candidate.
pub fn select_candidates(
    processes: &[ProcessEntry],
    signatures: &[String],
    exclude_pid: u32,
) -> Vec<HelperProcessRecord> {
    let needles: Vec<(String, &String)> = signatures
        .iter()
        .filter(|sig| !sig.trim().is_empty())
        .map(|sig| (sig.trim().to_lowercase(), sig))
        .collect();

    processes
        .iter()
        .filter(|entry| entry.pid != exclude_pid)
        .filter_map(|entry| {
            let name = entry.name.to_lowercase();
            needles
                .iter()
                .find(|(needle, _)| name.contains(needle.as_str()))
                .map(|(_, sig)| HelperProcessRecord {
                    pid: entry.pid,
                    signature: (*sig).clone(),
                })
        })
        .collect()
}
