//! Best-effort parsing of the worker's trailing metrics line.

use crate::core::types::SessionMetrics;

/// Parse the last non-empty line of `stdout` as a JSON metrics record.
///
/// Returns `None` when there is no output or the line is not a JSON object
/// matching [`SessionMetrics`].
pub fn parse_last_line(stdout: &str) -> Option<SessionMetrics> {
    let line = stdout.lines().map(str::trim).rfind(|line| !line.is_empty())?;
    serde_json::from_str(line).ok()
}

/// Like [`parse_last_line`], defaulting to an empty record.
pub fn metrics_or_default(stdout: &str) -> SessionMetrics {
    parse_last_line(stdout).unwrap_or_default()
}
