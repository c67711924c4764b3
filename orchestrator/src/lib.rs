//! Session orchestrator for long-running, multi-attempt worker runs.
//!
//! The orchestrator repeatedly spawns an opaque worker process, bounds each
//! attempt with a timeout, retries failures, reaps stray helper processes
//! between sessions, and runs an advisory checkpoint on a fixed cadence. The
//! architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (transitions, cadences, metrics
//!   parsing, signature matching). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (child processes, the host process
//!   table, config and log files), each behind a trait so tests can script it.
//!
//! [`orchestrate`] coordinates core logic with I/O; [`preflight`] guards the
//! loop's preconditions.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrate;
pub mod preflight;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
