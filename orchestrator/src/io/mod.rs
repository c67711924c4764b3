//! I/O helpers for the orchestrator: child processes, the process table,
//! configuration, and session logs.

pub mod checkpoint;
pub mod config;
pub mod process;
pub mod reaper;
pub mod session_log;
pub mod worker;
