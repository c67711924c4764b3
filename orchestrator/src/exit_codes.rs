//! Stable exit codes for orchestrator CLI commands.

/// Command succeeded; for `run`, a session reported all work complete.
pub const OK: i32 = 0;
/// Invalid config, missing workspace/manifest, or another setup error.
pub const INVALID: i32 = 1;
/// `run` used every session without the worker reporting completion.
pub const EXHAUSTED: i32 = 2;
/// `run` stopped on an unexpected error; partial counts were still reported.
pub const FATAL: i32 = 3;
