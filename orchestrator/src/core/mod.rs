//! Deterministic, pure logic shared by the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod machine;
pub mod metrics;
pub mod signatures;
pub mod summary;
pub mod text;
pub mod types;
