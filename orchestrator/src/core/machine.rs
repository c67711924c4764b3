//! Deterministic transition rules for the session loop.
//!
//! The orchestrator owns the counters; these functions only decide what the
//! next step is. Retry, reap, and checkpoint cadences are computed
//! independently so one clock never resets another.

use crate::core::types::SessionOutcome;

/// What the orchestrator does after recording an attempt outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Re-run the same sequence number with the given retry count.
    Retry { retry: u32 },
    /// Move to the next sequence number.
    Advance { succeeded: bool },
    /// The worker reported the manifest satisfied; advance then stop.
    Complete,
}

/// Decide the transition for `outcome` observed on an attempt that already
/// spent `retry` retries, given a per-sequence retry cap.
pub fn next_transition(outcome: &SessionOutcome, retry: u32, retry_cap: u32) -> Transition {
    match outcome {
        SessionOutcome::Succeeded { complete: true, .. } => Transition::Complete,
        SessionOutcome::Succeeded { complete: false, .. } => {
            Transition::Advance { succeeded: true }
        }
        SessionOutcome::Failed { .. } | SessionOutcome::TimedOut => {
            if retry < retry_cap {
                Transition::Retry { retry: retry + 1 }
            } else {
                Transition::Advance { succeeded: false }
            }
        }
    }
}

/// Whether a checkpoint runs after the `advanced`-th advance.
///
/// Checkpoints fall on multiples of `interval` and never on the final slot.
pub fn checkpoint_due(advanced: u32, interval: u32, max_sessions: u32) -> bool {
    interval > 0 && advanced > 0 && advanced % interval == 0 && advanced < max_sessions
}

/// Ratio of completed to attempted sessions, 0 when nothing was attempted.
pub fn success_rate(completed: u32, attempted: u32) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    f64::from(completed) / f64::from(attempted)
}
