// ABOUTME: Blocking wait-with-timeout polling of stack status.
// ABOUTME: Polls describe calls until a terminal phase, deadline, or cancel.

use std::time::Duration;

use thiserror::Error;

use crate::context::{CancelFlag, PollSettings};
use crate::provision::{ProvisionError, StackOps, StackPhase, StackStatus};
use crate::types::StackHandle;

/// Errors from a status poll. Timeout and cancellation carry the last
/// observed phase so callers can branch explicitly; neither is ever folded
/// into a generic failure.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("timed out after {waited:?} waiting for a terminal phase (last observed: {last_phase})")]
    Timeout {
        last_phase: StackPhase,
        waited: Duration,
    },

    #[error("cancelled while polling (last observed: {last_phase})")]
    Cancelled { last_phase: StackPhase },

    #[error("describe call failed while polling: {source}")]
    Describe {
        #[from]
        source: ProvisionError,
    },
}

/// Poll the stack's status on a fixed interval until its phase is one of
/// `terminal` or the timeout elapses.
///
/// Read-only: only describe calls are issued, so the wait is safe to retry
/// or cancel at any poll boundary. Cancellation stops the poll, never any
/// underlying mutating operation.
pub async fn await_phase<P: StackOps + ?Sized>(
    ops: &P,
    handle: &StackHandle,
    terminal: &[StackPhase],
    settings: PollSettings,
    cancel: &CancelFlag,
) -> Result<StackStatus, PollError> {
    let started = std::time::Instant::now();
    let mut last_phase = StackPhase::NotFound;

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { last_phase });
        }

        let status = ops.describe_stack(handle).await?;
        last_phase = status.phase;

        if terminal.contains(&status.phase) {
            tracing::debug!(phase = %status.phase, "terminal phase reached");
            return Ok(status);
        }

        tracing::debug!(
            phase = %status.phase,
            elapsed = ?started.elapsed(),
            "stack still transitioning"
        );

        if started.elapsed() + settings.interval > settings.timeout {
            return Err(PollError::Timeout {
                last_phase,
                waited: started.elapsed(),
            });
        }

        tokio::time::sleep(settings.interval).await;
    }
}
