// ABOUTME: Rollback strategy selection based on the observed stack phase.
// ABOUTME: A pure function; the orchestrator executes whatever it selects.

use std::fmt;

use crate::provision::StackPhase;

/// How to recover from a failed deployment, selected purely from the exact
/// phase the stack reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStrategy {
    /// The stack stalled mid-rollback or mid-update; resume the rollback.
    ContinueRollback,

    /// An update is unexpectedly in flight (race with a concurrent
    /// operator); cancel it, which sends the stack into rollback.
    CancelUpdate,

    /// The stack sits in a stable phase with nothing in flight. There is no
    /// safe automatic path from a stable state back to an unknown prior
    /// configuration, so automatic rollback is refused.
    ManualIntervention,
}

impl RollbackStrategy {
    /// Select the recovery strategy for the given phase.
    pub fn for_phase(phase: StackPhase) -> Self {
        match phase {
            StackPhase::UpdateFailed | StackPhase::UpdateRollbackFailed => {
                RollbackStrategy::ContinueRollback
            }
            StackPhase::UpdateInProgress => RollbackStrategy::CancelUpdate,
            _ => RollbackStrategy::ManualIntervention,
        }
    }
}

impl fmt::Display for RollbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RollbackStrategy::ContinueRollback => "continue-rollback",
            RollbackStrategy::CancelUpdate => "cancel-update",
            RollbackStrategy::ManualIntervention => "manual-intervention-required",
        };
        write!(f, "{s}")
    }
}
