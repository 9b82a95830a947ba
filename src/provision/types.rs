// ABOUTME: Point-in-time status types reported by the provisioning system.
// ABOUTME: StackPhase is a closed set matching the provider's wire form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::types::ResourceId;

/// The closed set of phases a stack can report. Parsed from the provider's
/// SCREAMING_SNAKE_CASE wire form and rendered back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackPhase {
    NotFound,
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    UpdateInProgress,
    UpdateComplete,
    UpdateFailed,
    UpdateRollbackInProgress,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
}

impl StackPhase {
    /// Phases after which no further transition occurs without new operator
    /// action.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            StackPhase::CreateInProgress
                | StackPhase::UpdateInProgress
                | StackPhase::UpdateRollbackInProgress
                | StackPhase::DeleteInProgress
        )
    }

    pub fn is_in_progress(self) -> bool {
        !self.is_terminal()
    }

    pub fn is_complete(self) -> bool {
        matches!(
            self,
            StackPhase::CreateComplete
                | StackPhase::UpdateComplete
                | StackPhase::UpdateRollbackComplete
                | StackPhase::DeleteComplete
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(
            self,
            StackPhase::CreateFailed
                | StackPhase::UpdateFailed
                | StackPhase::UpdateRollbackFailed
                | StackPhase::DeleteFailed
        )
    }

    /// All terminal phases, for polls that accept any settled outcome.
    pub fn all_terminal() -> &'static [StackPhase] {
        &[
            StackPhase::NotFound,
            StackPhase::CreateComplete,
            StackPhase::CreateFailed,
            StackPhase::UpdateComplete,
            StackPhase::UpdateFailed,
            StackPhase::UpdateRollbackComplete,
            StackPhase::UpdateRollbackFailed,
            StackPhase::DeleteComplete,
            StackPhase::DeleteFailed,
        ]
    }

    /// Terminal phases of a rollback operation.
    pub fn rollback_terminal() -> &'static [StackPhase] {
        &[
            StackPhase::UpdateRollbackComplete,
            StackPhase::UpdateRollbackFailed,
        ]
    }

    /// Terminal phases of a delete operation.
    pub fn delete_terminal() -> &'static [StackPhase] {
        &[
            StackPhase::NotFound,
            StackPhase::DeleteComplete,
            StackPhase::DeleteFailed,
        ]
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            StackPhase::NotFound => "NOT_FOUND",
            StackPhase::CreateInProgress => "CREATE_IN_PROGRESS",
            StackPhase::CreateComplete => "CREATE_COMPLETE",
            StackPhase::CreateFailed => "CREATE_FAILED",
            StackPhase::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackPhase::UpdateComplete => "UPDATE_COMPLETE",
            StackPhase::UpdateFailed => "UPDATE_FAILED",
            StackPhase::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            StackPhase::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackPhase::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackPhase::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackPhase::DeleteComplete => "DELETE_COMPLETE",
            StackPhase::DeleteFailed => "DELETE_FAILED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown stack phase: {0}")]
pub struct ParseStackPhaseError(String);

impl FromStr for StackPhase {
    type Err = ParseStackPhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The provider reports ROLLBACK_* for failed creates; fold those into
        // the create phases since a create rollback ends as a failed create.
        let phase = match s {
            "NOT_FOUND" => StackPhase::NotFound,
            "CREATE_IN_PROGRESS" | "REVIEW_IN_PROGRESS" => StackPhase::CreateInProgress,
            "CREATE_COMPLETE" => StackPhase::CreateComplete,
            "CREATE_FAILED" | "ROLLBACK_IN_PROGRESS" | "ROLLBACK_COMPLETE" | "ROLLBACK_FAILED" => {
                StackPhase::CreateFailed
            }
            "UPDATE_IN_PROGRESS" | "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => {
                StackPhase::UpdateInProgress
            }
            "UPDATE_COMPLETE" => StackPhase::UpdateComplete,
            "UPDATE_FAILED" => StackPhase::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" | "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                StackPhase::UpdateRollbackInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => StackPhase::UpdateRollbackComplete,
            "UPDATE_ROLLBACK_FAILED" => StackPhase::UpdateRollbackFailed,
            "DELETE_IN_PROGRESS" => StackPhase::DeleteInProgress,
            "DELETE_COMPLETE" => StackPhase::DeleteComplete,
            "DELETE_FAILED" => StackPhase::DeleteFailed,
            other => return Err(ParseStackPhaseError(other.to_string())),
        };
        Ok(phase)
    }
}

impl fmt::Display for StackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// A point-in-time snapshot of the provisioning system's report for a stack.
/// Refreshed by polling, never cached beyond one orchestration step.
#[derive(Debug, Clone)]
pub struct StackStatus {
    pub phase: StackPhase,
    pub reason: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl StackStatus {
    pub fn new(phase: StackPhase, reason: Option<String>) -> Self {
        Self {
            phase,
            reason,
            observed_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a data-store snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Creating,
    Available,
    Failed,
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotState::Creating => "creating",
            SnapshotState::Available => "available",
            SnapshotState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Status of a snapshot as reported by the provisioning system.
#[derive(Debug, Clone)]
pub struct SnapshotStatus {
    pub state: SnapshotState,
    pub progress_percent: Option<u8>,
}

/// Observable state of a restored data-store resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Creating,
    Available,
    Failed,
    Deleting,
}

/// Health view of a provisioned data-store resource.
#[derive(Debug, Clone)]
pub struct ResourceHealth {
    pub state: ResourceState,
    pub endpoint: Option<String>,
}

/// One resource as listed by the provisioning system, with enough metadata
/// for the test-resource garbage collector to filter on.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub created_at: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}

/// Target configuration for a snapshot restore.
#[derive(Debug, Clone)]
pub struct RestoreTarget {
    pub instance_id: ResourceId,
    /// Restore targets are never routable from production networks.
    pub publicly_accessible: bool,
    pub tags: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_round_trips() {
        for phase in [
            StackPhase::NotFound,
            StackPhase::CreateInProgress,
            StackPhase::CreateComplete,
            StackPhase::CreateFailed,
            StackPhase::UpdateInProgress,
            StackPhase::UpdateComplete,
            StackPhase::UpdateFailed,
            StackPhase::UpdateRollbackInProgress,
            StackPhase::UpdateRollbackComplete,
            StackPhase::UpdateRollbackFailed,
            StackPhase::DeleteInProgress,
            StackPhase::DeleteComplete,
            StackPhase::DeleteFailed,
        ] {
            assert_eq!(phase.as_wire().parse::<StackPhase>().unwrap(), phase);
        }
    }

    #[test]
    fn in_progress_phases_are_not_terminal() {
        assert!(!StackPhase::CreateInProgress.is_terminal());
        assert!(!StackPhase::UpdateRollbackInProgress.is_terminal());
        assert!(StackPhase::UpdateComplete.is_terminal());
        assert!(StackPhase::NotFound.is_terminal());
    }

    #[test]
    fn failed_and_complete_are_disjoint() {
        for phase in StackPhase::all_terminal() {
            assert!(!(phase.is_failed() && phase.is_complete()), "{phase}");
        }
    }

    #[test]
    fn create_rollback_wire_states_fold_into_create_failed() {
        assert_eq!(
            "ROLLBACK_COMPLETE".parse::<StackPhase>().unwrap(),
            StackPhase::CreateFailed
        );
    }

    #[test]
    fn unknown_phase_is_an_error() {
        assert!("TOTALLY_BOGUS".parse::<StackPhase>().is_err());
    }
}
