// ABOUTME: Abstract interface to the stack provisioning system.
// ABOUTME: Traits for stack and snapshot operations plus the CLI binding.

mod cli;
mod error;
mod types;

pub use cli::CliProvisioner;
pub use error::{ProvisionError, ProvisionErrorKind};
pub use types::{
    ParseStackPhaseError, ResourceHealth, ResourceRecord, ResourceState, RestoreTarget,
    SnapshotState, SnapshotStatus, StackPhase, StackStatus,
};

use crate::types::{ResourceId, SnapshotId, StackHandle};
use async_trait::async_trait;
use std::path::Path;

/// Stack-level operations of the provisioning system.
///
/// `describe_stack` is the only read; everything else mutates remote state
/// and must be preceded by an approval decision (the orchestrator enforces
/// this, the trait cannot).
#[async_trait]
pub trait StackOps: Send + Sync {
    /// Report the stack's current status. A missing stack is reported as
    /// `StackPhase::NotFound`, not an error.
    async fn describe_stack(&self, handle: &StackHandle) -> Result<StackStatus, ProvisionError>;

    /// Issue the create-or-update call for the stack with the given template.
    async fn create_or_update_stack(
        &self,
        handle: &StackHandle,
        template: &Path,
    ) -> Result<(), ProvisionError>;

    async fn delete_stack(&self, handle: &StackHandle) -> Result<(), ProvisionError>;

    /// Cancel an in-flight update, sending the stack into rollback.
    async fn cancel_update(&self, handle: &StackHandle) -> Result<(), ProvisionError>;

    /// Resume a rollback that stalled in `UPDATE_ROLLBACK_FAILED`.
    async fn continue_rollback(&self, handle: &StackHandle) -> Result<(), ProvisionError>;

    /// Resolve the account identity the provider credentials map to.
    async fn resolve_identity(&self) -> Result<String, ProvisionError>;
}

/// Snapshot and data-store operations of the provisioning system.
#[async_trait]
pub trait SnapshotOps: Send + Sync {
    /// Create a snapshot of the resource under the given identifier.
    async fn create_snapshot(
        &self,
        resource: &ResourceId,
        snapshot: &SnapshotId,
    ) -> Result<(), ProvisionError>;

    async fn describe_snapshot(
        &self,
        snapshot: &SnapshotId,
    ) -> Result<SnapshotStatus, ProvisionError>;

    /// Restore a snapshot into a new resource described by `target`.
    async fn restore_from_snapshot(
        &self,
        snapshot: &SnapshotId,
        target: &RestoreTarget,
    ) -> Result<ResourceId, ProvisionError>;

    async fn describe_resource(
        &self,
        resource: &ResourceId,
    ) -> Result<ResourceHealth, ProvisionError>;

    async fn delete_resource(&self, resource: &ResourceId) -> Result<(), ProvisionError>;

    /// List data-store resources whose identifier starts with `prefix`.
    async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceRecord>, ProvisionError>;
}

/// The full provisioning interface the orchestrator runs against.
pub trait Provisioner: StackOps + SnapshotOps {}

impl<T: StackOps + SnapshotOps> Provisioner for T {}
