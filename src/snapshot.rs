// ABOUTME: Snapshot lifecycle management: create, await, restore-test, GC.
// ABOUTME: Test-resource teardown filters by naming convention and age.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::checks::{Category, CheckResult, Outcome};
use crate::context::PollSettings;
use crate::provision::{
    ProvisionError, ResourceRecord, ResourceState, RestoreTarget, SnapshotOps, SnapshotState,
};
use crate::types::{ResourceId, SnapshotId};

/// Naming prefix for restore-test resources. The teardown filter matches on
/// this prefix plus the ephemeral tag, so production resources can never be
/// selected for garbage collection.
pub const RESTORE_TEST_PREFIX: &str = "strato-restoretest-";

/// Tag marking a resource as ephemeral, set on every restore-test instance.
pub const EPHEMERAL_TAG: &str = "strato.ephemeral";

/// A snapshot created (or adopted) by this run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub source: ResourceId,
    pub state: SnapshotState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot {id} failed on the provisioning side")]
    Failed { id: SnapshotId },

    #[error("timed out after {waited:?} waiting for snapshot {id} (last state: {last_state})")]
    Timeout {
        id: SnapshotId,
        last_state: SnapshotState,
        waited: Duration,
    },

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Result of a test-resource garbage collection pass.
#[derive(Debug, Default)]
pub struct CleanupSummary {
    pub removed: Vec<ResourceId>,
    pub failed: Vec<(ResourceId, String)>,
    pub skipped: usize,
}

/// Creates, polls, and optionally restore-tests data-store snapshots.
pub struct SnapshotManager<'a, P: SnapshotOps + ?Sized> {
    ops: &'a P,
    poll: PollSettings,
}

impl<'a, P: SnapshotOps + ?Sized> SnapshotManager<'a, P> {
    pub fn new(ops: &'a P, poll: PollSettings) -> Self {
        Self { ops, poll }
    }

    /// Deterministic snapshot identifier: `{resource}-{purpose}-{timestamp}`.
    /// Repeated runs stay traceable and prefix/age filters stay safe.
    pub fn snapshot_id(resource: &ResourceId, purpose: &str, at: DateTime<Utc>) -> SnapshotId {
        SnapshotId::new(format!(
            "{resource}-{purpose}-{}",
            at.format("%Y%m%d-%H%M%S")
        ))
    }

    pub async fn create(
        &self,
        resource: &ResourceId,
        purpose: &str,
    ) -> Result<Snapshot, SnapshotError> {
        let created_at = Utc::now();
        let id = Self::snapshot_id(resource, purpose, created_at);

        tracing::info!(snapshot = %id, %resource, "creating snapshot");
        self.ops.create_snapshot(resource, &id).await?;

        Ok(Snapshot {
            id,
            source: resource.clone(),
            state: SnapshotState::Creating,
            created_at,
        })
    }

    /// Poll the snapshot until it is available, with the same fixed-interval
    /// discipline as the stack status poller.
    pub async fn await_available(&self, snapshot: Snapshot) -> Result<Snapshot, SnapshotError> {
        let started = std::time::Instant::now();
        let mut last_state;

        loop {
            let status = self.ops.describe_snapshot(&snapshot.id).await?;
            last_state = status.state;

            match status.state {
                SnapshotState::Available => {
                    tracing::info!(snapshot = %snapshot.id, "snapshot available");
                    return Ok(Snapshot {
                        state: SnapshotState::Available,
                        ..snapshot
                    });
                }
                SnapshotState::Failed => {
                    return Err(SnapshotError::Failed { id: snapshot.id });
                }
                SnapshotState::Creating => {
                    if let Some(percent) = status.progress_percent {
                        tracing::debug!(snapshot = %snapshot.id, percent, "snapshot in progress");
                    }
                }
            }

            if started.elapsed() + self.poll.interval > self.poll.timeout {
                return Err(SnapshotError::Timeout {
                    id: snapshot.id,
                    last_state,
                    waited: started.elapsed(),
                });
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }

    /// Prove the snapshot is usable by restoring it into a throwaway,
    /// non-routable instance, verifying a trivial read, and destroying the
    /// instance again.
    ///
    /// The outcome is reported as a check result, never an error: a failed
    /// restore test is a finding for the report. The restore target never
    /// survives this call.
    pub async fn restore_test(&self, snapshot: &Snapshot) -> CheckResult {
        let instance_id = ResourceId::new(format!(
            "{RESTORE_TEST_PREFIX}{}",
            Utc::now().format("%Y%m%d-%H%M%S")
        ));

        let mut tags = HashMap::new();
        tags.insert(EPHEMERAL_TAG.to_string(), "true".to_string());
        tags.insert("strato.purpose".to_string(), "restore-test".to_string());

        let target = RestoreTarget {
            instance_id: instance_id.clone(),
            publicly_accessible: false,
            tags,
        };

        tracing::info!(snapshot = %snapshot.id, instance = %instance_id, "starting restore test");

        let restored = match self.ops.restore_from_snapshot(&snapshot.id, &target).await {
            Ok(id) => id,
            Err(e) => {
                return restore_result(
                    Outcome::Fail,
                    format!("restore call failed for snapshot {}: {e}", snapshot.id),
                );
            }
        };

        let verdict = self.await_restored(&restored).await;

        // The test instance must never outlive this call.
        if let Err(e) = self.ops.delete_resource(&restored).await {
            tracing::error!(instance = %restored, "failed to delete restore-test instance: {e}");
            return restore_result(
                Outcome::Fail,
                format!("restore-test instance {restored} could not be deleted: {e}"),
            );
        }

        verdict
    }

    async fn await_restored(&self, instance: &ResourceId) -> CheckResult {
        let started = std::time::Instant::now();

        loop {
            match self.ops.describe_resource(instance).await {
                Ok(health) => match health.state {
                    ResourceState::Available => {
                        // The trivial read: the restored instance reports an
                        // endpoint we could connect to.
                        return if health.endpoint.is_some() {
                            restore_result(
                                Outcome::Pass,
                                format!("snapshot restored and readable as {instance}"),
                            )
                        } else {
                            restore_result(
                                Outcome::Warn,
                                format!("{instance} restored but reports no endpoint"),
                            )
                        };
                    }
                    ResourceState::Failed => {
                        return restore_result(
                            Outcome::Fail,
                            format!("restore of {instance} failed on the provisioning side"),
                        );
                    }
                    ResourceState::Creating | ResourceState::Deleting => {}
                },
                Err(e) => {
                    return restore_result(
                        Outcome::Fail,
                        format!("could not observe restore-test instance {instance}: {e}"),
                    );
                }
            }

            if started.elapsed() + self.poll.interval > self.poll.timeout {
                return restore_result(
                    Outcome::Fail,
                    format!(
                        "restore test timed out after {:?} waiting for {instance}",
                        started.elapsed()
                    ),
                );
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }

    /// Delete expired restore-test resources. Only resources matching the
    /// naming convention, carrying the ephemeral tag, and older than the
    /// threshold are ever touched.
    pub async fn teardown_test_resources(
        &self,
        older_than: Duration,
    ) -> Result<CleanupSummary, ProvisionError> {
        let now = Utc::now();
        let records = self.ops.list_resources(RESTORE_TEST_PREFIX).await?;
        let mut summary = CleanupSummary::default();

        for record in records {
            if !is_expired_test_resource(&record, now, older_than) {
                summary.skipped += 1;
                continue;
            }

            tracing::info!(resource = %record.id, "removing expired restore-test resource");
            match self.ops.delete_resource(&record.id).await {
                Ok(()) => summary.removed.push(record.id),
                Err(e) => summary.failed.push((record.id, e.to_string())),
            }
        }

        Ok(summary)
    }
}

fn restore_result(outcome: Outcome, message: String) -> CheckResult {
    CheckResult {
        name: "snapshot-restore-test".to_string(),
        category: Category::Security,
        outcome,
        message,
    }
}

/// The teardown safety boundary. Requires the test-resource naming prefix
/// AND the ephemeral tag AND expired age; anything else is kept. Production
/// resources fail the first two conditions by construction.
pub fn is_expired_test_resource(
    record: &ResourceRecord,
    now: DateTime<Utc>,
    older_than: Duration,
) -> bool {
    if !record.id.as_str().starts_with(RESTORE_TEST_PREFIX) {
        return false;
    }

    if record
        .tags
        .get(EPHEMERAL_TAG)
        .is_none_or(|v| v != "true")
    {
        return false;
    }

    let age = now.signed_duration_since(record.created_at);
    match chrono::Duration::from_std(older_than) {
        Ok(threshold) => age > threshold,
        Err(_) => false,
    }
}
