// ABOUTME: The lifecycle state machine: validate, deploy, verify, recover.
// ABOUTME: Sequences checks, approval, provisioning calls, and polling.

mod strategy;

pub use strategy::RollbackStrategy;

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::approval::{ActionKind, ApprovalGate, Decision};
use crate::checks::{Category, CheckContext, CheckPhase, CheckRegistry, CheckResult, Outcome};
use crate::context::{CancelFlag, RunContext};
use crate::error::{Error, Result};
use crate::poll::{PollError, await_phase};
use crate::provision::{ProvisionErrorKind, Provisioner, StackPhase, StackStatus};
use crate::report::{ReportAggregator, RunReport};
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::types::SnapshotId;

/// Default age threshold for restore-test resource garbage collection.
pub const CLEANUP_AGE_THRESHOLD: Duration = Duration::from_secs(24 * 3600);

/// Terminal classification of a run. Exactly one per run, mapped to the
/// process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    Success,
    BlockedByPolicy,
    FailedNeedsManual,
    FailedAutoRecovered,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Success => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Success => "success",
            RunOutcome::BlockedByPolicy => "blocked-by-policy",
            RunOutcome::FailedNeedsManual => "failed-needs-manual-action",
            RunOutcome::FailedAutoRecovered => "failed-auto-recovered",
        };
        write!(f, "{s}")
    }
}

/// Drives one (environment, stack) pair through its lifecycle. Strictly
/// sequential: the provisioning system rejects concurrent mutating calls
/// against the same stack, so nothing here overlaps.
pub struct LifecycleOrchestrator<'a, P: Provisioner + ?Sized> {
    run: &'a RunContext,
    ops: &'a P,
    registry: &'a CheckRegistry,
    gate: &'a ApprovalGate<'a>,
}

impl<'a, P: Provisioner + ?Sized> LifecycleOrchestrator<'a, P> {
    pub fn new(
        run: &'a RunContext,
        ops: &'a P,
        registry: &'a CheckRegistry,
        gate: &'a ApprovalGate<'a>,
    ) -> Self {
        Self {
            run,
            ops,
            registry,
            gate,
        }
    }

    /// Validate, deploy, poll, verify, and recover on failure.
    ///
    /// Configuration errors abort with `Err` before any mutating call. Once
    /// the create-or-update call has been issued, every failure is captured
    /// into the report and the run proceeds to a terminal classification:
    /// the stack's real state must be observed and reported regardless.
    pub async fn deploy(&self) -> Result<RunReport> {
        let mut report = RunReport::new(self.run);

        // VALIDATING
        let ctx = CheckContext::pre_deploy(self.run);
        let pre = self.registry.run_all(CheckPhase::PreDeploy, &ctx, None)?;
        let blocked = pre.has_blocking_failures();
        report.pre_deploy = Some(pre);

        if blocked {
            report.outcome = RunOutcome::BlockedByPolicy;
            report.note("blocking pre-deploy check failed; no mutating call was issued");
            report.recommend("fix the failing checks and re-run `strato deploy`");
            return Ok(report);
        }

        if self.run.flags.dry_run {
            report.outcome = RunOutcome::Success;
            report.note("dry run: validation only, no mutating calls issued");
            return Ok(report);
        }

        // Re-check the live phase before mutating so a re-invoked run never
        // double-issues a create-or-update.
        let current = self.ops.describe_stack(&self.run.handle).await?;
        if current.phase.is_in_progress() {
            report.outcome = RunOutcome::FailedNeedsManual;
            report.note(format!(
                "stack already reports {}; refusing to issue a second operation",
                current.phase
            ));
            report.recommend("wait for the in-flight operation to settle, then re-run");
            return Ok(report);
        }

        if self.run.cancel.is_cancelled() {
            report.outcome = RunOutcome::BlockedByPolicy;
            report.note("interrupted before any mutating call was issued");
            return Ok(report);
        }

        // APPROVED | DENIED
        match self.gate.authorize(ActionKind::Deploy).await? {
            Decision::Denied(reason) => {
                report.outcome = RunOutcome::BlockedByPolicy;
                report.note(format!("deploy not approved: {reason}"));
                return Ok(report);
            }
            Decision::Granted(_) => {}
        }

        let template = self.run.template.as_deref().ok_or_else(|| {
            Error::Configuration("no template configured for this stack".to_string())
        })?;

        // DEPLOYING: issued exactly once per run, never silently retried.
        if let Err(e) = self
            .ops
            .create_or_update_stack(&self.run.handle, template)
            .await
        {
            report.note(format!("deploy call failed: {e}"));
            if e.kind() == ProvisionErrorKind::AlreadyInProgress {
                report.recommend("another operation is in flight; re-run once it settles");
            } else {
                report.recommend("inspect provider credentials and template, then re-run");
            }
            if let Ok(status) = self.ops.describe_stack(&self.run.handle).await {
                report.note(format!("stack currently reports {}", status.phase));
            }
            report.outcome = RunOutcome::FailedNeedsManual;
            return Ok(report);
        }
        report.note("create-or-update call issued");

        // POLLING. The mutating call is out; this wait runs to a terminal
        // outcome even if the operator interrupts.
        let status = match await_phase(
            self.ops,
            &self.run.handle,
            StackPhase::all_terminal(),
            self.run.poll,
            &CancelFlag::disarmed(),
        )
        .await
        {
            Ok(status) => status,
            Err(e) => {
                self.capture_poll_failure(&mut report, e, "deployment");
                return Ok(report);
            }
        };

        report.note(format!("stack settled in {}", status.phase));

        match status.phase {
            // VERIFIED
            StackPhase::CreateComplete | StackPhase::UpdateComplete => {
                let ctx = CheckContext {
                    run: self.run,
                    stack_status: Some(&status),
                    recorded_snapshot: None,
                };
                let post = self.registry.run_all(CheckPhase::PostDeploy, &ctx, None)?;
                let verified = !post.has_blocking_failures();
                report.post_deploy = Some(post);

                if verified {
                    report.outcome = RunOutcome::Success;
                } else {
                    report.outcome = RunOutcome::FailedNeedsManual;
                    report.recommend("review the failing post-deploy checks");
                }
            }
            // The provisioning system already rolled the update back.
            StackPhase::UpdateRollbackComplete => {
                report.outcome = RunOutcome::FailedAutoRecovered;
                report.note("update failed and the provisioning system rolled it back");
                if let Some(reason) = &status.reason {
                    report.note(format!("failure reason: {reason}"));
                }
                report.recommend("fix the template and re-run `strato deploy`");
            }
            // DEPLOY_FAILED
            _ => {
                self.recover(&status, &mut report).await?;
            }
        }

        Ok(report)
    }

    /// ROLLING_BACK: select and execute a recovery strategy for the phase
    /// the failed deployment settled in.
    async fn recover(&self, status: &StackStatus, report: &mut RunReport) -> Result<()> {
        let strategy = RollbackStrategy::for_phase(status.phase);
        report.note(format!(
            "deploy failed in {}; selected recovery: {strategy}",
            status.phase
        ));
        if let Some(reason) = &status.reason {
            report.note(format!("failure reason: {reason}"));
        }

        let operation = match strategy {
            RollbackStrategy::ManualIntervention => {
                report.outcome = RunOutcome::FailedNeedsManual;
                report.note(format!(
                    "no safe automatic recovery path from {}; stopping",
                    status.phase
                ));
                report.recommend(
                    "manual intervention required: inspect the stack events and recover by hand",
                );
                return Ok(());
            }
            RollbackStrategy::ContinueRollback => "continue-rollback",
            RollbackStrategy::CancelUpdate => "cancel-update",
        };

        match self.gate.authorize(ActionKind::Rollback).await? {
            Decision::Denied(reason) => {
                report.outcome = RunOutcome::FailedNeedsManual;
                report.note(format!("rollback not approved: {reason}"));
                report.recommend(format!("run {operation} manually once ready"));
                return Ok(());
            }
            Decision::Granted(_) => {}
        }

        let call = match strategy {
            RollbackStrategy::ContinueRollback => {
                self.ops.continue_rollback(&self.run.handle).await
            }
            RollbackStrategy::CancelUpdate => self.ops.cancel_update(&self.run.handle).await,
            RollbackStrategy::ManualIntervention => unreachable!("handled above"),
        };

        if let Err(e) = call {
            report.outcome = RunOutcome::FailedNeedsManual;
            report.note(format!("{operation} call failed: {e}"));
            report.recommend(format!("issue {operation} manually against the stack"));
            return Ok(());
        }
        report.note(format!("{operation} issued"));

        match await_phase(
            self.ops,
            &self.run.handle,
            StackPhase::rollback_terminal(),
            self.run.poll,
            &CancelFlag::disarmed(),
        )
        .await
        {
            Ok(s) if s.phase == StackPhase::UpdateRollbackComplete => {
                report.outcome = RunOutcome::FailedAutoRecovered;
                report.note("rollback succeeded; stack restored to its previous configuration");
                report.recommend("fix the underlying failure and re-run `strato deploy`");
            }
            Ok(s) => {
                report.outcome = RunOutcome::FailedNeedsManual;
                report.note(format!("rollback ended in {}", s.phase));
                report
                    .recommend("issue continue-rollback once the underlying failure is resolved");
            }
            Err(e) => {
                self.capture_poll_failure(report, e, "rollback");
            }
        }

        Ok(())
    }

    /// CLEANING_UP: preserve-or-discard data, then destroy the stack.
    ///
    /// Approval comes first: a denied destroy leaves the provisioning system
    /// completely untouched.
    pub async fn teardown(&self) -> Result<RunReport> {
        let mut report = RunReport::new(self.run);
        let mut aggregator = ReportAggregator::new(CheckPhase::PostDeploy);

        if self.run.cancel.is_cancelled() {
            report.outcome = RunOutcome::BlockedByPolicy;
            report.note("interrupted before any mutating call was issued");
            return Ok(report);
        }

        match self.gate.authorize(ActionKind::Destroy).await? {
            Decision::Denied(reason) => {
                report.outcome = RunOutcome::BlockedByPolicy;
                report.note(format!("destroy not approved: {reason}"));
                return Ok(report);
            }
            Decision::Granted(_) => {}
        }

        let keep_data = self.run.flags.keep_data || self.run.policy.retain_data_on_teardown;
        let manager = SnapshotManager::new(self.ops, self.run.poll);

        let mut recorded: Option<SnapshotId> = None;
        if keep_data {
            match self.preserve_data(&manager, &mut aggregator, &mut report).await? {
                Some(snapshot) => recorded = Some(snapshot.id),
                None => {
                    // Preservation was required but impossible or failed;
                    // refuse to proceed with the destructive part.
                    if self.run.data_store.is_some() {
                        report.post_deploy = Some(aggregator.finalize());
                        report.outcome = RunOutcome::FailedNeedsManual;
                        report.recommend(
                            "resolve the snapshot failure before retrying the teardown",
                        );
                        return Ok(report);
                    }
                }
            }
        } else {
            report.note("data preservation not requested; skipping final snapshot (explicit decision)");
            aggregator.record(CheckResult {
                name: "final-snapshot".to_string(),
                category: Category::Encryption,
                outcome: Outcome::Pass,
                message: "no data preservation requested for this run".to_string(),
            });
        }

        if let Err(e) = self.ops.delete_stack(&self.run.handle).await {
            aggregator.record(CheckResult {
                name: "stack-deleted".to_string(),
                category: Category::Connectivity,
                outcome: Outcome::Fail,
                message: format!("delete call failed: {e}"),
            });
            report.post_deploy = Some(aggregator.finalize());
            report.outcome = RunOutcome::FailedNeedsManual;
            if e.kind() == ProvisionErrorKind::AlreadyInProgress {
                report.recommend("another operation is in flight; re-run once it settles");
            } else {
                report.recommend("retry the teardown or delete the stack manually");
            }
            return Ok(report);
        }
        report.note("delete call issued");

        match await_phase(
            self.ops,
            &self.run.handle,
            StackPhase::delete_terminal(),
            self.run.poll,
            &CancelFlag::disarmed(),
        )
        .await
        {
            Ok(s) if matches!(s.phase, StackPhase::DeleteComplete | StackPhase::NotFound) => {
                aggregator.record(CheckResult {
                    name: "stack-deleted".to_string(),
                    category: Category::Connectivity,
                    outcome: Outcome::Pass,
                    message: format!("stack removed ({})", s.phase),
                });
                report.outcome = RunOutcome::Success;
                if let Some(id) = &recorded {
                    report.note(format!("retained data is recoverable from snapshot {id}"));
                }
            }
            Ok(s) => {
                aggregator.record(CheckResult {
                    name: "stack-deleted".to_string(),
                    category: Category::Connectivity,
                    outcome: Outcome::Fail,
                    message: format!("delete ended in {}", s.phase),
                });
                report.outcome = RunOutcome::FailedNeedsManual;
                report.recommend(
                    "some resources resisted deletion; inspect the stack events and retry",
                );
            }
            Err(e) => {
                aggregator.record(CheckResult {
                    name: "stack-deleted".to_string(),
                    category: Category::Connectivity,
                    outcome: Outcome::Fail,
                    message: format!("delete not confirmed: {e}"),
                });
                self.capture_poll_failure(&mut report, e, "delete");
            }
        }

        report.post_deploy = Some(aggregator.finalize());
        Ok(report)
    }

    /// Take the final pre-destroy snapshot (and optional restore test).
    /// Returns the available snapshot, or None when nothing was preserved.
    async fn preserve_data(
        &self,
        manager: &SnapshotManager<'_, P>,
        aggregator: &mut ReportAggregator,
        report: &mut RunReport,
    ) -> Result<Option<Snapshot>> {
        let Some(data_store) = &self.run.data_store else {
            aggregator.record(CheckResult {
                name: "final-snapshot".to_string(),
                category: Category::Encryption,
                outcome: Outcome::Warn,
                message: "data preservation requested but no data store is configured".to_string(),
            });
            return Ok(None);
        };

        let snapshot = match manager.create(data_store, "predelete").await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                aggregator.record(CheckResult {
                    name: "final-snapshot".to_string(),
                    category: Category::Encryption,
                    outcome: Outcome::Fail,
                    message: format!("snapshot creation failed: {e}"),
                });
                return Ok(None);
            }
        };

        let snapshot = match manager.await_available(snapshot).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                aggregator.record(CheckResult {
                    name: "final-snapshot".to_string(),
                    category: Category::Encryption,
                    outcome: Outcome::Fail,
                    message: format!("snapshot did not become available: {e}"),
                });
                return Ok(None);
            }
        };

        aggregator.record(CheckResult {
            name: "final-snapshot".to_string(),
            category: Category::Encryption,
            outcome: Outcome::Pass,
            message: format!("final snapshot recorded: {}", snapshot.id),
        });
        report.note(format!("final snapshot recorded: {}", snapshot.id));

        if self.run.flags.restore_test {
            let result = manager.restore_test(&snapshot).await;
            aggregator.record(result);
        }

        Ok(Some(snapshot))
    }

    /// Run the full check set without touching the stack. Read-only.
    pub async fn audit(&self, category: Option<Category>) -> Result<RunReport> {
        let mut report = RunReport::new(self.run);

        let ctx = CheckContext::pre_deploy(self.run);
        let pre = self.registry.run_all(CheckPhase::PreDeploy, &ctx, category)?;
        report.pre_deploy = Some(pre);

        let status = match self.ops.describe_stack(&self.run.handle).await {
            Ok(status) => Some(status),
            Err(e) => {
                report.note(format!("could not observe the stack: {e}"));
                None
            }
        };

        let ctx = CheckContext {
            run: self.run,
            stack_status: status.as_ref(),
            recorded_snapshot: None,
        };
        let post = self.registry.run_all(CheckPhase::PostDeploy, &ctx, category)?;
        report.post_deploy = Some(post);

        report.outcome = if report.blocking_failures() == 0 {
            RunOutcome::Success
        } else {
            RunOutcome::FailedNeedsManual
        };

        Ok(report)
    }

    fn capture_poll_failure(&self, report: &mut RunReport, error: PollError, operation: &str) {
        report.outcome = RunOutcome::FailedNeedsManual;
        match error {
            PollError::Timeout { last_phase, waited } => {
                report.note(format!(
                    "{operation} poll timed out after {waited:?}; last observed phase {last_phase}"
                ));
                report.recommend(
                    "re-run with a larger --wait-time or watch the stack until it settles",
                );
            }
            PollError::Cancelled { last_phase } => {
                report.note(format!(
                    "{operation} poll cancelled; last observed phase {last_phase}"
                ));
                report.recommend("re-run to observe the stack's terminal state");
            }
            PollError::Describe { source } => {
                report.note(format!("{operation} poll could not observe the stack: {source}"));
                report.recommend("verify provider credentials, then re-run");
            }
        }
    }
}
