// ABOUTME: Teardown command implementation.
// ABOUTME: Destroys a stack after the data-preservation policy has run.

use strato::approval::{ApprovalGate, TerminalPrompter};
use strato::checks::CheckRegistry;
use strato::context::RunFlags;
use strato::diagnostics::{Diagnostics, Warning};
use strato::error::Result;
use strato::orchestrator::{CLEANUP_AGE_THRESHOLD, LifecycleOrchestrator};
use strato::output::Output;
use strato::snapshot::SnapshotManager;

use super::setup;

#[allow(clippy::too_many_arguments)]
pub async fn teardown(
    environment: &str,
    keep_data: bool,
    restore_test: bool,
    cleanup_all: bool,
    force: bool,
    wait_time: Option<u64>,
    output: &mut Output,
    json: bool,
) -> Result<i32> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let flags = RunFlags {
        keep_data,
        restore_test,
        auto_approve: force,
        ..RunFlags::default()
    };
    let prepared = setup::prepare(environment, flags, wait_time, &mut diag).await?;

    output.progress(&format!("Tearing down {}", prepared.run.handle));

    let registry = CheckRegistry::builtin();
    let prompter = TerminalPrompter;
    let gate = ApprovalGate::new(&prepared.run, &prompter);
    let orchestrator =
        LifecycleOrchestrator::new(&prepared.run, &prepared.provisioner, &registry, &gate);

    let report = orchestrator.teardown().await?;

    if cleanup_all {
        let manager = SnapshotManager::new(&prepared.provisioner, prepared.run.poll);
        match manager.teardown_test_resources(CLEANUP_AGE_THRESHOLD).await {
            Ok(summary) => {
                output.progress(&format!(
                    "cleanup: {} removed, {} kept",
                    summary.removed.len(),
                    summary.skipped
                ));
                for (id, reason) in &summary.failed {
                    diag.warn(Warning::cleanup(format!(
                        "could not remove test resource {id}: {reason}"
                    )));
                }
            }
            Err(e) => diag.warn(Warning::cleanup(format!(
                "test-resource cleanup failed: {e}"
            ))),
        }
    }

    Ok(setup::finish(report, &prepared.cwd, output, json, &mut diag))
}
