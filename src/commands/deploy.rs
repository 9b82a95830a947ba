// ABOUTME: Deploy command implementation.
// ABOUTME: Runs the full validate-deploy-verify lifecycle for one stack.

use strato::approval::{ApprovalGate, TerminalPrompter};
use strato::checks::CheckRegistry;
use strato::context::RunFlags;
use strato::diagnostics::Diagnostics;
use strato::error::Result;
use strato::orchestrator::LifecycleOrchestrator;
use strato::output::Output;

use super::setup;

pub async fn deploy(
    environment: &str,
    dry_run: bool,
    force: bool,
    wait_time: Option<u64>,
    output: &mut Output,
    json: bool,
) -> Result<i32> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let flags = RunFlags {
        dry_run,
        auto_approve: force,
        ..RunFlags::default()
    };
    let prepared = setup::prepare(environment, flags, wait_time, &mut diag).await?;

    output.progress(&format!("Deploying {}", prepared.run.handle));

    let registry = CheckRegistry::builtin();
    let prompter = TerminalPrompter;
    let gate = ApprovalGate::new(&prepared.run, &prompter);
    let orchestrator =
        LifecycleOrchestrator::new(&prepared.run, &prepared.provisioner, &registry, &gate);

    let report = orchestrator.deploy().await?;

    Ok(setup::finish(report, &prepared.cwd, output, json, &mut diag))
}
