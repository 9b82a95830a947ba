// ABOUTME: Audit command implementation.
// ABOUTME: Runs the check set against a stack without mutating anything.

use strato::approval::{ApprovalGate, TerminalPrompter};
use strato::checks::{Category, CheckRegistry};
use strato::context::RunFlags;
use strato::diagnostics::Diagnostics;
use strato::error::{Error, Result};
use strato::orchestrator::LifecycleOrchestrator;
use strato::output::Output;

use super::setup;

pub async fn audit(
    environment: &str,
    category: Option<&str>,
    output: &mut Output,
    json: bool,
) -> Result<i32> {
    output.start_timer();
    let mut diag = Diagnostics::default();

    let category = category
        .map(|s| s.parse::<Category>())
        .transpose()
        .map_err(|e| Error::Configuration(e.to_string()))?;

    let prepared =
        setup::prepare(environment, RunFlags::default(), None, &mut diag).await?;

    output.progress(&format!("Auditing {}", prepared.run.handle));

    let registry = CheckRegistry::builtin();
    let prompter = TerminalPrompter;
    let gate = ApprovalGate::new(&prepared.run, &prompter);
    let orchestrator =
        LifecycleOrchestrator::new(&prepared.run, &prepared.provisioner, &registry, &gate);

    let report = orchestrator.audit(category).await?;

    Ok(setup::finish(report, &prepared.cwd, output, json, &mut diag))
}
