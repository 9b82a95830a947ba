// ABOUTME: Status command implementation.
// ABOUTME: Prints the stack's current phase; read-only.

use strato::context::RunFlags;
use strato::diagnostics::Diagnostics;
use strato::error::Result;
use strato::output::Output;
use strato::provision::StackOps;

use super::setup;

pub async fn status(environment: &str, output: &mut Output) -> Result<i32> {
    let mut diag = Diagnostics::default();
    let prepared = setup::prepare(environment, RunFlags::default(), None, &mut diag).await?;

    let status = prepared
        .provisioner
        .describe_stack(&prepared.run.handle)
        .await?;

    output.progress(&format!("Stack: {}", prepared.run.handle));
    output.success(&format!("Phase: {}", status.phase));
    if let Some(reason) = &status.reason {
        output.progress(&format!("Reason: {reason}"));
    }

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    Ok(0)
}
