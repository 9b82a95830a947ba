// ABOUTME: Shared run setup and teardown for the lifecycle commands.
// ABOUTME: Builds the run context, provisioner, and final report handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use strato::config::{Config, Environment};
use strato::context::{CancelFlag, RunContext, RunFlags};
use strato::diagnostics::{Diagnostics, Warning};
use strato::error::{Error, Result};
use strato::orchestrator::RunOutcome;
use strato::output::Output;
use strato::provision::{CliProvisioner, StackOps};
use strato::report::RunReport;

/// Everything a lifecycle command needs, resolved once up front.
pub struct Prepared {
    pub run: RunContext,
    pub provisioner: CliProvisioner,
    pub cwd: PathBuf,
}

pub async fn prepare(
    environment: &str,
    flags: RunFlags,
    wait_time: Option<u64>,
    diag: &mut Diagnostics,
) -> Result<Prepared> {
    let environment: Environment = environment
        .parse()
        .map_err(|e: strato::config::ParseEnvironmentError| Error::Configuration(e.to_string()))?;

    let cwd = std::env::current_dir()?;
    let config = Config::discover(&cwd)?;

    let mut run = RunContext::from_config(
        &config,
        environment,
        flags,
        None,
        wait_time.map(Duration::from_secs),
    )?;

    let provisioner = CliProvisioner::new(config.provider_cli.clone(), run.handle.region.clone());

    // Resolve the account identity ahead of the run so the approval gate
    // never issues provisioning calls itself. Failure is a warning here;
    // the gate denies prod actions when the identity is missing.
    if run.policy.approval.identity_cross_check {
        match provisioner.resolve_identity().await {
            Ok(account) => run.resolved_account = Some(account),
            Err(e) => diag.warn(Warning::identity_resolve(format!(
                "could not resolve the provider account identity: {e}"
            ))),
        }
    }

    install_interrupt_handler(run.cancel.clone());

    Ok(Prepared {
        run,
        provisioner,
        cwd,
    })
}

/// Honor operator interrupts at the orchestrator's safe boundaries.
fn install_interrupt_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping at the next safe boundary");
            cancel.cancel();
        }
    });
}

/// Persist and print the terminal report, emit collected warnings, and map
/// the run outcome to the process exit code.
pub fn finish(
    report: RunReport,
    cwd: &Path,
    output: &mut Output,
    json: bool,
    diag: &mut Diagnostics,
) -> i32 {
    match report.write_to(cwd, json) {
        Ok(path) => output.progress(&format!("report written to {}", path.display())),
        Err(e) => diag.warn(Warning::report_write(format!(
            "could not write the run report: {e}"
        ))),
    }

    for phase_report in [&report.pre_deploy, &report.post_deploy]
        .into_iter()
        .flatten()
    {
        output.progress(&phase_report.summary_line());
    }

    for note in &report.notes {
        output.progress(&format!("  - {note}"));
    }

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let line = format!("outcome: {}", report.outcome);
    if report.outcome == RunOutcome::Success {
        output.success(&line);
    } else {
        output.error(&line);
    }

    report.outcome.exit_code()
}
