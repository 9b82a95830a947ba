// ABOUTME: Built-in validation checks across all five categories.
// ABOUTME: Each check inspects the run context only; no mutating calls.

use super::{Category, Check, CheckContext, CheckError, CheckPhase, Evaluation, Severity};

/// The built-in check set, as (pre-deploy, post-deploy) lists.
pub fn builtin_checks() -> (Vec<Check>, Vec<Check>) {
    let pre = vec![
        Check {
            name: "region-format",
            category: Category::Connectivity,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Blocking,
            run: region_format,
        },
        Check {
            name: "network-configured",
            category: Category::Connectivity,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Advisory,
            run: network_configured,
        },
        Check {
            name: "template-present",
            category: Category::Security,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Blocking,
            run: template_present,
        },
        Check {
            name: "account-expectation",
            category: Category::Security,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Blocking,
            run: account_expectation,
        },
        Check {
            name: "stack-tier-naming",
            category: Category::Security,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Advisory,
            run: stack_tier_naming,
        },
        Check {
            name: "storage-encryption-declared",
            category: Category::Encryption,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Advisory,
            run: storage_encryption_declared,
        },
        Check {
            name: "budget-ceiling",
            category: Category::Cost,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Blocking,
            run: budget_ceiling,
        },
        Check {
            name: "monitoring-declared",
            category: Category::Monitoring,
            phase: CheckPhase::PreDeploy,
            severity: Severity::Advisory,
            run: monitoring_declared,
        },
    ];

    let post = vec![
        Check {
            name: "stack-settled",
            category: Category::Connectivity,
            phase: CheckPhase::PostDeploy,
            severity: Severity::Blocking,
            run: stack_settled,
        },
        Check {
            name: "status-reason",
            category: Category::Connectivity,
            phase: CheckPhase::PostDeploy,
            severity: Severity::Advisory,
            run: status_reason,
        },
        Check {
            name: "data-store-identified",
            category: Category::Security,
            phase: CheckPhase::PostDeploy,
            severity: Severity::Advisory,
            run: data_store_identified,
        },
        Check {
            name: "snapshot-recorded",
            category: Category::Encryption,
            phase: CheckPhase::PostDeploy,
            severity: Severity::Blocking,
            run: snapshot_recorded,
        },
        Check {
            name: "budget-ceiling",
            category: Category::Cost,
            phase: CheckPhase::PostDeploy,
            severity: Severity::Blocking,
            run: budget_ceiling,
        },
        Check {
            name: "alarms-declared",
            category: Category::Monitoring,
            phase: CheckPhase::PostDeploy,
            severity: Severity::Advisory,
            run: monitoring_declared,
        },
    ];

    (pre, post)
}

fn region_format(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    let region = &ctx.run.handle.region;
    if !region.is_empty() && region.is_ascii() && region.contains('-') {
        Ok(Evaluation::pass(format!("region {region} looks valid")))
    } else {
        Ok(Evaluation::fail(format!(
            "region '{region}' does not look like a provider region"
        )))
    }
}

fn network_configured(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match &ctx.run.network {
        Some(network) => Ok(Evaluation::pass(format!(
            "network identifier configured: {network}"
        ))),
        None => Ok(Evaluation::warn(
            "no network identifier configured; connectivity inspection is limited",
        )),
    }
}

fn template_present(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match &ctx.run.template {
        Some(path) if path.exists() => Ok(Evaluation::pass(format!(
            "template found at {}",
            path.display()
        ))),
        Some(path) => Ok(Evaluation::fail(format!(
            "template not found at {}",
            path.display()
        ))),
        None => Ok(Evaluation::fail("no template configured for this stack")),
    }
}

fn account_expectation(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    if !ctx.run.policy.approval.identity_cross_check {
        return Ok(Evaluation::pass(
            "tier does not require an account cross-check",
        ));
    }

    match &ctx.run.expected_account {
        Some(account) => Ok(Evaluation::pass(format!(
            "expected account configured: {account}"
        ))),
        None => Ok(Evaluation::fail(
            "this tier requires an expected account identifier (set account_id or STRATO_ACCOUNT_ID)",
        )),
    }
}

fn stack_tier_naming(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    let tier = ctx.run.environment().to_string();
    let stack = ctx.run.handle.stack.as_str();

    // Guards against targeting the wrong stack with the wrong tier.
    if stack.contains(&tier) {
        Ok(Evaluation::pass(format!(
            "stack name carries its tier ({tier})"
        )))
    } else {
        Ok(Evaluation::warn(format!(
            "stack name '{stack}' does not mention its tier '{tier}'"
        )))
    }
}

fn read_template(ctx: &CheckContext) -> Result<Option<String>, CheckError> {
    let Some(path) = &ctx.run.template else {
        return Ok(None);
    };
    match std::fs::read_to_string(path) {
        Ok(body) => Ok(Some(body)),
        Err(e) => Err(CheckError(format!(
            "cannot read template {}: {e}",
            path.display()
        ))),
    }
}

fn storage_encryption_declared(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match read_template(ctx)? {
        None => Ok(Evaluation::warn(
            "no template configured; encryption posture unknown",
        )),
        Some(body) => {
            if body.contains("Encrypted") || body.contains("KmsKeyId") || body.contains("SSEAlgorithm")
            {
                Ok(Evaluation::pass("template declares encryption at rest"))
            } else {
                Ok(Evaluation::warn(
                    "template declares no encryption at rest settings",
                ))
            }
        }
    }
}

fn budget_ceiling(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    let ceiling = ctx.run.policy.budget_ceiling_usd;
    match ctx.run.estimated_monthly_cost_usd {
        Some(estimate) if estimate <= ceiling => Ok(Evaluation::pass(format!(
            "estimated ${estimate}/month is within the ${ceiling} ceiling"
        ))),
        Some(estimate) => Ok(Evaluation::fail(format!(
            "estimated ${estimate}/month exceeds the ${ceiling} ceiling for this tier"
        ))),
        None => Ok(Evaluation::warn(
            "no cost estimate configured; budget not verified",
        )),
    }
}

fn monitoring_declared(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match read_template(ctx)? {
        None => Ok(Evaluation::warn(
            "no template configured; monitoring posture unknown",
        )),
        Some(body) => {
            if body.contains("Alarm") || body.contains("LogGroup") || body.contains("Dashboard") {
                Ok(Evaluation::pass("template declares monitoring resources"))
            } else {
                Ok(Evaluation::warn("template declares no monitoring resources"))
            }
        }
    }
}

fn stack_settled(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match ctx.stack_status {
        Some(status) if status.phase.is_complete() => Ok(Evaluation::pass(format!(
            "stack settled in {}",
            status.phase
        ))),
        Some(status) => Ok(Evaluation::fail(format!(
            "stack is in {} rather than a complete phase",
            status.phase
        ))),
        None => Ok(Evaluation::fail("no observed stack status to verify")),
    }
}

fn status_reason(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match ctx.stack_status.and_then(|s| s.reason.as_deref()) {
        None | Some("") => Ok(Evaluation::pass("no outstanding status reason")),
        Some(reason) => Ok(Evaluation::warn(format!(
            "provisioning system reports: {reason}"
        ))),
    }
}

fn data_store_identified(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    match &ctx.run.data_store {
        Some(id) => Ok(Evaluation::pass(format!("data store identified: {id}"))),
        None => Ok(Evaluation::warn(
            "no data store configured; snapshot policy does not apply",
        )),
    }
}

fn snapshot_recorded(ctx: &CheckContext) -> Result<Evaluation, CheckError> {
    if !ctx.run.flags.keep_data {
        return Ok(Evaluation::pass(
            "no data preservation requested for this run",
        ));
    }

    match ctx.recorded_snapshot {
        Some(id) => Ok(Evaluation::pass(format!("final snapshot recorded: {id}"))),
        None => Ok(Evaluation::fail(
            "data preservation requested but no snapshot was recorded",
        )),
    }
}
