// ABOUTME: Pluggable validation checks and the registry that runs them.
// ABOUTME: Checks are pure functions of the run context, never of globals.

mod builtin;

pub use builtin::builtin_checks;

use nonempty::NonEmpty;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::provision::StackStatus;
use crate::report::{Report, ReportAggregator};
use crate::types::SnapshotId;

/// Which lifecycle gate a check runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckPhase {
    PreDeploy,
    PostDeploy,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckPhase::PreDeploy => "pre-deploy",
            CheckPhase::PostDeploy => "post-deploy",
        };
        write!(f, "{s}")
    }
}

/// Check categories. Independent of each other: a failure in one category
/// never short-circuits the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Connectivity,
    Security,
    Encryption,
    Cost,
    Monitoring,
}

#[derive(Debug, Error)]
#[error("unknown check category '{0}' (expected connectivity, security, encryption, cost, or monitoring)")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "connectivity" => Ok(Category::Connectivity),
            "security" => Ok(Category::Security),
            "encryption" => Ok(Category::Encryption),
            "cost" => Ok(Category::Cost),
            "monitoring" => Ok(Category::Monitoring),
            other => Err(ParseCategoryError(other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Connectivity => "connectivity",
            Category::Security => "security",
            Category::Encryption => "encryption",
            Category::Cost => "cost",
            Category::Monitoring => "monitoring",
        };
        write!(f, "{s}")
    }
}

/// Whether a check's failure blocks gated actions or is reported only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Blocking,
    Advisory,
}

/// Outcome of a single check invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Warn,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Warn => "warn",
        };
        write!(f, "{s}")
    }
}

/// What a check function returns: an outcome plus a human-readable message.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub message: String,
}

impl Evaluation {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Pass,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            message: message.into(),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Warn,
            message: message.into(),
        }
    }
}

/// A check that failed to execute at all (as opposed to evaluating to fail).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CheckError(pub String);

/// Read-only inputs a check may inspect.
pub struct CheckContext<'a> {
    pub run: &'a RunContext,
    /// Last observed stack status; present for post-deploy checks.
    pub stack_status: Option<&'a StackStatus>,
    /// Snapshot recorded by the data-preservation policy, if any.
    pub recorded_snapshot: Option<&'a SnapshotId>,
}

impl<'a> CheckContext<'a> {
    pub fn pre_deploy(run: &'a RunContext) -> Self {
        Self {
            run,
            stack_status: None,
            recorded_snapshot: None,
        }
    }
}

pub type CheckFn = fn(&CheckContext) -> std::result::Result<Evaluation, CheckError>;

/// One named validation check.
pub struct Check {
    pub name: &'static str,
    pub category: Category,
    pub phase: CheckPhase,
    pub severity: Severity,
    pub run: CheckFn,
}

/// The outcome of one check, owned by the aggregator once emitted.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub category: Category,
    pub outcome: Outcome,
    pub message: String,
}

/// A pluggable collection of named checks, keyed by phase.
///
/// Both phase lists are non-empty by construction: a phase with zero checks
/// is a configuration error, not a runtime condition.
pub struct CheckRegistry {
    pre: NonEmpty<Check>,
    post: NonEmpty<Check>,
}

impl CheckRegistry {
    /// Build a registry from explicit check lists. Empty lists are rejected.
    pub fn from_checks(pre: Vec<Check>, post: Vec<Check>) -> Result<Self> {
        let pre = NonEmpty::from_vec(pre).ok_or_else(|| {
            Error::Configuration("no pre-deploy checks registered".to_string())
        })?;
        let post = NonEmpty::from_vec(post).ok_or_else(|| {
            Error::Configuration("no post-deploy checks registered".to_string())
        })?;
        Ok(Self { pre, post })
    }

    /// The built-in check set covering all five categories.
    pub fn builtin() -> Self {
        let (pre, post) = builtin_checks();
        Self::from_checks(pre, post).expect("builtin check set is non-empty per phase")
    }

    pub fn register(&mut self, check: Check) {
        match check.phase {
            CheckPhase::PreDeploy => self.pre.push(check),
            CheckPhase::PostDeploy => self.post.push(check),
        }
    }

    /// Run every check of the requested phase (optionally restricted to one
    /// category) and aggregate the outcomes into a report.
    ///
    /// All selected checks always run; nothing short-circuits. A check that
    /// fails to execute is converted into a failed result so one broken
    /// check never masks the rest of the report.
    pub fn run_all(
        &self,
        phase: CheckPhase,
        ctx: &CheckContext<'_>,
        category: Option<Category>,
    ) -> Result<Report> {
        let checks = match phase {
            CheckPhase::PreDeploy => &self.pre,
            CheckPhase::PostDeploy => &self.post,
        };

        let selected: Vec<&Check> = checks
            .iter()
            .filter(|c| category.is_none_or(|cat| c.category == cat))
            .collect();

        if selected.is_empty() {
            return Err(Error::Configuration(format!(
                "no {phase} checks registered for category {}",
                category.map(|c| c.to_string()).unwrap_or_default()
            )));
        }

        let mut aggregator = ReportAggregator::new(phase);

        for check in selected {
            let evaluation = match (check.run)(ctx) {
                Ok(evaluation) => evaluation,
                Err(e) => Evaluation::fail(format!("check execution failed: {e}")),
            };

            // Severity policy: an advisory check's failure is reported as a
            // warning and never blocks.
            let outcome = match (evaluation.outcome, check.severity) {
                (Outcome::Fail, Severity::Advisory) => Outcome::Warn,
                (outcome, _) => outcome,
            };

            aggregator.record(CheckResult {
                name: check.name.to_string(),
                category: check.category,
                outcome,
                message: evaluation.message,
            });
        }

        Ok(aggregator.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::context::{CancelFlag, PollSettings, RunContext, RunFlags};
    use crate::types::{StackHandle, StackName};
    use std::time::Duration;

    fn test_context() -> RunContext {
        RunContext {
            handle: StackHandle::new(
                StackName::new("demo-dev").unwrap(),
                "eu-west-1",
                Environment::Dev,
            ),
            policy: Environment::Dev.policy(),
            template: None,
            data_store: None,
            network: None,
            estimated_monthly_cost_usd: None,
            expected_account: None,
            resolved_account: None,
            flags: RunFlags::default(),
            poll: PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::from_secs(1),
            },
            cancel: CancelFlag::new(),
        }
    }

    fn passing(_: &CheckContext) -> std::result::Result<Evaluation, CheckError> {
        Ok(Evaluation::pass("ok"))
    }

    fn failing(_: &CheckContext) -> std::result::Result<Evaluation, CheckError> {
        Ok(Evaluation::fail("broken"))
    }

    fn erroring(_: &CheckContext) -> std::result::Result<Evaluation, CheckError> {
        Err(CheckError("inspection call exploded".to_string()))
    }

    fn check(name: &'static str, severity: Severity, run: CheckFn) -> Check {
        Check {
            name,
            category: Category::Security,
            phase: CheckPhase::PreDeploy,
            severity,
            run,
        }
    }

    #[test]
    fn empty_phase_is_a_configuration_error() {
        assert!(CheckRegistry::from_checks(vec![], vec![]).is_err());
    }

    #[test]
    fn totals_always_sum() {
        let registry = CheckRegistry::from_checks(
            vec![
                check("a", Severity::Blocking, passing),
                check("b", Severity::Blocking, failing),
                check("c", Severity::Advisory, failing),
            ],
            vec![check("d", Severity::Blocking, passing)],
        )
        .unwrap();

        let run = test_context();
        let ctx = CheckContext::pre_deploy(&run);
        let report = registry
            .run_all(CheckPhase::PreDeploy, &ctx, None)
            .unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.total, report.passed + report.failed + report.warned);
        assert_eq!(report.failed, 1);
        assert_eq!(report.warned, 1);
    }

    #[test]
    fn advisory_failure_is_downgraded_to_warn() {
        let registry = CheckRegistry::from_checks(
            vec![check("adv", Severity::Advisory, failing)],
            vec![check("d", Severity::Blocking, passing)],
        )
        .unwrap();

        let run = test_context();
        let ctx = CheckContext::pre_deploy(&run);
        let report = registry
            .run_all(CheckPhase::PreDeploy, &ctx, None)
            .unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(report.warned, 1);
        assert_eq!(report.items[0].outcome, Outcome::Warn);
    }

    #[test]
    fn broken_check_becomes_failed_result_without_masking_others() {
        let registry = CheckRegistry::from_checks(
            vec![
                check("boom", Severity::Blocking, erroring),
                check("fine", Severity::Blocking, passing),
            ],
            vec![check("d", Severity::Blocking, passing)],
        )
        .unwrap();

        let run = test_context();
        let ctx = CheckContext::pre_deploy(&run);
        let report = registry
            .run_all(CheckPhase::PreDeploy, &ctx, None)
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.passed, 1);
        assert!(report.items[0].message.contains("check execution failed"));
    }

    #[test]
    fn category_filter_with_no_matches_is_an_error() {
        let registry = CheckRegistry::from_checks(
            vec![check("a", Severity::Blocking, passing)],
            vec![check("d", Severity::Blocking, passing)],
        )
        .unwrap();

        let run = test_context();
        let ctx = CheckContext::pre_deploy(&run);
        let result = registry.run_all(CheckPhase::PreDeploy, &ctx, Some(Category::Cost));
        assert!(result.is_err());
    }

    #[test]
    fn builtin_registry_has_checks_in_both_phases() {
        let registry = CheckRegistry::builtin();
        let run = test_context();
        let ctx = CheckContext::pre_deploy(&run);
        let report = registry
            .run_all(CheckPhase::PreDeploy, &ctx, None)
            .unwrap();
        assert!(report.total >= 1);
    }
}
