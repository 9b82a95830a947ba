// ABOUTME: Report aggregation and rendering for check outcomes.
// ABOUTME: Aggregation is incremental; rendering is a pure projection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::checks::{Category, CheckPhase, CheckResult, Outcome};
use crate::context::RunContext;
use crate::error::Result;
use crate::orchestrator::RunOutcome;

/// Accumulates check outcomes for one phase. Finalized exactly once; the
/// resulting `Report` is never mutated afterwards.
pub struct ReportAggregator {
    phase: CheckPhase,
    items: Vec<CheckResult>,
}

impl ReportAggregator {
    pub fn new(phase: CheckPhase) -> Self {
        Self {
            phase,
            items: Vec::new(),
        }
    }

    pub fn record(&mut self, result: CheckResult) {
        tracing::debug!(
            check = %result.name,
            outcome = %result.outcome,
            "{}",
            result.message
        );
        self.items.push(result);
    }

    pub fn finalize(self) -> Report {
        let total = self.items.len();
        let passed = self
            .items
            .iter()
            .filter(|r| r.outcome == Outcome::Pass)
            .count();
        let failed = self
            .items
            .iter()
            .filter(|r| r.outcome == Outcome::Fail)
            .count();
        let warned = self
            .items
            .iter()
            .filter(|r| r.outcome == Outcome::Warn)
            .count();

        // total >= 1 is enforced by the registry; guard the division anyway.
        let success_rate = if total == 0 {
            0
        } else {
            (passed * 100 / total) as u8
        };

        Report {
            phase: self.phase,
            total,
            passed,
            failed,
            warned,
            success_rate,
            items: self.items,
            generated_at: Utc::now(),
        }
    }
}

/// The aggregated outcome of one check phase.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub phase: CheckPhase,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    /// Integer percentage, rounded down.
    pub success_rate: u8,
    pub items: Vec<CheckResult>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn has_blocking_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} checks: {} passed, {} failed, {} warned ({}%)",
            self.phase, self.passed, self.failed, self.warned, self.success_rate
        )
    }
}

/// The single terminal artifact of a run: phase reports plus run-level notes
/// and recommendations, rendered once for a human operator.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stack: String,
    pub environment: String,
    pub region: String,
    pub outcome: RunOutcome,
    pub pre_deploy: Option<Report>,
    pub post_deploy: Option<Report>,
    pub notes: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub generated_on: String,
}

impl RunReport {
    pub fn new(run: &RunContext) -> Self {
        Self {
            stack: run.handle.stack.to_string(),
            environment: run.handle.environment.to_string(),
            region: run.handle.region.clone(),
            outcome: RunOutcome::FailedNeedsManual,
            pre_deploy: None,
            post_deploy: None,
            notes: Vec::new(),
            recommendations: Vec::new(),
            generated_at: Utc::now(),
            generated_on: gethostname::gethostname().to_string_lossy().into_owned(),
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        tracing::info!("{note}");
        self.notes.push(note);
    }

    pub fn recommend(&mut self, recommendation: impl Into<String>) {
        self.recommendations.push(recommendation.into());
    }

    /// Blocking failures across both phases.
    pub fn blocking_failures(&self) -> usize {
        self.pre_deploy.as_ref().map_or(0, |r| r.failed)
            + self.post_deploy.as_ref().map_or(0, |r| r.failed)
    }

    /// Render the report as a text document. Pure projection of accumulated
    /// state; never re-runs checks.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("strato run report\n");
        out.push_str("=================\n");
        out.push_str(&format!(
            "stack: {}  environment: {}  region: {}\n",
            self.stack, self.environment, self.region
        ));
        out.push_str(&format!("outcome: {}\n", self.outcome));
        out.push_str(&format!(
            "generated: {} on {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.generated_on
        ));

        for report in [&self.pre_deploy, &self.post_deploy].into_iter().flatten() {
            out.push('\n');
            out.push_str(&report.summary_line());
            out.push('\n');
            for item in &report.items {
                out.push_str(&format!(
                    "  [{}] {}/{}: {}\n",
                    item.outcome, item.category, item.name, item.message
                ));
            }
        }

        if !self.notes.is_empty() {
            out.push_str("\nnotes:\n");
            for note in &self.notes {
                out.push_str(&format!("  - {note}\n"));
            }
        }

        let recommendations = self.all_recommendations();
        if !recommendations.is_empty() {
            out.push_str("\nrecommendations:\n");
            for rec in &recommendations {
                out.push_str(&format!("  - {rec}\n"));
            }
        }

        out
    }

    pub fn render_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the rendered report next to the working directory and return
    /// its path.
    pub fn write_to(&self, dir: &Path, json: bool) -> Result<PathBuf> {
        let stamp = self.generated_at.format("%Y%m%d-%H%M%S");
        let extension = if json { "json" } else { "txt" };
        let path = dir.join(format!(
            "strato-report-{}-{stamp}.{extension}",
            self.stack
        ));

        let body = if json {
            self.render_json()?
        } else {
            self.render_text()
        };

        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Explicit recommendations plus ones derived from failing items.
    fn all_recommendations(&self) -> Vec<String> {
        let mut recs = self.recommendations.clone();

        for report in [&self.pre_deploy, &self.post_deploy].into_iter().flatten() {
            for item in &report.items {
                if item.outcome != Outcome::Fail {
                    continue;
                }
                let suggestion = match item.category {
                    Category::Connectivity => {
                        "verify region and network settings in strato.yml"
                    }
                    Category::Security => {
                        "review account and template configuration before retrying"
                    }
                    Category::Encryption => {
                        "enable encryption at rest in the stack template"
                    }
                    Category::Cost => "reduce instance sizing or raise the tier's budget ceiling",
                    Category::Monitoring => "declare alarms and log groups in the stack template",
                };
                let line = format!("{}: {suggestion}", item.name);
                if !recs.contains(&line) {
                    recs.push(line);
                }
            }
        }

        recs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, outcome: Outcome) -> CheckResult {
        CheckResult {
            name: name.to_string(),
            category: Category::Security,
            outcome,
            message: "msg".to_string(),
        }
    }

    #[test]
    fn success_rate_rounds_down() {
        let mut aggregator = ReportAggregator::new(CheckPhase::PreDeploy);
        aggregator.record(result("a", Outcome::Pass));
        aggregator.record(result("b", Outcome::Pass));
        aggregator.record(result("c", Outcome::Fail));
        let report = aggregator.finalize();

        // 2/3 = 66.66 -> 66
        assert_eq!(report.success_rate, 66);
        assert_eq!(report.total, 3);
    }

    #[test]
    fn totals_partition_items() {
        let mut aggregator = ReportAggregator::new(CheckPhase::PostDeploy);
        aggregator.record(result("a", Outcome::Pass));
        aggregator.record(result("b", Outcome::Warn));
        aggregator.record(result("c", Outcome::Fail));
        aggregator.record(result("d", Outcome::Warn));
        let report = aggregator.finalize();

        assert_eq!(report.total, report.passed + report.failed + report.warned);
        assert_eq!(report.warned, 2);
    }

    #[test]
    fn render_text_lists_every_item() {
        let mut aggregator = ReportAggregator::new(CheckPhase::PreDeploy);
        aggregator.record(result("alpha", Outcome::Pass));
        aggregator.record(result("beta", Outcome::Fail));

        let run = test_run();
        let mut report = RunReport::new(&run);
        report.pre_deploy = Some(aggregator.finalize());
        report.note("a note for the operator");

        let text = report.render_text();
        assert!(text.contains("alpha"));
        assert!(text.contains("beta"));
        assert!(text.contains("a note for the operator"));
        assert!(text.contains("recommendations:"));
    }

    #[test]
    fn writes_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let run = test_run();
        let report = RunReport::new(&run);

        let path = report.write_to(dir.path(), false).unwrap();
        assert!(path.exists());
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("strato run report"));
    }

    fn test_run() -> RunContext {
        use crate::config::Environment;
        use crate::context::{CancelFlag, PollSettings, RunFlags};
        use crate::types::{StackHandle, StackName};
        use std::time::Duration;

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
}
