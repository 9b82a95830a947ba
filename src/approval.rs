// ABOUTME: Approval gate deciding what confirmation a mutating action needs.
// ABOUTME: Policy is resolved per tier; granted tokens are cached per run.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::config::Environment;
use crate::context::RunContext;
use crate::error::Result;

/// The fixed literal a destroy confirmation must match.
pub const DESTROY_LITERAL: &str = "delete";

/// The mutating action kinds the gate knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Deploy,
    Rollback,
    Destroy,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Deploy => "deploy",
            ActionKind::Rollback => "rollback",
            ActionKind::Destroy => "destroy",
        };
        write!(f, "{s}")
    }
}

impl ActionKind {
    /// The typed phrase required on tiers with `phrase_per_action`.
    /// Unique per action kind.
    fn phrase(self) -> &'static str {
        match self {
            ActionKind::Deploy => "deploy to production",
            ActionKind::Rollback => "rollback production",
            ActionKind::Destroy => "destroy production",
        }
    }
}

/// In-memory proof that a mutating action was authorized for this run.
/// Never persisted across runs.
#[derive(Debug, Clone)]
pub struct ApprovalToken {
    pub environment: Environment,
    pub action: ActionKind,
    pub granted_at: DateTime<Utc>,
}

/// The gate's answer. Denial is a first-class result: callers check it and
/// abort gracefully, leaving the stack untouched.
#[derive(Debug, Clone)]
pub enum Decision {
    Granted(ApprovalToken),
    Denied(String),
}

impl Decision {
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted(_))
    }
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt failed: {0}")]
    Io(String),
}

/// Source of interactive confirmations. Tests inject scripted answers; the
/// CLI uses the terminal implementation below.
pub trait Prompter: Send + Sync {
    fn confirm(&self, prompt: &str) -> std::result::Result<bool, PromptError>;
    fn input(&self, prompt: &str) -> std::result::Result<String, PromptError>;
}

/// Interactive prompter backed by the terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str) -> std::result::Result<bool, PromptError> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| PromptError::Io(e.to_string()))
    }

    fn input(&self, prompt: &str) -> std::result::Result<String, PromptError> {
        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| PromptError::Io(e.to_string()))
    }
}

/// Decides what confirmation is required before a mutating action proceeds,
/// per the environment tier's policy.
pub struct ApprovalGate<'a> {
    run: &'a RunContext,
    prompter: &'a dyn Prompter,
    granted: Mutex<HashMap<ActionKind, ApprovalToken>>,
}

impl<'a> ApprovalGate<'a> {
    pub fn new(run: &'a RunContext, prompter: &'a dyn Prompter) -> Self {
        Self {
            run,
            prompter,
            granted: Mutex::new(HashMap::new()),
        }
    }

    /// Authorize a mutating action. Idempotent within a run: once granted
    /// for an action kind, retries of that action reuse the same token.
    pub async fn authorize(&self, action: ActionKind) -> Result<Decision> {
        if let Some(token) = self.granted.lock().get(&action) {
            tracing::debug!(%action, "reusing approval token granted earlier this run");
            return Ok(Decision::Granted(token.clone()));
        }

        let decision = self.evaluate(action).await?;

        if let Decision::Granted(ref token) = decision {
            self.granted.lock().insert(action, token.clone());
        }

        Ok(decision)
    }

    async fn evaluate(&self, action: ActionKind) -> Result<Decision> {
        let environment = self.run.environment();
        let policy = &self.run.policy.approval;
        let stack = &self.run.handle.stack;

        if self.run.flags.auto_approve && action != ActionKind::Destroy {
            if environment == Environment::Prod {
                tracing::warn!("--force is ignored on prod; interactive approval still required");
            } else {
                tracing::info!(%action, %environment, "auto-approved (--force)");
                return Ok(self.grant(action));
            }
        }

        if policy.confirm_each_action {
            let prompt = format!("Proceed with {action} of {stack} in {environment}?");
            if !self.prompter.confirm(&prompt)? {
                return Ok(Decision::Denied(format!("{action} not confirmed")));
            }
        }

        if policy.phrase_per_action {
            let phrase = action.phrase();
            let answer = self
                .prompter
                .input(&format!("Type '{phrase}' to continue"))?;
            if answer.trim() != phrase {
                return Ok(Decision::Denied(format!(
                    "confirmation phrase did not match for {action}"
                )));
            }
        }

        if policy.identity_cross_check
            && let Some(denied) = self.cross_check_identity()?
        {
            return Ok(denied);
        }

        if action == ActionKind::Destroy
            && let Some(denied) = self.destroy_safeguards().await?
        {
            return Ok(denied);
        }

        if !policy.confirm_each_action && action != ActionKind::Destroy {
            tracing::info!(%action, %environment, "auto-approved by tier policy");
        }

        Ok(self.grant(action))
    }

    /// The resolved account must match expectation and be affirmed by the
    /// operator. Either half missing or mismatching is a denial.
    fn cross_check_identity(&self) -> Result<Option<Decision>> {
        let Some(expected) = self.run.expected_account.as_deref() else {
            return Ok(Some(Decision::Denied(
                "no expected account configured for the identity cross-check".to_string(),
            )));
        };
        let Some(resolved) = self.run.resolved_account.as_deref() else {
            return Ok(Some(Decision::Denied(
                "could not resolve the provider account identity".to_string(),
            )));
        };

        if expected != resolved {
            return Ok(Some(Decision::Denied(format!(
                "resolved account {resolved} does not match expected {expected}"
            ))));
        }

        let prompt = format!("Resolved account {resolved} matches expectation. Continue?");
        if !self.prompter.confirm(&prompt)? {
            return Ok(Some(Decision::Denied(
                "account identity not affirmed".to_string(),
            )));
        }

        Ok(None)
    }

    async fn destroy_safeguards(&self) -> Result<Option<Decision>> {
        let policy = &self.run.policy.approval;
        let stack = &self.run.handle.stack;

        if policy.destroy_typed_literal {
            let answer = self.prompter.input(&format!(
                "Type '{DESTROY_LITERAL}' to confirm destroying {stack}"
            ))?;
            if answer.trim() != DESTROY_LITERAL {
                return Ok(Some(Decision::Denied(
                    "destroy confirmation literal did not match".to_string(),
                )));
            }
        }

        if policy.destroy_typed_account {
            let Some(resolved) = self.run.resolved_account.as_deref() else {
                return Ok(Some(Decision::Denied(
                    "could not resolve the provider account identity".to_string(),
                )));
            };
            let answer = self
                .prompter
                .input("Type the account identifier to confirm destroy")?;
            if answer.trim() != resolved {
                return Ok(Some(Decision::Denied(
                    "typed account identifier did not match the resolved account".to_string(),
                )));
            }
        }

        if let Some(countdown) = policy.destroy_countdown {
            let mut remaining = countdown.as_secs();
            while remaining > 0 {
                tracing::warn!("destroying {stack} in {remaining}s (interrupt to abort)");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                if self.run.cancel.is_cancelled() {
                    return Ok(Some(Decision::Denied(
                        "destroy aborted during countdown".to_string(),
                    )));
                }
                remaining -= 1;
            }
        }

        Ok(None)
    }

    fn grant(&self, action: ActionKind) -> Decision {
        Decision::Granted(ApprovalToken {
            environment: self.run.environment(),
            action,
            granted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CancelFlag, PollSettings, RunFlags};
    use crate::types::{StackHandle, StackName};
    use parking_lot::Mutex as PlMutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Scripted prompter: pops answers in order; panics when the script
    /// runs dry, which marks a test asking more questions than expected.
    struct Script {
        confirms: PlMutex<VecDeque<bool>>,
        inputs: PlMutex<VecDeque<String>>,
    }

    impl Script {
        fn new(confirms: Vec<bool>, inputs: Vec<&str>) -> Self {
            Self {
                confirms: PlMutex::new(confirms.into_iter().collect()),
                inputs: PlMutex::new(inputs.into_iter().map(String::from).collect()),
            }
        }
    }

    impl Prompter for Script {
        fn confirm(&self, _prompt: &str) -> std::result::Result<bool, PromptError> {
            Ok(self.confirms.lock().pop_front().expect("unexpected confirm"))
        }

        fn input(&self, _prompt: &str) -> std::result::Result<String, PromptError> {
            Ok(self.inputs.lock().pop_front().expect("unexpected input"))
        }
    }

    fn run_for(environment: Environment, flags: RunFlags) -> RunContext {
        let stack = match environment {
            Environment::Dev => "app-dev",
            Environment::Staging => "app-staging",
            Environment::Prod => "app-prod",
        };
        RunContext {
            handle: StackHandle::new(StackName::new(stack).unwrap(), "eu-west-1", environment),
            policy: environment.policy(),
            template: None,
            data_store: None,
            network: None,
            estimated_monthly_cost_usd: None,
            expected_account: Some("123456789012".to_string()),
            resolved_account: Some("123456789012".to_string()),
            flags,
            poll: PollSettings {
                interval: Duration::from_millis(1),
                timeout: Duration::from_secs(1),
            },
            cancel: CancelFlag::new(),
        }
    }

    #[tokio::test]
    async fn dev_deploy_auto_approves_without_prompts() {
        let run = run_for(Environment::Dev, RunFlags::default());
        let script = Script::new(vec![], vec![]);
        let gate = ApprovalGate::new(&run, &script);

        let decision = gate.authorize(ActionKind::Deploy).await.unwrap();
        assert!(decision.is_granted());
    }

    #[tokio::test]
    async fn dev_destroy_requires_typed_literal() {
        let run = run_for(Environment::Dev, RunFlags::default());

        let script = Script::new(vec![], vec!["delete"]);
        let gate = ApprovalGate::new(&run, &script);
        assert!(gate.authorize(ActionKind::Destroy).await.unwrap().is_granted());

        let script = Script::new(vec![], vec!["yes please"]);
        let gate = ApprovalGate::new(&run, &script);
        assert!(!gate.authorize(ActionKind::Destroy).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn staging_deploy_requires_yes() {
        let run = run_for(Environment::Staging, RunFlags::default());

        let script = Script::new(vec![true], vec![]);
        let gate = ApprovalGate::new(&run, &script);
        assert!(gate.authorize(ActionKind::Deploy).await.unwrap().is_granted());

        let script = Script::new(vec![false], vec![]);
        let gate = ApprovalGate::new(&run, &script);
        assert!(!gate.authorize(ActionKind::Deploy).await.unwrap().is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn prod_destroy_needs_phrase_and_identity_and_account() {
        let run = run_for(Environment::Prod, RunFlags::default());

        // confirm, phrase, identity affirm, literal, account id.
        let script = Script::new(
            vec![true, true],
            vec!["destroy production", "delete", "123456789012"],
        );
        let gate = ApprovalGate::new(&run, &script);
        assert!(gate.authorize(ActionKind::Destroy).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn prod_destroy_denied_on_wrong_typed_account() {
        let run = run_for(Environment::Prod, RunFlags::default());

        let script = Script::new(
            vec![true, true],
            vec!["destroy production", "delete", "999999999999"],
        );
        let gate = ApprovalGate::new(&run, &script);
        let decision = gate.authorize(ActionKind::Destroy).await.unwrap();
        assert!(!decision.is_granted());
    }

    #[tokio::test]
    async fn prod_destroy_denied_on_wrong_phrase() {
        let run = run_for(Environment::Prod, RunFlags::default());

        let script = Script::new(vec![true], vec!["destroy prod"]);
        let gate = ApprovalGate::new(&run, &script);
        let decision = gate.authorize(ActionKind::Destroy).await.unwrap();
        assert!(!decision.is_granted());
    }

    #[tokio::test]
    async fn prod_denied_when_accounts_mismatch() {
        let mut run = run_for(Environment::Prod, RunFlags::default());
        run.resolved_account = Some("000000000000".to_string());

        let script = Script::new(vec![true], vec!["deploy to production"]);
        let gate = ApprovalGate::new(&run, &script);
        let decision = gate.authorize(ActionKind::Deploy).await.unwrap();
        match decision {
            Decision::Denied(reason) => assert!(reason.contains("does not match")),
            Decision::Granted(_) => panic!("expected denial"),
        }
    }

    #[tokio::test]
    async fn token_is_reused_for_retries_within_a_run() {
        let run = run_for(Environment::Staging, RunFlags::default());

        // Only one confirm scripted; the second authorize must not prompt.
        let script = Script::new(vec![true], vec![]);
        let gate = ApprovalGate::new(&run, &script);

        let first = gate.authorize(ActionKind::Deploy).await.unwrap();
        let second = gate.authorize(ActionKind::Deploy).await.unwrap();
        assert!(first.is_granted());
        assert!(second.is_granted());
    }

    #[tokio::test]
    async fn force_skips_staging_prompts_but_not_destroy() {
        let flags = RunFlags {
            auto_approve: true,
            ..RunFlags::default()
        };
        let run = run_for(Environment::Staging, flags);

        let script = Script::new(vec![], vec![]);
        let gate = ApprovalGate::new(&run, &script);
        assert!(gate.authorize(ActionKind::Deploy).await.unwrap().is_granted());

        // Destroy still walks the full staging ceremony.
        let script = Script::new(vec![true], vec!["delete"]);
        let gate = ApprovalGate::new(&run, &script);
        assert!(gate.authorize(ActionKind::Destroy).await.unwrap().is_granted());
    }
}
