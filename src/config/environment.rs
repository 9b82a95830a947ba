// ABOUTME: Environment tiers and their risk policies.
// ABOUTME: A lookup table maps each tier to budget, approval, and retention policy.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Deployment environment tier. Selected by the caller, immutable per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

#[derive(Debug, Error)]
#[error("unknown environment '{0}' (expected dev, staging, or prod)")]
pub struct ParseEnvironmentError(String);

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" => Ok(Environment::Prod),
            other => Err(ParseEnvironmentError(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        };
        write!(f, "{s}")
    }
}

impl Environment {
    /// Resolve this tier's policy from the static table. Resolved once per
    /// run; call sites branch on the policy struct, never on the tier name.
    pub fn policy(self) -> &'static EnvironmentPolicy {
        match self {
            Environment::Dev => &DEV_POLICY,
            Environment::Staging => &STAGING_POLICY,
            Environment::Prod => &PROD_POLICY,
        }
    }
}

/// Per-tier risk policy: budget ceiling, approval requirements, and what
/// happens to data on teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPolicy {
    /// Monthly budget ceiling used by the cost checks.
    pub budget_ceiling_usd: u32,
    pub approval: ApprovalPolicy,
    /// Whether teardown defaults to taking a final snapshot.
    pub retain_data_on_teardown: bool,
}

/// What confirmation is required before a mutating action proceeds.
///
/// The fields compose: prod sets all of them, dev almost none. Destroy has
/// its own safeguards on top because there is no undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalPolicy {
    /// A yes/no confirmation before every mutating action.
    pub confirm_each_action: bool,
    /// A typed phrase, unique per action kind, before every mutating action.
    pub phrase_per_action: bool,
    /// The resolved account identity must match expectation and be affirmed.
    pub identity_cross_check: bool,
    /// Destroy requires typing a fixed confirmation literal.
    pub destroy_typed_literal: bool,
    /// Destroy requires re-typing the account identifier itself.
    pub destroy_typed_account: bool,
    /// Pause between final approval and issuing the destroy call.
    pub destroy_countdown: Option<Duration>,
}

static DEV_POLICY: EnvironmentPolicy = EnvironmentPolicy {
    budget_ceiling_usd: 100,
    approval: ApprovalPolicy {
        confirm_each_action: false,
        phrase_per_action: false,
        identity_cross_check: false,
        destroy_typed_literal: true,
        destroy_typed_account: false,
        destroy_countdown: None,
    },
    retain_data_on_teardown: false,
};

static STAGING_POLICY: EnvironmentPolicy = EnvironmentPolicy {
    budget_ceiling_usd: 500,
    approval: ApprovalPolicy {
        confirm_each_action: true,
        phrase_per_action: false,
        identity_cross_check: false,
        destroy_typed_literal: true,
        destroy_typed_account: false,
        destroy_countdown: None,
    },
    retain_data_on_teardown: true,
};

static PROD_POLICY: EnvironmentPolicy = EnvironmentPolicy {
    budget_ceiling_usd: 2000,
    approval: ApprovalPolicy {
        confirm_each_action: true,
        phrase_per_action: true,
        identity_cross_check: true,
        destroy_typed_literal: true,
        destroy_typed_account: true,
        destroy_countdown: Some(Duration::from_secs(5)),
    },
    retain_data_on_teardown: true,
};
