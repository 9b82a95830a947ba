// ABOUTME: Per-run context constructed once and passed to every component.
// ABOUTME: Replaces ambient process state; nothing reads globals after this.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::{Config, Environment, EnvironmentPolicy};
use crate::error::Result;
use crate::types::{ResourceId, StackHandle};

/// Cooperative cancellation flag, set by the operator interrupt handler and
/// checked at poll boundaries and before mutating calls.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that can never fire. Used for polls issued after a mutating
    /// call, which must run to a terminal outcome regardless of interrupts.
    pub fn disarmed() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polling cadence for waits against the provisioning system.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Caller-selected switches for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub auto_approve: bool,
    pub keep_data: bool,
    pub restore_test: bool,
}

/// Everything a run needs, resolved once at start. Components receive this
/// by reference; none of them read process-wide mutable state.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub handle: StackHandle,
    pub policy: &'static EnvironmentPolicy,
    pub template: Option<PathBuf>,
    pub data_store: Option<ResourceId>,
    pub network: Option<ResourceId>,
    pub estimated_monthly_cost_usd: Option<u32>,
    /// Expectation for the approval gate's identity cross-check.
    pub expected_account: Option<String>,
    /// Identity the provider credentials actually resolve to.
    pub resolved_account: Option<String>,
    pub flags: RunFlags,
    pub poll: PollSettings,
    pub cancel: CancelFlag,
}

impl RunContext {
    /// Build a context from the merged config for one environment.
    ///
    /// `resolved_account` is supplied by the caller (resolved ahead of the
    /// run) so the approval gate itself never issues provisioning calls.
    pub fn from_config(
        config: &Config,
        environment: Environment,
        flags: RunFlags,
        resolved_account: Option<String>,
        wait_time: Option<Duration>,
    ) -> Result<Self> {
        config.validate_overlay_keys()?;
        let merged = config.for_environment(environment);
        let region = merged.resolve_region()?;

        Ok(Self {
            handle: StackHandle::new(merged.stack.clone(), region, environment),
            policy: environment.policy(),
            template: merged.template.clone(),
            data_store: merged.data_store.clone(),
            network: merged.network.clone(),
            estimated_monthly_cost_usd: merged.estimated_monthly_cost_usd,
            expected_account: merged.resolve_expected_account(),
            resolved_account,
            flags,
            poll: PollSettings {
                interval: merged.poll.interval,
                timeout: wait_time.unwrap_or(merged.poll.timeout),
            },
            cancel: CancelFlag::new(),
        })
    }

    pub fn environment(&self) -> Environment {
        self.handle.environment
    }
}
