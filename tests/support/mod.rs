// ABOUTME: Shared test support: a scripted fake provisioner and prompter.
// ABOUTME: Drives the orchestrator without any real provisioning system.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use strato::approval::{PromptError, Prompter};
use strato::config::Environment;
use strato::context::{CancelFlag, PollSettings, RunContext, RunFlags};
use strato::provision::{
    ProvisionError, ResourceHealth, ResourceRecord, ResourceState, RestoreTarget, SnapshotOps,
    SnapshotState, SnapshotStatus, StackOps, StackPhase, StackStatus,
};
use strato::types::{ResourceId, SnapshotId, StackHandle, StackName};
use tempfile::TempDir;

/// Fake provisioning system driven by scripted status sequences. The last
/// entry of each sequence repeats, so polls eventually settle.
#[derive(Default)]
pub struct FakeProvisioner {
    phases: Mutex<VecDeque<StackPhase>>,
    snapshot_states: Mutex<VecDeque<SnapshotState>>,
    resource_states: Mutex<VecDeque<ResourceState>>,
    resources: Mutex<Vec<ResourceRecord>>,
    identity: Option<String>,
    fail_create_or_update: Mutex<Option<ProvisionError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeProvisioner {
    pub fn with_phases(phases: Vec<StackPhase>) -> Self {
        Self {
            phases: Mutex::new(phases.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn snapshot_states(mut self, states: Vec<SnapshotState>) -> Self {
        self.snapshot_states = Mutex::new(states.into_iter().collect());
        self
    }

    pub fn resource_states(mut self, states: Vec<ResourceState>) -> Self {
        self.resource_states = Mutex::new(states.into_iter().collect());
        self
    }

    pub fn with_resources(mut self, resources: Vec<ResourceRecord>) -> Self {
        self.resources = Mutex::new(resources);
        self
    }

    pub fn identity(mut self, account: &str) -> Self {
        self.identity = Some(account.to_string());
        self
    }

    pub fn fail_create_or_update(self, error: ProvisionError) -> Self {
        *self.fail_create_or_update.lock() = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    fn next_phase(&self) -> StackPhase {
        let mut phases = self.phases.lock();
        if phases.len() > 1 {
            phases.pop_front().expect("non-empty")
        } else {
            *phases.front().expect("phase script must not be empty")
        }
    }
}

#[async_trait]
impl StackOps for FakeProvisioner {
    async fn describe_stack(&self, _handle: &StackHandle) -> Result<StackStatus, ProvisionError> {
        self.record("describe_stack");
        Ok(StackStatus::new(self.next_phase(), None))
    }

    async fn create_or_update_stack(
        &self,
        _handle: &StackHandle,
        _template: &Path,
    ) -> Result<(), ProvisionError> {
        self.record("create_or_update_stack");
        match self.fail_create_or_update.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn delete_stack(&self, _handle: &StackHandle) -> Result<(), ProvisionError> {
        self.record("delete_stack");
        Ok(())
    }

    async fn cancel_update(&self, _handle: &StackHandle) -> Result<(), ProvisionError> {
        self.record("cancel_update");
        Ok(())
    }

    async fn continue_rollback(&self, _handle: &StackHandle) -> Result<(), ProvisionError> {
        self.record("continue_rollback");
        Ok(())
    }

    async fn resolve_identity(&self) -> Result<String, ProvisionError> {
        self.record("resolve_identity");
        self.identity.clone().ok_or(ProvisionError::Api {
            detail: "no identity scripted".to_string(),
        })
    }
}

#[async_trait]
impl SnapshotOps for FakeProvisioner {
    async fn create_snapshot(
        &self,
        _resource: &ResourceId,
        _snapshot: &SnapshotId,
    ) -> Result<(), ProvisionError> {
        self.record("create_snapshot");
        Ok(())
    }

    async fn describe_snapshot(
        &self,
        _snapshot: &SnapshotId,
    ) -> Result<SnapshotStatus, ProvisionError> {
        self.record("describe_snapshot");
        let mut states = self.snapshot_states.lock();
        let state = if states.len() > 1 {
            states.pop_front().expect("non-empty")
        } else {
            *states.front().expect("snapshot script must not be empty")
        };
        Ok(SnapshotStatus {
            state,
            progress_percent: None,
        })
    }

    async fn restore_from_snapshot(
        &self,
        _snapshot: &SnapshotId,
        target: &RestoreTarget,
    ) -> Result<ResourceId, ProvisionError> {
        self.record("restore_from_snapshot");
        Ok(target.instance_id.clone())
    }

    async fn describe_resource(
        &self,
        _resource: &ResourceId,
    ) -> Result<ResourceHealth, ProvisionError> {
        self.record("describe_resource");
        let mut states = self.resource_states.lock();
        let state = if states.len() > 1 {
            states.pop_front().expect("non-empty")
        } else {
            *states.front().expect("resource script must not be empty")
        };
        Ok(ResourceHealth {
            state,
            endpoint: match state {
                ResourceState::Available => Some("restored.internal.example".to_string()),
                _ => None,
            },
        })
    }

    async fn delete_resource(&self, resource: &ResourceId) -> Result<(), ProvisionError> {
        self.record("delete_resource");
        self.resources.lock().retain(|r| &r.id != resource);
        Ok(())
    }

    async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceRecord>, ProvisionError> {
        self.record("list_resources");
        Ok(self
            .resources
            .lock()
            .iter()
            .filter(|r| r.id.as_str().starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Scripted prompter: pops answers in order. Panics when a test asks more
/// questions than the script expects.
pub struct ScriptedPrompter {
    confirms: Mutex<VecDeque<bool>>,
    inputs: Mutex<VecDeque<String>>,
}

impl ScriptedPrompter {
    pub fn new(confirms: Vec<bool>, inputs: Vec<&str>) -> Self {
        Self {
            confirms: Mutex::new(confirms.into_iter().collect()),
            inputs: Mutex::new(inputs.into_iter().map(String::from).collect()),
        }
    }

    /// For runs that must never prompt.
    pub fn silent() -> Self {
        Self::new(vec![], vec![])
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, _prompt: &str) -> Result<bool, PromptError> {
        Ok(self
            .confirms
            .lock()
            .pop_front()
            .expect("unexpected confirm prompt"))
    }

    fn input(&self, _prompt: &str) -> Result<String, PromptError> {
        Ok(self
            .inputs
            .lock()
            .pop_front()
            .expect("unexpected input prompt"))
    }
}

/// A run context over a real template file in `dir`, with fast polling.
pub fn run_context(
    environment: Environment,
    stack: &str,
    dir: &TempDir,
    flags: RunFlags,
) -> RunContext {
    let template = dir.path().join("stack.yml");
    std::fs::write(
        &template,
        "Resources:\n  Db:\n    Encrypted: true\n  HighCpuAlarm:\n    Threshold: 90\n",
    )
    .expect("write template");

    RunContext {
        handle: StackHandle::new(
            StackName::new(stack).expect("valid stack name"),
            "eu-west-1",
            environment,
        ),
        policy: environment.policy(),
        template: Some(template),
        data_store: Some(ResourceId::new("demo-db")),
        network: None,
        estimated_monthly_cost_usd: Some(40),
        expected_account: Some("123456789012".to_string()),
        resolved_account: Some("123456789012".to_string()),
        flags,
        poll: PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(2),
        },
        cancel: CancelFlag::new(),
    }
}

/// An expired, correctly tagged restore-test resource record.
pub fn test_resource_record(id: &str, age_hours: i64, ephemeral: bool) -> ResourceRecord {
    let mut tags = std::collections::HashMap::new();
    if ephemeral {
        tags.insert("strato.ephemeral".to_string(), "true".to_string());
    }
    ResourceRecord {
        id: ResourceId::new(id),
        created_at: Utc::now() - chrono::Duration::hours(age_hours),
        tags,
    }
}
