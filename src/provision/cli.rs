// ABOUTME: Provisioner binding that shells out to the provider CLI.
// ABOUTME: Spawns the CLI per call and parses its JSON output.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::types::{ResourceId, SnapshotId, StackHandle};

use super::error::{ProvisionError, SpawnSnafu};
use super::types::{
    ResourceHealth, ResourceRecord, ResourceState, RestoreTarget, SnapshotState, SnapshotStatus,
    StackPhase, StackStatus,
};
use super::{SnapshotOps, StackOps};
use snafu::ResultExt;

/// Shells out to the provider CLI (`aws` by default). Every call is a fresh
/// subprocess; no session state is held between calls.
pub struct CliProvisioner {
    binary: String,
    region: String,
}

struct CliOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CliProvisioner {
    pub fn new(binary: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            region: region.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<CliOutput, ProvisionError> {
        tracing::debug!(binary = %self.binary, ?args, "invoking provider cli");

        let output = Command::new(&self.binary)
            .args(args)
            .args(["--region", &self.region, "--output", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context(SpawnSnafu)?;

        Ok(CliOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn parse<T: for<'de> Deserialize<'de>>(output: &CliOutput) -> Result<T, ProvisionError> {
        serde_json::from_str(&output.stdout).map_err(|e| ProvisionError::Malformed {
            detail: e.to_string(),
        })
    }

    /// Map a failed mutating call's stderr onto the error taxonomy. The
    /// provider reports a concurrent operation as an in-progress state
    /// conflict, which callers treat as a normal outcome.
    fn mutation_error(handle: &StackHandle, stderr: &str) -> ProvisionError {
        if stderr.contains("IN_PROGRESS") || stderr.contains("cannot be updated") {
            ProvisionError::AlreadyInProgress {
                stack: handle.stack.to_string(),
                detail: first_line(stderr),
            }
        } else if stderr.contains("does not exist") {
            ProvisionError::StackNotFound {
                stack: handle.stack.to_string(),
            }
        } else {
            ProvisionError::Api {
                detail: first_line(stderr),
            }
        }
    }
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or("").trim().to_string()
}

#[derive(Deserialize)]
struct DescribeStacksResponse {
    #[serde(rename = "Stacks")]
    stacks: Vec<StackRecordWire>,
}

#[derive(Deserialize)]
struct StackRecordWire {
    #[serde(rename = "StackStatus")]
    status: String,
    #[serde(rename = "StackStatusReason")]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct CallerIdentityResponse {
    #[serde(rename = "Account")]
    account: String,
}

#[derive(Deserialize)]
struct DescribeSnapshotsResponse {
    #[serde(rename = "DBSnapshots")]
    snapshots: Vec<SnapshotWire>,
}

#[derive(Deserialize)]
struct SnapshotWire {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "PercentProgress")]
    percent_progress: Option<u8>,
}

#[derive(Deserialize)]
struct DescribeInstancesResponse {
    #[serde(rename = "DBInstances")]
    instances: Vec<InstanceWire>,
}

#[derive(Deserialize)]
struct InstanceWire {
    #[serde(rename = "DBInstanceIdentifier")]
    identifier: String,
    #[serde(rename = "DBInstanceStatus")]
    status: String,
    #[serde(rename = "InstanceCreateTime")]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "Endpoint")]
    endpoint: Option<EndpointWire>,
    #[serde(rename = "TagList", default)]
    tags: Vec<TagWire>,
}

#[derive(Deserialize)]
struct EndpointWire {
    #[serde(rename = "Address")]
    address: String,
}

#[derive(Deserialize)]
struct TagWire {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: String,
}

#[async_trait]
impl StackOps for CliProvisioner {
    async fn describe_stack(&self, handle: &StackHandle) -> Result<StackStatus, ProvisionError> {
        let output = self
            .run(&[
                "cloudformation",
                "describe-stacks",
                "--stack-name",
                handle.stack.as_str(),
            ])
            .await?;

        if !output.success {
            if output.stderr.contains("does not exist") {
                return Ok(StackStatus::new(StackPhase::NotFound, None));
            }
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }

        let response: DescribeStacksResponse = Self::parse(&output)?;
        let record = response
            .stacks
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::Malformed {
                detail: "describe-stacks returned an empty stack list".to_string(),
            })?;

        let phase = record
            .status
            .parse::<StackPhase>()
            .map_err(|e| ProvisionError::Malformed {
                detail: e.to_string(),
            })?;

        Ok(StackStatus::new(phase, record.reason))
    }

    async fn create_or_update_stack(
        &self,
        handle: &StackHandle,
        template: &Path,
    ) -> Result<(), ProvisionError> {
        let body = format!("file://{}", template.display());
        let current = self.describe_stack(handle).await?;

        let verb = if current.phase == StackPhase::NotFound {
            "create-stack"
        } else {
            "update-stack"
        };

        let output = self
            .run(&[
                "cloudformation",
                verb,
                "--stack-name",
                handle.stack.as_str(),
                "--template-body",
                &body,
                "--capabilities",
                "CAPABILITY_NAMED_IAM",
            ])
            .await?;

        if !output.success {
            // "No updates" means the template already matches; the poll will
            // observe the existing terminal phase.
            if output.stderr.contains("No updates are to be performed") {
                return Ok(());
            }
            return Err(Self::mutation_error(handle, &output.stderr));
        }

        Ok(())
    }

    async fn delete_stack(&self, handle: &StackHandle) -> Result<(), ProvisionError> {
        let output = self
            .run(&[
                "cloudformation",
                "delete-stack",
                "--stack-name",
                handle.stack.as_str(),
            ])
            .await?;

        if !output.success {
            return Err(Self::mutation_error(handle, &output.stderr));
        }
        Ok(())
    }

    async fn cancel_update(&self, handle: &StackHandle) -> Result<(), ProvisionError> {
        let output = self
            .run(&[
                "cloudformation",
                "cancel-update-stack",
                "--stack-name",
                handle.stack.as_str(),
            ])
            .await?;

        if !output.success {
            return Err(Self::mutation_error(handle, &output.stderr));
        }
        Ok(())
    }

    async fn continue_rollback(&self, handle: &StackHandle) -> Result<(), ProvisionError> {
        let output = self
            .run(&[
                "cloudformation",
                "continue-update-rollback",
                "--stack-name",
                handle.stack.as_str(),
            ])
            .await?;

        if !output.success {
            return Err(Self::mutation_error(handle, &output.stderr));
        }
        Ok(())
    }

    async fn resolve_identity(&self) -> Result<String, ProvisionError> {
        let output = self.run(&["sts", "get-caller-identity"]).await?;

        if !output.success {
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }

        let identity: CallerIdentityResponse = Self::parse(&output)?;
        Ok(identity.account)
    }
}

#[async_trait]
impl SnapshotOps for CliProvisioner {
    async fn create_snapshot(
        &self,
        resource: &ResourceId,
        snapshot: &SnapshotId,
    ) -> Result<(), ProvisionError> {
        let output = self
            .run(&[
                "rds",
                "create-db-snapshot",
                "--db-instance-identifier",
                resource.as_str(),
                "--db-snapshot-identifier",
                snapshot.as_str(),
            ])
            .await?;

        if !output.success {
            if output.stderr.contains("DBInstanceNotFound") {
                return Err(ProvisionError::ResourceNotFound {
                    resource: resource.to_string(),
                });
            }
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }
        Ok(())
    }

    async fn describe_snapshot(
        &self,
        snapshot: &SnapshotId,
    ) -> Result<SnapshotStatus, ProvisionError> {
        let output = self
            .run(&[
                "rds",
                "describe-db-snapshots",
                "--db-snapshot-identifier",
                snapshot.as_str(),
            ])
            .await?;

        if !output.success {
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }

        let response: DescribeSnapshotsResponse = Self::parse(&output)?;
        let record = response
            .snapshots
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::ResourceNotFound {
                resource: snapshot.to_string(),
            })?;

        let state = match record.status.as_str() {
            "available" => SnapshotState::Available,
            "failed" | "error" => SnapshotState::Failed,
            _ => SnapshotState::Creating,
        };

        Ok(SnapshotStatus {
            state,
            progress_percent: record.percent_progress,
        })
    }

    async fn restore_from_snapshot(
        &self,
        snapshot: &SnapshotId,
        target: &RestoreTarget,
    ) -> Result<ResourceId, ProvisionError> {
        let tags: Vec<String> = target
            .tags
            .iter()
            .map(|(k, v)| format!("Key={k},Value={v}"))
            .collect();

        let mut args = vec![
            "rds",
            "restore-db-instance-from-db-snapshot",
            "--db-instance-identifier",
            target.instance_id.as_str(),
            "--db-snapshot-identifier",
            snapshot.as_str(),
        ];
        if !target.publicly_accessible {
            args.push("--no-publicly-accessible");
        }
        if !tags.is_empty() {
            args.push("--tags");
            for tag in &tags {
                args.push(tag);
            }
        }

        let output = self.run(&args).await?;

        if !output.success {
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }

        Ok(target.instance_id.clone())
    }

    async fn describe_resource(
        &self,
        resource: &ResourceId,
    ) -> Result<ResourceHealth, ProvisionError> {
        let output = self
            .run(&[
                "rds",
                "describe-db-instances",
                "--db-instance-identifier",
                resource.as_str(),
            ])
            .await?;

        if !output.success {
            if output.stderr.contains("DBInstanceNotFound") {
                return Err(ProvisionError::ResourceNotFound {
                    resource: resource.to_string(),
                });
            }
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }

        let response: DescribeInstancesResponse = Self::parse(&output)?;
        let record = response
            .instances
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::ResourceNotFound {
                resource: resource.to_string(),
            })?;

        let state = match record.status.as_str() {
            "available" => ResourceState::Available,
            "failed" | "incompatible-restore" => ResourceState::Failed,
            "deleting" => ResourceState::Deleting,
            _ => ResourceState::Creating,
        };

        Ok(ResourceHealth {
            state,
            endpoint: record.endpoint.map(|e| e.address),
        })
    }

    async fn delete_resource(&self, resource: &ResourceId) -> Result<(), ProvisionError> {
        let output = self
            .run(&[
                "rds",
                "delete-db-instance",
                "--db-instance-identifier",
                resource.as_str(),
                "--skip-final-snapshot",
            ])
            .await?;

        if !output.success {
            if output.stderr.contains("DBInstanceNotFound") {
                return Err(ProvisionError::ResourceNotFound {
                    resource: resource.to_string(),
                });
            }
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }
        Ok(())
    }

    async fn list_resources(&self, prefix: &str) -> Result<Vec<ResourceRecord>, ProvisionError> {
        let output = self.run(&["rds", "describe-db-instances"]).await?;

        if !output.success {
            return Err(ProvisionError::Api {
                detail: first_line(&output.stderr),
            });
        }

        let response: DescribeInstancesResponse = Self::parse(&output)?;
        let records = response
            .instances
            .into_iter()
            .filter(|i| i.identifier.starts_with(prefix))
            .map(|i| ResourceRecord {
                id: ResourceId::new(i.identifier),
                created_at: i.created_at.unwrap_or_else(Utc::now),
                tags: i
                    .tags
                    .into_iter()
                    .map(|t| (t.key, t.value))
                    .collect::<HashMap<_, _>>(),
            })
            .collect();

        Ok(records)
    }
}
