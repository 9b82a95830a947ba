// ABOUTME: StackHandle identifies one provisioned stack instance.
// ABOUTME: Created at orchestration start and used as the correlation key.

use std::fmt;

use crate::config::Environment;

use super::StackName;

/// Identifies one provisioned stack instance. Created once at orchestration
/// start, never mutated, and passed to every provisioning call for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackHandle {
    pub stack: StackName,
    pub region: String,
    pub environment: Environment,
}

impl StackHandle {
    pub fn new(stack: StackName, region: impl Into<String>, environment: Environment) -> Self {
        Self {
            stack,
            region: region.into(),
            environment,
        }
    }
}

impl fmt::Display for StackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.stack, self.environment, self.region)
    }
}
