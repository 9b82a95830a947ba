// ABOUTME: Provisioning-system error types with SNAFU pattern.
// ABOUTME: Exposes an error kind for programmatic branching on failure mode.

use snafu::Snafu;

/// Errors from calls into the stack provisioning system.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProvisionError {
    #[snafu(display("an operation is already in progress for stack {stack}: {detail}"))]
    AlreadyInProgress { stack: String, detail: String },

    #[snafu(display("stack not found: {stack}"))]
    StackNotFound { stack: String },

    #[snafu(display("resource not found: {resource}"))]
    ResourceNotFound { resource: String },

    #[snafu(display("provider call failed: {detail}"))]
    Api { detail: String },

    #[snafu(display("failed to invoke provider cli: {source}"))]
    Spawn { source: std::io::Error },

    #[snafu(display("unparseable provider response: {detail}"))]
    Malformed { detail: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionErrorKind {
    /// The provisioning system rejected a second concurrent mutating call.
    /// A normal, expected outcome — reported, never retried within a run.
    AlreadyInProgress,
    /// The referenced stack or resource does not exist.
    NotFound,
    /// The provider call itself failed.
    Api,
    /// The provider CLI could not be invoked.
    Invocation,
    /// The provider's response could not be parsed.
    Malformed,
}

impl ProvisionError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ProvisionErrorKind {
        match self {
            ProvisionError::AlreadyInProgress { .. } => ProvisionErrorKind::AlreadyInProgress,
            ProvisionError::StackNotFound { .. } | ProvisionError::ResourceNotFound { .. } => {
                ProvisionErrorKind::NotFound
            }
            ProvisionError::Api { .. } => ProvisionErrorKind::Api,
            ProvisionError::Spawn { .. } => ProvisionErrorKind::Invocation,
            ProvisionError::Malformed { .. } => ProvisionErrorKind::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_variants() {
        let err = ProvisionError::AlreadyInProgress {
            stack: "s".into(),
            detail: "update running".into(),
        };
        assert_eq!(err.kind(), ProvisionErrorKind::AlreadyInProgress);

        let err = ProvisionError::StackNotFound { stack: "s".into() };
        assert_eq!(err.kind(), ProvisionErrorKind::NotFound);

        let err = ProvisionError::Api { detail: "x".into() };
        assert_eq!(err.kind(), ProvisionErrorKind::Api);
    }
}
