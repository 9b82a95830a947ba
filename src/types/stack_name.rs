// ABOUTME: Validated stack name newtype.
// ABOUTME: Enforces the provisioning system's naming rules at construction.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackNameError {
    #[error("stack name cannot be empty")]
    Empty,

    #[error("stack name exceeds maximum length of 128 characters")]
    TooLong,

    #[error("stack name must start with a letter")]
    InvalidStart,

    #[error("stack name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("invalid character in stack name: '{0}'")]
    InvalidChar(char),
}

/// A validated stack name: letters, digits, and hyphens, starting with a
/// letter. Matches what the provisioning system accepts, so an invalid name
/// is rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackName(String);

impl StackName {
    pub fn new(value: &str) -> Result<Self, StackNameError> {
        if value.is_empty() {
            return Err(StackNameError::Empty);
        }

        if value.len() > 128 {
            return Err(StackNameError::TooLong);
        }

        let first = value.chars().next().unwrap_or(' ');
        if !first.is_ascii_alphabetic() {
            return Err(StackNameError::InvalidStart);
        }

        if value.ends_with('-') {
            return Err(StackNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && c != '-' {
                return Err(StackNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
