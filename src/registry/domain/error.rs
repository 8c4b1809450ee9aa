//! Error types for registry domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryDomainError {
    /// The agent identifier is empty after trimming.
    #[error("agent id must not be empty")]
    EmptyAgentId,

    /// The agent identifier contains characters outside `[A-Za-z0-9_-]`.
    #[error("agent id '{0}' contains invalid characters (only alphanumerics, '_' and '-' allowed)")]
    InvalidAgentId(String),

    /// The agent identifier exceeds the 128-character limit.
    #[error("agent id exceeds 128 character limit: {0}")]
    AgentIdTooLong(String),

    /// The agent display name is empty after trimming.
    #[error("agent name must not be empty")]
    EmptyAgentName,

    /// A capability name is empty after trimming.
    #[error("capability name must not be empty")]
    EmptyCapability,

    /// A complexity range falls outside `1..=10` or is inverted.
    #[error("invalid complexity range {min}..={max} (bounds must satisfy 1 <= min <= max <= 10)")]
    InvalidComplexityRange {
        /// Requested lower bound.
        min: u8,
        /// Requested upper bound.
        max: u8,
    },
}

/// Error returned while parsing an agent type from persistence or input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent type: {0}")]
pub struct ParseAgentTypeError(pub String);

/// Error returned while parsing an agent state from persistence or input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown agent state: {0}")]
pub struct ParseAgentStateError(pub String);
