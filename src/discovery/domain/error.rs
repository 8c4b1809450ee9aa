//! Error types for discovery domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing discovery domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryDomainError {
    /// Task complexity falls outside `1..=10`.
    #[error("task complexity {0} is outside 1..=10")]
    InvalidComplexity(u8),
}

/// Error returned while parsing a task type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task type: {0}")]
pub struct ParseTaskTypeError(pub String);

/// Error returned while parsing a load-balancing strategy name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown load-balancing strategy: {0}")]
pub struct ParseStrategyError(pub String);
