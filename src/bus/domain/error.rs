//! Error types for bus domain parsing.

use thiserror::Error;

/// Errors returned while constructing bus domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusDomainError {
    /// A recipient is neither `*` nor a valid agent id.
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),
}

/// Error returned while parsing a message type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown message type: {0}")]
pub struct ParseMessageTypeError(pub String);
