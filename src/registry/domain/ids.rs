//! Identifier types for the registry domain.

use super::RegistryDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for an agent identifier.
const MAX_ID_LENGTH: usize = 128;

/// Globally unique identifier chosen by (or minted for) a registering agent.
///
/// Identifiers are trimmed and restricted to `[A-Za-z0-9_-]` so they can be
/// embedded in store keys and routing keys without escaping. A `.` would
/// split the routing-key word and let one agent's bindings match another's
/// inbox keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a validated agent identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::EmptyAgentId`] when the value is blank,
    /// [`RegistryDomainError::AgentIdTooLong`] when it exceeds 128
    /// characters, or [`RegistryDomainError::InvalidAgentId`] when it contains
    /// characters outside `[A-Za-z0-9_-]`.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(RegistryDomainError::EmptyAgentId);
        }
        if trimmed.len() > MAX_ID_LENGTH {
            return Err(RegistryDomainError::AgentIdTooLong(raw));
        }
        let is_valid = trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
        if !is_valid {
            return Err(RegistryDomainError::InvalidAgentId(raw));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Mints a fresh random identifier of the form `agent-<uuid>`.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("agent-{}", Uuid::new_v4()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name of the agent's inbox queue on the message bus.
    #[must_use]
    pub fn inbox_queue(&self) -> String {
        format!("agent.{}", self.0)
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for AgentId {
    type Error = RegistryDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
