//! Agent specialisation types.

use super::ParseAgentTypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Specialisation declared by an agent at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// System design and technical planning.
    Architect,
    /// Server-side application development.
    Backend,
    /// Client-side and user interface development.
    Frontend,
    /// Schema design, queries, and data migrations.
    Database,
    /// Deployment, infrastructure, and operations.
    Devops,
    /// Test authoring and quality assurance.
    Testing,
    /// Security review and hardening.
    Security,
    /// Technical writing.
    Documentation,
}

impl AgentType {
    /// Every agent type, in index iteration order.
    pub const ALL: [Self; 8] = [
        Self::Architect,
        Self::Backend,
        Self::Frontend,
        Self::Database,
        Self::Devops,
        Self::Testing,
        Self::Security,
        Self::Documentation,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Backend => "backend",
            Self::Frontend => "frontend",
            Self::Database => "database",
            Self::Devops => "devops",
            Self::Testing => "testing",
            Self::Security => "security",
            Self::Documentation => "documentation",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentType {
    type Error = ParseAgentTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseAgentTypeError(value.to_owned()))
    }
}
