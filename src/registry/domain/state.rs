//! Agent lifecycle states.

use super::ParseAgentStateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state reported by an agent in its health record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// The agent is starting up and not yet accepting work.
    Initializing,
    /// The agent is waiting for work.
    Idle,
    /// The agent is executing work but may accept more.
    Busy,
    /// The agent is draining before shutdown.
    Stopping,
    /// The agent has shut down.
    Stopped,
    /// The agent hit an unrecoverable error.
    Error,
    /// The agent reported itself unhealthy.
    Unhealthy,
}

impl AgentState {
    /// Every lifecycle state.
    pub const ALL: [Self; 7] = [
        Self::Initializing,
        Self::Idle,
        Self::Busy,
        Self::Stopping,
        Self::Stopped,
        Self::Error,
        Self::Unhealthy,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Returns whether discovery may route new work to an agent in this state.
    #[must_use]
    pub const fn accepts_work(self) -> bool {
        matches!(self, Self::Idle | Self::Busy)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AgentState {
    type Error = ParseAgentStateError;

    fn try_from(value: &str) -> Result<Self, <Self as TryFrom<&str>>::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseAgentStateError(value.to_owned()))
    }
}
