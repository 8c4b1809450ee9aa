//! Message classification, priority, addressing, and lifecycle state.

use super::{BusDomainError, ParseMessageTypeError};
use crate::registry::domain::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Purpose of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Work handed to an agent.
    TaskRequest,
    /// Result returned for a task request.
    TaskResponse,
    /// Progress or lifecycle notification.
    StatusUpdate,
    /// Liveness probe.
    HealthCheck,
    /// Fan-out announcement.
    Broadcast,
    /// Agent-to-agent coordination.
    Coordination,
    /// Failure report.
    Error,
}

impl MessageType {
    /// Every message type.
    pub const ALL: [Self; 7] = [
        Self::TaskRequest,
        Self::TaskResponse,
        Self::StatusUpdate,
        Self::HealthCheck,
        Self::Broadcast,
        Self::Coordination,
        Self::Error,
    ];

    /// Returns the canonical representation, also used as the last routing
    /// key segment for direct sends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskRequest => "task_request",
            Self::TaskResponse => "task_response",
            Self::StatusUpdate => "status_update",
            Self::HealthCheck => "health_check",
            Self::Broadcast => "broadcast",
            Self::Coordination => "coordination",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MessageType {
    type Error = ParseMessageTypeError;

    fn try_from(value: &str) -> Result<Self, <Self as TryFrom<&str>>::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseMessageTypeError(value.to_owned()))
    }
}

/// Delivery priority from 1 (lowest) to 10 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Lowest priority.
    pub const MIN: Self = Self(1);
    /// Highest priority.
    pub const MAX: Self = Self(10);
    /// Priority used when callers do not choose one.
    pub const NORMAL: Self = Self(5);

    /// Creates a priority, clamping into `1..=10`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value < Self::MIN.0 {
            Self::MIN
        } else if value > Self::MAX.0 {
            Self::MAX
        } else {
            Self(value)
        }
    }

    /// Returns the numeric priority.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

/// Addressee of a message: one agent or everyone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recipient {
    /// A single agent.
    Agent(AgentId),
    /// Every listening agent, written `*`.
    All,
}

impl Recipient {
    const WILDCARD: &'static str = "*";

    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Agent(agent_id) => agent_id.as_str(),
            Self::All => Self::WILDCARD,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AgentId> for Recipient {
    fn from(agent_id: AgentId) -> Self {
        Self::Agent(agent_id)
    }
}

impl TryFrom<String> for Recipient {
    type Error = BusDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim() == Self::WILDCARD {
            return Ok(Self::All);
        }
        AgentId::new(value.as_str())
            .map(Self::Agent)
            .map_err(|_| BusDomainError::InvalidRecipient(value))
    }
}

impl From<Recipient> for String {
    fn from(recipient: Recipient) -> Self {
        match recipient {
            Recipient::Agent(agent_id) => agent_id.as_str().to_owned(),
            Recipient::All => Recipient::WILDCARD.to_owned(),
        }
    }
}

/// Lifecycle of one queued copy of a message.
///
/// ```text
/// published -> enqueued -> delivered -> acked
///                  ^           |
///                  +- requeued +-> dead_lettered
/// ```
///
/// A message that expires while enqueued is also dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Accepted by an exchange.
    Published,
    /// Waiting in a queue.
    Enqueued,
    /// Handed to a consumer and awaiting acknowledgement.
    Delivered,
    /// Acknowledged by the consumer.
    Acked,
    /// Rejected by the consumer and queued for redelivery.
    Requeued,
    /// Moved to the dead-letter exchange.
    DeadLettered,
}

impl MessageState {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Enqueued => "enqueued",
            Self::Delivered => "delivered",
            Self::Acked => "acked",
            Self::Requeued => "requeued",
            Self::DeadLettered => "dead_lettered",
        }
    }

    /// Returns whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Acked | Self::DeadLettered)
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
