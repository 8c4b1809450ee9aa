//! Queue declarations and dead-letter records.

use super::Envelope;
use crate::config::BusConfig;
use crate::registry::domain::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Declaration of a queue and its dead-letter policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name.
    pub name: String,
    /// Survives broker restarts.
    pub durable: bool,
    /// Owned by the declaring connection and removed when it closes.
    pub exclusive: bool,
    /// Exchange receiving dead letters.
    pub dead_letter_exchange: String,
    /// Routing key used for dead letters.
    pub dead_letter_routing_key: String,
    /// Lifetime of an undelivered message.
    pub message_ttl: Duration,
    /// Redeliveries allowed after the first failed delivery.
    pub max_retries: u32,
}

impl QueueSpec {
    /// Creates a durable, shared spec for `name` with dead-letter policy
    /// taken from `config`. Dead letters are routed as `failed.<name>`.
    #[must_use]
    pub fn new(name: impl Into<String>, config: &BusConfig) -> Self {
        let queue = name.into();
        Self {
            dead_letter_routing_key: format!("failed.{queue}"),
            name: queue,
            durable: true,
            exclusive: false,
            dead_letter_exchange: config.dead_letter_exchange.clone(),
            message_ttl: config.message_ttl(),
            max_retries: config.max_retries,
        }
    }

    /// Creates a spec for `name` owned by `agent_id`. Dead letters are
    /// routed as `failed.<agent_id>`.
    #[must_use]
    pub fn for_agent(name: impl Into<String>, agent_id: &AgentId, config: &BusConfig) -> Self {
        Self::new(name, config).with_dead_letter_routing_key(Self::dead_letter_key(agent_id))
    }

    /// Returns the dead-letter routing key for `agent_id`.
    #[must_use]
    pub fn dead_letter_key(agent_id: &AgentId) -> String {
        format!("failed.{agent_id}")
    }

    /// Sets durability.
    #[must_use]
    pub const fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Sets exclusivity.
    #[must_use]
    pub const fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Overrides the dead-letter routing key.
    #[must_use]
    pub fn with_dead_letter_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.dead_letter_routing_key = routing_key.into();
        self
    }

    /// Overrides the message lifetime.
    #[must_use]
    pub const fn with_message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = ttl;
        self
    }

    /// Overrides the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Why a message left its queue for the dead-letter exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// The consumer rejected it without requeue.
    Rejected,
    /// Every allowed redelivery failed.
    RetriesExhausted,
    /// It waited in the queue past its lifetime.
    Expired,
}

impl DeadLetterReason {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dead letter held by the broker because no queue was bound to receive
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    /// Queue the message was dead-lettered from.
    pub source_queue: String,
    /// Routing key it was dead-lettered with.
    pub routing_key: String,
    /// Why it was dead-lettered.
    pub reason: DeadLetterReason,
    /// Deliveries attempted before dead-lettering.
    pub attempts: u32,
    /// When it was dead-lettered.
    pub dead_lettered_at: DateTime<Utc>,
    /// The message, with death headers added.
    pub envelope: Envelope,
}
