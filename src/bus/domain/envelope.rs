//! Message envelopes and broker deliveries.

use super::{CorrelationId, MessageId, MessageType, Priority, Recipient};
use crate::registry::domain::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Header names carried on every envelope.
pub mod headers {
    /// Sending agent id.
    pub const SENDER: &str = "sender";
    /// Recipient agent id or `*`.
    pub const RECIPIENT: &str = "recipient";
    /// Message type name.
    pub const MESSAGE_TYPE: &str = "message_type";
    /// Broadcast narrowing filter, when present.
    pub const FILTER: &str = "filter";
    /// Why a message was dead-lettered.
    pub const DEATH_REASON: &str = "x-death-reason";
    /// Queue a dead-lettered message came from.
    pub const DEATH_QUEUE: &str = "x-death-queue";
    /// Routing key a dead-lettered message was originally published with.
    pub const ORIGINAL_ROUTING_KEY: &str = "x-original-routing-key";
}

/// A message together with its routing and correlation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message id.
    pub id: MessageId,
    /// Agent that sent the message.
    pub sender_id: AgentId,
    /// Addressee.
    pub recipient: Recipient,
    /// Purpose of the message.
    pub message_type: MessageType,
    /// Delivery priority.
    pub priority: Priority,
    /// When the message was created.
    pub created_at: DateTime<Utc>,
    /// Absolute expiry, if the sender set one.
    pub expires_at: Option<DateTime<Utc>>,
    /// Pairs a reply with its request.
    pub correlation_id: Option<CorrelationId>,
    /// Routing key replies should be published to.
    pub reply_to: Option<String>,
    /// Topic routing key.
    pub routing_key: String,
    /// String headers for filtering.
    pub headers: BTreeMap<String, String>,
    /// Opaque payload.
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns whether the sender-set expiry has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// One delivery of a queued message to a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Queue the message was consumed from.
    pub queue: String,
    /// Broker-assigned tag used to ack or nack this delivery.
    pub delivery_tag: u64,
    /// Delivery attempt, starting at 1.
    pub attempt: u32,
    /// The message.
    pub envelope: Envelope,
}

impl Delivery {
    /// Returns whether this message was delivered before.
    #[must_use]
    pub const fn redelivered(&self) -> bool {
        self.attempt > 1
    }
}
