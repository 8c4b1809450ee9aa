//! Broker port for topic exchanges, queues, and acknowledgements.

use crate::bus::domain::{Delivery, Envelope, QueueSpec};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Maximum unacknowledged deliveries buffered per consumer.
pub const DELIVERY_BUFFER: usize = 32;

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Messaging broker contract.
///
/// Exchanges are topic exchanges. Messages are at-least-once: a delivery
/// stays outstanding until acked or nacked, and nacked deliveries are
/// requeued until the queue's retry budget is spent, then dead-lettered.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Opens the connection. Connecting twice is a no-op.
    async fn connect(&self) -> BrokerResult<()>;

    /// Closes the connection, ending consumers and dropping exclusive
    /// queues. Closing twice is a no-op.
    async fn close(&self) -> BrokerResult<()>;

    /// Declares a topic exchange. Redeclaring is a no-op.
    async fn declare_exchange(&self, name: &str) -> BrokerResult<()>;

    /// Declares a queue. Redeclaring an existing queue keeps its contents.
    async fn declare_queue(&self, spec: &QueueSpec) -> BrokerResult<()>;

    /// Deletes a queue and its bindings. Returns `false` when it did not
    /// exist.
    async fn delete_queue(&self, name: &str) -> BrokerResult<bool>;

    /// Returns whether a queue exists.
    async fn queue_exists(&self, name: &str) -> BrokerResult<bool>;

    /// Binds `queue` to `exchange` for routing keys matching `pattern`.
    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> BrokerResult<()>;

    /// Publishes `envelope` to `exchange` using its routing key. Returns the
    /// number of queues the message was routed to.
    async fn publish(&self, exchange: &str, envelope: Envelope) -> BrokerResult<usize>;

    /// Starts consuming `queue`, replacing any previous consumer. Deliveries
    /// outstanding to a replaced consumer are requeued.
    async fn consume(&self, queue: &str) -> BrokerResult<mpsc::Receiver<Delivery>>;

    /// Acknowledges a delivery.
    async fn ack(&self, queue: &str, delivery_tag: u64) -> BrokerResult<()>;

    /// Rejects a delivery. With `requeue` the message is redelivered while
    /// the retry budget lasts; otherwise it is dead-lettered at once.
    async fn nack(&self, queue: &str, delivery_tag: u64, requeue: bool) -> BrokerResult<()>;
}

/// Errors returned by broker implementations.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// The broker cannot be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),

    /// The operation needs an open connection.
    #[error("broker connection is not open")]
    NotConnected,

    /// The named exchange was never declared.
    #[error("exchange {0} does not exist")]
    UnknownExchange(String),

    /// The named queue does not exist.
    #[error("queue {0} does not exist")]
    UnknownQueue(String),

    /// The delivery tag is not outstanding on the queue.
    #[error("delivery {delivery_tag} is not outstanding on queue {queue}")]
    UnknownDelivery {
        /// Queue the tag was presented to.
        queue: String,
        /// Presented tag.
        delivery_tag: u64,
    },
}

impl BrokerError {
    /// Wraps a transport failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
