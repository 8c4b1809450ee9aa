//! Consumer-side message handlers.

use crate::bus::domain::Envelope;
use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Failure reported by a handler. The delivery is requeued until the retry
/// budget is spent, then dead-lettered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler failure.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result of handling one message: an optional reply payload.
pub type HandlerResult = Result<Option<serde_json::Value>, HandlerError>;

/// Processes messages delivered to an agent's queue.
///
/// A returned payload is published back to the sender when the envelope
/// carries `reply_to`.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one envelope.
    async fn handle(&self, envelope: &Envelope) -> HandlerResult;
}

/// Adapts an async closure into a [`MessageHandler`].
pub struct FnHandler<F> {
    handler: F,
}

/// Wraps `handler` as a [`MessageHandler`].
#[must_use]
pub const fn handler_fn<F, Fut>(handler: F) -> FnHandler<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler { handler }
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, envelope: &Envelope) -> HandlerResult {
        (self.handler)(envelope.clone()).await
    }
}
