//! Scoped ownership of temporary reply queues.

use crate::bus::ports::MessageBroker;
use std::sync::Arc;
use tracing::{debug, warn};

/// Deletes a reply queue when released or dropped.
///
/// Dropping without [`Self::release`] (for example when the waiting future
/// is cancelled) schedules the deletion on the current runtime.
pub(super) struct ReplyQueueGuard<B>
where
    B: MessageBroker + 'static,
{
    broker: Arc<B>,
    queue: String,
    armed: bool,
}

impl<B> ReplyQueueGuard<B>
where
    B: MessageBroker + 'static,
{
    pub(super) const fn new(broker: Arc<B>, queue: String) -> Self {
        Self {
            broker,
            queue,
            armed: true,
        }
    }

    pub(super) fn queue(&self) -> &str {
        &self.queue
    }

    /// Deletes the queue now.
    pub(super) async fn release(mut self) {
        self.armed = false;
        delete(&*self.broker, &self.queue).await;
    }
}

impl<B> Drop for ReplyQueueGuard<B>
where
    B: MessageBroker + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(queue = %self.queue, "no runtime to delete abandoned reply queue");
            return;
        };
        let broker = Arc::clone(&self.broker);
        let queue = std::mem::take(&mut self.queue);
        runtime.spawn(async move {
            delete(&*broker, &queue).await;
        });
    }
}

async fn delete<B: MessageBroker + ?Sized>(broker: &B, queue: &str) {
    match broker.delete_queue(queue).await {
        Ok(_) => debug!(queue, "reply queue deleted"),
        Err(err) => warn!(queue, error = %err, "failed to delete reply queue"),
    }
}
