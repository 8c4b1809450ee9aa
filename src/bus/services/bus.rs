//! Service layer for publishing, consuming, and request/response messaging.

use super::handler::MessageHandler;
use super::reply::ReplyQueueGuard;
use crate::bus::domain::{
    BusHealth, BusStatus, CorrelationId, Delivery, Envelope, MessageId, MessageType, Priority,
    QueueSpec, Recipient, broadcast_key, headers,
};
use crate::bus::ports::{BrokerError, MessageBroker};
use crate::config::BusConfig;
use crate::registry::domain::AgentId;
use crate::telemetry::{OperationMetrics, Outcome};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Service-level errors for bus operations.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// The bus has not been connected.
    #[error("message bus is not connected")]
    NotConnected,

    /// A message addressed to one agent matched no queue.
    #[error("message {message_id} to '{routing_key}' matched no queue")]
    Unroutable {
        /// Identifier of the dropped message.
        message_id: MessageId,
        /// Routing key nothing was bound to.
        routing_key: String,
    },

    /// The broker rejected or could not serve the call.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Result type for bus service operations.
pub type BusResult<T> = Result<T, BusError>;

/// A message to publish on the bus exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    routing_key: String,
    sender: AgentId,
    recipient: Recipient,
    message_type: MessageType,
    payload: serde_json::Value,
    priority: Priority,
    correlation_id: Option<CorrelationId>,
    reply_to: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    headers: BTreeMap<String, String>,
}

impl PublishRequest {
    /// Creates a request with normal priority and no correlation.
    #[must_use]
    pub fn new(
        routing_key: impl Into<String>,
        sender: AgentId,
        recipient: impl Into<Recipient>,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            sender,
            recipient: recipient.into(),
            message_type,
            payload,
            priority: Priority::NORMAL,
            correlation_id: None,
            reply_to: None,
            expires_at: None,
            headers: BTreeMap::new(),
        }
    }

    /// Sets the priority, clamped into `1..=10`.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub const fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Sets the routing key replies should be published to.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets an absolute expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Adds a custom header. Standard headers cannot be overridden.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn into_envelope(self, now: DateTime<Utc>) -> Envelope {
        let mut envelope_headers = self.headers;
        envelope_headers.insert(headers::SENDER.to_owned(), self.sender.as_str().to_owned());
        envelope_headers.insert(
            headers::RECIPIENT.to_owned(),
            self.recipient.as_str().to_owned(),
        );
        envelope_headers.insert(
            headers::MESSAGE_TYPE.to_owned(),
            self.message_type.as_str().to_owned(),
        );
        Envelope {
            id: MessageId::new(),
            sender_id: self.sender,
            recipient: self.recipient,
            message_type: self.message_type,
            priority: self.priority,
            created_at: now,
            expires_at: self.expires_at,
            correlation_id: self.correlation_id,
            reply_to: self.reply_to,
            routing_key: self.routing_key,
            headers: envelope_headers,
            payload: self.payload,
        }
    }
}

/// A direct message to one agent's inbox, optionally awaiting a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    target: AgentId,
    sender: AgentId,
    message_type: MessageType,
    payload: serde_json::Value,
    priority: Priority,
    wait_for_response: bool,
    timeout: Option<Duration>,
}

impl SendRequest {
    /// Creates a fire-and-forget request.
    #[must_use]
    pub const fn new(
        target: AgentId,
        sender: AgentId,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            target,
            sender,
            message_type,
            payload,
            priority: Priority::NORMAL,
            wait_for_response: false,
            timeout: None,
        }
    }

    /// Sets the priority, clamped into `1..=10`.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Waits for a correlated reply, up to `timeout` or the configured
    /// default when `None`.
    #[must_use]
    pub const fn awaiting_reply(mut self, timeout: Option<Duration>) -> Self {
        self.wait_for_response = true;
        self.timeout = timeout;
        self
    }

    fn routing_key(&self) -> String {
        format!("{}.{}", self.target.inbox_queue(), self.message_type)
    }
}

struct ConsumerHandle {
    agent_id: AgentId,
    queue: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct BusRuntime {
    status: BusStatus,
    consumers: Vec<ConsumerHandle>,
}

/// Topic-routed message bus.
///
/// One topic exchange carries agent traffic and one dead-letter exchange
/// receives messages that exhausted their retry budget or expired. Every
/// queue the bus declares dead-letters to `failed.<agent_id>`.
pub struct MessageBus<B, C>
where
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
{
    broker: Arc<B>,
    clock: Arc<C>,
    config: BusConfig,
    metrics: Arc<OperationMetrics>,
    runtime: Mutex<BusRuntime>,
}

impl<B, C> MessageBus<B, C>
where
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a disconnected bus with its own metrics sink.
    #[must_use]
    pub fn new(broker: Arc<B>, clock: Arc<C>, config: BusConfig) -> Self {
        Self {
            broker,
            clock,
            config,
            metrics: Arc::new(OperationMetrics::new()),
            runtime: Mutex::new(BusRuntime::default()),
        }
    }

    /// Shares `metrics` with other components.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<OperationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the operation metrics sink.
    #[must_use]
    pub const fn metrics(&self) -> &Arc<OperationMetrics> {
        &self.metrics
    }

    /// Returns the bus configuration.
    #[must_use]
    pub const fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Returns the current connection status.
    #[must_use]
    pub fn status(&self) -> BusStatus {
        self.runtime().status.clone()
    }

    /// Returns the number of running handler consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        let mut runtime = self.runtime();
        runtime.consumers.retain(|consumer| !consumer.handle.is_finished());
        runtime.consumers.len()
    }

    /// Connects to the broker and declares the topic and dead-letter
    /// exchanges. Connecting an already connected bus is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Broker`] when the broker is unreachable.
    pub async fn connect(&self) -> BusResult<()> {
        if self.status().is_connected() {
            return Ok(());
        }
        let result = async {
            self.broker.connect().await?;
            self.broker.declare_exchange(&self.config.exchange).await?;
            self.broker
                .declare_exchange(&self.config.dead_letter_exchange)
                .await?;
            self.set_status(BusStatus::Connected);
            info!(
                exchange = %self.config.exchange,
                dead_letter_exchange = %self.config.dead_letter_exchange,
                "message bus connected"
            );
            Ok::<(), BusError>(())
        }
        .await;
        self.finish("bus.connect", result)
    }

    /// Stops every consumer and closes the broker connection.
    /// Disconnecting a disconnected bus is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Broker`] when the broker fails to close.
    pub async fn disconnect(&self) -> BusResult<()> {
        let consumers = std::mem::take(&mut self.runtime().consumers);
        for consumer in &consumers {
            consumer.cancel.cancel();
        }
        for consumer in consumers {
            if let Err(err) = consumer.handle.await {
                warn!(agent_id = %consumer.agent_id, queue = %consumer.queue, error = %err, "consumer ended abnormally");
            }
        }

        if !self.status().is_connected() {
            return Ok(());
        }
        let result = self.broker.close().await.map_err(BusError::from);
        if result.is_ok() {
            self.set_status(BusStatus::Disconnected);
            info!("message bus disconnected");
        }
        self.finish("bus.disconnect", result)
    }

    /// Publishes a message to the topic exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotConnected`] before [`Self::connect`],
    /// [`BusError::Unroutable`] when a message for a single agent matched no
    /// queue, and [`BusError::Broker`] when the broker rejects the message.
    pub async fn publish(&self, request: PublishRequest) -> BusResult<MessageId> {
        let result = self.publish_request(request).await;
        self.finish("bus.publish", result)
    }

    /// Declares a queue bound to `routing_keys` on the topic exchange, with
    /// dead letters routed as `failed.<agent_id>`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotConnected`] before [`Self::connect`] and
    /// [`BusError::Broker`] when the broker fails.
    pub async fn create_queue(
        &self,
        name: &str,
        routing_keys: &[String],
        agent_id: &AgentId,
        durable: bool,
        exclusive: bool,
    ) -> BusResult<()> {
        let spec = QueueSpec::for_agent(name, agent_id, &self.config)
            .with_durable(durable)
            .with_exclusive(exclusive);
        let result = self.declare_bound(&spec, routing_keys).await;
        self.finish("bus.create_queue", result)
    }

    /// Declares the consumable dead-letter queue `failed.<agent_id>` bound
    /// on the dead-letter exchange, and returns its name.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotConnected`] before [`Self::connect`] and
    /// [`BusError::Broker`] when the broker fails.
    pub async fn create_dead_letter_queue(&self, agent_id: &AgentId) -> BusResult<String> {
        let name = QueueSpec::dead_letter_key(agent_id);
        // Dead letters of the dead-letter queue itself are parked instead of
        // looping back into it.
        let spec = QueueSpec::new(name.clone(), &self.config)
            .with_dead_letter_routing_key(format!("parked.{agent_id}"));
        let result = async {
            self.ensure_connected()?;
            self.broker.declare_queue(&spec).await?;
            self.broker
                .bind_queue(&name, &self.config.dead_letter_exchange, &name)
                .await?;
            Ok::<_, BusError>(name)
        }
        .await;
        self.finish("bus.create_dead_letter_queue", result)
    }

    /// Declares the agent's queue and starts consuming it with `handler`.
    ///
    /// The queue defaults to `agent.<id>` and the bindings to
    /// `agent.<id>.#` and `broadcast.all` when `routing_keys` is empty.
    /// Successful deliveries are acked, publishing the handler's reply when
    /// the envelope carries `reply_to`; failures are nacked for redelivery.
    /// Returns the consumed queue name.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotConnected`] before [`Self::connect`] and
    /// [`BusError::Broker`] when the broker fails.
    pub async fn register_handler<H>(
        &self,
        agent_id: &AgentId,
        handler: H,
        routing_keys: &[String],
        queue_name: Option<&str>,
    ) -> BusResult<String>
    where
        H: MessageHandler + 'static,
    {
        let queue = queue_name.map_or_else(|| agent_id.inbox_queue(), str::to_owned);
        let bindings = if routing_keys.is_empty() {
            vec![format!("{}.#", agent_id.inbox_queue()), broadcast_key(None)]
        } else {
            routing_keys.to_vec()
        };
        let result = async {
            let spec = QueueSpec::for_agent(queue.clone(), agent_id, &self.config);
            self.declare_bound(&spec, &bindings).await?;
            let deliveries = self.broker.consume(&queue).await?;
            self.spawn_consumer(agent_id.clone(), queue.clone(), handler, deliveries);
            info!(agent_id = %agent_id, queue = %queue, bindings = ?bindings, "handler registered");
            Ok::<_, BusError>(queue.clone())
        }
        .await;
        self.finish("bus.register_handler", result)
    }

    /// Sends a message to `agent.<target>` routed as
    /// `agent.<target>.<message_type>`.
    ///
    /// When a reply is requested, a private reply queue
    /// `reply.<correlation>` receives it and is deleted whether or not the
    /// reply arrives. A reply that does not arrive in time yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotConnected`] before [`Self::connect`],
    /// [`BusError::Unroutable`] when the target has no bound queue, and
    /// [`BusError::Broker`] when the broker fails.
    pub async fn send_to_agent(&self, request: SendRequest) -> BusResult<Option<Envelope>> {
        let result = self.send(request).await;
        self.finish("bus.send_to_agent", result)
    }

    /// Publishes to every agent listening on `broadcast.all`, or on
    /// `broadcast.<filter>` when a filter is given. A broadcast nobody
    /// listens to is logged and still succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::NotConnected`] before [`Self::connect`] and
    /// [`BusError::Broker`] when the broker rejects the message.
    pub async fn broadcast(
        &self,
        payload: serde_json::Value,
        sender: AgentId,
        message_type: MessageType,
        filter: Option<&str>,
    ) -> BusResult<MessageId> {
        let mut request = PublishRequest::new(
            broadcast_key(filter),
            sender,
            Recipient::All,
            message_type,
            payload,
        );
        if let Some(narrowing) = filter {
            request = request.with_header(headers::FILTER, narrowing);
        }
        let result = self.publish_request(request).await;
        self.finish("bus.broadcast", result)
    }

    /// Round-trips a disposable queue through the broker.
    ///
    /// A failure marks the bus `error` with the failure message but keeps
    /// the connection; a later successful check restores `connected`.
    pub async fn health_check(&self) -> BusHealth {
        if self.status().is_connected() {
            match self.finish("bus.health_check", self.probe().await) {
                Ok(()) => self.set_status(BusStatus::Connected),
                Err(err) => self.set_status(BusStatus::Error(err.to_string())),
            }
        }
        BusHealth {
            status: self.status(),
            exchange: self.config.exchange.clone(),
            consumers: self.consumer_count(),
            checked_at: self.clock.utc(),
        }
    }

    async fn probe(&self) -> BusResult<()> {
        let queue = format!("health.{}", Uuid::new_v4());
        let spec = QueueSpec::new(queue.clone(), &self.config)
            .with_durable(false)
            .with_exclusive(true);
        self.broker.declare_queue(&spec).await?;
        self.broker.delete_queue(&queue).await?;
        Ok(())
    }

    async fn publish_request(&self, request: PublishRequest) -> BusResult<MessageId> {
        self.ensure_connected()?;
        let envelope = request.into_envelope(self.clock.utc());
        let message_id = envelope.id;
        let routing_key = envelope.routing_key.clone();
        let directed = matches!(envelope.recipient, Recipient::Agent(_));
        let routed = publish_envelope(&*self.broker, &self.config.exchange, envelope).await?;
        if routed == 0 && directed {
            return Err(BusError::Unroutable {
                message_id,
                routing_key,
            });
        }
        Ok(message_id)
    }

    async fn declare_bound(&self, spec: &QueueSpec, routing_keys: &[String]) -> BusResult<()> {
        self.ensure_connected()?;
        self.broker.declare_queue(spec).await?;
        for pattern in routing_keys {
            self.broker
                .bind_queue(&spec.name, &self.config.exchange, pattern)
                .await?;
        }
        debug!(queue = %spec.name, bindings = routing_keys.len(), "queue declared");
        Ok(())
    }

    async fn send(&self, request: SendRequest) -> BusResult<Option<Envelope>> {
        self.ensure_connected()?;
        let publish = PublishRequest::new(
            request.routing_key(),
            request.sender.clone(),
            request.target.clone(),
            request.message_type,
            request.payload.clone(),
        )
        .with_priority(request.priority);

        if !request.wait_for_response {
            self.publish_request(publish).await?;
            return Ok(None);
        }

        let correlation_id = CorrelationId::new();
        let spec = QueueSpec::for_agent(correlation_id.reply_queue(), &request.sender, &self.config)
            .with_durable(false)
            .with_exclusive(true);
        self.broker.declare_queue(&spec).await?;
        let guard = ReplyQueueGuard::new(Arc::clone(&self.broker), spec.name.clone());

        let wait = request.timeout.unwrap_or_else(|| self.config.reply_timeout());
        let result = self
            .request_reply(&guard, publish, correlation_id, wait)
            .await;
        guard.release().await;

        if matches!(result, Ok(None)) {
            warn!(
                target_agent = %request.target,
                correlation_id = %correlation_id,
                timeout_ms = wait.as_millis(),
                "no reply received before timeout"
            );
        }
        result
    }

    async fn request_reply(
        &self,
        guard: &ReplyQueueGuard<B>,
        publish: PublishRequest,
        correlation_id: CorrelationId,
        wait: Duration,
    ) -> BusResult<Option<Envelope>> {
        let reply_queue = guard.queue();
        self.broker
            .bind_queue(reply_queue, &self.config.exchange, reply_queue)
            .await?;
        let mut replies = self.broker.consume(reply_queue).await?;
        self.publish_request(
            publish
                .with_correlation_id(correlation_id)
                .with_reply_to(reply_queue),
        )
        .await?;

        match tokio::time::timeout(wait, self.next_reply(&mut replies, correlation_id)).await {
            Ok(reply) => reply,
            Err(_elapsed) => Ok(None),
        }
    }

    async fn next_reply(
        &self,
        replies: &mut mpsc::Receiver<Delivery>,
        correlation_id: CorrelationId,
    ) -> BusResult<Option<Envelope>> {
        while let Some(delivery) = replies.recv().await {
            self.broker.ack(&delivery.queue, delivery.delivery_tag).await?;
            if delivery.envelope.correlation_id == Some(correlation_id) {
                return Ok(Some(delivery.envelope));
            }
            debug!(
                correlation_id = %correlation_id,
                message_id = %delivery.envelope.id,
                "discarding uncorrelated reply"
            );
        }
        Ok(None)
    }

    fn spawn_consumer<H>(
        &self,
        agent_id: AgentId,
        queue: String,
        handler: H,
        deliveries: mpsc::Receiver<Delivery>,
    ) where
        H: MessageHandler + 'static,
    {
        let cancel = CancellationToken::new();
        let consumer = Consumer {
            agent_id: agent_id.clone(),
            broker: Arc::clone(&self.broker),
            clock: Arc::clone(&self.clock),
            exchange: self.config.exchange.clone(),
            metrics: Arc::clone(&self.metrics),
            handler,
        };
        let handle = tokio::spawn(consumer.run(deliveries, cancel.clone()));
        self.runtime().consumers.push(ConsumerHandle {
            agent_id,
            queue,
            cancel,
            handle,
        });
    }

    fn ensure_connected(&self) -> BusResult<()> {
        if self.status().is_connected() {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }

    fn set_status(&self, status: BusStatus) {
        self.runtime().status = status;
    }

    fn runtime(&self) -> MutexGuard<'_, BusRuntime> {
        self.runtime.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish<T>(&self, operation: &'static str, result: BusResult<T>) -> BusResult<T> {
        match &result {
            Err(BusError::NotConnected) => warn!(operation, "bus operation before connect"),
            Err(err @ BusError::Unroutable { .. }) => warn!(operation, error = %err, "message not delivered"),
            Err(err @ BusError::Broker(_)) => error!(operation, error = %err, "bus operation failed"),
            Ok(_) => {}
        }
        self.metrics.observe(operation, result)
    }
}

impl<B, C> Drop for MessageBus<B, C>
where
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn drop(&mut self) {
        for consumer in &self.runtime().consumers {
            consumer.cancel.cancel();
        }
    }
}

/// Publishes `envelope` and returns how many queues it reached.
async fn publish_envelope<B>(broker: &B, exchange: &str, envelope: Envelope) -> Result<usize, BrokerError>
where
    B: MessageBroker + ?Sized,
{
    let message_id = envelope.id;
    let routing_key = envelope.routing_key.clone();
    let routed = broker.publish(exchange, envelope).await?;
    if routed == 0 {
        warn!(message_id = %message_id, routing_key = %routing_key, "message matched no queue");
    } else {
        debug!(message_id = %message_id, routing_key = %routing_key, routed, "message published");
    }
    Ok(routed)
}

/// Consumer task state for one registered handler.
struct Consumer<B, C, H> {
    agent_id: AgentId,
    broker: Arc<B>,
    clock: Arc<C>,
    exchange: String,
    metrics: Arc<OperationMetrics>,
    handler: H,
}

impl<B, C, H> Consumer<B, C, H>
where
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
    H: MessageHandler + 'static,
{
    async fn run(self, mut deliveries: mpsc::Receiver<Delivery>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                next = deliveries.recv() => match next {
                    Some(delivery) => self.process(delivery).await,
                    None => break,
                },
            }
        }
        debug!(agent_id = %self.agent_id, "consumer stopped");
    }

    async fn process(&self, delivery: Delivery) {
        let Delivery {
            queue,
            delivery_tag,
            attempt,
            envelope,
        } = delivery;

        match self.handler.handle(&envelope).await {
            Ok(reply) => {
                if let (Some(reply_to), Some(payload)) = (envelope.reply_to.as_deref(), reply) {
                    self.reply(&envelope, reply_to, payload).await;
                }
                if let Err(err) = self.broker.ack(&queue, delivery_tag).await {
                    warn!(agent_id = %self.agent_id, queue = %queue, error = %err, "failed to ack delivery");
                }
                self.metrics.record("bus.handle", Outcome::Success);
            }
            Err(err) => {
                warn!(
                    agent_id = %self.agent_id,
                    queue = %queue,
                    message_id = %envelope.id,
                    attempt,
                    error = %err,
                    "handler failed; rejecting delivery"
                );
                if let Err(nack_err) = self.broker.nack(&queue, delivery_tag, true).await {
                    warn!(agent_id = %self.agent_id, queue = %queue, error = %nack_err, "failed to nack delivery");
                }
                self.metrics.record("bus.handle", Outcome::Error);
            }
        }
    }

    async fn reply(&self, request: &Envelope, reply_to: &str, payload: serde_json::Value) {
        let mut reply = PublishRequest::new(
            reply_to,
            self.agent_id.clone(),
            request.sender_id.clone(),
            MessageType::TaskResponse,
            payload,
        )
        .with_priority(request.priority);
        if let Some(correlation_id) = request.correlation_id {
            reply = reply.with_correlation_id(correlation_id);
        }
        let envelope = reply.into_envelope(self.clock.utc());
        if let Err(err) = publish_envelope(&*self.broker, &self.exchange, envelope).await {
            warn!(agent_id = %self.agent_id, reply_to, error = %err, "failed to publish reply");
        }
    }
}
