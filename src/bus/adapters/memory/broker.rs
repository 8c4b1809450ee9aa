//! In-process topic broker with retries, expiry, and dead-lettering.

use crate::bus::domain::{
    DeadLetter, DeadLetterReason, Delivery, Envelope, MessageId, MessageState, QueueSpec, headers,
    topic_matches,
};
use crate::bus::ports::{BrokerError, BrokerResult, DELIVERY_BUFFER, MessageBroker};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

/// Thread-safe in-memory broker.
///
/// Exchanges route by topic pattern. Each queue keeps FIFO order, buffers
/// at most [`DELIVERY_BUFFER`] unacknowledged deliveries per consumer, and
/// evaluates message lifetimes lazily against the injected clock. Dead
/// letters that no queue is bound to receive are parked and can be read
/// back with [`Self::dead_letters`].
pub struct InMemoryBroker<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<BrokerState>>,
    clock: Arc<C>,
    available: Arc<AtomicBool>,
}

impl<C> Clone for InMemoryBroker<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            available: Arc::clone(&self.available),
        }
    }
}

impl<C> std::fmt::Debug for InMemoryBroker<C>
where
    C: Clock + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBroker")
            .field("state", &self.state)
            .field("available", &self.available)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    connected: bool,
    exchanges: BTreeMap<String, Vec<Binding>>,
    queues: HashMap<String, QueueState>,
    parked: Vec<DeadLetter>,
    next_tag: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    queue: String,
    pattern: String,
}

#[derive(Debug)]
struct QueueState {
    spec: QueueSpec,
    pending: VecDeque<QueuedMessage>,
    unacked: BTreeMap<u64, QueuedMessage>,
    consumer: Option<mpsc::Sender<Delivery>>,
    states: HashMap<MessageId, MessageState>,
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    envelope: Envelope,
    attempts: u32,
    expires_at: DateTime<Utc>,
}

/// Where a queue sends its dead letters.
struct DeadLetterPolicy {
    source_queue: String,
    exchange: String,
    routing_key: String,
}

impl QueueState {
    fn new(spec: QueueSpec) -> Self {
        Self {
            spec,
            pending: VecDeque::new(),
            unacked: BTreeMap::new(),
            consumer: None,
            states: HashMap::new(),
        }
    }

    fn policy(&self) -> DeadLetterPolicy {
        DeadLetterPolicy {
            source_queue: self.spec.name.clone(),
            exchange: self.spec.dead_letter_exchange.clone(),
            routing_key: self.spec.dead_letter_routing_key.clone(),
        }
    }

    fn transition(&mut self, message_id: MessageId, state: MessageState) {
        trace!(queue = %self.spec.name, message_id = %message_id, state = %state, "message state changed");
        self.states.insert(message_id, state);
    }

    /// Hands pending messages to the consumer until it is absent or full,
    /// returning messages that expired while waiting.
    fn dispatch(&mut self, now: DateTime<Utc>, next_tag: &mut u64) -> Vec<QueuedMessage> {
        let mut expired = Vec::new();
        while let Some(mut message) = self.pending.pop_front() {
            if message.expires_at <= now {
                self.transition(message.envelope.id, MessageState::DeadLettered);
                expired.push(message);
                continue;
            }
            let Some(consumer) = &self.consumer else {
                self.pending.push_front(message);
                break;
            };

            let delivery_tag = next_tag.wrapping_add(1);
            let delivery = Delivery {
                queue: self.spec.name.clone(),
                delivery_tag,
                attempt: message.attempts.saturating_add(1),
                envelope: message.envelope.clone(),
            };
            match consumer.try_send(delivery) {
                Ok(()) => {
                    *next_tag = delivery_tag;
                    message.attempts = message.attempts.saturating_add(1);
                    self.transition(message.envelope.id, MessageState::Delivered);
                    self.unacked.insert(delivery_tag, message);
                }
                Err(TrySendError::Full(_)) => {
                    self.pending.push_front(message);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    self.consumer = None;
                    self.pending.push_front(message);
                    self.requeue_outstanding();
                    break;
                }
            }
        }
        expired
    }

    /// Returns outstanding deliveries to the head of the queue in their
    /// original order.
    fn requeue_outstanding(&mut self) {
        let outstanding = std::mem::take(&mut self.unacked);
        for (_, message) in outstanding.into_iter().rev() {
            self.transition(message.envelope.id, MessageState::Requeued);
            self.pending.push_front(message);
        }
    }
}

impl BrokerState {
    fn ensure_connected(&self) -> BrokerResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn queue_mut(&mut self, name: &str) -> BrokerResult<&mut QueueState> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| BrokerError::UnknownQueue(name.to_owned()))
    }

    fn matching_queues(&self, exchange: &str, routing_key: &str) -> BTreeSet<String> {
        self.exchanges
            .get(exchange)
            .into_iter()
            .flatten()
            .filter(|binding| topic_matches(&binding.pattern, routing_key))
            .map(|binding| binding.queue.clone())
            .collect()
    }

    fn enqueue(&mut self, queue: &str, envelope: Envelope, now: DateTime<Utc>) {
        let Some(state) = self.queues.get_mut(queue) else {
            return;
        };
        let ttl = TimeDelta::from_std(state.spec.message_ttl).unwrap_or(TimeDelta::MAX);
        let queue_deadline = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let expires_at = envelope
            .expires_at
            .map_or(queue_deadline, |deadline| deadline.min(queue_deadline));

        state.transition(envelope.id, MessageState::Published);
        state.transition(envelope.id, MessageState::Enqueued);
        state.pending.push_back(QueuedMessage {
            envelope,
            attempts: 0,
            expires_at,
        });
    }

    /// Dispatches the named queues, following dead letters into whichever
    /// queues they land in.
    fn pump(&mut self, queues: impl IntoIterator<Item = String>, now: DateTime<Utc>) {
        let mut touched: VecDeque<String> = queues.into_iter().collect();
        while let Some(name) = touched.pop_front() {
            let Some(state) = self.queues.get_mut(&name) else {
                continue;
            };
            let expired = state.dispatch(now, &mut self.next_tag);
            if expired.is_empty() {
                continue;
            }
            let policy = state.policy();
            for message in expired {
                touched.extend(self.dead_letter(&policy, message, DeadLetterReason::Expired, now));
            }
        }
    }

    fn pump_all(&mut self, now: DateTime<Utc>) {
        let names: Vec<String> = self.queues.keys().cloned().collect();
        self.pump(names, now);
    }

    /// Publishes `message` to the dead-letter exchange and returns the queues
    /// it landed in. Unroutable dead letters are parked.
    fn dead_letter(
        &mut self,
        policy: &DeadLetterPolicy,
        message: QueuedMessage,
        reason: DeadLetterReason,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let QueuedMessage {
            mut envelope,
            attempts,
            ..
        } = message;
        envelope
            .headers
            .insert(headers::DEATH_REASON.to_owned(), reason.as_str().to_owned());
        envelope
            .headers
            .insert(headers::DEATH_QUEUE.to_owned(), policy.source_queue.clone());
        envelope.headers.insert(
            headers::ORIGINAL_ROUTING_KEY.to_owned(),
            envelope.routing_key.clone(),
        );
        envelope.routing_key.clone_from(&policy.routing_key);
        // Lifetime was enforced at the source; the dead-letter queue applies
        // its own.
        envelope.expires_at = None;

        let targets = self.matching_queues(&policy.exchange, &policy.routing_key);
        if targets.is_empty() {
            warn!(
                queue = %policy.source_queue,
                message_id = %envelope.id,
                routing_key = %policy.routing_key,
                reason = %reason,
                "dead letter has no bound queue; parking it"
            );
            self.parked.push(DeadLetter {
                source_queue: policy.source_queue.clone(),
                routing_key: policy.routing_key.clone(),
                reason,
                attempts,
                dead_lettered_at: now,
                envelope,
            });
            return Vec::new();
        }

        debug!(
            queue = %policy.source_queue,
            message_id = %envelope.id,
            routing_key = %policy.routing_key,
            reason = %reason,
            "message dead-lettered"
        );
        for target in &targets {
            self.enqueue(target, envelope.clone(), now);
        }
        targets.into_iter().collect()
    }

    fn reject(
        &mut self,
        queue: &str,
        delivery_tag: u64,
        requeue: bool,
        now: DateTime<Utc>,
    ) -> BrokerResult<Vec<String>> {
        let state = self.queue_mut(queue)?;
        let message = state
            .unacked
            .remove(&delivery_tag)
            .ok_or_else(|| BrokerError::UnknownDelivery {
                queue: queue.to_owned(),
                delivery_tag,
            })?;

        if requeue && message.attempts <= state.spec.max_retries {
            state.transition(message.envelope.id, MessageState::Requeued);
            state.pending.push_front(message);
            return Ok(vec![queue.to_owned()]);
        }

        let reason = if requeue {
            DeadLetterReason::RetriesExhausted
        } else {
            DeadLetterReason::Rejected
        };
        state.transition(message.envelope.id, MessageState::DeadLettered);
        let policy = state.policy();
        let mut touched = self.dead_letter(&policy, message, reason, now);
        touched.push(queue.to_owned());
        Ok(touched)
    }

    fn remove_queue(&mut self, name: &str) -> bool {
        for bindings in self.exchanges.values_mut() {
            bindings.retain(|binding| binding.queue != name);
        }
        self.queues.remove(name).is_some()
    }
}

impl InMemoryBroker<DefaultClock> {
    /// Creates an empty broker driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryBroker<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryBroker<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty broker driven by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(BrokerState::default())),
            clock,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulates the broker going offline (`false`) or recovering (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the lifecycle state of message `id` in `queue`, applying any
    /// pending expiry first.
    #[must_use]
    pub fn message_state(&self, queue: &str, id: MessageId) -> Option<MessageState> {
        let now = self.clock.utc();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.pump([queue.to_owned()], now);
        state
            .queues
            .get(queue)
            .and_then(|queue_state| queue_state.states.get(&id).copied())
    }

    /// Returns dead letters parked because no queue was bound to receive
    /// them, applying any pending expiry first.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        let now = self.clock.utc();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.pump_all(now);
        state.parked.clone()
    }

    /// Returns the names of every declared queue, sorted.
    #[must_use]
    pub fn queue_names(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = state.queues.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the number of messages waiting in `queue`, excluding
    /// outstanding deliveries.
    #[must_use]
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.queues.get(queue).map(|queue_state| queue_state.pending.len())
    }

    fn ensure_available(&self) -> BrokerResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BrokerError::unavailable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "in-memory broker is offline",
            )))
        }
    }

    fn write(&self) -> BrokerResult<RwLockWriteGuard<'_, BrokerState>> {
        self.ensure_available()?;
        self.state
            .write()
            .map_err(|err| BrokerError::unavailable(std::io::Error::other(err.to_string())))
    }

    fn connected(&self) -> BrokerResult<RwLockWriteGuard<'_, BrokerState>> {
        let state = self.write()?;
        state.ensure_connected()?;
        Ok(state)
    }
}

#[async_trait]
impl<C> MessageBroker for InMemoryBroker<C>
where
    C: Clock + Send + Sync,
{
    async fn connect(&self) -> BrokerResult<()> {
        let mut state = self.write()?;
        state.connected = true;
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        let mut state = self.write()?;
        if !state.connected {
            return Ok(());
        }
        let exclusive: Vec<String> = state
            .queues
            .values()
            .filter(|queue| queue.spec.exclusive)
            .map(|queue| queue.spec.name.clone())
            .collect();
        for name in exclusive {
            state.remove_queue(&name);
        }
        for queue in state.queues.values_mut() {
            queue.consumer = None;
            queue.requeue_outstanding();
        }
        state.connected = false;
        Ok(())
    }

    async fn declare_exchange(&self, name: &str) -> BrokerResult<()> {
        let mut state = self.connected()?;
        state.exchanges.entry(name.to_owned()).or_default();
        Ok(())
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> BrokerResult<()> {
        let mut state = self.connected()?;
        state
            .queues
            .entry(spec.name.clone())
            .or_insert_with(|| QueueState::new(spec.clone()));
        Ok(())
    }

    async fn delete_queue(&self, name: &str) -> BrokerResult<bool> {
        let mut state = self.connected()?;
        Ok(state.remove_queue(name))
    }

    async fn queue_exists(&self, name: &str) -> BrokerResult<bool> {
        let state = self.connected()?;
        Ok(state.queues.contains_key(name))
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, pattern: &str) -> BrokerResult<()> {
        let mut state = self.connected()?;
        if !state.queues.contains_key(queue) {
            return Err(BrokerError::UnknownQueue(queue.to_owned()));
        }
        let bindings = state
            .exchanges
            .get_mut(exchange)
            .ok_or_else(|| BrokerError::UnknownExchange(exchange.to_owned()))?;
        let binding = Binding {
            queue: queue.to_owned(),
            pattern: pattern.to_owned(),
        };
        if !bindings.contains(&binding) {
            bindings.push(binding);
        }
        Ok(())
    }

    async fn publish(&self, exchange: &str, envelope: Envelope) -> BrokerResult<usize> {
        let now = self.clock.utc();
        let mut state = self.connected()?;
        if !state.exchanges.contains_key(exchange) {
            return Err(BrokerError::UnknownExchange(exchange.to_owned()));
        }
        let targets = state.matching_queues(exchange, &envelope.routing_key);
        for target in &targets {
            state.enqueue(target, envelope.clone(), now);
        }
        let routed = targets.len();
        state.pump(targets, now);
        Ok(routed)
    }

    async fn consume(&self, queue: &str) -> BrokerResult<mpsc::Receiver<Delivery>> {
        let now = self.clock.utc();
        let mut state = self.connected()?;
        let queue_state = state.queue_mut(queue)?;
        queue_state.requeue_outstanding();
        let (sender, receiver) = mpsc::channel(DELIVERY_BUFFER);
        queue_state.consumer = Some(sender);
        state.pump([queue.to_owned()], now);
        Ok(receiver)
    }

    async fn ack(&self, queue: &str, delivery_tag: u64) -> BrokerResult<()> {
        let now = self.clock.utc();
        let mut state = self.connected()?;
        let queue_state = state.queue_mut(queue)?;
        let message = queue_state.unacked.remove(&delivery_tag).ok_or_else(|| {
            BrokerError::UnknownDelivery {
                queue: queue.to_owned(),
                delivery_tag,
            }
        })?;
        queue_state.transition(message.envelope.id, MessageState::Acked);
        state.pump([queue.to_owned()], now);
        Ok(())
    }

    async fn nack(&self, queue: &str, delivery_tag: u64, requeue: bool) -> BrokerResult<()> {
        let now = self.clock.utc();
        let mut state = self.connected()?;
        let touched = state.reject(queue, delivery_tag, requeue, now)?;
        state.pump(touched, now);
        Ok(())
    }
}
