//! Process-wide wiring of the store, broker, and services.
//!
//! A [`ConductorContext`] is built once at start-up and handed to whatever
//! needs the registry, discovery, or bus. All three services share one
//! [`OperationMetrics`] sink and one clock.

use crate::bus::{
    adapters::memory::InMemoryBroker,
    ports::MessageBroker,
    services::{BusError, MessageBus},
};
use crate::config::ConductorConfig;
use crate::discovery::services::DiscoveryService;
use crate::registry::{
    adapters::memory::InMemoryKeyValueStore,
    ports::KeyValueStore,
    services::{AgentRegistryService, RegistryError, ReaperHandle, StaleAgentReaper},
};
use crate::telemetry::OperationMetrics;
use mockable::{Clock, DefaultClock};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

/// Errors raised while starting or stopping a context.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// The registry store could not be reached.
    #[error("registry store unavailable: {0}")]
    Registry(#[from] RegistryError),

    /// The message bus could not connect or disconnect.
    #[error("message bus unavailable: {0}")]
    Bus(#[from] BusError),
}

/// Context backed entirely by in-process adapters.
pub type InMemoryContext<C = DefaultClock> =
    ConductorContext<InMemoryKeyValueStore<C>, InMemoryBroker<C>, C>;

/// Owns the adapters and services for one running process.
pub struct ConductorContext<S, B, C>
where
    S: KeyValueStore + 'static,
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
{
    config: ConductorConfig,
    store: Arc<S>,
    broker: Arc<B>,
    metrics: Arc<OperationMetrics>,
    registry: Arc<AgentRegistryService<S, C>>,
    discovery: Arc<DiscoveryService<S, C>>,
    bus: Arc<MessageBus<B, C>>,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl<S, B, C> ConductorContext<S, B, C>
where
    S: KeyValueStore + 'static,
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Builds the services, checks the store, connects the bus, and spawns
    /// the stale-agent reaper when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Registry`] when the store is unreachable and
    /// [`ContextError::Bus`] when the broker refuses the connection.
    pub async fn start(
        config: ConductorConfig,
        store: Arc<S>,
        broker: Arc<B>,
        clock: Arc<C>,
    ) -> Result<Self, ContextError> {
        let metrics = Arc::new(OperationMetrics::new());
        let registry = Arc::new(
            AgentRegistryService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                config.registry.clone(),
            )
            .with_metrics(Arc::clone(&metrics)),
        );
        let discovery = Arc::new(DiscoveryService::new(
            Arc::clone(&registry),
            Arc::clone(&clock),
            config.discovery.clone(),
        ));
        let bus = Arc::new(
            MessageBus::new(Arc::clone(&broker), clock, config.bus.clone())
                .with_metrics(Arc::clone(&metrics)),
        );

        registry.ping().await?;
        bus.connect().await?;

        let reaper = config.registry.reaper_enabled.then(|| {
            StaleAgentReaper::spawn(Arc::clone(&registry), config.registry.reap_interval())
        });
        info!(
            registry = %config.registry.endpoint,
            exchange = %config.bus.exchange,
            reaper = reaper.is_some(),
            "conductor context started"
        );

        Ok(Self {
            config,
            store,
            broker,
            metrics,
            registry,
            discovery,
            bus,
            reaper: Mutex::new(reaper),
        })
    }

    /// Stops the reaper and disconnects the bus. Calling it twice is
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Bus`] when the broker fails to close.
    pub async fn shutdown(&self) -> Result<(), ContextError> {
        let reaper = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reaper {
            handle.stop().await;
        }
        self.bus.disconnect().await?;
        info!("conductor context stopped");
        Ok(())
    }

    /// Returns whether the background reaper is running.
    #[must_use]
    pub fn reaper_running(&self) -> bool {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(ReaperHandle::is_running)
    }

    /// Returns the configuration the context was started with.
    #[must_use]
    pub const fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the message broker.
    #[must_use]
    pub const fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    /// Returns the metrics sink shared by every service.
    #[must_use]
    pub const fn metrics(&self) -> &Arc<OperationMetrics> {
        &self.metrics
    }

    /// Returns the agent registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<AgentRegistryService<S, C>> {
        &self.registry
    }

    /// Returns the discovery service.
    #[must_use]
    pub const fn discovery(&self) -> &Arc<DiscoveryService<S, C>> {
        &self.discovery
    }

    /// Returns the message bus.
    #[must_use]
    pub const fn bus(&self) -> &Arc<MessageBus<B, C>> {
        &self.bus
    }
}

impl<S, B, C> Drop for ConductorContext<S, B, C>
where
    S: KeyValueStore + 'static,
    B: MessageBroker + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(handle) = self
            .reaper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.cancel();
        }
    }
}

impl<C> ConductorContext<InMemoryKeyValueStore<C>, InMemoryBroker<C>, C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Starts a context over fresh in-memory adapters driven by `clock`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::start`] failures.
    pub async fn in_memory(config: ConductorConfig, clock: Arc<C>) -> Result<Self, ContextError> {
        let store = Arc::new(InMemoryKeyValueStore::with_clock(Arc::clone(&clock)));
        let broker = Arc::new(InMemoryBroker::with_clock(Arc::clone(&clock)));
        Self::start(config, store, broker, clock).await
    }
}
