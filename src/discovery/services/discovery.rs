//! Service layer for matching tasks to registered agents.

use crate::config::DiscoveryConfig;
use crate::discovery::domain::{
    LoadBalancingStrategy, ScoreInputs, TaskRequest, resource_penalty, score_candidate,
};
use crate::registry::{
    domain::{AgentHealth, AgentId, AgentMetadata, AgentType, Capability},
    ports::KeyValueStore,
    services::{AgentFilter, AgentRegistryService, RegistryError, RegistryStats},
};
use crate::telemetry::OperationMetrics;
use chrono::{DateTime, Utc};
use mockable::Clock;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Service-level errors for discovery operations.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// The registry could not serve a lookup.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type for discovery service operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Registry statistics stamped with the time they were gathered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryStats {
    /// Aggregate registry counts.
    pub registry: RegistryStats,
    /// When the counts were gathered.
    pub generated_at: DateTime<Utc>,
}

/// Candidate that survived filtering, with its computed score.
struct Scored {
    agent_id: AgentId,
    total: f64,
}

/// Task matching and load-balancing service.
///
/// Reads go through [`AgentRegistryService`]; discovery never writes to the
/// registry. Unhealthy agents and agents outside `idle`/`busy` are never
/// returned by [`Self::find_agent_for_task`].
pub struct DiscoveryService<S, C>
where
    S: KeyValueStore,
    C: Clock + Send + Sync,
{
    registry: Arc<AgentRegistryService<S, C>>,
    clock: Arc<C>,
    config: DiscoveryConfig,
    round_robin: AtomicUsize,
    metrics: Arc<OperationMetrics>,
}

impl<S, C> DiscoveryService<S, C>
where
    S: KeyValueStore,
    C: Clock + Send + Sync,
{
    /// Creates a discovery service sharing the registry's metrics sink.
    #[must_use]
    pub fn new(
        registry: Arc<AgentRegistryService<S, C>>,
        clock: Arc<C>,
        config: DiscoveryConfig,
    ) -> Self {
        let metrics = Arc::clone(registry.metrics());
        Self {
            registry,
            clock,
            config,
            round_robin: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Returns the strategy named in configuration.
    #[must_use]
    pub fn default_strategy(&self) -> LoadBalancingStrategy {
        LoadBalancingStrategy::from_name(&self.config.default_strategy)
    }

    /// Returns the best-scoring available agent for `request`, or `None`
    /// when no candidate qualifies.
    ///
    /// Equal scores resolve to the lowest agent id.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Registry`] when a registry lookup fails.
    pub async fn find_agent_for_task(&self, request: &TaskRequest) -> DiscoveryResult<Option<AgentId>> {
        let result = self.best_candidate(request).await;
        self.finish("discovery.find_agent_for_task", result)
    }

    /// Lists agents of `agent_type`, optionally restricted to healthy or
    /// work-accepting agents.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Registry`] when a registry lookup fails.
    pub async fn find_agents_by_type(
        &self,
        agent_type: AgentType,
        healthy_only: bool,
        available_only: bool,
    ) -> DiscoveryResult<Vec<AgentId>> {
        let result = async {
            let ids = self
                .registry
                .list_agents(AgentFilter::all().of_type(agent_type))
                .await?;
            self.retain_by_health(ids, healthy_only, available_only).await
        }
        .await;
        self.finish("discovery.find_agents_by_type", result)
    }

    /// Lists agents declaring `capability`, optionally restricted to healthy
    /// or work-accepting agents.
    ///
    /// Index members whose metadata is gone are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Registry`] when a registry lookup fails.
    pub async fn find_agents_by_capability(
        &self,
        capability: &Capability,
        healthy_only: bool,
        available_only: bool,
    ) -> DiscoveryResult<Vec<AgentId>> {
        let result = async {
            let mut registered = Vec::new();
            for agent_id in self.registry.find_by_capability(capability).await? {
                if self.registry.get_metadata(&agent_id).await?.is_some() {
                    registered.push(agent_id);
                }
            }
            self.retain_by_health(registered, healthy_only, available_only)
                .await
        }
        .await;
        self.finish("discovery.find_agents_by_capability", result)
    }

    /// Picks one agent from `agents` using `strategy`.
    ///
    /// Load-aware strategies consider only agents with a live health record
    /// and break ties by lowest id. Returns `None` for an empty list or when
    /// no agent has health data for a load-aware strategy.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Registry`] when a registry lookup fails.
    pub async fn select_agent_with_load_balancing(
        &self,
        agents: &[AgentId],
        strategy: LoadBalancingStrategy,
    ) -> DiscoveryResult<Option<AgentId>> {
        let result = self.select(agents, strategy).await;
        if let Ok(Some(agent_id)) = &result {
            debug!(agent_id = %agent_id, strategy = %strategy, "load balancer selected agent");
        }
        self.finish("discovery.select_agent_with_load_balancing", result)
    }

    /// Returns registry statistics with a generation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Registry`] when a registry lookup fails.
    pub async fn get_discovery_stats(&self) -> DiscoveryResult<DiscoveryStats> {
        let result = self
            .registry
            .get_registry_stats()
            .await
            .map(|registry| DiscoveryStats {
                registry,
                generated_at: self.clock.utc(),
            })
            .map_err(DiscoveryError::from);
        self.finish("discovery.get_discovery_stats", result)
    }

    async fn best_candidate(&self, request: &TaskRequest) -> DiscoveryResult<Option<AgentId>> {
        let candidates = self.candidates(request).await?;
        let considered = candidates.len();

        let mut best: Option<Scored> = None;
        for agent_id in candidates {
            let Some(scored) = self.score(agent_id, request).await? else {
                continue;
            };
            // Candidates arrive in ascending id order, so only a strictly
            // higher score displaces the current best.
            if best.as_ref().is_none_or(|current| scored.total > current.total) {
                best = Some(scored);
            }
        }

        let selected = best.filter(|scored| scored.total > 0.0);
        match &selected {
            Some(scored) => info!(
                task_type = %request.task_type(),
                complexity = request.complexity(),
                agent_id = %scored.agent_id,
                score = scored.total,
                considered,
                "selected agent for task"
            ),
            None => debug!(
                task_type = %request.task_type(),
                considered,
                "no agent available for task"
            ),
        }
        Ok(selected.map(|scored| scored.agent_id))
    }

    async fn candidates(&self, request: &TaskRequest) -> DiscoveryResult<BTreeSet<AgentId>> {
        let mut candidates = BTreeSet::new();
        if let Some(agent_type) = request.preferred_type() {
            candidates.extend(
                self.registry
                    .list_agents(AgentFilter::all().of_type(agent_type))
                    .await?,
            );
        }
        for name in request.task_type().category().capabilities() {
            let Ok(capability) = Capability::new(*name) else {
                continue;
            };
            candidates.extend(self.registry.find_by_capability(&capability).await?);
        }
        candidates.retain(|agent_id| !request.exclude().contains(agent_id));
        Ok(candidates)
    }

    async fn score(&self, agent_id: AgentId, request: &TaskRequest) -> DiscoveryResult<Option<Scored>> {
        let Some(health) = self.registry.get_health(&agent_id).await? else {
            return Ok(None);
        };
        if !health.is_available() {
            return Ok(None);
        }
        let Some(metadata) = self.registry.get_metadata(&agent_id).await? else {
            return Ok(None);
        };
        if request.privacy_required() && !self.is_private(&metadata) {
            return Ok(None);
        }
        let stats = self.registry.get_stats(&agent_id).await?;

        let inputs = ScoreInputs::from_records(&metadata, &health, stats.as_ref());
        let score = score_candidate(&inputs, request.task_type(), request.complexity());
        debug!(
            agent_id = %agent_id,
            total = score.total,
            health = score.health,
            success = score.success,
            responsiveness = score.responsiveness,
            type_compatibility = score.type_compatibility,
            complexity_fit = score.complexity_fit,
            resource_penalty = score.resource_penalty,
            "scored candidate"
        );
        Ok(Some(Scored {
            agent_id,
            total: score.total,
        }))
    }

    fn is_private(&self, metadata: &AgentMetadata) -> bool {
        self.config
            .privacy_tags
            .iter()
            .any(|tag| metadata.tags().contains(tag))
    }

    async fn retain_by_health(
        &self,
        agents: Vec<AgentId>,
        healthy_only: bool,
        available_only: bool,
    ) -> DiscoveryResult<Vec<AgentId>> {
        if !healthy_only && !available_only {
            return Ok(agents);
        }
        let mut retained = Vec::with_capacity(agents.len());
        for agent_id in agents {
            let Some(health) = self.registry.get_health(&agent_id).await? else {
                continue;
            };
            let healthy = !healthy_only || health.is_healthy;
            let available = !available_only || health.is_available();
            if healthy && available {
                retained.push(agent_id);
            }
        }
        Ok(retained)
    }

    async fn select(
        &self,
        agents: &[AgentId],
        strategy: LoadBalancingStrategy,
    ) -> DiscoveryResult<Option<AgentId>> {
        if agents.is_empty() {
            return Ok(None);
        }
        match strategy {
            LoadBalancingStrategy::RoundRobin => {
                let ticket = self.round_robin.fetch_add(1, Ordering::Relaxed);
                Ok(ticket
                    .checked_rem(agents.len())
                    .and_then(|slot| agents.get(slot))
                    .cloned())
            }
            LoadBalancingStrategy::Random => Ok(pick_random(agents)),
            LoadBalancingStrategy::LeastLoaded => {
                self.min_by_health(agents, |health| {
                    resource_penalty(health.cpu_percent, health.memory_mb)
                })
                .await
            }
            LoadBalancingStrategy::Fastest => {
                self.min_by_health(agents, |health| health.response_time_ms)
                    .await
            }
            LoadBalancingStrategy::BestHealth => {
                self.min_by_health(agents, |health| -health.health_score.value())
                    .await
            }
        }
    }

    async fn min_by_health(
        &self,
        agents: &[AgentId],
        key: impl Fn(&AgentHealth) -> f64 + Send,
    ) -> DiscoveryResult<Option<AgentId>> {
        let mut ranked = Vec::with_capacity(agents.len());
        for agent_id in agents {
            if let Some(health) = self.registry.get_health(agent_id).await? {
                ranked.push((key(&health), agent_id));
            }
        }
        Ok(ranked
            .into_iter()
            .min_by(|(left_key, left_id), (right_key, right_id)| {
                left_key
                    .total_cmp(right_key)
                    .then_with(|| left_id.cmp(right_id))
            })
            .map(|(_, agent_id)| agent_id.clone()))
    }

    fn finish<T>(&self, operation: &'static str, result: DiscoveryResult<T>) -> DiscoveryResult<T> {
        if let Err(err) = &result {
            warn!(operation, error = %err, "discovery operation failed");
        }
        self.metrics.observe(operation, result)
    }
}

fn pick_random(agents: &[AgentId]) -> Option<AgentId> {
    agents.choose(&mut rand::thread_rng()).cloned()
}
