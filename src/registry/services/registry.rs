//! Service layer for agent registration, health, and statistics.
//!
//! Provides [`AgentRegistryService`], which owns record and index
//! maintenance on top of a [`KeyValueStore`]. The store is the single source
//! of truth: there is no in-process caching or locking, and concurrent field
//! writes resolve as last-write-wins at the store.

use super::records::{
    capability_index_key, decode, encode, encode_field, health_key, metadata_key, stats_key,
    type_index_key,
};
use crate::config::RegistryConfig;
use crate::registry::{
    domain::{
        AgentHealth, AgentId, AgentMetadata, AgentState, AgentStats, AgentType, Capability,
        RegistrationRequest, RegistrationResponse, RegistryDomainError, TaskOutcome,
    },
    ports::{KeyValueStore, StoreError},
};
use crate::telemetry::OperationMetrics;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Service-level errors for registry operations.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Request validation failed.
    #[error(transparent)]
    Domain(#[from] RegistryDomainError),

    /// An agent with the same identifier is already registered.
    #[error("agent {0} is already registered")]
    DuplicateAgent(AgentId),

    /// The backing store could not serve the call.
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// A stored record could not be encoded or decoded.
    #[error("record {key} could not be encoded or decoded: {source}")]
    InvalidRecord {
        /// Store key of the offending record.
        key: String,
        /// Serialisation failure.
        source: Arc<serde_json::Error>,
    },
}

impl RegistryError {
    fn invalid_record(key: &str, err: serde_json::Error) -> Self {
        Self::InvalidRecord {
            key: key.to_owned(),
            source: Arc::new(err),
        }
    }
}

/// Result type for registry service operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Predicate applied by [`AgentRegistryService::list_agents`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentFilter {
    agent_type: Option<AgentType>,
    state: Option<AgentState>,
    healthy_only: bool,
}

impl AgentFilter {
    /// Matches every registered agent.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts matches to one agent type.
    #[must_use]
    pub const fn of_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = Some(agent_type);
        self
    }

    /// Restricts matches to agents currently reporting `state`.
    #[must_use]
    pub const fn in_state(mut self, state: AgentState) -> Self {
        self.state = Some(state);
        self
    }

    /// Restricts matches to agents reporting themselves healthy.
    #[must_use]
    pub const fn healthy_only(mut self) -> Self {
        self.healthy_only = true;
        self
    }

    const fn needs_health(self) -> bool {
        self.state.is_some() || self.healthy_only
    }

    fn admits(self, health: &AgentHealth) -> bool {
        self.state.is_none_or(|state| state == health.state)
            && (!self.healthy_only || health.is_healthy)
    }
}

/// Aggregate counts across the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Registered agents.
    pub total_agents: usize,
    /// Registered agents per type.
    pub by_type: BTreeMap<AgentType, usize>,
    /// Agents per reported state; agents without a live health record are
    /// not counted here.
    pub by_state: BTreeMap<AgentState, usize>,
    /// Agents reporting themselves healthy.
    pub healthy_agents: usize,
    /// Agents reporting unhealthy or missing a live health record.
    pub unhealthy_agents: usize,
    /// Mean health score over agents with a live health record.
    pub average_health_score: f64,
}

/// Agent registration, health, and statistics service.
pub struct AgentRegistryService<S, C>
where
    S: KeyValueStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    config: RegistryConfig,
    metrics: Arc<OperationMetrics>,
}

impl<S, C> AgentRegistryService<S, C>
where
    S: KeyValueStore,
    C: Clock + Send + Sync,
{
    /// Creates a registry service with its own metrics sink.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>, config: RegistryConfig) -> Self {
        Self {
            store,
            clock,
            config,
            metrics: Arc::new(OperationMetrics::new()),
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

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Checks that the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn ping(&self) -> RegistryResult<()> {
        let result = self.store.ping().await.map_err(RegistryError::from);
        self.finish("registry.ping", None, result)
    }

    /// Registers an agent, creating its metadata, health, and stats records
    /// and adding it to the type and capability indices.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Domain`] for invalid requests,
    /// [`RegistryError::DuplicateAgent`] when the identifier is taken (the
    /// existing records are left untouched), or
    /// [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> RegistryResult<RegistrationResponse> {
        let requested_id = request.id().to_owned();
        let result = self.register_agent(request).await;
        self.finish("registry.register", Some(&requested_id), result)
    }

    /// Removes an agent's records and index memberships.
    ///
    /// Returns `Ok(false)` when the agent is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn deregister(&self, agent_id: &AgentId) -> RegistryResult<bool> {
        let result = self.deregister_agent(agent_id).await;
        self.finish("registry.deregister", Some(agent_id.as_str()), result)
    }

    /// Replaces an agent's health snapshot and refreshes its TTL.
    ///
    /// The snapshot's `agent_id` is forced to `agent_id`. Returns `Ok(false)`
    /// when the agent is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn update_health(
        &self,
        agent_id: &AgentId,
        health: AgentHealth,
    ) -> RegistryResult<bool> {
        let result = self.replace_health(agent_id, health).await;
        self.finish("registry.update_health", Some(agent_id.as_str()), result)
    }

    /// Replaces an agent's statistics.
    ///
    /// The record's `agent_id` is forced to `agent_id`. Returns `Ok(false)`
    /// when the agent is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn update_stats(&self, agent_id: &AgentId, stats: AgentStats) -> RegistryResult<bool> {
        let result = self.replace_stats(agent_id, stats).await;
        self.finish("registry.update_stats", Some(agent_id.as_str()), result)
    }

    /// Records a liveness ping, refreshing `last_heartbeat` and the health TTL.
    ///
    /// An agent whose health record already expired gets a fresh
    /// `initializing` snapshot and stays out of discovery until it pushes a
    /// full report. Returns `Ok(false)` when the agent is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn heartbeat(&self, agent_id: &AgentId) -> RegistryResult<bool> {
        let result = self.touch_heartbeat(agent_id).await;
        self.finish("registry.heartbeat", Some(agent_id.as_str()), result)
    }

    /// Folds a finished task into the agent's statistics.
    ///
    /// Successful outcomes also stamp `last_task_completed` on the live
    /// health record. Returns `Ok(false)` when the agent is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn record_task_outcome(
        &self,
        agent_id: &AgentId,
        outcome: &TaskOutcome,
    ) -> RegistryResult<bool> {
        let result = self.apply_outcome(agent_id, outcome).await;
        self.finish("registry.record_task_outcome", Some(agent_id.as_str()), result)
    }

    /// Returns an agent's metadata, or `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down or
    /// [`RegistryError::InvalidRecord`] when the record is corrupt.
    pub async fn get_metadata(&self, agent_id: &AgentId) -> RegistryResult<Option<AgentMetadata>> {
        let result = self.load(&metadata_key(agent_id)).await;
        self.finish("registry.get_metadata", Some(agent_id.as_str()), result)
    }

    /// Returns an agent's live health snapshot, or `None` when unknown or
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down or
    /// [`RegistryError::InvalidRecord`] when the record is corrupt.
    pub async fn get_health(&self, agent_id: &AgentId) -> RegistryResult<Option<AgentHealth>> {
        let result = self.load(&health_key(agent_id)).await;
        self.finish("registry.get_health", Some(agent_id.as_str()), result)
    }

    /// Returns an agent's statistics, or `None` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down or
    /// [`RegistryError::InvalidRecord`] when the record is corrupt.
    pub async fn get_stats(&self, agent_id: &AgentId) -> RegistryResult<Option<AgentStats>> {
        let result = self.load(&stats_key(agent_id)).await;
        self.finish("registry.get_stats", Some(agent_id.as_str()), result)
    }

    /// Lists agent identifiers matching `filter`, in ascending order.
    ///
    /// State and health predicates drop agents whose health record expired.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn list_agents(&self, filter: AgentFilter) -> RegistryResult<Vec<AgentId>> {
        let result = self.filter_agents(filter).await;
        self.finish("registry.list_agents", None, result)
    }

    /// Lists agents that declared `capability`, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn find_by_capability(&self, capability: &Capability) -> RegistryResult<Vec<AgentId>> {
        let result = self
            .index_members(&capability_index_key(capability))
            .await
            .map(|ids| ids.into_iter().collect());
        self.finish("registry.find_by_capability", None, result)
    }

    /// Returns aggregate counts across the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn get_registry_stats(&self) -> RegistryResult<RegistryStats> {
        let result = self.collect_stats().await;
        self.finish("registry.get_registry_stats", None, result)
    }

    /// Runs one reaping pass, deregistering every agent whose health record
    /// expired or whose last heartbeat is older than the stale timeout.
    ///
    /// Returns the reaped identifiers in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::StoreUnavailable`] when the store is down.
    pub async fn reap_stale_agents(&self) -> RegistryResult<Vec<AgentId>> {
        let result = self.reap().await;
        self.finish("registry.reap_stale_agents", None, result)
    }

    async fn register_agent(
        &self,
        request: RegistrationRequest,
    ) -> RegistryResult<RegistrationResponse> {
        let (profile, initial_state) = request.into_profile()?;
        let metadata = AgentMetadata::new(profile, &*self.clock);
        let agent_id = metadata.id().clone();

        let key = metadata_key(&agent_id);
        let fields = encode(&metadata).map_err(|err| RegistryError::invalid_record(&key, err))?;
        if !self.store.create_fields(&key, &fields).await? {
            return Err(RegistryError::DuplicateAgent(agent_id));
        }
        if let Err(err) = self.complete_registration(&metadata, initial_state).await {
            self.roll_back_registration(&metadata).await;
            return Err(err);
        }

        info!(
            agent_id = %agent_id,
            agent_type = %metadata.agent_type(),
            capabilities = metadata.capabilities().len(),
            "agent registered"
        );

        Ok(RegistrationResponse {
            success: true,
            assigned_queues: vec![agent_id.inbox_queue()],
            agent_id,
            registry_endpoint: self.config.endpoint.clone(),
        })
    }

    /// Writes everything but the metadata record. The type index goes first
    /// so the reaper can see a registration abandoned past this point.
    async fn complete_registration(
        &self,
        metadata: &AgentMetadata,
        initial_state: AgentState,
    ) -> RegistryResult<()> {
        let agent_id = metadata.id();
        self.store
            .add_to_set(&type_index_key(metadata.agent_type()), agent_id.as_str())
            .await?;
        let health = AgentHealth::new(agent_id.clone(), initial_state, metadata.created_at());
        self.write_health(&health).await?;
        self.write_stats(&AgentStats::new(agent_id.clone())).await?;
        self.index(metadata).await
    }

    /// Removes a partially written registration, metadata first so the id
    /// can be registered again. Leftovers are cleared by reaping.
    async fn roll_back_registration(&self, metadata: &AgentMetadata) {
        let agent_id = metadata.id();
        let result = async {
            self.store.delete(&metadata_key(agent_id)).await?;
            self.store.delete(&health_key(agent_id)).await?;
            self.store.delete(&stats_key(agent_id)).await?;
            self.unindex(metadata).await
        }
        .await;
        if let Err(err) = &result {
            error!(
                agent_id = %agent_id,
                error = %err,
                "partial registration left behind until reaped"
            );
            return;
        }
        warn!(agent_id = %agent_id, "rolled back partial registration");
    }

    async fn deregister_agent(&self, agent_id: &AgentId) -> RegistryResult<bool> {
        let metadata: Option<AgentMetadata> = self.load(&metadata_key(agent_id)).await?;

        // Orphaned health/stats records can survive a crash mid-registration.
        self.store.delete(&health_key(agent_id)).await?;
        self.store.delete(&stats_key(agent_id)).await?;

        let Some(record) = metadata else {
            // Capability sets cannot be enumerated without metadata; discovery
            // skips members whose metadata is gone.
            for kind in AgentType::ALL {
                self.store
                    .remove_from_set(&type_index_key(kind), agent_id.as_str())
                    .await?;
            }
            return Ok(false);
        };

        self.unindex(&record).await?;
        self.store.delete(&metadata_key(agent_id)).await?;
        info!(agent_id = %agent_id, "agent deregistered");
        Ok(true)
    }

    async fn replace_health(&self, agent_id: &AgentId, health: AgentHealth) -> RegistryResult<bool> {
        if !self.is_registered(agent_id).await? {
            return Ok(false);
        }
        let snapshot = AgentHealth {
            agent_id: agent_id.clone(),
            ..health
        };
        self.write_health(&snapshot).await?;
        debug!(agent_id = %agent_id, state = %snapshot.state, "health updated");
        Ok(true)
    }

    async fn replace_stats(&self, agent_id: &AgentId, stats: AgentStats) -> RegistryResult<bool> {
        if !self.is_registered(agent_id).await? {
            return Ok(false);
        }
        let record = AgentStats {
            agent_id: agent_id.clone(),
            ..stats
        };
        self.write_stats(&record).await?;
        debug!(agent_id = %agent_id, "stats updated");
        Ok(true)
    }

    async fn touch_heartbeat(&self, agent_id: &AgentId) -> RegistryResult<bool> {
        if !self.is_registered(agent_id).await? {
            return Ok(false);
        }
        let now = self.clock.utc();
        let key = health_key(agent_id);
        let current: Option<AgentHealth> = self.load(&key).await?;
        match current {
            Some(_) => {
                let fields = encode_field("last_heartbeat", &now)
                    .map_err(|err| RegistryError::invalid_record(&key, err))?;
                self.store.set_fields(&key, &fields).await?;
                self.store.expire(&key, self.config.health_ttl()).await?;
            }
            None => {
                let fresh = AgentHealth::new(agent_id.clone(), AgentState::Initializing, now);
                self.write_health(&fresh).await?;
            }
        }
        Ok(true)
    }

    async fn apply_outcome(&self, agent_id: &AgentId, outcome: &TaskOutcome) -> RegistryResult<bool> {
        if !self.is_registered(agent_id).await? {
            return Ok(false);
        }
        let now = self.clock.utc();
        let mut stats: AgentStats = self
            .load(&stats_key(agent_id))
            .await?
            .unwrap_or_else(|| AgentStats::new(agent_id.clone()));
        stats.record(outcome, now);
        self.write_stats(&stats).await?;

        let key = health_key(agent_id);
        if outcome.success && self.store.exists(&key).await? {
            let fields = encode_field("last_task_completed", &Some(now))
                .map_err(|err| RegistryError::invalid_record(&key, err))?;
            self.store.set_fields(&key, &fields).await?;
        }
        Ok(true)
    }

    async fn filter_agents(&self, filter: AgentFilter) -> RegistryResult<Vec<AgentId>> {
        let candidates = self.indexed_agents(filter.agent_type).await?;
        if !filter.needs_health() {
            return Ok(candidates.into_iter().collect());
        }

        let mut matched = Vec::new();
        for agent_id in candidates {
            let health: Option<AgentHealth> = self.load(&health_key(&agent_id)).await?;
            if health.as_ref().is_some_and(|snapshot| filter.admits(snapshot)) {
                matched.push(agent_id);
            }
        }
        Ok(matched)
    }

    async fn collect_stats(&self) -> RegistryResult<RegistryStats> {
        let mut stats = RegistryStats::default();
        let mut score_total = 0.0;
        let mut scored = 0_u32;

        for agent_type in AgentType::ALL {
            let members = self.index_members(&type_index_key(agent_type)).await?;
            if members.is_empty() {
                continue;
            }
            stats.by_type.insert(agent_type, members.len());
            stats.total_agents += members.len();

            for agent_id in members {
                let health: Option<AgentHealth> = self.load(&health_key(&agent_id)).await?;
                let Some(snapshot) = health else {
                    stats.unhealthy_agents += 1;
                    continue;
                };
                *stats.by_state.entry(snapshot.state).or_insert(0) += 1;
                if snapshot.is_healthy {
                    stats.healthy_agents += 1;
                } else {
                    stats.unhealthy_agents += 1;
                }
                score_total += snapshot.health_score.value();
                scored += 1;
            }
        }

        if scored > 0 {
            stats.average_health_score = score_total / f64::from(scored);
        }
        Ok(stats)
    }

    async fn reap(&self) -> RegistryResult<Vec<AgentId>> {
        let now = self.clock.utc();
        let stale_after = TimeDelta::from_std(self.config.stale_timeout()).unwrap_or(TimeDelta::MAX);
        let mut reaped = Vec::new();

        for agent_id in self.indexed_agents(None).await? {
            let health: Option<AgentHealth> = self.load(&health_key(&agent_id)).await?;
            let last_heartbeat = health.as_ref().map(|snapshot| snapshot.last_heartbeat);
            let is_stale = match &health {
                Some(snapshot) => snapshot.is_stale(now, stale_after),
                None => self.is_abandoned(&agent_id, now, stale_after).await?,
            };
            if !is_stale {
                continue;
            }
            if self.deregister_agent(&agent_id).await? {
                info!(
                    agent_id = %agent_id,
                    last_heartbeat = ?last_heartbeat,
                    "reaped stale agent"
                );
                reaped.push(agent_id);
            }
        }
        Ok(reaped)
    }

    /// An indexed agent without health is abandoned once its metadata is
    /// gone or older than `stale_after`; younger ones may still be
    /// registering.
    async fn is_abandoned(
        &self,
        agent_id: &AgentId,
        now: DateTime<Utc>,
        stale_after: TimeDelta,
    ) -> RegistryResult<bool> {
        let metadata: Option<AgentMetadata> = self.load(&metadata_key(agent_id)).await?;
        Ok(metadata.is_none_or(|record| now.signed_duration_since(record.created_at()) > stale_after))
    }

    async fn is_registered(&self, agent_id: &AgentId) -> RegistryResult<bool> {
        Ok(self.store.exists(&metadata_key(agent_id)).await?)
    }

    async fn write_health(&self, health: &AgentHealth) -> RegistryResult<()> {
        let key = health_key(&health.agent_id);
        let fields = encode(health).map_err(|err| RegistryError::invalid_record(&key, err))?;
        self.store.set_fields(&key, &fields).await?;
        self.store.expire(&key, self.config.health_ttl()).await?;
        Ok(())
    }

    async fn write_stats(&self, stats: &AgentStats) -> RegistryResult<()> {
        let key = stats_key(&stats.agent_id);
        let fields = encode(stats).map_err(|err| RegistryError::invalid_record(&key, err))?;
        self.store.set_fields(&key, &fields).await?;
        Ok(())
    }

    async fn index(&self, metadata: &AgentMetadata) -> RegistryResult<()> {
        let member = metadata.id().as_str();
        self.store
            .add_to_set(&type_index_key(metadata.agent_type()), member)
            .await?;
        for capability in metadata.capabilities() {
            self.store
                .add_to_set(&capability_index_key(capability), member)
                .await?;
        }
        Ok(())
    }

    async fn unindex(&self, metadata: &AgentMetadata) -> RegistryResult<()> {
        let member = metadata.id().as_str();
        self.store
            .remove_from_set(&type_index_key(metadata.agent_type()), member)
            .await?;
        for capability in metadata.capabilities() {
            self.store
                .remove_from_set(&capability_index_key(capability), member)
                .await?;
        }
        Ok(())
    }

    async fn indexed_agents(&self, agent_type: Option<AgentType>) -> RegistryResult<BTreeSet<AgentId>> {
        match agent_type {
            Some(kind) => self.index_members(&type_index_key(kind)).await,
            None => {
                let mut all = BTreeSet::new();
                for kind in AgentType::ALL {
                    all.extend(self.index_members(&type_index_key(kind)).await?);
                }
                Ok(all)
            }
        }
    }

    async fn index_members(&self, key: &str) -> RegistryResult<BTreeSet<AgentId>> {
        let raw = self.store.set_members(key).await?;
        let members = raw
            .into_iter()
            .filter_map(|member| match AgentId::new(member.as_str()) {
                Ok(agent_id) => Some(agent_id),
                Err(err) => {
                    warn!(index = key, member = %member, error = %err, "skipping malformed index member");
                    None
                }
            })
            .collect();
        Ok(members)
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> RegistryResult<Option<T>> {
        let Some(fields) = self.store.get_fields(key).await? else {
            return Ok(None);
        };
        decode(&fields)
            .map(Some)
            .map_err(|err| RegistryError::invalid_record(key, err))
    }

    fn finish<T>(
        &self,
        operation: &'static str,
        agent_id: Option<&str>,
        result: RegistryResult<T>,
    ) -> RegistryResult<T> {
        if let Err(err) = &result {
            match err {
                RegistryError::DuplicateAgent(_) | RegistryError::Domain(_) => {
                    warn!(operation, agent_id, error = %err, "registry request rejected");
                }
                RegistryError::StoreUnavailable(_) | RegistryError::InvalidRecord { .. } => {
                    error!(operation, agent_id, error = %err, "registry operation failed");
                }
            }
        }
        self.metrics.observe(operation, result)
    }
}
