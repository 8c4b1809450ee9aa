//! Agent metadata record.

use super::{AgentId, AgentType, Capability, ComplexityRange};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default heartbeat interval advertised by agents, in seconds.
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Runtime configuration an agent declares at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Task complexity the agent is built for.
    pub complexity_range: ComplexityRange,
    /// Upper bound on tasks the agent runs at once.
    pub max_concurrent_tasks: u32,
    /// How often the agent promises to push health snapshots.
    pub heartbeat_interval_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            complexity_range: ComplexityRange::default(),
            max_concurrent_tasks: 1,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

/// Parameter object for constructing [`AgentMetadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    /// Unique agent identifier.
    pub id: AgentId,
    /// Agent specialisation.
    pub agent_type: AgentType,
    /// Human-readable name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Agent software version.
    pub version: String,
    /// Declared capabilities.
    pub capabilities: BTreeSet<Capability>,
    /// Owning team or operator, if any.
    pub owner: Option<String>,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
    /// Declared runtime configuration.
    pub config: AgentConfig,
}

/// Immutable description of a registered agent.
///
/// Metadata only changes through a full re-registration, so there are no
/// mutators beyond construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    id: AgentId,
    agent_type: AgentType,
    name: String,
    description: String,
    version: String,
    capabilities: BTreeSet<Capability>,
    owner: Option<String>,
    tags: BTreeSet<String>,
    config: AgentConfig,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentMetadata {
    /// Creates metadata stamped with the current clock time.
    #[must_use]
    pub fn new(profile: AgentProfile, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        let AgentProfile {
            id,
            agent_type,
            name,
            description,
            version,
            capabilities,
            owner,
            tags,
            config,
        } = profile;
        Self {
            id,
            agent_type,
            name,
            description,
            version,
            capabilities,
            owner,
            tags,
            config,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the agent identifier.
    #[must_use]
    pub const fn id(&self) -> &AgentId {
        &self.id
    }

    /// Returns the agent specialisation.
    #[must_use]
    pub const fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Returns the human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the agent software version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub const fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Returns whether the agent declared `capability`.
    #[must_use]
    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns the owner, if one was declared.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Returns the free-form tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the declared runtime configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Returns the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
