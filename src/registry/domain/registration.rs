//! Registration request and response payloads.

use super::{
    AgentConfig, AgentId, AgentProfile, AgentState, AgentType, Capability, ComplexityRange,
    RegistryDomainError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Request payload for registering an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    id: String,
    agent_type: AgentType,
    name: String,
    description: String,
    version: String,
    capabilities: Vec<String>,
    owner: Option<String>,
    tags: Vec<String>,
    initial_state: AgentState,
    config: AgentConfig,
}

impl RegistrationRequest {
    /// Creates a request with the mandatory identity fields.
    ///
    /// The agent starts in [`AgentState::Initializing`] unless
    /// [`Self::with_initial_state`] says otherwise.
    #[must_use]
    pub fn new(id: impl Into<String>, agent_type: AgentType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_type,
            name: name.into(),
            description: String::new(),
            version: String::from("0.1.0"),
            capabilities: Vec::new(),
            owner: None,
            tags: Vec::new(),
            initial_state: AgentState::Initializing,
            config: AgentConfig::default(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the agent software version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the declared capabilities.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the free-form tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the state recorded in the initial health snapshot.
    #[must_use]
    pub const fn with_initial_state(mut self, state: AgentState) -> Self {
        self.initial_state = state;
        self
    }

    /// Sets the declared runtime configuration.
    #[must_use]
    pub const fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the declared complexity range.
    #[must_use]
    pub const fn with_complexity_range(mut self, range: ComplexityRange) -> Self {
        self.config.complexity_range = range;
        self
    }

    /// Returns the requested agent identifier, before validation.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the requested initial state.
    #[must_use]
    pub const fn initial_state(&self) -> AgentState {
        self.initial_state
    }

    /// Validates the request and splits it into a profile and initial state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError`] when the identifier, name, or any
    /// capability name is invalid.
    pub fn into_profile(self) -> Result<(AgentProfile, AgentState), RegistryDomainError> {
        let Self {
            id,
            agent_type,
            name,
            description,
            version,
            capabilities,
            owner,
            tags,
            initial_state,
            config,
        } = self;

        let agent_id = AgentId::new(id)?;
        let trimmed_name = name.trim().to_owned();
        if trimmed_name.is_empty() {
            return Err(RegistryDomainError::EmptyAgentName);
        }
        let declared = capabilities
            .into_iter()
            .map(Capability::new)
            .collect::<Result<BTreeSet<_>, _>>()?;

        let profile = AgentProfile {
            id: agent_id,
            agent_type,
            name: trimmed_name,
            description,
            version,
            capabilities: declared,
            owner,
            tags: tags.into_iter().collect(),
            config,
        };
        Ok((profile, initial_state))
    }
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    /// Always `true`; failures are reported as errors instead.
    pub success: bool,
    /// Identifier the agent was registered under.
    pub agent_id: AgentId,
    /// Bus queues the agent should consume from.
    pub assigned_queues: Vec<String>,
    /// Endpoint agents use to reach the registry.
    pub registry_endpoint: String,
}
