//! Task descriptors submitted to discovery.

use super::{DiscoveryDomainError, TaskType};
use crate::registry::domain::{AgentId, AgentType, MAX_COMPLEXITY, MIN_COMPLEXITY};
use std::collections::BTreeSet;

/// A unit of work to be matched against registered agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    task_type: TaskType,
    complexity: u8,
    privacy_required: bool,
    preferred_type: Option<AgentType>,
    exclude: BTreeSet<AgentId>,
}

impl TaskRequest {
    /// Creates a request for `task_type` at `complexity`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryDomainError::InvalidComplexity`] when `complexity`
    /// falls outside `1..=10`.
    pub const fn new(task_type: TaskType, complexity: u8) -> Result<Self, DiscoveryDomainError> {
        if complexity < MIN_COMPLEXITY || complexity > MAX_COMPLEXITY {
            return Err(DiscoveryDomainError::InvalidComplexity(complexity));
        }
        Ok(Self {
            task_type,
            complexity,
            privacy_required: false,
            preferred_type: None,
            exclude: BTreeSet::new(),
        })
    }

    /// Restricts candidates to agents tagged for private work.
    #[must_use]
    pub const fn with_privacy_required(mut self) -> Self {
        self.privacy_required = true;
        self
    }

    /// Adds every agent of `agent_type` to the candidate set.
    #[must_use]
    pub const fn with_preferred_type(mut self, agent_type: AgentType) -> Self {
        self.preferred_type = Some(agent_type);
        self
    }

    /// Removes `agents` from the candidate set.
    #[must_use]
    pub fn excluding(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.exclude.extend(agents);
        self
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Returns the complexity in `1..=10`.
    #[must_use]
    pub const fn complexity(&self) -> u8 {
        self.complexity
    }

    /// Returns whether only privacy-tagged agents qualify.
    #[must_use]
    pub const fn privacy_required(&self) -> bool {
        self.privacy_required
    }

    /// Returns the preferred agent type, if any.
    #[must_use]
    pub const fn preferred_type(&self) -> Option<AgentType> {
        self.preferred_type
    }

    /// Returns the excluded agent identifiers.
    #[must_use]
    pub const fn exclude(&self) -> &BTreeSet<AgentId> {
        &self.exclude
    }
}
