//! Task types, their categories, and agent-type affinity.
//!
//! Matching is table driven: each [`TaskType`] belongs to exactly one
//! [`TaskCategory`], each category lists the capabilities that qualify an
//! agent, and [`TYPE_COMPATIBILITY`] scores how well an agent type suits a
//! task type. Adding a task type means adding rows, not branches.

use super::ParseTaskTypeError;
use crate::registry::domain::AgentType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of work a caller wants routed to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Writing new code.
    CodeGeneration,
    /// Reviewing existing changes.
    CodeReview,
    /// Restructuring code without changing behaviour.
    Refactoring,
    /// Locating and fixing defects.
    Debugging,
    /// Designing service interfaces.
    ApiDesign,
    /// Designing system structure.
    Architecture,
    /// Designing user interfaces.
    UiDesign,
    /// Designing schemas and data models.
    DatabaseDesign,
    /// Writing and running tests.
    Testing,
    /// Shipping builds to an environment.
    Deployment,
    /// Profiling and tuning hot paths.
    PerformanceOptimization,
    /// Auditing code or infrastructure for vulnerabilities.
    SecurityAudit,
    /// Writing technical documentation.
    Documentation,
}

impl TaskType {
    /// Every task type.
    pub const ALL: [Self; 13] = [
        Self::CodeGeneration,
        Self::CodeReview,
        Self::Refactoring,
        Self::Debugging,
        Self::ApiDesign,
        Self::Architecture,
        Self::UiDesign,
        Self::DatabaseDesign,
        Self::Testing,
        Self::Deployment,
        Self::PerformanceOptimization,
        Self::SecurityAudit,
        Self::Documentation,
    ];

    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeGeneration => "code_generation",
            Self::CodeReview => "code_review",
            Self::Refactoring => "refactoring",
            Self::Debugging => "debugging",
            Self::ApiDesign => "api_design",
            Self::Architecture => "architecture",
            Self::UiDesign => "ui_design",
            Self::DatabaseDesign => "database_design",
            Self::Testing => "testing",
            Self::Deployment => "deployment",
            Self::PerformanceOptimization => "performance_optimization",
            Self::SecurityAudit => "security_audit",
            Self::Documentation => "documentation",
        }
    }

    /// Returns the category whose capabilities qualify an agent for this
    /// task type.
    #[must_use]
    pub const fn category(self) -> TaskCategory {
        match self {
            Self::CodeGeneration | Self::Refactoring | Self::Debugging => TaskCategory::Development,
            Self::CodeReview | Self::Testing => TaskCategory::Quality,
            Self::ApiDesign | Self::Architecture | Self::UiDesign => TaskCategory::Design,
            Self::DatabaseDesign => TaskCategory::Data,
            Self::Deployment | Self::PerformanceOptimization => TaskCategory::Operations,
            Self::SecurityAudit => TaskCategory::Security,
            Self::Documentation => TaskCategory::Knowledge,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskType {
    type Error = ParseTaskTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseTaskTypeError(value.to_owned()))
    }
}

/// Group of task types sharing the capabilities that qualify an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// Producing and changing code.
    Development,
    /// Reviewing and testing code.
    Quality,
    /// Structural and interface design.
    Design,
    /// Data modelling and storage.
    Data,
    /// Delivery and runtime concerns.
    Operations,
    /// Security assessment.
    Security,
    /// Documentation and knowledge sharing.
    Knowledge,
}

impl TaskCategory {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Quality => "quality",
            Self::Design => "design",
            Self::Data => "data",
            Self::Operations => "operations",
            Self::Security => "security",
            Self::Knowledge => "knowledge",
        }
    }

    /// Returns the normalised capability names that qualify an agent for
    /// this category.
    #[must_use]
    pub const fn capabilities(self) -> &'static [&'static str] {
        match self {
            Self::Development => &["code_generation", "refactoring", "debugging"],
            Self::Quality => &["code_review", "testing", "test_automation"],
            Self::Design => &["architecture", "system_design", "api_design", "ui_design"],
            Self::Data => &["database_design", "data_modeling", "query_optimization"],
            Self::Operations => &["deployment", "infrastructure", "monitoring", "performance_tuning"],
            Self::Security => &["security_audit", "vulnerability_scanning", "threat_modeling"],
            Self::Knowledge => &["documentation", "technical_writing"],
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compatibility applied when an (agent type, task type) pair is unlisted.
pub const DEFAULT_TYPE_COMPATIBILITY: f64 = 0.3;

/// Affinity of agent types for task types, in `[0, 1]`.
const TYPE_COMPATIBILITY: &[(AgentType, TaskType, f64)] = &[
    (AgentType::Architect, TaskType::Architecture, 1.0),
    (AgentType::Architect, TaskType::ApiDesign, 0.8),
    (AgentType::Architect, TaskType::DatabaseDesign, 0.6),
    (AgentType::Architect, TaskType::CodeReview, 0.7),
    (AgentType::Backend, TaskType::CodeGeneration, 0.9),
    (AgentType::Backend, TaskType::ApiDesign, 1.0),
    (AgentType::Backend, TaskType::Debugging, 0.8),
    (AgentType::Backend, TaskType::Refactoring, 0.8),
    (AgentType::Backend, TaskType::DatabaseDesign, 0.6),
    (AgentType::Backend, TaskType::PerformanceOptimization, 0.7),
    (AgentType::Frontend, TaskType::CodeGeneration, 0.8),
    (AgentType::Frontend, TaskType::UiDesign, 1.0),
    (AgentType::Frontend, TaskType::Debugging, 0.7),
    (AgentType::Frontend, TaskType::Refactoring, 0.7),
    (AgentType::Database, TaskType::DatabaseDesign, 1.0),
    (AgentType::Database, TaskType::PerformanceOptimization, 0.7),
    (AgentType::Devops, TaskType::Deployment, 1.0),
    (AgentType::Devops, TaskType::PerformanceOptimization, 0.6),
    (AgentType::Testing, TaskType::Testing, 1.0),
    (AgentType::Testing, TaskType::CodeReview, 0.7),
    (AgentType::Testing, TaskType::Debugging, 0.7),
    (AgentType::Security, TaskType::SecurityAudit, 1.0),
    (AgentType::Security, TaskType::CodeReview, 0.8),
    (AgentType::Documentation, TaskType::Documentation, 1.0),
];

/// Returns how well `agent_type` suits `task_type`, falling back to
/// [`DEFAULT_TYPE_COMPATIBILITY`] for unlisted pairs.
#[must_use]
pub fn type_compatibility(agent_type: AgentType, task_type: TaskType) -> f64 {
    TYPE_COMPATIBILITY
        .iter()
        .find(|(agent, task, _)| *agent == agent_type && *task == task_type)
        .map_or(DEFAULT_TYPE_COMPATIBILITY, |(_, _, score)| *score)
}
