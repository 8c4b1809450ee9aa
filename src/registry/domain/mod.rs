//! Domain model for agent registration, health, and statistics.
//!
//! All records here are plain values; persistence, TTL handling, and index
//! maintenance live behind the registry ports.

mod agent_type;
mod capability;
mod error;
mod health;
mod ids;
mod metadata;
mod registration;
mod state;
mod stats;

pub use agent_type::AgentType;
pub use capability::{Capability, ComplexityRange, MAX_COMPLEXITY, MIN_COMPLEXITY};
pub use error::{ParseAgentStateError, ParseAgentTypeError, RegistryDomainError};
pub use health::{AgentHealth, HealthScore};
pub use ids::AgentId;
pub use metadata::{AgentConfig, AgentMetadata, AgentProfile};
pub use registration::{RegistrationRequest, RegistrationResponse};
pub use state::AgentState;
pub use stats::{AgentStats, TaskOutcome};
