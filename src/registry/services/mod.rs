//! Application services for agent registration, health, and reaping.

mod reaper;
mod records;
mod registry;

pub use reaper::{ReaperHandle, StaleAgentReaper};
pub use registry::{
    AgentFilter, AgentRegistryService, RegistryError, RegistryResult, RegistryStats,
};
