//! Shared world state for agent discovery BDD scenarios.

use std::sync::Arc;

use conductor::config::{DiscoveryConfig, RegistryConfig};
use conductor::discovery::services::DiscoveryService;
use conductor::registry::{
    adapters::memory::InMemoryKeyValueStore, domain::AgentId, services::AgentRegistryService,
};
use rstest::fixture;

use crate::test_helpers::ManualClock;

/// Store type used by the BDD world.
pub type TestStore = InMemoryKeyValueStore<ManualClock>;

/// Scenario world for discovery behaviour tests.
pub struct DiscoveryWorld {
    /// Clock driving record expiry and staleness.
    pub clock: Arc<ManualClock>,
    /// The registry under test.
    pub registry: Arc<AgentRegistryService<TestStore, ManualClock>>,
    /// Discovery over `registry`.
    pub discovery: DiscoveryService<TestStore, ManualClock>,
    /// Outcome of the last discovery request.
    pub last_selection: Option<Option<AgentId>>,
    /// Agents removed by the last reaping pass.
    pub last_reaped: Vec<AgentId>,
}

impl DiscoveryWorld {
    /// Creates a world over an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(InMemoryKeyValueStore::with_clock(Arc::clone(&clock)));
        let registry = Arc::new(AgentRegistryService::new(
            store,
            Arc::clone(&clock),
            RegistryConfig::default(),
        ));
        let discovery = DiscoveryService::new(
            Arc::clone(&registry),
            Arc::clone(&clock),
            DiscoveryConfig::default(),
        );
        Self {
            clock,
            registry,
            discovery,
            last_selection: None,
            last_reaped: Vec::new(),
        }
    }
}

impl Default for DiscoveryWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> DiscoveryWorld {
    DiscoveryWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Parses an agent identifier from scenario text.
pub fn agent_id(raw: &str) -> Result<AgentId, eyre::Report> {
    AgentId::new(raw).map_err(|err| eyre::eyre!("invalid agent id '{raw}': {err}"))
}
