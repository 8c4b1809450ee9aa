//! Shared helpers for in-memory integration tests.

use std::sync::Arc;

use conductor::config::ConductorConfig;
use conductor::context::InMemoryContext;
use conductor::registry::domain::{
    AgentHealth, AgentId, AgentState, AgentType, RegistrationRequest,
};
use mockable::Clock;

pub use crate::test_helpers::ManualClock;

/// Context type used by the integration tests.
pub type TestContext = InMemoryContext<ManualClock>;

/// Starts an in-memory context with the background reaper disabled.
pub async fn start_context(clock: &Arc<ManualClock>) -> TestContext {
    let mut config = ConductorConfig::default();
    config.registry.reaper_enabled = false;
    TestContext::in_memory(config, Arc::clone(clock))
        .await
        .expect("in-memory context should start")
}

/// Registers an idle agent and pushes a healthy snapshot with `score`.
pub async fn register_agent(
    context: &TestContext,
    clock: &ManualClock,
    id: &str,
    agent_type: AgentType,
    capabilities: &[&str],
    score: f64,
) -> AgentId {
    let agent_id = context
        .registry()
        .register(
            RegistrationRequest::new(id, agent_type, id)
                .with_capabilities(capabilities.iter().copied())
                .with_initial_state(AgentState::Idle),
        )
        .await
        .expect("registration should succeed")
        .agent_id;
    context
        .registry()
        .update_health(
            &agent_id,
            AgentHealth::new(agent_id.clone(), AgentState::Idle, clock.utc()).with_health(true, score),
        )
        .await
        .expect("health update should succeed");
    agent_id
}
