//! Given steps for agent discovery BDD scenarios.

use super::world::{DiscoveryWorld, agent_id, run_async};
use conductor::registry::domain::{AgentHealth, AgentState, AgentType, RegistrationRequest};
use eyre::WrapErr;
use mockable::Clock;
use rstest_bdd_macros::given;

#[given(r#"a registered "{kind}" agent "{id}" with health score {score:f64}"#)]
fn registered_agent(
    world: &mut DiscoveryWorld,
    kind: String,
    id: String,
    score: f64,
) -> Result<(), eyre::Report> {
    let agent_type = AgentType::try_from(kind.as_str())
        .map_err(|err| eyre::eyre!("unknown agent type: {err}"))?;
    let capabilities = match agent_type {
        AgentType::Database => vec!["database_design"],
        _ => vec!["code_generation"],
    };
    let request = RegistrationRequest::new(id, agent_type, "Scenario Agent")
        .with_capabilities(capabilities)
        .with_initial_state(AgentState::Idle);
    let registered = run_async(world.registry.register(request))
        .wrap_err("register agent for scenario")?
        .agent_id;
    let health = AgentHealth::new(registered.clone(), AgentState::Idle, world.clock.utc())
        .with_health(true, score);
    run_async(world.registry.update_health(&registered, health))
        .wrap_err("push initial health for scenario")?;
    Ok(())
}

#[given(r#"agent "{id}" reports state "{state}""#)]
fn agent_reports_state(
    world: &mut DiscoveryWorld,
    id: String,
    state: String,
) -> Result<(), eyre::Report> {
    let target = agent_id(&id)?;
    let reported = AgentState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("unknown agent state: {err}"))?;
    let current = run_async(world.registry.get_health(&target))
        .wrap_err("read health for scenario")?
        .ok_or_else(|| eyre::eyre!("agent '{id}' has no health record"))?;
    let updated = run_async(world.registry.update_health(&target, current.with_state(reported)))
        .wrap_err("update health for scenario")?;
    if !updated {
        return Err(eyre::eyre!("agent '{id}' is not registered"));
    }
    Ok(())
}
