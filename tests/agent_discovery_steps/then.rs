//! Then steps for agent discovery BDD scenarios.

use super::world::{DiscoveryWorld, agent_id, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::then;

#[then(r#"agent "{id}" is selected"#)]
fn agent_is_selected(world: &DiscoveryWorld, id: String) -> Result<(), eyre::Report> {
    let expected = agent_id(&id)?;
    match &world.last_selection {
        Some(Some(selected)) if *selected == expected => Ok(()),
        Some(Some(selected)) => Err(eyre::eyre!("expected '{id}', discovery chose '{selected}'")),
        Some(None) => Err(eyre::eyre!("expected '{id}', discovery found no agent")),
        None => Err(eyre::eyre!("discovery was never asked")),
    }
}

#[then("no agent is selected")]
fn no_agent_is_selected(world: &DiscoveryWorld) -> Result<(), eyre::Report> {
    match &world.last_selection {
        Some(None) => Ok(()),
        Some(Some(selected)) => Err(eyre::eyre!("expected no agent, discovery chose '{selected}'")),
        None => Err(eyre::eyre!("discovery was never asked")),
    }
}

#[then(r#"agent "{id}" is no longer registered"#)]
fn agent_is_gone(world: &DiscoveryWorld, id: String) -> Result<(), eyre::Report> {
    let target = agent_id(&id)?;
    if !world.last_reaped.contains(&target) {
        return Err(eyre::eyre!("agent '{id}' was not reaped"));
    }
    let metadata = run_async(world.registry.get_metadata(&target)).wrap_err("read metadata")?;
    if metadata.is_some() {
        return Err(eyre::eyre!("agent '{id}' still has metadata"));
    }
    Ok(())
}
