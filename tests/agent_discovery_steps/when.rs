//! When steps for agent discovery BDD scenarios.

use std::time::Duration;

use super::world::{DiscoveryWorld, agent_id, run_async};
use conductor::discovery::domain::{TaskRequest, TaskType};
use eyre::WrapErr;
use rstest_bdd_macros::when;

fn task_request(task: &str, complexity: u8) -> Result<TaskRequest, eyre::Report> {
    let task_type =
        TaskType::try_from(task).map_err(|err| eyre::eyre!("unknown task type: {err}"))?;
    TaskRequest::new(task_type, complexity).map_err(|err| eyre::eyre!("invalid task: {err}"))
}

#[when(r#"discovery is asked for a "{task}" task of complexity {complexity:u8}"#)]
fn discover(world: &mut DiscoveryWorld, task: String, complexity: u8) -> Result<(), eyre::Report> {
    let request = task_request(&task, complexity)?;
    let selection = run_async(world.discovery.find_agent_for_task(&request))
        .wrap_err("find agent for task")?;
    world.last_selection = Some(selection);
    Ok(())
}

#[when(r#"discovery is asked for a "{task}" task of complexity {complexity:u8} excluding "{id}""#)]
fn discover_excluding(
    world: &mut DiscoveryWorld,
    task: String,
    complexity: u8,
    id: String,
) -> Result<(), eyre::Report> {
    let request = task_request(&task, complexity)?.excluding([agent_id(&id)?]);
    let selection = run_async(world.discovery.find_agent_for_task(&request))
        .wrap_err("find agent for task")?;
    world.last_selection = Some(selection);
    Ok(())
}

#[when(r#"{seconds:u64} seconds pass with heartbeats only from "{id}""#)]
fn time_passes_with_heartbeats(
    world: &mut DiscoveryWorld,
    seconds: u64,
    id: String,
) -> Result<(), eyre::Report> {
    let chatty = agent_id(&id)?;
    let mut remaining = seconds;
    while remaining > 0 {
        let step = remaining.min(60);
        world.clock.advance(Duration::from_secs(step));
        remaining -= step;
        let alive = run_async(world.registry.heartbeat(&chatty)).wrap_err("send heartbeat")?;
        if !alive {
            return Err(eyre::eyre!("agent '{id}' is not registered"));
        }
    }
    Ok(())
}

#[when("stale agents are reaped")]
fn reap(world: &mut DiscoveryWorld) -> Result<(), eyre::Report> {
    world.last_reaped =
        run_async(world.registry.reap_stale_agents()).wrap_err("reap stale agents")?;
    Ok(())
}
