//! Liveness and reaping across the registry and discovery.

use std::sync::Arc;
use std::time::Duration;

use conductor::discovery::domain::{TaskRequest, TaskType};
use conductor::registry::domain::AgentType;
use rstest::rstest;

use super::helpers::{ManualClock, register_agent, start_context};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn silent_agents_drop_out_of_discovery_and_get_reaped() {
    let clock = Arc::new(ManualClock::new());
    let context = start_context(&clock).await;
    let quiet = register_agent(
        &context,
        &clock,
        "db-quiet",
        AgentType::Database,
        &["database_design"],
        0.9,
    )
    .await;
    let chatty = register_agent(
        &context,
        &clock,
        "db-chatty",
        AgentType::Database,
        &["database_design"],
        0.5,
    )
    .await;
    let request = TaskRequest::new(TaskType::DatabaseDesign, 4).expect("complexity is valid");

    for _ in 0..4 {
        clock.advance(Duration::from_secs(60));
        context
            .registry()
            .heartbeat(&chatty)
            .await
            .expect("heartbeat should succeed");
    }

    let reaped = context
        .registry()
        .reap_stale_agents()
        .await
        .expect("reaping should succeed");
    assert_eq!(reaped, vec![quiet.clone()]);
    assert!(
        context
            .registry()
            .get_metadata(&quiet)
            .await
            .expect("lookup should succeed")
            .is_none()
    );
    assert_eq!(
        context
            .discovery()
            .find_agent_for_task(&request)
            .await
            .expect("discovery should succeed"),
        Some(chatty)
    );
    context.shutdown().await.expect("shutdown should succeed");
}
