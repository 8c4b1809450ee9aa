//! End-to-end flow: register, discover, dispatch, reply, and record.

use std::sync::Arc;
use std::time::Duration;

use conductor::bus::{
    domain::{Envelope, MessageType},
    services::{HandlerError, SendRequest, handler_fn},
};
use conductor::discovery::domain::{TaskRequest, TaskType};
use conductor::registry::domain::{AgentId, AgentType, TaskOutcome};
use conductor::telemetry::Outcome;
use rstest::{fixture, rstest};
use serde_json::json;

use super::helpers::{ManualClock, register_agent, start_context};

#[fixture]
fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn discovered_agent_answers_a_dispatched_task(clock: Arc<ManualClock>) {
    let context = start_context(&clock).await;
    let strong = register_agent(
        &context,
        &clock,
        "backend-a",
        AgentType::Backend,
        &["code_generation", "api_design"],
        0.95,
    )
    .await;
    register_agent(
        &context,
        &clock,
        "backend-b",
        AgentType::Backend,
        &["code_generation"],
        0.4,
    )
    .await;

    let request = TaskRequest::new(TaskType::CodeGeneration, 5).expect("complexity is valid");
    let chosen = context
        .discovery()
        .find_agent_for_task(&request)
        .await
        .expect("discovery should succeed")
        .expect("an agent should be available");
    assert_eq!(chosen, strong);

    let handler = handler_fn(|envelope: Envelope| async move {
        Ok::<_, HandlerError>(Some(json!({ "done": envelope.payload.get("task").cloned() })))
    });
    context
        .bus()
        .register_handler(&chosen, handler, &[], None)
        .await
        .expect("handler registration should succeed");

    let caller = AgentId::new("orchestrator").expect("valid id");
    let reply = context
        .bus()
        .send_to_agent(
            SendRequest::new(
                chosen.clone(),
                caller,
                MessageType::TaskRequest,
                json!({ "task": "scaffold service" }),
            )
            .awaiting_reply(Some(Duration::from_secs(2))),
        )
        .await
        .expect("send should succeed")
        .expect("the agent should reply");
    assert_eq!(reply.payload, json!({ "done": "scaffold service" }));

    context
        .registry()
        .record_task_outcome(&chosen, &TaskOutcome::succeeded(Duration::from_millis(1200)))
        .await
        .expect("outcome should be recorded");
    let stats = context
        .registry()
        .get_stats(&chosen)
        .await
        .expect("lookup should succeed")
        .expect("stats should exist");
    assert_eq!(stats.total_tasks(), 1);

    assert_eq!(
        context
            .metrics()
            .count("discovery.find_agent_for_task", Outcome::Success),
        1
    );
    assert_eq!(context.metrics().count("bus.handle", Outcome::Success), 1);
    context.shutdown().await.expect("shutdown should succeed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deregistered_agents_are_no_longer_discovered(clock: Arc<ManualClock>) {
    let context = start_context(&clock).await;
    let only = register_agent(
        &context,
        &clock,
        "docs-1",
        AgentType::Documentation,
        &["documentation"],
        0.9,
    )
    .await;
    let request = TaskRequest::new(TaskType::Documentation, 3).expect("complexity is valid");

    assert_eq!(
        context
            .discovery()
            .find_agent_for_task(&request)
            .await
            .expect("discovery should succeed"),
        Some(only.clone())
    );

    assert!(
        context
            .registry()
            .deregister(&only)
            .await
            .expect("deregistration should succeed")
    );

    assert_eq!(
        context
            .discovery()
            .find_agent_for_task(&request)
            .await
            .expect("discovery should succeed"),
        None
    );
    context.shutdown().await.expect("shutdown should succeed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_tasks_land_in_the_agent_dead_letter_queue(clock: Arc<ManualClock>) {
    let context = start_context(&clock).await;
    let worker = register_agent(
        &context,
        &clock,
        "flaky",
        AgentType::Testing,
        &["testing"],
        0.8,
    )
    .await;
    let dead_letter_queue = context
        .bus()
        .create_dead_letter_queue(&worker)
        .await
        .expect("dead-letter queue should be created");
    let handler = handler_fn(|_envelope: Envelope| async move {
        Err::<Option<serde_json::Value>, _>(HandlerError::new("test runner crashed"))
    });
    context
        .bus()
        .register_handler(&worker, handler, &[], None)
        .await
        .expect("handler registration should succeed");

    context
        .bus()
        .send_to_agent(SendRequest::new(
            worker.clone(),
            AgentId::new("orchestrator").expect("valid id"),
            MessageType::TaskRequest,
            json!({ "suite": "all" }),
        ))
        .await
        .expect("send should succeed");

    let mut landed = false;
    for _ in 0..200 {
        if context.broker().queue_depth(&dead_letter_queue) == Some(1) {
            landed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(landed, "dead letter never reached {dead_letter_queue}");
    context.shutdown().await.expect("shutdown should succeed");
}
