//! Tests for discovery service orchestration.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::{DiscoveryConfig, RegistryConfig};
use crate::discovery::{
    domain::{LoadBalancingStrategy, TaskRequest, TaskType},
    services::{DiscoveryError, DiscoveryService},
};
use crate::registry::{
    adapters::memory::InMemoryKeyValueStore,
    domain::{
        AgentHealth, AgentId, AgentState, AgentStats, AgentType, Capability, ComplexityRange,
        RegistrationRequest,
    },
    ports::KeyValueStore,
    services::{AgentRegistryService, RegistryError},
};
use crate::telemetry::Outcome;
use crate::test_support::ManualClock;
use mockable::Clock;
use rstest::{fixture, rstest};

type TestStore = InMemoryKeyValueStore<ManualClock>;
type TestRegistry = AgentRegistryService<TestStore, ManualClock>;
type TestDiscovery = DiscoveryService<TestStore, ManualClock>;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<TestStore>,
    registry: Arc<TestRegistry>,
    discovery: TestDiscovery,
}

#[fixture]
fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(InMemoryKeyValueStore::with_clock(Arc::clone(&clock)));
    let registry = Arc::new(AgentRegistryService::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        RegistryConfig::default(),
    ));
    let discovery = DiscoveryService::new(
        Arc::clone(&registry),
        Arc::clone(&clock),
        DiscoveryConfig::default(),
    );
    Harness {
        clock,
        store,
        registry,
        discovery,
    }
}

/// Shape of an agent seeded into the registry.
struct Seed<'a> {
    id: &'a str,
    agent_type: AgentType,
    capabilities: &'a [&'a str],
    tags: &'a [&'a str],
    state: AgentState,
    healthy: bool,
    score: f64,
}

impl<'a> Seed<'a> {
    const fn backend(id: &'a str) -> Self {
        Self {
            id,
            agent_type: AgentType::Backend,
            capabilities: &["code_generation"],
            tags: &[],
            state: AgentState::Idle,
            healthy: true,
            score: 1.0,
        }
    }

    const fn scored(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    const fn in_state(mut self, state: AgentState, healthy: bool) -> Self {
        self.state = state;
        self.healthy = healthy;
        self
    }

    const fn tagged(mut self, tags: &'a [&'a str]) -> Self {
        self.tags = tags;
        self
    }

    const fn typed(mut self, agent_type: AgentType, capabilities: &'a [&'a str]) -> Self {
        self.agent_type = agent_type;
        self.capabilities = capabilities;
        self
    }
}

impl Harness {
    async fn seed(&self, seed: Seed<'_>) -> AgentId {
        let agent_id = self
            .registry
            .register(
                RegistrationRequest::new(seed.id, seed.agent_type, "Seeded Agent")
                    .with_capabilities(seed.capabilities.iter().copied())
                    .with_tags(seed.tags.iter().copied())
                    .with_initial_state(seed.state),
            )
            .await
            .expect("registration should succeed")
            .agent_id;
        self.registry
            .update_health(
                &agent_id,
                AgentHealth::new(agent_id.clone(), seed.state, self.clock.utc())
                    .with_health(seed.healthy, seed.score),
            )
            .await
            .expect("health update should succeed");
        agent_id
    }

    async fn set_load(&self, agent_id: &AgentId, cpu: f64, memory: f64, response: f64) {
        let health = self
            .registry
            .get_health(agent_id)
            .await
            .expect("lookup should succeed")
            .expect("health should exist");
        self.registry
            .update_health(agent_id, health.with_load(cpu, memory, response))
            .await
            .expect("health update should succeed");
    }
}

fn code_generation(complexity: u8) -> TaskRequest {
    TaskRequest::new(TaskType::CodeGeneration, complexity).expect("complexity should be valid")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn healthier_agent_wins_between_equal_peers(harness: Harness) {
    let strong = harness.seed(Seed::backend("agent-a").scored(0.9)).await;
    harness.seed(Seed::backend("agent-b").scored(0.4)).await;

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, Some(strong));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn busy_unhealthy_agent_is_never_selected(harness: Harness) {
    harness
        .seed(Seed::backend("agent-c").in_state(AgentState::Busy, false))
        .await;

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, None);
}

#[rstest]
#[case(AgentState::Initializing)]
#[case(AgentState::Stopping)]
#[case(AgentState::Stopped)]
#[case(AgentState::Error)]
#[case(AgentState::Unhealthy)]
#[tokio::test(flavor = "multi_thread")]
async fn non_accepting_states_are_filtered_regardless_of_score(
    harness: Harness,
    #[case] state: AgentState,
) {
    harness
        .seed(Seed::backend("perfect").in_state(state, true))
        .await;
    let fallback = harness.seed(Seed::backend("modest").scored(0.1)).await;

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, Some(fallback));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_registry_yields_none(harness: Harness) {
    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fully_excluded_candidates_yield_none(harness: Harness) {
    let only = harness.seed(Seed::backend("agent-a")).await;

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5).excluding([only]))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn agents_without_live_health_are_skipped(harness: Harness) {
    harness.seed(Seed::backend("agent-a")).await;
    harness.clock.advance(std::time::Duration::from_secs(301));

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn equal_scores_resolve_to_lowest_id(harness: Harness) {
    harness.seed(Seed::backend("agent-z")).await;
    let lowest = harness.seed(Seed::backend("agent-m")).await;
    harness.seed(Seed::backend("agent-x")).await;

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, Some(lowest));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn preferred_type_widens_candidates_beyond_capabilities(harness: Harness) {
    let writer = harness
        .seed(Seed::backend("doc-writer").typed(AgentType::Documentation, &["technical_writing"]))
        .await;

    let without_preference = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");
    let with_preference = harness
        .discovery
        .find_agent_for_task(&code_generation(5).with_preferred_type(AgentType::Documentation))
        .await
        .expect("discovery should succeed");

    assert_eq!(without_preference, None);
    assert_eq!(with_preference, Some(writer));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn privacy_required_limits_candidates_to_private_agents(harness: Harness) {
    harness.seed(Seed::backend("cloud-agent")).await;
    let local = harness
        .seed(Seed::backend("local-agent").scored(0.5).tagged(&["local"]))
        .await;

    let open = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");
    let private = harness
        .discovery
        .find_agent_for_task(&code_generation(5).with_privacy_required())
        .await
        .expect("discovery should succeed");

    assert_eq!(open, Some(AgentId::new("cloud-agent").expect("valid id")));
    assert_eq!(private, Some(local));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn track_record_breaks_otherwise_equal_candidates(harness: Harness) {
    let shaky = harness.seed(Seed::backend("agent-a")).await;
    let reliable = harness.seed(Seed::backend("agent-b")).await;
    let mut record = AgentStats::new(shaky.clone());
    record.tasks_completed = 1;
    record.tasks_failed = 3;
    record.success_rate = 0.25;
    harness
        .registry
        .update_stats(&shaky, record)
        .await
        .expect("stats update should succeed");

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, Some(reliable));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn complexity_outside_declared_range_is_penalised(harness: Harness) {
    let junior = harness.seed(Seed::backend("agent-a")).await;
    let senior = harness.seed(Seed::backend("agent-b")).await;
    for (agent_id, min, max) in [(&junior, 1, 3), (&senior, 5, 10)] {
        harness
            .registry
            .deregister(agent_id)
            .await
            .expect("deregistration should succeed");
        harness
            .registry
            .register(
                RegistrationRequest::new(agent_id.as_str(), AgentType::Backend, "Ranged")
                    .with_capabilities(["code_generation"])
                    .with_initial_state(AgentState::Idle)
                    .with_complexity_range(
                        ComplexityRange::new(min, max).expect("valid complexity range"),
                    ),
            )
            .await
            .expect("registration should succeed");
    }

    let selected = harness
        .discovery
        .find_agent_for_task(&code_generation(8))
        .await
        .expect("discovery should succeed");

    assert_eq!(selected, Some(senior));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_agents_by_type_applies_health_and_availability(harness: Harness) {
    let idle = harness.seed(Seed::backend("idle")).await;
    let sick = harness
        .seed(Seed::backend("sick").in_state(AgentState::Idle, false))
        .await;
    let stopping = harness
        .seed(Seed::backend("stopping").in_state(AgentState::Stopping, true))
        .await;

    let everyone = harness
        .discovery
        .find_agents_by_type(AgentType::Backend, false, false)
        .await
        .expect("lookup should succeed");
    let healthy = harness
        .discovery
        .find_agents_by_type(AgentType::Backend, true, false)
        .await
        .expect("lookup should succeed");
    let available = harness
        .discovery
        .find_agents_by_type(AgentType::Backend, false, true)
        .await
        .expect("lookup should succeed");

    assert_eq!(everyone, vec![idle.clone(), sick, stopping.clone()]);
    assert_eq!(healthy, vec![idle.clone(), stopping]);
    assert_eq!(available, vec![idle]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_agents_by_capability_skips_orphaned_index_members(harness: Harness) {
    let live = harness.seed(Seed::backend("live")).await;
    harness
        .store
        .add_to_set("index:capability:code_generation", "ghost")
        .await
        .expect("seeding the index should succeed");

    let found = harness
        .discovery
        .find_agents_by_capability(
            &Capability::new("code_generation").expect("valid capability"),
            false,
            false,
        )
        .await
        .expect("lookup should succeed");

    assert_eq!(found, vec![live]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn load_aware_strategies_pick_by_health_data(harness: Harness) {
    let heavy = harness.seed(Seed::backend("heavy").scored(0.95)).await;
    let light = harness.seed(Seed::backend("light").scored(0.6)).await;
    harness.set_load(&heavy, 90.0, 800.0, 50.0).await;
    harness.set_load(&light, 10.0, 100.0, 900.0).await;
    let agents = [heavy.clone(), light.clone()];

    let least_loaded = harness
        .discovery
        .select_agent_with_load_balancing(&agents, LoadBalancingStrategy::LeastLoaded)
        .await
        .expect("selection should succeed");
    let fastest = harness
        .discovery
        .select_agent_with_load_balancing(&agents, LoadBalancingStrategy::Fastest)
        .await
        .expect("selection should succeed");
    let best_health = harness
        .discovery
        .select_agent_with_load_balancing(&agents, LoadBalancingStrategy::BestHealth)
        .await
        .expect("selection should succeed");

    assert_eq!(least_loaded, Some(light));
    assert_eq!(fastest, Some(heavy.clone()));
    assert_eq!(best_health, Some(heavy));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn round_robin_cycles_through_agents(harness: Harness) {
    let agents: Vec<AgentId> = ["a", "b", "c"]
        .into_iter()
        .map(|raw| AgentId::new(raw).expect("valid id"))
        .collect();

    let mut picks = Vec::new();
    for _ in 0..6 {
        picks.push(
            harness
                .discovery
                .select_agent_with_load_balancing(&agents, LoadBalancingStrategy::RoundRobin)
                .await
                .expect("selection should succeed")
                .expect("an agent should be picked"),
        );
    }

    let expected: Vec<AgentId> = agents.iter().chain(agents.iter()).cloned().collect();
    assert_eq!(picks, expected);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn random_strategy_picks_a_listed_agent(harness: Harness) {
    let agents: BTreeSet<AgentId> = ["a", "b", "c"]
        .into_iter()
        .map(|raw| AgentId::new(raw).expect("valid id"))
        .collect();
    let listed: Vec<AgentId> = agents.iter().cloned().collect();

    let pick = harness
        .discovery
        .select_agent_with_load_balancing(&listed, LoadBalancingStrategy::Random)
        .await
        .expect("selection should succeed")
        .expect("an agent should be picked");

    assert!(agents.contains(&pick));
}

#[rstest]
#[case(LoadBalancingStrategy::LeastLoaded)]
#[case(LoadBalancingStrategy::RoundRobin)]
#[case(LoadBalancingStrategy::Random)]
#[tokio::test(flavor = "multi_thread")]
async fn empty_agent_list_selects_nothing(
    harness: Harness,
    #[case] strategy: LoadBalancingStrategy,
) {
    let pick = harness
        .discovery
        .select_agent_with_load_balancing(&[], strategy)
        .await
        .expect("selection should succeed");

    assert_eq!(pick, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn discovery_stats_carry_registry_counts_and_timestamp(harness: Harness) {
    harness.seed(Seed::backend("agent-a")).await;

    let stats = harness
        .discovery
        .get_discovery_stats()
        .await
        .expect("stats should succeed");

    assert_eq!(stats.registry.total_agents, 1);
    assert_eq!(stats.generated_at, harness.clock.utc());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_outage_surfaces_as_registry_error(harness: Harness) {
    harness.seed(Seed::backend("agent-a")).await;
    harness.store.set_available(false);

    let result = harness
        .discovery
        .find_agent_for_task(&code_generation(5))
        .await;

    assert!(matches!(
        result,
        Err(DiscoveryError::Registry(RegistryError::StoreUnavailable(_)))
    ));
    assert_eq!(
        harness
            .registry
            .metrics()
            .count("discovery.find_agent_for_task", Outcome::Error),
        1
    );
}
