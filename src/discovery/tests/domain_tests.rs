//! Tests for task types, requests, and strategy parsing.

use crate::discovery::domain::{
    DEFAULT_TYPE_COMPATIBILITY, DiscoveryDomainError, LoadBalancingStrategy, ParseTaskTypeError,
    TaskCategory, TaskRequest, TaskType, type_compatibility,
};
use crate::registry::domain::{AgentId, AgentType};
use rstest::rstest;

#[rstest]
#[case(TaskType::CodeGeneration, TaskCategory::Development)]
#[case(TaskType::Testing, TaskCategory::Quality)]
#[case(TaskType::Architecture, TaskCategory::Design)]
#[case(TaskType::DatabaseDesign, TaskCategory::Data)]
#[case(TaskType::Deployment, TaskCategory::Operations)]
#[case(TaskType::SecurityAudit, TaskCategory::Security)]
#[case(TaskType::Documentation, TaskCategory::Knowledge)]
fn task_types_map_to_categories(#[case] task_type: TaskType, #[case] category: TaskCategory) {
    assert_eq!(task_type.category(), category);
}

#[rstest]
fn every_category_lists_qualifying_capabilities() {
    for task_type in TaskType::ALL {
        assert!(
            !task_type.category().capabilities().is_empty(),
            "{task_type} has no qualifying capabilities"
        );
    }
    assert!(
        TaskType::CodeGeneration
            .category()
            .capabilities()
            .contains(&"code_generation")
    );
}

#[rstest]
fn task_type_round_trips_through_its_name() {
    for task_type in TaskType::ALL {
        assert_eq!(TaskType::try_from(task_type.as_str()), Ok(task_type));
    }
    assert_eq!(
        TaskType::try_from("  Code_Generation "),
        Ok(TaskType::CodeGeneration)
    );
    assert_eq!(
        TaskType::try_from("juggling"),
        Err(ParseTaskTypeError("juggling".to_owned()))
    );
}

#[rstest]
#[case(AgentType::Backend, TaskType::ApiDesign, 1.0)]
#[case(AgentType::Backend, TaskType::CodeGeneration, 0.9)]
#[case(AgentType::Documentation, TaskType::Documentation, 1.0)]
#[case(AgentType::Documentation, TaskType::Deployment, DEFAULT_TYPE_COMPATIBILITY)]
fn type_compatibility_uses_table_with_default(
    #[case] agent_type: AgentType,
    #[case] task_type: TaskType,
    #[case] expected: f64,
) {
    assert!((type_compatibility(agent_type, task_type) - expected).abs() < f64::EPSILON);
}

#[rstest]
#[case(0)]
#[case(11)]
fn task_request_rejects_out_of_range_complexity(#[case] complexity: u8) {
    assert_eq!(
        TaskRequest::new(TaskType::Testing, complexity),
        Err(DiscoveryDomainError::InvalidComplexity(complexity))
    );
}

#[rstest]
fn task_request_builders_set_fields() {
    let excluded = AgentId::new("skip-me").expect("valid agent id");
    let request = TaskRequest::new(TaskType::Debugging, 7)
        .expect("complexity should be valid")
        .with_privacy_required()
        .with_preferred_type(AgentType::Backend)
        .excluding([excluded.clone()]);

    assert_eq!(request.task_type(), TaskType::Debugging);
    assert_eq!(request.complexity(), 7);
    assert!(request.privacy_required());
    assert_eq!(request.preferred_type(), Some(AgentType::Backend));
    assert!(request.exclude().contains(&excluded));
}

#[rstest]
#[case("least_loaded", LoadBalancingStrategy::LeastLoaded)]
#[case("FASTEST", LoadBalancingStrategy::Fastest)]
#[case("best_health", LoadBalancingStrategy::BestHealth)]
#[case("round_robin", LoadBalancingStrategy::RoundRobin)]
#[case("random", LoadBalancingStrategy::Random)]
#[case("weighted_lottery", LoadBalancingStrategy::Random)]
fn strategy_names_resolve_with_random_fallback(
    #[case] name: &str,
    #[case] expected: LoadBalancingStrategy,
) {
    assert_eq!(LoadBalancingStrategy::from_name(name), expected);
}
