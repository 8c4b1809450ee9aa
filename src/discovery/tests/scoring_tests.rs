//! Tests for candidate scoring arithmetic.

use crate::discovery::domain::{
    ScoreInputs, TaskType, complexity_fit, normalised_response_time, resource_penalty,
    score_candidate,
};
use crate::registry::domain::{AgentType, ComplexityRange};
use rstest::{fixture, rstest};

const TOLERANCE: f64 = 1e-9;

fn range(min: u8, max: u8) -> ComplexityRange {
    ComplexityRange::new(min, max).expect("test range should be valid")
}

#[fixture]
fn idle_backend() -> ScoreInputs {
    ScoreInputs {
        agent_type: AgentType::Backend,
        complexity_range: ComplexityRange::default(),
        health_score: 1.0,
        success_rate: 1.0,
        response_time_ms: 0.0,
        cpu_percent: 0.0,
        memory_mb: 0.0,
    }
}

#[rstest]
fn unloaded_candidate_scores_the_weighted_sum(idle_backend: ScoreInputs) {
    let score = score_candidate(&idle_backend, TaskType::CodeGeneration, 5);

    let expected_fit = 1.0 - 2.3 / 9.0;
    assert!((score.health - 40.0).abs() < TOLERANCE);
    assert!((score.success - 20.0).abs() < TOLERANCE);
    assert!((score.responsiveness - 15.0).abs() < TOLERANCE);
    assert!((score.type_compatibility - 13.5).abs() < TOLERANCE);
    assert!((score.complexity_fit - expected_fit * 10.0).abs() < TOLERANCE);
    assert!(score.resource_penalty.abs() < TOLERANCE);
    assert!((score.total - (88.5 + expected_fit * 10.0)).abs() < TOLERANCE);
}

#[rstest]
fn resource_pressure_discounts_up_to_twenty_percent(idle_backend: ScoreInputs) {
    let relaxed = score_candidate(&idle_backend, TaskType::CodeGeneration, 5);
    let saturated = score_candidate(
        &ScoreInputs {
            cpu_percent: 250.0,
            memory_mb: 4096.0,
            ..idle_backend
        },
        TaskType::CodeGeneration,
        5,
    );

    assert!((saturated.resource_penalty - 1.0).abs() < TOLERANCE);
    assert!((saturated.total - relaxed.total * 0.8).abs() < TOLERANCE);
}

#[rstest]
fn score_rises_strictly_with_health(idle_backend: ScoreInputs) {
    let scores: Vec<f64> = [0.0, 0.25, 0.5, 0.75, 1.0]
        .into_iter()
        .map(|health_score| {
            score_candidate(
                &ScoreInputs {
                    health_score,
                    cpu_percent: 40.0,
                    memory_mb: 300.0,
                    ..idle_backend
                },
                TaskType::CodeGeneration,
                5,
            )
            .total
        })
        .collect();

    assert!(scores.windows(2).all(|pair| pair.first() < pair.last()));
}

#[rstest]
fn score_falls_strictly_with_cpu_and_memory(idle_backend: ScoreInputs) {
    let by_cpu: Vec<f64> = [0.0, 20.0, 60.0, 100.0]
        .into_iter()
        .map(|cpu_percent| {
            score_candidate(
                &ScoreInputs {
                    cpu_percent,
                    ..idle_backend
                },
                TaskType::CodeGeneration,
                5,
            )
            .total
        })
        .collect();
    let by_memory: Vec<f64> = [0.0, 128.0, 512.0, 1000.0]
        .into_iter()
        .map(|memory_mb| {
            score_candidate(
                &ScoreInputs {
                    memory_mb,
                    ..idle_backend
                },
                TaskType::CodeGeneration,
                5,
            )
            .total
        })
        .collect();

    assert!(by_cpu.windows(2).all(|pair| pair.first() > pair.last()));
    assert!(by_memory.windows(2).all(|pair| pair.first() > pair.last()));
}

#[rstest]
#[case(range(1, 10), 5, 1.0 - 2.3 / 9.0)]
#[case(range(1, 10), 1, 1.0 - 6.3 / 9.0)]
#[case(range(2, 3), 3, 0.7)]
#[case(range(4, 4), 4, 1.0)]
#[case(range(1, 5), 8, 0.2)]
#[case(range(5, 10), 2, 0.7)]
fn complexity_fit_peaks_inside_the_range(
    #[case] declared: ComplexityRange,
    #[case] complexity: u8,
    #[case] expected: f64,
) {
    assert!((complexity_fit(declared, complexity) - expected).abs() < TOLERANCE);
}

#[rstest]
#[case(0.0, 1.0)]
#[case(2500.0, 0.5)]
#[case(5000.0, 0.0)]
#[case(60_000.0, 0.0)]
#[case(-10.0, 1.0)]
#[case(f64::NAN, 1.0)]
fn response_time_is_normalised_against_five_seconds(#[case] millis: f64, #[case] expected: f64) {
    assert!((normalised_response_time(millis) - expected).abs() < TOLERANCE);
}

#[rstest]
fn resource_penalty_averages_capped_cpu_and_memory() {
    assert!((resource_penalty(50.0, 500.0) - 0.5).abs() < TOLERANCE);
    assert!((resource_penalty(100.0, 0.0) - 0.5).abs() < TOLERANCE);
    assert!((resource_penalty(400.0, 9000.0) - 1.0).abs() < TOLERANCE);
}
