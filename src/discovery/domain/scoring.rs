//! Multi-factor candidate scoring.
//!
//! A candidate's score is a weighted sum of health, track record,
//! responsiveness, type affinity, and complexity fit, discounted by up to
//! 20% for resource pressure:
//!
//! ```text
//! base    = health*40 + success_rate*20 + responsiveness*15
//!         + type_compat*15 + complexity_fit*10
//! total   = base * (1 - resource_penalty*0.2)
//! ```
//!
//! Every normalised input is capped, so no term divides by zero.

use super::{TaskType, type_compatibility};
use crate::registry::domain::{AgentHealth, AgentMetadata, AgentStats, AgentType, ComplexityRange};

const HEALTH_WEIGHT: f64 = 40.0;
const SUCCESS_WEIGHT: f64 = 20.0;
const RESPONSE_WEIGHT: f64 = 15.0;
const TYPE_WEIGHT: f64 = 15.0;
const COMPLEXITY_WEIGHT: f64 = 10.0;
const RESOURCE_DISCOUNT: f64 = 0.2;

const RESPONSE_TIME_CAP_MS: f64 = 5000.0;
const CPU_CAP_PERCENT: f64 = 100.0;
const MEMORY_CAP_MB: f64 = 1000.0;

const COMPLEXITY_PEAK: f64 = 0.7;
const UNDER_QUALIFIED_FIT: f64 = 0.2;
const OVER_QUALIFIED_FIT: f64 = 0.7;

/// Registry facts about one candidate that feed its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInputs {
    /// Declared agent type.
    pub agent_type: AgentType,
    /// Declared complexity range.
    pub complexity_range: ComplexityRange,
    /// Reported health score in `[0, 1]`.
    pub health_score: f64,
    /// Historical success rate in `[0, 1]`.
    pub success_rate: f64,
    /// Reported response time in milliseconds.
    pub response_time_ms: f64,
    /// Reported CPU use in percent.
    pub cpu_percent: f64,
    /// Reported memory use in megabytes.
    pub memory_mb: f64,
}

impl ScoreInputs {
    /// Gathers scoring inputs from registry records. Agents without
    /// statistics are treated as having a perfect record.
    #[must_use]
    pub fn from_records(
        metadata: &AgentMetadata,
        health: &AgentHealth,
        stats: Option<&AgentStats>,
    ) -> Self {
        Self {
            agent_type: metadata.agent_type(),
            complexity_range: metadata.config().complexity_range,
            health_score: health.health_score.value(),
            success_rate: stats.map_or(1.0, |record| record.success_rate),
            response_time_ms: health.response_time_ms,
            cpu_percent: health.cpu_percent,
            memory_mb: health.memory_mb,
        }
    }
}

/// Per-component breakdown of a candidate score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    /// Weighted health contribution.
    pub health: f64,
    /// Weighted success-rate contribution.
    pub success: f64,
    /// Weighted responsiveness contribution.
    pub responsiveness: f64,
    /// Weighted type-affinity contribution.
    pub type_compatibility: f64,
    /// Weighted complexity-fit contribution.
    pub complexity_fit: f64,
    /// Resource pressure in `[0, 1]`.
    pub resource_penalty: f64,
    /// Final score.
    pub total: f64,
}

/// Scores a candidate for a task of `task_type` at `complexity`.
#[must_use]
pub fn score_candidate(inputs: &ScoreInputs, task_type: TaskType, complexity: u8) -> CandidateScore {
    let health = unit(inputs.health_score) * HEALTH_WEIGHT;
    let success = unit(inputs.success_rate) * SUCCESS_WEIGHT;
    let responsiveness = normalised_response_time(inputs.response_time_ms) * RESPONSE_WEIGHT;
    let type_compatibility = type_compatibility(inputs.agent_type, task_type) * TYPE_WEIGHT;
    let complexity_fit = complexity_fit(inputs.complexity_range, complexity) * COMPLEXITY_WEIGHT;
    let resource_penalty = resource_penalty(inputs.cpu_percent, inputs.memory_mb);

    let base = health + success + responsiveness + type_compatibility + complexity_fit;
    CandidateScore {
        health,
        success,
        responsiveness,
        type_compatibility,
        complexity_fit,
        resource_penalty,
        total: base * (1.0 - resource_penalty * RESOURCE_DISCOUNT),
    }
}

/// Maps a response time onto `[0, 1]`, where instant is 1 and anything at
/// or beyond five seconds is 0.
#[must_use]
pub fn normalised_response_time(response_time_ms: f64) -> f64 {
    1.0 - capped(response_time_ms, RESPONSE_TIME_CAP_MS) / RESPONSE_TIME_CAP_MS
}

/// Returns the mean of normalised CPU and memory use, in `[0, 1]`.
#[must_use]
pub fn resource_penalty(cpu_percent: f64, memory_mb: f64) -> f64 {
    let cpu = capped(cpu_percent, CPU_CAP_PERCENT) / CPU_CAP_PERCENT;
    let memory = capped(memory_mb, MEMORY_CAP_MB) / MEMORY_CAP_MB;
    (cpu + memory) / 2.0
}

/// Rates how well `complexity` suits an agent's declared range.
///
/// Inside the range the fit peaks 70% of the way from `min` to `max` and
/// falls off linearly with distance from the peak. Tasks above the range
/// score 0.2 and tasks below it 0.7; neither excludes the agent.
#[must_use]
pub fn complexity_fit(range: ComplexityRange, complexity: u8) -> f64 {
    if complexity > range.max() {
        return UNDER_QUALIFIED_FIT;
    }
    if complexity < range.min() {
        return OVER_QUALIFIED_FIT;
    }
    if range.min() == range.max() {
        return 1.0;
    }
    let span = f64::from(range.max() - range.min());
    let peak = f64::from(range.min()) + span * COMPLEXITY_PEAK;
    (1.0 - (f64::from(complexity) - peak).abs() / span).max(0.0)
}

fn capped(value: f64, cap: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, cap)
}

fn unit(value: f64) -> f64 {
    capped(value, 1.0)
}
