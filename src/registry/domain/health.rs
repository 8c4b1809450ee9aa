//! Agent health snapshots.

use super::{AgentId, AgentState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health fitness in `[0, 1]`.
///
/// Out-of-range and non-finite inputs are clamped, so a stored score can
/// never escape the unit interval.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct HealthScore(f64);

impl HealthScore {
    /// A perfectly healthy score.
    pub const PERFECT: Self = Self(1.0);

    /// Creates a score, clamping into `[0, 1]`. `NaN` maps to zero.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Returns the score value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for HealthScore {
    fn default() -> Self {
        Self::PERFECT
    }
}

impl From<f64> for HealthScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<HealthScore> for f64 {
    fn from(score: HealthScore) -> Self {
        score.0
    }
}

/// Point-in-time health and load report pushed by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentHealth {
    /// Agent this snapshot describes.
    pub agent_id: AgentId,
    /// Reported lifecycle state.
    pub state: AgentState,
    /// When the agent last proved liveness.
    pub last_heartbeat: DateTime<Utc>,
    /// When the agent last finished a task successfully.
    pub last_task_completed: Option<DateTime<Utc>>,
    /// Errors observed since start-up.
    pub error_count: u64,
    /// Most recent error message.
    pub last_error: Option<String>,
    /// CPU utilisation in percent.
    pub cpu_percent: f64,
    /// Resident memory in megabytes.
    pub memory_mb: f64,
    /// Recent mean response time in milliseconds.
    pub response_time_ms: f64,
    /// Seconds since the agent started.
    pub uptime_secs: u64,
    /// Agent self-assessment; discovery never routes to unhealthy agents.
    pub is_healthy: bool,
    /// Derived fitness score.
    pub health_score: HealthScore,
}

impl AgentHealth {
    /// Creates a healthy, unloaded snapshot for a freshly started agent.
    #[must_use]
    pub const fn new(agent_id: AgentId, state: AgentState, now: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            state,
            last_heartbeat: now,
            last_task_completed: None,
            error_count: 0,
            last_error: None,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            response_time_ms: 0.0,
            uptime_secs: 0,
            is_healthy: true,
            health_score: HealthScore::PERFECT,
        }
    }

    /// Sets the lifecycle state.
    #[must_use]
    pub const fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    /// Sets the health flag and score.
    #[must_use]
    pub fn with_health(mut self, is_healthy: bool, score: impl Into<HealthScore>) -> Self {
        self.is_healthy = is_healthy;
        self.health_score = score.into();
        self
    }

    /// Sets resource usage and latency figures.
    #[must_use]
    pub const fn with_load(mut self, cpu_percent: f64, memory_mb: f64, response_time_ms: f64) -> Self {
        self.cpu_percent = cpu_percent;
        self.memory_mb = memory_mb;
        self.response_time_ms = response_time_ms;
        self
    }

    /// Returns whether discovery may route new work to this agent.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_healthy && self.state.accepts_work()
    }

    /// Returns whether the last heartbeat is older than `stale_after`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) > stale_after
    }
}
