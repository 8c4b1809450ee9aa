//! Agent execution statistics.

use super::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of one task execution, reported by the caller that ran it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    /// Whether the task succeeded.
    pub success: bool,
    /// Wall-clock execution time.
    pub execution_time: Duration,
    /// Monetary cost attributed to the task.
    pub cost: f64,
    /// Model used to execute the task, if any.
    pub model: Option<String>,
}

impl TaskOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub const fn succeeded(execution_time: Duration) -> Self {
        Self {
            success: true,
            execution_time,
            cost: 0.0,
            model: None,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub const fn failed(execution_time: Duration) -> Self {
        Self {
            success: false,
            execution_time,
            cost: 0.0,
            model: None,
        }
    }

    /// Attributes a cost to the outcome.
    #[must_use]
    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Records the model used.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Cumulative execution statistics for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStats {
    /// Agent these statistics describe.
    pub agent_id: AgentId,
    /// Tasks finished successfully.
    pub tasks_completed: u64,
    /// Tasks that failed.
    pub tasks_failed: u64,
    /// Mean execution time across all tasks, in seconds.
    pub average_execution_time: f64,
    /// Accumulated cost across all tasks.
    pub total_cost: f64,
    /// Task counts per model name.
    pub model_usage: BTreeMap<String, u64>,
    /// Completed share of all finished tasks, in `[0, 1]`.
    pub success_rate: f64,
    /// When the agent last finished any task.
    pub last_active: Option<DateTime<Utc>>,
}

impl AgentStats {
    /// Creates empty statistics. A fresh agent has a perfect success rate.
    #[must_use]
    pub const fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            tasks_completed: 0,
            tasks_failed: 0,
            average_execution_time: 0.0,
            total_cost: 0.0,
            model_usage: BTreeMap::new(),
            success_rate: 1.0,
            last_active: None,
        }
    }

    /// Returns the number of finished tasks.
    #[must_use]
    pub const fn total_tasks(&self) -> u64 {
        self.tasks_completed.saturating_add(self.tasks_failed)
    }

    /// Folds a task outcome into the running statistics.
    pub fn record(&mut self, outcome: &TaskOutcome, now: DateTime<Utc>) {
        if outcome.success {
            self.tasks_completed = self.tasks_completed.saturating_add(1);
        } else {
            self.tasks_failed = self.tasks_failed.saturating_add(1);
        }

        let total = self.total_tasks() as f64;
        let elapsed = outcome.execution_time.as_secs_f64();
        self.average_execution_time += (elapsed - self.average_execution_time) / total;
        self.total_cost += outcome.cost;
        self.success_rate = (self.tasks_completed as f64 / total).clamp(0.0, 1.0);
        self.last_active = Some(now);

        if let Some(model) = &outcome.model {
            let uses = self.model_usage.entry(model.clone()).or_insert(0);
            *uses = uses.saturating_add(1);
        }
    }
}
