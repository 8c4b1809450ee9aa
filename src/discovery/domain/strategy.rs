//! Load-balancing strategies for picking among known candidates.

use super::ParseStrategyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// How [`select_agent_with_load_balancing`] picks one agent from a list.
///
/// [`select_agent_with_load_balancing`]: crate::discovery::services::DiscoveryService::select_agent_with_load_balancing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancingStrategy {
    /// Lowest mean of normalised CPU and memory use.
    #[default]
    LeastLoaded,
    /// Lowest reported response time.
    Fastest,
    /// Highest health score.
    BestHealth,
    /// Rotates through the list on successive calls.
    RoundRobin,
    /// Uniformly random choice.
    Random,
}

impl LoadBalancingStrategy {
    /// Every strategy.
    pub const ALL: [Self; 5] = [
        Self::LeastLoaded,
        Self::Fastest,
        Self::BestHealth,
        Self::RoundRobin,
        Self::Random,
    ];

    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LeastLoaded => "least_loaded",
            Self::Fastest => "fastest",
            Self::BestHealth => "best_health",
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
        }
    }

    /// Resolves a strategy name, falling back to [`Self::Random`] with a
    /// warning when the name is unknown.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self::try_from(name).unwrap_or_else(|err| {
            warn!(strategy = name, error = %err, "falling back to random load balancing");
            Self::Random
        })
    }
}

impl fmt::Display for LoadBalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for LoadBalancingStrategy {
    type Error = ParseStrategyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == normalized)
            .ok_or_else(|| ParseStrategyError(value.to_owned()))
    }
}
