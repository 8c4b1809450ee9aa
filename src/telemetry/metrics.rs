//! In-process success/error counters keyed by operation name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Whether an operation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// The operation completed.
    Success,
    /// The operation failed.
    Error,
}

impl Outcome {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One counter row from [`OperationMetrics::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationCount {
    /// Operation name, e.g. `registry.register`.
    pub operation: String,
    /// Outcome being counted.
    pub outcome: Outcome,
    /// Number of recorded calls.
    pub count: u64,
}

/// Thread-safe operation counters.
#[derive(Debug, Default)]
pub struct OperationMetrics {
    counters: RwLock<BTreeMap<(String, Outcome), u64>>,
}

impl OperationMetrics {
    /// Creates an empty metrics sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for `operation` and `outcome`.
    pub fn record(&self, operation: &str, outcome: Outcome) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        let counter = counters
            .entry((operation.to_owned(), outcome))
            .or_insert(0);
        *counter = counter.saturating_add(1);
        tracing::trace!(operation, outcome = outcome.as_str(), "operation recorded");
    }

    /// Records the outcome of `result` and hands it back unchanged.
    pub fn observe<T, E>(&self, operation: &str, result: Result<T, E>) -> Result<T, E> {
        let outcome = if result.is_ok() {
            Outcome::Success
        } else {
            Outcome::Error
        };
        self.record(operation, outcome);
        result
    }

    /// Returns the current count for `operation` and `outcome`.
    #[must_use]
    pub fn count(&self, operation: &str, outcome: Outcome) -> u64 {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters
            .get(&(operation.to_owned(), outcome))
            .copied()
            .unwrap_or(0)
    }

    /// Returns every counter, ordered by operation then outcome.
    #[must_use]
    pub fn snapshot(&self) -> Vec<OperationCount> {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters
            .iter()
            .map(|((operation, outcome), count)| OperationCount {
                operation: operation.clone(),
                outcome: *outcome,
                count: *count,
            })
            .collect()
    }
}
