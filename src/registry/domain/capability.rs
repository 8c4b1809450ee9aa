//! Declared agent capabilities and complexity ranges.

use super::RegistryDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named unit of declared work used for discovery indexing.
///
/// Capability names are trimmed and lowercased so `Code_Generation` and
/// `code_generation` land in the same index set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Creates a normalised capability name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::EmptyCapability`] when the name is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, RegistryDomainError> {
        let normalized = value.into().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(RegistryDomainError::EmptyCapability);
        }
        Ok(Self(normalized))
    }

    /// Returns the capability name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowest task complexity an agent can declare.
pub const MIN_COMPLEXITY: u8 = 1;

/// Highest task complexity an agent can declare.
pub const MAX_COMPLEXITY: u8 = 10;

/// Inclusive task complexity range an agent is comfortable handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityRange {
    min: u8,
    max: u8,
}

impl ComplexityRange {
    /// Creates a validated complexity range.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryDomainError::InvalidComplexityRange`] when either
    /// bound falls outside `1..=10` or `min > max`.
    pub const fn new(min: u8, max: u8) -> Result<Self, RegistryDomainError> {
        if min < MIN_COMPLEXITY || max > MAX_COMPLEXITY || min > max {
            return Err(RegistryDomainError::InvalidComplexityRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Returns the lower bound.
    #[must_use]
    pub const fn min(self) -> u8 {
        self.min
    }

    /// Returns the upper bound.
    #[must_use]
    pub const fn max(self) -> u8 {
        self.max
    }

    /// Returns whether `complexity` falls inside the range.
    #[must_use]
    pub const fn contains(self, complexity: u8) -> bool {
        complexity >= self.min && complexity <= self.max
    }
}

impl Default for ComplexityRange {
    fn default() -> Self {
        Self {
            min: MIN_COMPLEXITY,
            max: MAX_COMPLEXITY,
        }
    }
}
