//! Bus connection status reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Connection status of the message bus.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum BusStatus {
    /// Not connected to the broker.
    #[default]
    Disconnected,
    /// Connected and passing health checks.
    Connected,
    /// Connected, but the last health check failed.
    Error(String),
}

impl BusStatus {
    /// Returns the status label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Error(_) => "error",
        }
    }

    /// Returns whether the bus holds a live broker connection.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Error(_))
    }
}

impl fmt::Display for BusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            Self::Disconnected | Self::Connected => f.write_str(self.as_str()),
        }
    }
}

/// Result of [`MessageBus::health_check`].
///
/// [`MessageBus::health_check`]: crate::bus::services::MessageBus::health_check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusHealth {
    /// Status after the check.
    pub status: BusStatus,
    /// Topic exchange in use.
    pub exchange: String,
    /// Running handler consumers.
    pub consumers: usize,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}
