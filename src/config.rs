//! Process configuration loaded from TOML.
//!
//! Every field has a default, so an empty document (or no file at all)
//! yields a working in-process setup. Durations are expressed in whole
//! seconds.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: Arc<std::io::Error>,
    },

    /// The document is not valid configuration TOML.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration for a coordination process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConductorConfig {
    /// Agent registry settings.
    pub registry: RegistryConfig,
    /// Discovery settings.
    pub discovery: DiscoveryConfig,
    /// Message bus settings.
    pub bus: BusConfig,
    /// Logging settings.
    pub telemetry: TelemetryConfig,
}

impl ConductorConfig {
    /// Parses configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(document)?)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = path.as_ref();
        let document = std::fs::read_to_string(file).map_err(|err| ConfigError::Read {
            path: file.to_path_buf(),
            source: Arc::new(err),
        })?;
        Self::from_toml_str(&document)
    }
}

/// Agent registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Endpoint advertised to agents in registration responses.
    pub endpoint: String,
    /// Lifetime of a health record without refresh.
    pub health_ttl_secs: u64,
    /// Heartbeat age after which an agent is reaped.
    pub stale_timeout_secs: u64,
    /// Period of the background reaper.
    pub reap_interval_secs: u64,
    /// Whether the background reaper runs at all.
    pub reaper_enabled: bool,
}

impl RegistryConfig {
    /// Returns the health record lifetime.
    #[must_use]
    pub const fn health_ttl(&self) -> Duration {
        Duration::from_secs(self.health_ttl_secs)
    }

    /// Returns the heartbeat age after which an agent is stale.
    #[must_use]
    pub const fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }

    /// Returns the reaper period.
    #[must_use]
    pub const fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("memory://registry"),
            health_ttl_secs: 300,
            stale_timeout_secs: 180,
            reap_interval_secs: 60,
            reaper_enabled: true,
        }
    }
}

/// Discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Load-balancing strategy name used when callers do not pick one.
    pub default_strategy: String,
    /// Tags marking an agent as fit for privacy-sensitive work.
    pub privacy_tags: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_strategy: String::from("least_loaded"),
            privacy_tags: vec![String::from("local"), String::from("private")],
        }
    }
}

/// Message bus settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Topic exchange carrying agent traffic.
    pub exchange: String,
    /// Exchange receiving dead-lettered messages.
    pub dead_letter_exchange: String,
    /// Lifetime of an undelivered message before it is dead-lettered.
    pub message_ttl_secs: u64,
    /// Redeliveries allowed after the first failed delivery.
    pub max_retries: u32,
    /// Default wait for a correlated reply.
    pub reply_timeout_secs: u64,
}

impl BusConfig {
    /// Returns the message lifetime.
    #[must_use]
    pub const fn message_ttl(&self) -> Duration {
        Duration::from_secs(self.message_ttl_secs)
    }

    /// Returns the default reply wait.
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            exchange: String::from("agents"),
            dead_letter_exchange: String::from("agents.dlx"),
            message_ttl_secs: 3600,
            max_retries: 3,
            reply_timeout_secs: 30,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Whether log lines include the emitting module path.
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: String::from("info"),
            with_target: true,
        }
    }
}
