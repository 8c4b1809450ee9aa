//! Conductor: agent registry, discovery, and messaging.
//!
//! This crate keeps track of a fleet of specialised agents, picks the best
//! one for a task, and carries messages between them.
//!
//! # Architecture
//!
//! Each context follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and brokering
//! - **Adapters**: Concrete implementations of ports (in-memory today)
//! - **Services**: Orchestration, logging, and metrics
//!
//! # Modules
//!
//! - [`registry`]: Agent records, health, statistics, and indices
//! - [`discovery`]: Capability matching, scoring, and load balancing
//! - [`bus`]: Topic-routed messaging with retries and dead letters
//! - [`context`]: Start-up wiring of the services above
//! - [`config`]: TOML configuration
//! - [`telemetry`]: Tracing setup and operation counters

pub mod bus;
pub mod config;
pub mod context;
pub mod discovery;
pub mod registry;
pub mod telemetry;

#[cfg(test)]
mod test_support;
