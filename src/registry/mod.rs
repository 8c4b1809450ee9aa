//! Agent registration, health tracking, and stale-agent reaping.
//!
//! The registry keeps one metadata record, one TTL-backed health record, and
//! one stats record per agent in a key-value backing store, alongside
//! type and capability index sets. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
