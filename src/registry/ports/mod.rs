//! Port contracts for the agent registry.
//!
//! Ports define infrastructure-agnostic interfaces used by registry services.

pub mod store;

pub use store::{FieldMap, KeyValueStore, StoreError, StoreResult};
