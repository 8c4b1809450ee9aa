//! In-memory adapters for the registry ports.

mod store;

pub use store::InMemoryKeyValueStore;
