//! In-memory broker adapter.

mod broker;

pub use broker::InMemoryBroker;
