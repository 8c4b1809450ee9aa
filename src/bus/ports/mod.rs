//! Port abstractions for the message bus.

mod broker;

pub use broker::{BrokerError, BrokerResult, DELIVERY_BUFFER, MessageBroker};
