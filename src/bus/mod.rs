//! Topic-routed messaging between agents.
//!
//! The bus publishes [`domain::Envelope`]s onto a topic exchange, gives every
//! agent a durable inbox queue, retries failed deliveries a bounded number of
//! times, and moves exhausted or expired messages to a dead-letter exchange.
//! Broker mechanics sit behind [`ports::MessageBroker`] with an in-process
//! implementation in [`adapters::memory`].

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
