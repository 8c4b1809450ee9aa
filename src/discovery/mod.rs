//! Capability matching, candidate scoring, and load balancing.
//!
//! Discovery reads agents through the registry service and never writes.
//! Scoring is a pure function over registry records (see
//! [`domain::score_candidate`]) so weights can be exercised without a store.

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
