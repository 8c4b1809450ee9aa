//! Adapter implementations of the bus ports.

pub mod memory;
