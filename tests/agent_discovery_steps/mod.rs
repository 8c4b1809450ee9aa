//! Step definitions for agent discovery scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
