//! Discovery services.

mod discovery;

pub use discovery::{DiscoveryError, DiscoveryResult, DiscoveryService, DiscoveryStats};
