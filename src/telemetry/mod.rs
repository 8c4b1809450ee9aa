//! Logging setup and operation metrics shared by every component.

mod metrics;
mod subscriber;

pub use metrics::{OperationCount, OperationMetrics, Outcome};
pub use subscriber::{TelemetryError, init_tracing};
