//! Domain model for task matching and agent selection.

mod error;
mod request;
mod scoring;
mod strategy;
mod task;

pub use error::{DiscoveryDomainError, ParseStrategyError, ParseTaskTypeError};
pub use request::TaskRequest;
pub use scoring::{
    CandidateScore, ScoreInputs, complexity_fit, normalised_response_time, resource_penalty,
    score_candidate,
};
pub use strategy::LoadBalancingStrategy;
pub use task::{DEFAULT_TYPE_COMPATIBILITY, TaskCategory, TaskType, type_compatibility};
