//! Unit tests for discovery.

mod domain_tests;
mod scoring_tests;
mod service_tests;
