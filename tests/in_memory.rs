//! In-memory integration tests.
//!
//! Tests are organized into modules by functionality:
//! - `dispatch_tests`: Registration, discovery, dispatch, replies, dead letters
//! - `reaping_tests`: Heartbeats, stale agents, and reaping

mod test_helpers;

mod in_memory {
    pub mod helpers;

    mod dispatch_tests;
    mod reaping_tests;
}
