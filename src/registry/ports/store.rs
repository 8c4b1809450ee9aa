//! Backing-store port for registry records and index sets.
//!
//! The contract mirrors the handful of Redis primitives the registry relies
//! on: field maps with per-field writes, key expiry, atomic creation, and
//! string sets. Anything offering these can back the registry.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Field name to encoded value map stored under a single key.
pub type FieldMap = BTreeMap<String, String>;

/// Result type for backing-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value backing store contract.
///
/// Expired keys behave exactly like absent keys for every operation.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Checks that the store is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Returns every field stored under `key`, or `None` when absent.
    async fn get_fields(&self, key: &str) -> StoreResult<Option<FieldMap>>;

    /// Writes `fields` into the map under `key`, creating it when absent.
    ///
    /// Existing fields not named in `fields` are kept and any expiry on the
    /// key is preserved.
    async fn set_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<()>;

    /// Atomically creates the map under `key` only if the key is absent.
    ///
    /// Returns `false` without writing anything when the key already exists.
    async fn create_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<bool>;

    /// Removes `key`. Returns whether anything was deleted.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Returns whether `key` exists.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Sets `key` to expire after `ttl`. Returns `false` when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Returns the remaining lifetime of `key`, or `None` when it is absent or
    /// has no expiry.
    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Adds `member` to the set under `key`. Returns whether it was new.
    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Removes `member` from the set under `key`. Returns whether it was
    /// present. Sets left empty are deleted.
    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Returns the members of the set under `key`; absent sets are empty.
    async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>>;
}

/// Errors returned by backing-store adapters.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or refused the operation.
    #[error("backing store unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),

    /// The key holds a value of a different kind than the operation expects.
    #[error("key '{0}' holds a value of the wrong kind")]
    WrongType(String),
}

impl StoreError {
    /// Wraps a connectivity or transport failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
