//! In-memory key-value store with clock-driven expiry.

use crate::registry::ports::{FieldMap, KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Thread-safe in-memory backing store.
///
/// Expiry is evaluated lazily against the injected clock, so tests can move
/// time forward and observe TTL behaviour without sleeping. The store can be
/// switched offline to simulate an unreachable backend.
pub struct InMemoryKeyValueStore<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<StoreState>>,
    clock: Arc<C>,
    available: Arc<AtomicBool>,
}

impl<C> Clone for InMemoryKeyValueStore<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
            available: Arc::clone(&self.available),
        }
    }
}

impl<C> std::fmt::Debug for InMemoryKeyValueStore<C>
where
    C: Clock + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyValueStore")
            .field("state", &self.state)
            .field("available", &self.available)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, Entry>,
}

#[derive(Debug)]
struct Entry {
    value: StoredValue,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum StoredValue {
    Fields(FieldMap),
    Members(BTreeSet<String>),
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

impl StoreState {
    fn live(&self, key: &str, now: DateTime<Utc>) -> Option<&Entry> {
        self.entries.get(key).filter(|entry| entry.is_live(now))
    }

    fn live_mut(&mut self, key: &str, now: DateTime<Utc>) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

impl InMemoryKeyValueStore<DefaultClock> {
    /// Creates an empty store driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryKeyValueStore<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryKeyValueStore<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty store driven by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            clock,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulates the store going offline (`false`) or recovering (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "in-memory store is offline",
            )))
        }
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.ensure_available()?;
        self.state
            .read()
            .map_err(|err| StoreError::unavailable(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.ensure_available()?;
        self.state
            .write()
            .map_err(|err| StoreError::unavailable(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl<C> KeyValueStore for InMemoryKeyValueStore<C>
where
    C: Clock + Send + Sync,
{
    async fn ping(&self) -> StoreResult<()> {
        self.ensure_available()
    }

    async fn get_fields(&self, key: &str) -> StoreResult<Option<FieldMap>> {
        let now = self.clock.utc();
        let state = self.read()?;
        match state.live(key, now).map(|entry| &entry.value) {
            None => Ok(None),
            Some(StoredValue::Fields(fields)) => Ok(Some(fields.clone())),
            Some(StoredValue::Members(_)) => Err(StoreError::WrongType(key.to_owned())),
        }
    }

    async fn set_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<()> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        match state.live_mut(key, now) {
            Some(Entry {
                value: StoredValue::Fields(existing),
                ..
            }) => {
                existing.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Some(_) => return Err(StoreError::WrongType(key.to_owned())),
            None => {
                state.entries.insert(
                    key.to_owned(),
                    Entry {
                        value: StoredValue::Fields(fields.clone()),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn create_fields(&self, key: &str, fields: &FieldMap) -> StoreResult<bool> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        if state.live_mut(key, now).is_some() {
            return Ok(false);
        }
        state.entries.insert(
            key.to_owned(),
            Entry {
                value: StoredValue::Fields(fields.clone()),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        if state.live_mut(key, now).is_none() {
            return Ok(false);
        }
        Ok(state.entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = self.clock.utc();
        let state = self.read()?;
        Ok(state.live(key, now).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        let Some(entry) = state.live_mut(key, now) else {
            return Ok(false);
        };
        entry.expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta));
        Ok(true)
    }

    async fn time_to_live(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = self.clock.utc();
        let state = self.read()?;
        Ok(state
            .live(key, now)
            .and_then(|entry| entry.expires_at)
            .and_then(|deadline| deadline.signed_duration_since(now).to_std().ok()))
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        match state.live_mut(key, now) {
            Some(Entry {
                value: StoredValue::Members(members),
                ..
            }) => Ok(members.insert(member.to_owned())),
            Some(_) => Err(StoreError::WrongType(key.to_owned())),
            None => {
                state.entries.insert(
                    key.to_owned(),
                    Entry {
                        value: StoredValue::Members(BTreeSet::from([member.to_owned()])),
                        expires_at: None,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = self.clock.utc();
        let mut state = self.write()?;
        let (removed, now_empty) = match state.live_mut(key, now) {
            Some(Entry {
                value: StoredValue::Members(members),
                ..
            }) => (members.remove(member), members.is_empty()),
            Some(_) => return Err(StoreError::WrongType(key.to_owned())),
            None => return Ok(false),
        };
        if now_empty {
            state.entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> StoreResult<BTreeSet<String>> {
        let now = self.clock.utc();
        let state = self.read()?;
        match state.live(key, now).map(|entry| &entry.value) {
            None => Ok(BTreeSet::new()),
            Some(StoredValue::Members(members)) => Ok(members.clone()),
            Some(StoredValue::Fields(_)) => Err(StoreError::WrongType(key.to_owned())),
        }
    }
}
