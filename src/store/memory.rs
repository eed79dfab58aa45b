//! In-memory key-value store with per-key TTL.
//!
//! Expired entries are invisible to every read and are physically removed by
//! [`MemoryStore::purge_expired`] or when the key is written again.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use fnv::FnvHashMap;
use tracing::trace;

use crate::store::{namespaced_key, KeyValueStore, OpsKind, Space, StoredValue, DEFAULT_TTL};

/// Data held under a physical key.
#[derive(Debug)]
enum Slot {
    Value(StoredValue),
    List(VecDeque<StoredValue>),
    Set(BTreeSet<String>),
}

#[derive(Debug)]
struct Entry {
    slot: Slot,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory store for mocks and verification data.
pub struct MemoryStore {
    /// Map from namespaced key to entry
    entries: RwLock<FnvHashMap<String, Entry>>,
    /// Time-to-live applied on every write
    ttl: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a new empty store with a custom TTL.
    ///
    /// # Parameters
    ///
    /// - `ttl` - Lifetime of every entry, refreshed on each write to it
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { entries: RwLock::new(FnvHashMap::default()), ttl }
    }

    /// TTL applied to writes.
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remove every expired entry.
    ///
    /// # Returns
    ///
    /// Returns the number of removed entries.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of live entries across all namespaces.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read().values().filter(|entry| entry.is_live(now)).count()
    }

    /// Whether the store holds no live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, FnvHashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FnvHashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the live entry under `key` for mutation, dropping it if expired.
    fn live_mut<'a>(
        entries: &'a mut FnvHashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn set_value(&self, space: &Space, key: &str, value: StoredValue) {
        let physical = namespaced_key(space, OpsKind::Value, key);
        trace!(key = %physical, "set value");
        let expires_at = Instant::now() + self.ttl;
        self.write().insert(physical, Entry { slot: Slot::Value(value), expires_at });
    }

    fn get_value(&self, space: &Space, key: &str) -> Option<StoredValue> {
        let physical = namespaced_key(space, OpsKind::Value, key);
        let now = Instant::now();
        let entries = self.read();
        match entries.get(&physical) {
            Some(Entry { slot: Slot::Value(value), expires_at }) if *expires_at > now => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    fn push_list(&self, space: &Space, key: &str, value: StoredValue) {
        let physical = namespaced_key(space, OpsKind::List, key);
        trace!(key = %physical, "push list");
        let now = Instant::now();
        let expires_at = now + self.ttl;
        {
            let mut entries = self.write();
            match Self::live_mut(&mut entries, &physical, now) {
                Some(Entry { slot: Slot::List(list), expires_at: expiry }) => {
                    list.push_back(value.clone());
                    *expiry = expires_at;
                }
                _ => {
                    entries.insert(
                        physical,
                        Entry { slot: Slot::List(VecDeque::from([value.clone()])), expires_at },
                    );
                }
            }
        }
        // Sticky copy served once the list drains
        self.set_value(space, key, value);
    }

    fn pop_list(&self, space: &Space, key: &str) -> Option<StoredValue> {
        let physical = namespaced_key(space, OpsKind::List, key);
        let now = Instant::now();
        let popped = {
            let mut entries = self.write();
            match Self::live_mut(&mut entries, &physical, now) {
                Some(Entry { slot: Slot::List(list), .. }) => list.pop_front(),
                _ => None,
            }
        };
        // Not atomic with the pop above, see the module docs.
        popped.or_else(|| self.get_value(space, key))
    }

    fn list_all(&self, space: &Space, key: &str) -> Vec<StoredValue> {
        let physical = namespaced_key(space, OpsKind::List, key);
        let now = Instant::now();
        let entries = self.read();
        match entries.get(&physical) {
            Some(Entry { slot: Slot::List(list), expires_at }) if *expires_at > now => {
                list.iter().cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    fn add_to_set(&self, space: &Space, key: &str, members: &[String]) {
        let physical = namespaced_key(space, OpsKind::Set, key);
        trace!(key = %physical, count = members.len(), "add to set");
        let now = Instant::now();
        let expires_at = now + self.ttl;
        let mut entries = self.write();
        match Self::live_mut(&mut entries, &physical, now) {
            Some(Entry { slot: Slot::Set(set), expires_at: expiry }) => {
                set.extend(members.iter().cloned());
                *expiry = expires_at;
            }
            _ => {
                let set = members.iter().cloned().collect();
                entries.insert(physical, Entry { slot: Slot::Set(set), expires_at });
            }
        }
    }

    fn set_members(&self, space: &Space, key: &str) -> BTreeSet<String> {
        let physical = namespaced_key(space, OpsKind::Set, key);
        let now = Instant::now();
        let entries = self.read();
        match entries.get(&physical) {
            Some(Entry { slot: Slot::Set(set), expires_at }) if *expires_at > now => set.clone(),
            _ => BTreeSet::new(),
        }
    }

    fn exists(&self, space: &Space, kind: OpsKind, key: &str) -> bool {
        let physical = namespaced_key(space, kind, key);
        let now = Instant::now();
        self.read().get(&physical).is_some_and(|entry| entry.is_live(now))
    }
}
