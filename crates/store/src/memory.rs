//! In-memory counter store with per-key TTL

use crate::store::{CounterStore, Ttl};
use async_trait::async_trait;
use questline_core::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Stored value with optional expiration
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

fn deadline(ttl: Ttl) -> Option<Instant> {
    ttl.as_duration().map(|d| Instant::now() + d)
}

/// Thread-safe in-memory implementation of [`CounterStore`].
///
/// Expired entries are dropped lazily on access. Suitable for tests and
/// single-node deployments; a Redis-backed store can replace it behind
/// the same trait in a multi-instance cluster.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (non-expired) keys
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|m| m.values().filter(|e| !e.is_expired()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let map = self
            .entries
            .read()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        Ok(map.get(key).filter(|e| !e.is_expired()).map(|e| e.value))
    }

    async fn set(&self, key: &str, value: i64, ttl: Ttl) -> Result<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        map.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: deadline(ttl),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        let entry = map.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        // Expired entries restart from zero and lose their deadline
        if entry.is_expired() {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value += delta;
        Ok(entry.value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        map.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self
            .entries
            .read()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        Ok(map
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired())
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        if let Some(entry) = map.get_mut(key) {
            if !entry.is_expired() {
                entry.expires_at = Some(Instant::now() + ttl);
            }
        }
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: i64, ttl: Ttl) -> Result<bool> {
        let mut map = self
            .entries
            .write()
            .map_err(|_| Error::StoreError("store lock poisoned".to_string()))?;

        match map.get(key) {
            Some(existing) if !existing.is_expired() => Ok(false),
            _ => {
                map.insert(
                    key.to_string(),
                    Entry {
                        value,
                        expires_at: deadline(ttl),
                    },
                );
                Ok(true)
            }
        }
    }
}
