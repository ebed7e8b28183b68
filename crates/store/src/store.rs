//! Counter store trait and TTL type

use async_trait::async_trait;
use questline_core::Result;
use std::time::Duration;

/// Expiry policy for a stored key.
///
/// Explicit variant instead of a sentinel value so "never expires" is
/// visible at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Key never expires
    Forever,
    /// Key expires after the given duration
    After(Duration),
}

impl Ttl {
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Ttl::Forever => None,
            Ttl::After(d) => Some(*d),
        }
    }
}

/// Shared key-value store for counters, sessions, and the cluster mutex.
///
/// All values are signed 64-bit integers (counters and millisecond
/// timestamps). Implementations must make `increment` and
/// `set_if_absent` atomic; they are the primitives the play-time
/// counter and the distributed lock are built on.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read a key; `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Write a key with the given expiry
    async fn set(&self, key: &str, value: i64, ttl: Ttl) -> Result<()>;

    /// Atomically add `delta` to a key (absent counts as 0) and return
    /// the new value
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all live keys starting with `prefix`
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;

    /// Reset the expiry of an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Write a key only if it is absent (or expired); returns whether
    /// the write happened. This is the distributed-mutex primitive.
    async fn set_if_absent(&self, key: &str, value: i64, ttl: Ttl) -> Result<bool>;
}
