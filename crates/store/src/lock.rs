//! Distributed lock built on the store's set-if-absent primitive

use crate::store::{CounterStore, Ttl};
use questline_core::Result;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

static TOKEN_SEQ: AtomicI64 = AtomicI64::new(0);

/// Acquisition timestamp plus a process-local sequence, so no two
/// acquisitions ever share a token
fn next_token() -> i64 {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let seq = TOKEN_SEQ.fetch_add(1, Ordering::Relaxed) & 0xFFFF;

    (now_ms << 16) | seq
}

/// Cluster-wide mutual exclusion via a conditional, time-limited write.
///
/// The TTL bounds how long a crashed holder can block other instances;
/// pick it strictly greater than the work period the lock protects so a
/// healthy holder is never preempted mid-cycle. Each acquisition writes
/// a holder token; `release` only deletes the key while that token is
/// still in place, so a stale holder whose TTL already lapsed cannot
/// knock out its successor.
pub struct StoreLock {
    store: Arc<dyn CounterStore>,
    key: String,
    ttl: Duration,
    token: Mutex<Option<i64>>,
}

impl StoreLock {
    pub fn new(store: Arc<dyn CounterStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            token: Mutex::new(None),
        }
    }

    /// Try to take the lock; returns false when another instance holds it.
    /// Losing the race is expected, not an error.
    pub async fn try_acquire(&self) -> Result<bool> {
        let token = next_token();
        let acquired = self
            .store
            .set_if_absent(&self.key, token, Ttl::After(self.ttl))
            .await?;

        if acquired {
            *self.token.lock().unwrap_or_else(|p| p.into_inner()) = Some(token);
        }
        Ok(acquired)
    }

    /// Release the lock if this instance still holds it. Failure is
    /// logged, not propagated: the TTL will reclaim the key on its own.
    pub async fn release(&self) {
        let token = self.token.lock().unwrap_or_else(|p| p.into_inner()).take();
        let Some(token) = token else {
            return;
        };

        match self.store.get(&self.key).await {
            Ok(Some(current)) if current == token => {
                if let Err(err) = self.store.delete(&self.key).await {
                    warn!("Failed to release lock {}: {}", self.key, err);
                }
            }
            Ok(_) => {
                // TTL lapsed and another instance took over
                warn!("Lock {} no longer held by this instance, not releasing", self.key);
            }
            Err(err) => warn!("Failed to read lock {} on release: {}", self.key, err),
        }
    }
}
