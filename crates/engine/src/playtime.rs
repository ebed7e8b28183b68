//! Play-time tracking and cross-instance reconciliation
//!
//! Each active session is a checkpoint timestamp in the shared store.
//! Elapsed time is rolled into a durable per-user millisecond counter
//! either when the session ends or by the periodic reconciliation
//! worker, so a condition check mid-session sees up-to-date play time
//! instead of only learning about it at logout.

use questline_core::Result;
use questline_store::{keys, CounterStore, StoreLock, Ttl};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

/// Minimum accounting unit: play time is reported in whole minutes
const MIN_UNIT_MS: i64 = 60_000;

/// How often the reconciliation loop runs (one accounting unit)
pub const RECONCILE_PERIOD: Duration = Duration::from_secs(60);

/// Lock TTL survives one missed cycle but stays bounded so a crashed
/// holder cannot block reconciliation for long
const RECONCILE_LOCK_TTL: Duration = Duration::from_secs(90);

/// Pause before releasing the lock, to dampen re-acquisition races at
/// the TTL boundary
const RELEASE_GRACE: Duration = Duration::from_millis(500);

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Tracks per-user play sessions and the durable play-time counter
#[derive(Clone)]
pub struct PlayTimeTracker {
    store: Arc<dyn CounterStore>,
}

impl PlayTimeTracker {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Begin (or restart) a play session for a user.
    ///
    /// Overwrites any existing checkpoint; the previous unflushed
    /// interval is dropped, which loses at most one reconcile period.
    pub async fn start_session(&self, user_id: &str) -> Result<()> {
        self.store
            .set(&keys::session_start_key(user_id), now_ms(), Ttl::Forever)
            .await?;

        info!("Started session for user {}", user_id);
        Ok(())
    }

    /// End a user's session, flush the remaining interval, and return
    /// the user's total play time in whole minutes.
    ///
    /// Returns 0 without touching the counter when no session is active
    /// - reconciliation may already have flushed and a second flush
    /// would double-count.
    pub async fn end_session(&self, user_id: &str) -> Result<i64> {
        let session_key = keys::session_start_key(user_id);

        let Some(started_at) = self.store.get(&session_key).await? else {
            return Ok(0);
        };

        let elapsed = (now_ms() - started_at).max(0);
        let total = self
            .store
            .increment(&keys::play_time_key(user_id), elapsed)
            .await?;
        self.store.delete(&session_key).await?;

        info!(
            "Ended session for user {}, flushed {} ms",
            user_id, elapsed
        );
        Ok(total / MIN_UNIT_MS)
    }

    /// Accumulated play time in whole minutes; 0 for unknown users
    pub async fn get_play_time(&self, user_id: &str) -> Result<i64> {
        let total = self
            .store
            .get(&keys::play_time_key(user_id))
            .await?
            .unwrap_or(0);

        Ok(total / MIN_UNIT_MS)
    }

    /// Flush every active session's elapsed interval into its durable
    /// counter and reset the checkpoints to now. Sessions stay active.
    ///
    /// Callers must hold the reconcile lock; this method itself only
    /// relies on `increment` being atomic.
    pub async fn reconcile_once(&self) -> Result<u32> {
        let session_keys = self.store.scan(keys::SESSION_START_PREFIX).await?;
        let mut flushed = 0;

        for session_key in session_keys {
            let Some(user_id) = keys::user_id_from_session_key(&session_key) else {
                continue;
            };
            // Session may have ended between scan and read
            let Some(started_at) = self.store.get(&session_key).await? else {
                continue;
            };

            let now = now_ms();
            let elapsed = (now - started_at).max(0);

            // Checkpoint first so the interval is never flushed twice
            self.store.set(&session_key, now, Ttl::Forever).await?;
            self.store
                .increment(&keys::play_time_key(user_id), elapsed)
                .await?;

            debug!("Reconciled play time for user {}: +{} ms", user_id, elapsed);
            flushed += 1;
        }

        Ok(flushed)
    }
}

/// Periodic reconciliation loop, one instance cluster-wide per cycle.
///
/// Every service instance runs a worker; the store lock picks the one
/// that actually does the scan each period.
pub struct ReconcileWorker {
    tracker: PlayTimeTracker,
    lock: StoreLock,
    period: Duration,
}

impl ReconcileWorker {
    pub fn new(store: Arc<dyn CounterStore>, tracker: PlayTimeTracker) -> Self {
        Self {
            tracker,
            lock: StoreLock::new(store, keys::RECONCILE_LOCK_KEY, RECONCILE_LOCK_TTL),
            period: RECONCILE_PERIOD,
        }
    }

    /// Run forever; spawn this onto the runtime at process start
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = self.run_cycle().await {
                error!("Play-time reconciliation cycle failed: {}", err);
            }
        }
    }

    /// One lock-guarded reconciliation cycle; returns whether this
    /// instance did the work
    pub async fn run_cycle(&self) -> Result<bool> {
        if !self.lock.try_acquire().await? {
            // Normal in a cluster: another instance owns this cycle
            debug!("Reconcile lock busy, skipping cycle");
            return Ok(false);
        }

        let flushed = self.tracker.reconcile_once().await;

        // Hold the lock a moment past the work so instances whose timers
        // fire late do not immediately re-acquire and rescan
        tokio::time::sleep(RELEASE_GRACE).await;
        self.lock.release().await;

        flushed.map(|count| {
            if count > 0 {
                debug!("Reconciled {} active sessions", count);
            }
            true
        })
    }
}
