//! Key naming and default TTLs for the counter store
//!
//! Every key the service writes is built here so the namespace stays in
//! one place.

use std::time::Duration;

/// Prefix for per-user session-start checkpoints
pub const SESSION_START_PREFIX: &str = "playtime:session:start:";

/// Prefix for per-user durable play-time counters (milliseconds)
pub const PLAY_TIME_PREFIX: &str = "playtime:total:";

/// Prefix for per-user continuous-login counters
pub const LOGIN_STREAK_PREFIX: &str = "condition:login:streak:";

/// Cluster-wide mutex key for the play-time reconciliation loop
pub const RECONCILE_LOCK_KEY: &str = "lock:playtime:reconcile";

/// Login-streak counters roll over daily
pub const LOGIN_STREAK_TTL: Duration = Duration::from_secs(86_400);

/// Session-start checkpoint for a user
pub fn session_start_key(user_id: &str) -> String {
    format!("{SESSION_START_PREFIX}{user_id}")
}

/// Durable accumulated play time for a user, in milliseconds
pub fn play_time_key(user_id: &str) -> String {
    format!("{PLAY_TIME_PREFIX}{user_id}")
}

/// Continuous-login counter for a user
pub fn login_streak_key(user_id: &str) -> String {
    format!("{LOGIN_STREAK_PREFIX}{user_id}")
}

/// Extract the user id from a scanned session-start key
pub fn user_id_from_session_key(key: &str) -> Option<&str> {
    key.strip_prefix(SESSION_START_PREFIX)
}
