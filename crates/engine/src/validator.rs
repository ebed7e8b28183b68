//! Reward condition validation

use crate::playtime::PlayTimeTracker;
use questline_core::{ConditionType, Error, Result, RewardCondition};
use questline_store::{keys, CounterStore};
use std::sync::Arc;
use tracing::debug;

/// Outcome of checking one condition for one user
#[derive(Debug, Clone)]
pub struct Verdict {
    pub is_valid: bool,
    /// Human-readable shortfall, present when the condition is unmet
    pub reason: Option<String>,
}

impl Verdict {
    fn met() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn unmet(reason: String) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
        }
    }
}

/// Checks reward conditions against the user's counters.
///
/// Pure reads: validation never mutates any counter.
#[derive(Clone)]
pub struct ConditionValidator {
    store: Arc<dyn CounterStore>,
    tracker: PlayTimeTracker,
}

impl ConditionValidator {
    pub fn new(store: Arc<dyn CounterStore>, tracker: PlayTimeTracker) -> Self {
        Self { store, tracker }
    }

    /// Check a condition for a user.
    ///
    /// An unmet condition is a normal business outcome (`Verdict`); a
    /// condition type with no evaluation rule is an error - those must
    /// fail closed rather than silently pass.
    pub async fn validate(&self, condition: &RewardCondition, user_id: &str) -> Result<Verdict> {
        debug!(
            "Validating {:?} condition for user {}",
            condition.condition_type, user_id
        );

        match condition.condition_type {
            ConditionType::Login => self.validate_login(condition, user_id).await,
            ConditionType::PlayTime => self.validate_play_time(condition, user_id).await,
            ConditionType::Achievement
            | ConditionType::Level
            | ConditionType::ItemCollect
            | ConditionType::Custom => Err(Error::UnsupportedCondition(format!(
                "{:?} has no evaluation rule",
                condition.condition_type
            ))),
        }
    }

    async fn validate_login(&self, condition: &RewardCondition, user_id: &str) -> Result<Verdict> {
        let streak = self
            .store
            .get(&keys::login_streak_key(user_id))
            .await?
            .unwrap_or(0);

        if streak >= condition.target_value {
            Ok(Verdict::met())
        } else {
            Ok(Verdict::unmet(format!(
                "login streak too short (current: {}, target: {})",
                streak, condition.target_value
            )))
        }
    }

    async fn validate_play_time(
        &self,
        condition: &RewardCondition,
        user_id: &str,
    ) -> Result<Verdict> {
        let minutes = self.tracker.get_play_time(user_id).await?;

        if minutes >= condition.target_value {
            Ok(Verdict::met())
        } else {
            Ok(Verdict::unmet(format!(
                "not enough play time (current: {} min, target: {} min)",
                minutes, condition.target_value
            )))
        }
    }

    /// Record a daily login: bumps the continuous-login counter and
    /// refreshes its one-day expiry. Returns the new streak.
    pub async fn record_login(&self, user_id: &str) -> Result<i64> {
        let key = keys::login_streak_key(user_id);
        let streak = self.store.increment(&key, 1).await?;
        self.store.expire(&key, keys::LOGIN_STREAK_TTL).await?;
        Ok(streak)
    }
}
