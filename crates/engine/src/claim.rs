//! Reward claim orchestration
//!
//! The claim pipeline: event lookup, one-claim-per-user-per-event
//! guard, condition validation, aggregated point credit, approval.
//! Validation is all-or-nothing - a single unmet condition rejects the
//! whole claim and nothing is credited.

use crate::ledger::PointLedger;
use crate::validator::ConditionValidator;
use chrono::{DateTime, Utc};
use questline_core::{Claim, Error, LedgerEntryType, Result};
use questline_persistence::sqlite::{claims, events};
use questline_persistence::Database;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Top-level reward claim use case
#[derive(Clone)]
pub struct ClaimService {
    db: Arc<Database>,
    validator: ConditionValidator,
    ledger: PointLedger,
}

impl ClaimService {
    pub fn new(db: Arc<Database>, validator: ConditionValidator, ledger: PointLedger) -> Self {
        Self {
            db,
            validator,
            ledger,
        }
    }

    /// Claim all rewards of an event for a user.
    ///
    /// Exactly one terminal outcome per attempt: the approved claim, or
    /// one typed error. A `Conflict` means a live claim already exists
    /// for this (user, event) pair; rejected and failed attempts do not
    /// block a retry.
    pub async fn claim(&self, event_id: &str, user_id: &str) -> Result<Claim> {
        info!("Processing claim for event {} by user {}", event_id, user_id);
        let pool = self.db.pool();

        let event = events::find_event(pool, event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {} not found", event_id)))?;

        if event.rewards.is_empty() {
            return Err(Error::InvalidState("event has no rewards".to_string()));
        }
        if !event.is_claimable() {
            return Err(Error::InvalidState(format!(
                "event {} is not open for claims",
                event_id
            )));
        }

        // Fast-fail for the common duplicate case; the unique index on
        // the insert below is what actually closes the race
        if claims::find_live_by_user_and_event(pool, user_id, event_id)
            .await?
            .is_some()
        {
            return Err(Error::Conflict("reward already requested".to_string()));
        }

        let claim_id = Uuid::new_v4().to_string();
        claims::insert_pending(pool, &claim_id, user_id, event_id, Utc::now()).await?;

        // Every condition must hold; the first shortfall rejects the
        // whole claim with its reason
        let mut total_points = 0;
        for reward in &event.rewards {
            let verdict = match self.validator.validate(&reward.condition, user_id).await {
                Ok(verdict) => verdict,
                Err(err) => {
                    claims::mark_failed(pool, &claim_id, &err.to_string()).await?;
                    return Err(err);
                }
            };

            if !verdict.is_valid {
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| "condition not met".to_string());
                claims::mark_rejected(pool, &claim_id, &reason).await?;
                info!("Rejected claim {}: {}", claim_id, reason);
                return Err(Error::ConditionUnmet(reason));
            }

            total_points += reward.points;
        }

        let description = format!("[event:{}] reward payout", event.title);
        let approved_at = Utc::now();

        if let Err(err) = self
            .credit_and_approve(
                &claim_id,
                user_id,
                event_id,
                total_points,
                &description,
                approved_at,
            )
            .await
        {
            error!(
                "Point credit failed for user {} event {} amount {}: {}",
                user_id, event_id, total_points, err
            );
            // Roll the placeholder back to FAILED so the user can retry
            if let Err(rollback_err) = claims::mark_failed(pool, &claim_id, "point credit failed").await
            {
                error!(
                    "Could not roll back claim {} to FAILED, manual reconciliation required: {}",
                    claim_id, rollback_err
                );
            }
            return Err(Error::LedgerFailure(err.to_string()));
        }

        let claim = claims::find_by_id(pool, &claim_id)
            .await?
            .ok_or_else(|| Error::DatabaseError(format!("claim {} vanished", claim_id)))?;

        info!(
            "Approved claim {} for user {} (+{} points)",
            claim_id, user_id, total_points
        );
        Ok(claim)
    }

    /// The step the pipeline must protect: balance update, ledger
    /// append, and claim approval commit or roll back as one unit
    async fn credit_and_approve(
        &self,
        claim_id: &str,
        user_id: &str,
        event_id: &str,
        total_points: i64,
        description: &str,
        approved_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        self.ledger
            .credit_in_tx(
                &mut tx,
                user_id,
                total_points,
                LedgerEntryType::EventReward,
                Some(event_id),
                description,
            )
            .await?;
        claims::mark_approved(&mut tx, claim_id, approved_at).await?;

        tx.commit()
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))
    }

    /// Look up a claim by id, failing if it does not exist
    pub async fn find_claim(&self, claim_id: &str) -> Result<Claim> {
        claims::find_by_id(self.db.pool(), claim_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("claim {} not found", claim_id)))
    }

    /// All claims, newest first, with the total count
    pub async fn list_claims(&self) -> Result<(Vec<Claim>, i64)> {
        let items = claims::list_all(self.db.pool()).await?;
        let total = claims::count_all(self.db.pool()).await?;
        Ok((items, total))
    }

    /// A user's claims, newest first, with the total count
    pub async fn list_claims_by_user(&self, user_id: &str) -> Result<(Vec<Claim>, i64)> {
        let items = claims::list_by_user(self.db.pool(), user_id).await?;
        let total = claims::count_by_user(self.db.pool(), user_id).await?;
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CreateEvent, EventService};
    use crate::playtime::PlayTimeTracker;
    use chrono::Duration;
    use questline_core::{ClaimStatus, ConditionType, Event, Reward, RewardCondition};
    use questline_persistence::sqlite::{ledger, users};
    use questline_store::{keys, CounterStore, MemoryStore, Ttl};

    struct Fixture {
        db: Arc<Database>,
        store: Arc<MemoryStore>,
        events: EventService,
        claims: ClaimService,
    }

    async fn setup() -> Fixture {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        users::create_user(db.pool(), "u1", "alice", 0).await.unwrap();

        let store = Arc::new(MemoryStore::new());
        let tracker = PlayTimeTracker::new(store.clone() as Arc<dyn CounterStore>);
        let validator =
            ConditionValidator::new(store.clone() as Arc<dyn CounterStore>, tracker);
        let ledger = PointLedger::new(db.clone());
        let claims = ClaimService::new(db.clone(), validator, ledger);
        let events = EventService::new(db.clone());

        Fixture {
            db,
            store,
            events,
            claims,
        }
    }

    fn reward(condition_type: ConditionType, target_value: i64, points: i64) -> Reward {
        Reward {
            name: format!("{:?} reward", condition_type),
            points,
            description: String::new(),
            condition: RewardCondition {
                condition_type,
                target_value,
                description: String::new(),
                params: serde_json::Value::Null,
            },
        }
    }

    async fn active_event(fx: &Fixture, rewards: Vec<Reward>) -> Event {
        let event = fx
            .events
            .create_event(CreateEvent {
                title: "Launch Week".to_string(),
                description: String::new(),
                start_date: Utc::now(),
                end_date: Utc::now() + Duration::days(7),
                created_by: "admin".to_string(),
                rewards,
            })
            .await
            .unwrap();
        fx.events.activate(&event.id).await.unwrap();
        fx.events.find_event(&event.id).await.unwrap()
    }

    async fn seed_play_minutes(fx: &Fixture, user_id: &str, minutes: i64) {
        fx.store
            .increment(&keys::play_time_key(user_id), minutes * 60_000)
            .await
            .unwrap();
    }

    async fn seed_login_streak(fx: &Fixture, user_id: &str, streak: i64) {
        fx.store
            .set(&keys::login_streak_key(user_id), streak, Ttl::Forever)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_play_time_reward_claim_end_to_end() {
        let fx = setup().await;
        seed_play_minutes(&fx, "u1", 45).await;
        let event = active_event(&fx, vec![reward(ConditionType::PlayTime, 30, 500)]).await;

        let claim = fx.claims.claim(&event.id, "u1").await.unwrap();
        assert_eq!(claim.status, ClaimStatus::Approved);
        assert!(claim.approved_at.is_some());

        assert_eq!(users::get_balance(fx.db.pool(), "u1").await.unwrap(), Some(500));
        let entries = ledger::list_by_user(fx.db.pool(), "u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 500);
        assert_eq!(entries[0].event_id.as_deref(), Some(event.id.as_str()));
        assert!(entries[0].description.contains("Launch Week"));

        // Second attempt is a conflict and credits nothing
        let err = fx.claims.claim(&event.id, "u1").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(users::get_balance(fx.db.pool(), "u1").await.unwrap(), Some(500));
    }

    #[tokio::test]
    async fn test_any_unmet_condition_rejects_the_whole_claim() {
        let fx = setup().await;
        seed_login_streak(&fx, "u1", 5).await;
        seed_play_minutes(&fx, "u1", 10).await;
        let event = active_event(
            &fx,
            vec![
                reward(ConditionType::Login, 3, 100),
                reward(ConditionType::PlayTime, 120, 400),
            ],
        )
        .await;

        let err = fx.claims.claim(&event.id, "u1").await.unwrap_err();
        match err {
            Error::ConditionUnmet(reason) => assert!(reason.contains("play time")),
            other => panic!("expected ConditionUnmet, got {other:?}"),
        }

        // No partial grant, and no claim left PENDING or APPROVED
        assert_eq!(users::get_balance(fx.db.pool(), "u1").await.unwrap(), Some(0));
        assert_eq!(ledger::count_by_user(fx.db.pool(), "u1").await.unwrap(), 0);

        let (items, total) = fx.claims.list_claims_by_user("u1").await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].status, ClaimStatus::Rejected);
        assert!(items[0].rejection_reason.contains("play time"));
    }

    #[tokio::test]
    async fn test_both_conditions_met_credits_one_aggregated_entry() {
        let fx = setup().await;
        seed_login_streak(&fx, "u1", 5).await;
        seed_play_minutes(&fx, "u1", 45).await;
        let event = active_event(
            &fx,
            vec![
                reward(ConditionType::Login, 3, 100),
                reward(ConditionType::PlayTime, 30, 200),
            ],
        )
        .await;

        fx.claims.claim(&event.id, "u1").await.unwrap();

        // One aggregated credit, not one per reward
        let entries = ledger::list_by_user(fx.db.pool(), "u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 300);
        assert_eq!(entries[0].balance_after, 300);
    }

    #[tokio::test]
    async fn test_claim_missing_event() {
        let fx = setup().await;
        let err = fx.claims.claim("nope", "u1").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_claim_event_without_rewards() {
        let fx = setup().await;
        let event = active_event(&fx, vec![]).await;

        let err = fx.claims.claim(&event.id, "u1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_claim_draft_event_is_invalid() {
        let fx = setup().await;
        let event = fx
            .events
            .create_event(CreateEvent {
                title: "Not yet".to_string(),
                description: String::new(),
                start_date: Utc::now(),
                end_date: Utc::now() + Duration::days(1),
                created_by: "admin".to_string(),
                rewards: vec![reward(ConditionType::Login, 1, 10)],
            })
            .await
            .unwrap();

        let err = fx.claims.claim(&event.id, "u1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_claims_approve_exactly_once() {
        let fx = setup().await;
        seed_play_minutes(&fx, "u1", 45).await;
        let event = active_event(&fx, vec![reward(ConditionType::PlayTime, 30, 500)]).await;

        let (a, b) = tokio::join!(
            fx.claims.claim(&event.id, "u1"),
            fx.claims.claim(&event.id, "u1")
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let loser = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(loser, Error::Conflict(_)));

        assert_eq!(users::get_balance(fx.db.pool(), "u1").await.unwrap(), Some(500));
        assert_eq!(ledger::count_by_user(fx.db.pool(), "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_condition_fails_the_claim() {
        let fx = setup().await;
        let event = active_event(&fx, vec![reward(ConditionType::Achievement, 1, 50)]).await;

        let err = fx.claims.claim(&event.id, "u1").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedCondition(_)));

        let (items, _) = fx.claims.list_claims_by_user("u1").await.unwrap();
        assert_eq!(items[0].status, ClaimStatus::Failed);
        assert_eq!(ledger::count_by_user(fx.db.pool(), "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_credit_failure_rolls_claim_back_to_failed() {
        let fx = setup().await;
        // "ghost" has no account row, so the credit step fails after the
        // placeholder is created
        seed_play_minutes(&fx, "ghost", 45).await;
        let event = active_event(&fx, vec![reward(ConditionType::PlayTime, 30, 500)]).await;

        let err = fx.claims.claim(&event.id, "ghost").await.unwrap_err();
        assert!(matches!(err, Error::LedgerFailure(_)));

        let (items, _) = fx.claims.list_claims_by_user("ghost").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, ClaimStatus::Failed);

        // After the account exists the same user can retry successfully
        users::create_user(fx.db.pool(), "ghost", "casper", 0)
            .await
            .unwrap();
        let claim = fx.claims.claim(&event.id, "ghost").await.unwrap();
        assert_eq!(claim.status, ClaimStatus::Approved);
        assert_eq!(
            users::get_balance(fx.db.pool(), "ghost").await.unwrap(),
            Some(500)
        );
    }

    #[tokio::test]
    async fn test_find_and_list_claims() {
        let fx = setup().await;
        seed_play_minutes(&fx, "u1", 45).await;
        let event = active_event(&fx, vec![reward(ConditionType::PlayTime, 30, 500)]).await;

        let claim = fx.claims.claim(&event.id, "u1").await.unwrap();

        let found = fx.claims.find_claim(&claim.id).await.unwrap();
        assert_eq!(found.id, claim.id);

        let (all, total) = fx.claims.list_claims().await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(all[0].event_id, event.id);

        let err = fx.claims.find_claim("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
