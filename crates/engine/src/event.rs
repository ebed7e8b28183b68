//! Event lifecycle service

use chrono::{DateTime, Utc};
use questline_core::{Error, Event, EventStatus, Result, Reward};
use questline_persistence::sqlite::events;
use questline_persistence::Database;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Parameters for creating a new event
#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_by: String,
    pub rewards: Vec<Reward>,
}

/// Manages promotional events and their reward lists
#[derive(Clone)]
pub struct EventService {
    db: Arc<Database>,
}

impl EventService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a new event in DRAFT status
    pub async fn create_event(&self, params: CreateEvent) -> Result<Event> {
        if params.start_date > params.end_date {
            return Err(Error::InvalidState(
                "start date must be before end date".to_string(),
            ));
        }

        let event = Event {
            id: Uuid::new_v4().to_string(),
            title: params.title,
            description: params.description,
            start_date: params.start_date,
            end_date: params.end_date,
            status: EventStatus::Draft,
            rewards: params.rewards,
            created_by: params.created_by,
            is_active: true,
        };

        events::insert_event(self.db.pool(), &event).await?;
        info!("Created event {} ({})", event.id, event.title);
        Ok(event)
    }

    /// Append a reward to an event's reward list
    pub async fn add_reward(&self, event_id: &str, reward: Reward) -> Result<Event> {
        let mut event = self.find_event(event_id).await?;

        if event.status.is_terminal() {
            return Err(Error::InvalidState(
                "cannot add rewards to ended or cancelled events".to_string(),
            ));
        }

        event.rewards.push(reward);
        events::update_rewards(self.db.pool(), event_id, &event.rewards).await?;

        info!("Added reward to event {}", event_id);
        Ok(event)
    }

    /// Open an event for claims
    pub async fn activate(&self, event_id: &str) -> Result<()> {
        let event = self.find_event(event_id).await?;
        if event.status.is_terminal() {
            return Err(Error::InvalidState(
                "cannot activate an ended or cancelled event".to_string(),
            ));
        }

        events::update_status(self.db.pool(), event_id, EventStatus::Active).await
    }

    /// Look up an event, failing if it does not exist
    pub async fn find_event(&self, event_id: &str) -> Result<Event> {
        events::find_event(self.db.pool(), event_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("event {} not found", event_id)))
    }

    /// All events, newest start date first
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        events::list_events(self.db.pool()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use questline_core::{ConditionType, RewardCondition};

    fn sample_reward(points: i64) -> Reward {
        Reward {
            name: "starter pack".to_string(),
            points,
            description: String::new(),
            condition: RewardCondition {
                condition_type: ConditionType::Login,
                target_value: 1,
                description: String::new(),
                params: serde_json::Value::Null,
            },
        }
    }

    fn sample_params() -> CreateEvent {
        CreateEvent {
            title: "Launch Week".to_string(),
            description: "launch celebration".to_string(),
            start_date: Utc::now(),
            end_date: Utc::now() + Duration::days(7),
            created_by: "admin".to_string(),
            rewards: vec![],
        }
    }

    async fn service() -> EventService {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        EventService::new(db)
    }

    #[tokio::test]
    async fn test_create_and_find_event() {
        let svc = service().await;
        let created = svc.create_event(sample_params()).await.unwrap();
        assert_eq!(created.status, EventStatus::Draft);

        let found = svc.find_event(&created.id).await.unwrap();
        assert_eq!(found.title, "Launch Week");
        assert!(found.rewards.is_empty());
    }

    #[tokio::test]
    async fn test_create_event_rejects_inverted_dates() {
        let svc = service().await;
        let mut params = sample_params();
        params.end_date = params.start_date - Duration::days(1);

        let err = svc.create_event(params).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_add_reward_and_activate() {
        let svc = service().await;
        let event = svc.create_event(sample_params()).await.unwrap();

        svc.add_reward(&event.id, sample_reward(100)).await.unwrap();
        svc.activate(&event.id).await.unwrap();

        let found = svc.find_event(&event.id).await.unwrap();
        assert_eq!(found.status, EventStatus::Active);
        assert_eq!(found.rewards.len(), 1);
        assert_eq!(found.total_points(), 100);
    }

    #[tokio::test]
    async fn test_add_reward_to_ended_event_fails() {
        let svc = service().await;
        let event = svc.create_event(sample_params()).await.unwrap();
        events::update_status(svc.db.pool(), &event.id, EventStatus::Ended)
            .await
            .unwrap();

        let err = svc.add_reward(&event.id, sample_reward(100)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_find_missing_event() {
        let svc = service().await;
        let err = svc.find_event("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
