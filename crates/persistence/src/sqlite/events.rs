//! Event persistence operations
//!
//! Rewards are stored as a JSON array in a TEXT column; the event row
//! is otherwise flat.

use chrono::{DateTime, Utc};
use questline_core::{Error, Event, EventStatus, Result, Reward};
use sqlx::SqlitePool;

/// Event row as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    event_id: String,
    title: String,
    description: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    rewards: String,
    created_by: String,
    is_active: bool,
}

impl EventRow {
    fn into_event(self) -> Result<Event> {
        let status = EventStatus::parse(&self.status)
            .ok_or_else(|| Error::DatabaseError(format!("bad event status: {}", self.status)))?;
        let rewards: Vec<Reward> = serde_json::from_str(&self.rewards)?;

        Ok(Event {
            id: self.event_id,
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            status,
            rewards,
            created_by: self.created_by,
            is_active: self.is_active,
        })
    }
}

const EVENT_COLUMNS: &str = "event_id, title, description, start_date, end_date, status, \
                             rewards, created_by, is_active";

/// Insert a new event
pub async fn insert_event(pool: &SqlitePool, event: &Event) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO events (event_id, title, description, start_date, end_date,
                            status, rewards, created_by, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(event.status.as_str())
    .bind(serde_json::to_string(&event.rewards)?)
    .bind(&event.created_by)
    .bind(event.is_active)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Look up an event by id
pub async fn find_event(pool: &SqlitePool, event_id: &str) -> Result<Option<Event>> {
    let row: Option<EventRow> =
        sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?"))
            .bind(event_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(EventRow::into_event).transpose()
}

/// List all events, newest start date first
pub async fn list_events(pool: &SqlitePool) -> Result<Vec<Event>> {
    let rows: Vec<EventRow> =
        sqlx::query_as(&format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY start_date DESC"))
            .fetch_all(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(EventRow::into_event).collect()
}

/// Replace an event's reward list
pub async fn update_rewards(pool: &SqlitePool, event_id: &str, rewards: &[Reward]) -> Result<()> {
    let result = sqlx::query("UPDATE events SET rewards = ? WHERE event_id = ?")
        .bind(serde_json::to_string(rewards)?)
        .bind(event_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("event {} not found", event_id)));
    }
    Ok(())
}

/// Move an event to a new lifecycle status
pub async fn update_status(pool: &SqlitePool, event_id: &str, status: EventStatus) -> Result<()> {
    let result = sqlx::query("UPDATE events SET status = ? WHERE event_id = ?")
        .bind(status.as_str())
        .bind(event_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("event {} not found", event_id)));
    }
    Ok(())
}
