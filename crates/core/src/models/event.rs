//! Event and reward models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a promotional event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Draft,
    Scheduled,
    Active,
    Ended,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "DRAFT",
            EventStatus::Scheduled => "SCHEDULED",
            EventStatus::Active => "ACTIVE",
            EventStatus::Ended => "ENDED",
            EventStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(EventStatus::Draft),
            "SCHEDULED" => Some(EventStatus::Scheduled),
            "ACTIVE" => Some(EventStatus::Active),
            "ENDED" => Some(EventStatus::Ended),
            "CANCELLED" => Some(EventStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal statuses accept no further changes (no new rewards, no claims)
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Ended | EventStatus::Cancelled)
    }
}

/// Type of predicate a reward condition checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionType {
    Login,
    PlayTime,
    Achievement,
    Level,
    ItemCollect,
    Custom,
}

/// A predicate that must hold for a user before a reward is granted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardCondition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    /// Numeric threshold the user's counter must reach
    pub target_value: i64,
    #[serde(default)]
    pub description: String,
    /// Free-form parameters for condition-specific settings
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A reward attached to an event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub name: String,
    /// Points credited when the condition holds (positive)
    pub points: i64,
    #[serde(default)]
    pub description: String,
    pub condition: RewardCondition,
}

/// A time-bound promotional event carrying rewards
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: EventStatus,
    pub rewards: Vec<Reward>,
    pub created_by: String,
    pub is_active: bool,
}

impl Event {
    /// Whether claims may currently be made against this event
    pub fn is_claimable(&self) -> bool {
        self.is_active && self.status == EventStatus::Active
    }

    /// Sum of all reward points on this event
    pub fn total_points(&self) -> i64 {
        self.rewards.iter().map(|r| r.points).sum()
    }
}
