//! Reward claim models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a reward claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "PENDING",
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Rejected => "REJECTED",
            ClaimStatus::Completed => "COMPLETED",
            ClaimStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ClaimStatus::Pending),
            "APPROVED" => Some(ClaimStatus::Approved),
            "REJECTED" => Some(ClaimStatus::Rejected),
            "COMPLETED" => Some(ClaimStatus::Completed),
            "FAILED" => Some(ClaimStatus::Failed),
            _ => None,
        }
    }
}

/// A user's request to receive the rewards of an event.
///
/// At most one claim exists per (user, event) pair; the pair is the
/// idempotency key. Claims are never deleted (audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub status: ClaimStatus,
    /// Why the claim was rejected, if it was
    #[serde(default)]
    pub rejection_reason: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
