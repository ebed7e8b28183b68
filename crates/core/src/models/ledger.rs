//! Point ledger models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a balance-affecting transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    /// Points granted for an approved event claim
    EventReward,
    /// Points granted directly by an operator
    AdminGrant,
    /// Points spent (negative amount)
    Redemption,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::EventReward => "EVENT_REWARD",
            LedgerEntryType::AdminGrant => "ADMIN_GRANT",
            LedgerEntryType::Redemption => "REDEMPTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EVENT_REWARD" => Some(LedgerEntryType::EventReward),
            "ADMIN_GRANT" => Some(LedgerEntryType::AdminGrant),
            "REDEMPTION" => Some(LedgerEntryType::Redemption),
            _ => None,
        }
    }
}

/// One append-only entry in a user's point transaction log.
///
/// Replaying a user's entries oldest-first, starting from zero, must
/// reproduce the latest `balance_after` exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: String,
    /// Signed point delta (+credit / -debit)
    pub amount: i64,
    pub entry_type: LedgerEntryType,
    /// Related event, for EVENT_REWARD entries
    pub event_id: Option<String>,
    /// Balance after this transaction was applied
    pub balance_after: i64,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}
