//! User account model

use serde::{Deserialize, Serialize};

/// A user account as seen by the reward core.
///
/// The balance is mutated only through the point ledger's credit path
/// and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub balance: i64,
}
