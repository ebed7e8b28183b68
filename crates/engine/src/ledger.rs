//! Point ledger service
//!
//! Thin service over the ledger persistence: every balance change goes
//! through `credit`/`credit_in_tx` so the transaction log and the
//! stored balance can never drift apart.

use questline_core::{LedgerEntry, LedgerEntryType, Result};
use questline_persistence::sqlite::ledger;
use questline_persistence::Database;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::info;

/// Append-only point ledger plus the user's current balance
#[derive(Clone)]
pub struct PointLedger {
    db: Arc<Database>,
}

impl PointLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Atomically apply a signed amount to the user's balance and append
    /// the matching ledger entry (own transaction)
    pub async fn credit(
        &self,
        user_id: &str,
        amount: i64,
        entry_type: LedgerEntryType,
        event_id: Option<&str>,
        description: &str,
    ) -> Result<LedgerEntry> {
        let entry = ledger::credit(
            self.db.pool(),
            user_id,
            amount,
            entry_type,
            event_id,
            description,
        )
        .await?;

        info!(
            "Credited {} points to user {} (balance: {})",
            amount, user_id, entry.balance_after
        );
        Ok(entry)
    }

    /// Same as [`credit`](Self::credit) but on the caller's transaction,
    /// for callers that need the credit to commit together with their
    /// own writes
    pub async fn credit_in_tx(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        amount: i64,
        entry_type: LedgerEntryType,
        event_id: Option<&str>,
        description: &str,
    ) -> Result<LedgerEntry> {
        ledger::credit_in_tx(conn, user_id, amount, entry_type, event_id, description).await
    }

    /// A user's transaction history, newest first, with the total count
    pub async fn history(&self, user_id: &str) -> Result<(Vec<LedgerEntry>, i64)> {
        let entries = ledger::list_by_user(self.db.pool(), user_id).await?;
        let total = ledger::count_by_user(self.db.pool(), user_id).await?;
        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_persistence::sqlite::users;

    async fn setup() -> (Arc<Database>, PointLedger) {
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        users::create_user(db.pool(), "u1", "alice", 0).await.unwrap();
        (db.clone(), PointLedger::new(db))
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (_db, ledger) = setup().await;

        ledger
            .credit("u1", 100, LedgerEntryType::AdminGrant, None, "first")
            .await
            .unwrap();
        ledger
            .credit("u1", 200, LedgerEntryType::AdminGrant, None, "second")
            .await
            .unwrap();

        let (entries, total) = ledger.history("u1").await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[0].balance_after, 300);
        assert_eq!(entries[1].description, "first");
    }

    #[tokio::test]
    async fn test_concurrent_credits_serialize() {
        let (db, ledger) = setup().await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .credit("u1", 10, LedgerEntryType::AdminGrant, None, "")
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(users::get_balance(db.pool(), "u1").await.unwrap(), Some(80));

        // No lost updates: every balance_after is distinct and replay
        // from zero matches the final balance
        let (entries, _) = ledger.history("u1").await.unwrap();
        let mut balances: Vec<i64> = entries.iter().map(|e| e.balance_after).collect();
        balances.sort_unstable();
        balances.dedup();
        assert_eq!(balances.len(), 8);

        let replayed: i64 = entries.iter().map(|e| e.amount).sum();
        assert_eq!(replayed, 80);
    }
}
