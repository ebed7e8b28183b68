//! Point ledger persistence operations
//!
//! The balance update and the log append always happen on one
//! connection inside one transaction, and the balance is written with a
//! single server-side `balance = balance + ?` so two concurrent credits
//! for the same user can never both log a stale value.

use chrono::{DateTime, Utc};
use questline_core::{Error, LedgerEntry, LedgerEntryType, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Ledger row as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    user_id: String,
    amount: i64,
    entry_type: String,
    event_id: Option<String>,
    balance_after: i64,
    timestamp: DateTime<Utc>,
    description: String,
}

impl LedgerRow {
    fn into_entry(self) -> Result<LedgerEntry> {
        let entry_type = LedgerEntryType::parse(&self.entry_type)
            .ok_or_else(|| Error::DatabaseError(format!("bad entry type: {}", self.entry_type)))?;

        Ok(LedgerEntry {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            entry_type,
            event_id: self.event_id,
            balance_after: self.balance_after,
            timestamp: self.timestamp,
            description: self.description,
        })
    }
}

const LEDGER_COLUMNS: &str =
    "id, user_id, amount, entry_type, event_id, balance_after, timestamp, description";

/// Apply a balance delta and append the matching log entry on the
/// caller's transaction.
///
/// The returned entry carries the server-confirmed `balance_after`.
/// Fails with `NotFound` for a missing user and `InsufficientBalance`
/// when a debit would push the balance negative; either way nothing is
/// written.
pub async fn credit_in_tx(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: i64,
    entry_type: LedgerEntryType,
    event_id: Option<&str>,
    description: &str,
) -> Result<LedgerEntry> {
    let updated: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE users SET balance = balance + ?1
        WHERE user_id = ?2 AND balance + ?1 >= 0
        RETURNING balance
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let balance_after = match updated {
        Some((balance,)) => balance,
        None => {
            // Distinguish "no such user" from "would go negative"
            let current: Option<(i64,)> =
                sqlx::query_as("SELECT balance FROM users WHERE user_id = ?")
                    .bind(user_id)
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| Error::DatabaseError(e.to_string()))?;

            return match current {
                Some((available,)) => Err(Error::InsufficientBalance {
                    required: -amount,
                    available,
                }),
                None => Err(Error::NotFound(format!("user {} not found", user_id))),
            };
        }
    };

    let timestamp = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO point_transactions
            (user_id, amount, entry_type, event_id, balance_after, timestamp, description)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(entry_type.as_str())
    .bind(event_id)
    .bind(balance_after)
    .bind(timestamp)
    .bind(description)
    .execute(&mut *conn)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(LedgerEntry {
        id: result.last_insert_rowid(),
        user_id: user_id.to_string(),
        amount,
        entry_type,
        event_id: event_id.map(str::to_string),
        balance_after,
        timestamp,
        description: description.to_string(),
    })
}

/// Credit-and-log as a standalone transaction
pub async fn credit(
    pool: &SqlitePool,
    user_id: &str,
    amount: i64,
    entry_type: LedgerEntryType,
    event_id: Option<&str>,
    description: &str,
) -> Result<LedgerEntry> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    let entry = credit_in_tx(&mut tx, user_id, amount, entry_type, event_id, description).await?;

    tx.commit()
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(entry)
}

/// List a user's ledger entries, newest first
pub async fn list_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<LedgerEntry>> {
    let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
        "SELECT {LEDGER_COLUMNS} FROM point_transactions \
         WHERE user_id = ? ORDER BY timestamp DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(LedgerRow::into_entry).collect()
}

/// Number of ledger entries for a user
pub async fn count_by_user(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM point_transactions WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0)
}
