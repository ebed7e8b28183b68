//! Claim persistence operations
//!
//! The unique index on (user_id, event_id) is the authoritative
//! once-per-user-per-event guard; `insert_pending` surfaces a violation
//! as `Conflict`.

use chrono::{DateTime, Utc};
use questline_core::{Claim, ClaimStatus, Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

/// Claim row as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct ClaimRow {
    claim_id: String,
    user_id: String,
    event_id: String,
    status: String,
    rejection_reason: String,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ClaimRow {
    fn into_claim(self) -> Result<Claim> {
        let status = ClaimStatus::parse(&self.status)
            .ok_or_else(|| Error::DatabaseError(format!("bad claim status: {}", self.status)))?;

        Ok(Claim {
            id: self.claim_id,
            user_id: self.user_id,
            event_id: self.event_id,
            status,
            rejection_reason: self.rejection_reason,
            approved_at: self.approved_at,
            created_at: self.created_at,
        })
    }
}

const CLAIM_COLUMNS: &str =
    "claim_id, user_id, event_id, status, rejection_reason, approved_at, created_at";

/// Insert a PENDING placeholder for (user, event).
///
/// A second insert for the same pair hits the unique index and is
/// surfaced as `Conflict` - this closes the check-then-act race.
pub async fn insert_pending(
    pool: &SqlitePool,
    claim_id: &str,
    user_id: &str,
    event_id: &str,
    created_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO claims (claim_id, user_id, event_id, status, created_at)
        VALUES (?, ?, ?, 'PENDING', ?)
        "#,
    )
    .bind(claim_id)
    .bind(user_id)
    .bind(event_id)
    .bind(created_at)
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict("reward already requested".to_string())
        }
        _ => Error::DatabaseError(e.to_string()),
    })?;

    Ok(())
}

/// Look up a claim by id
pub async fn find_by_id(pool: &SqlitePool, claim_id: &str) -> Result<Option<Claim>> {
    let row: Option<ClaimRow> =
        sqlx::query_as(&format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = ?"))
            .bind(claim_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(ClaimRow::into_claim).transpose()
}

/// Advisory duplicate check for the common fast path.
///
/// Only live claims count; rejected and failed attempts do not block a
/// retry.
pub async fn find_live_by_user_and_event(
    pool: &SqlitePool,
    user_id: &str,
    event_id: &str,
) -> Result<Option<Claim>> {
    let row: Option<ClaimRow> = sqlx::query_as(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims WHERE user_id = ? AND event_id = ? \
         AND status IN ('PENDING', 'APPROVED', 'COMPLETED')"
    ))
    .bind(user_id)
    .bind(event_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(ClaimRow::into_claim).transpose()
}

/// List all claims, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Claim>> {
    let rows: Vec<ClaimRow> =
        sqlx::query_as(&format!("SELECT {CLAIM_COLUMNS} FROM claims ORDER BY created_at DESC"))
            .fetch_all(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(ClaimRow::into_claim).collect()
}

/// Total number of claims
pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM claims")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0)
}

/// List a user's claims, newest first
pub async fn list_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Claim>> {
    let rows: Vec<ClaimRow> = sqlx::query_as(&format!(
        "SELECT {CLAIM_COLUMNS} FROM claims WHERE user_id = ? ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(ClaimRow::into_claim).collect()
}

/// Number of claims for a user
pub async fn count_by_user(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM claims WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.0)
}

/// Mark a claim APPROVED inside the caller's transaction, so approval
/// commits or rolls back together with the ledger credit
pub async fn mark_approved(
    conn: &mut SqliteConnection,
    claim_id: &str,
    approved_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE claims SET status = 'APPROVED', approved_at = ? WHERE claim_id = ?")
        .bind(approved_at)
        .bind(claim_id)
        .execute(conn)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Mark a claim REJECTED with the failing condition's reason
pub async fn mark_rejected(pool: &SqlitePool, claim_id: &str, reason: &str) -> Result<()> {
    sqlx::query("UPDATE claims SET status = 'REJECTED', rejection_reason = ? WHERE claim_id = ?")
        .bind(reason)
        .bind(claim_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Mark a claim FAILED (credit could not be applied; safe to retry after
/// operator review)
pub async fn mark_failed(pool: &SqlitePool, claim_id: &str, reason: &str) -> Result<()> {
    sqlx::query("UPDATE claims SET status = 'FAILED', rejection_reason = ? WHERE claim_id = ?")
        .bind(reason)
        .bind(claim_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_second_pending_insert_conflicts() {
        let db = Database::connect_in_memory().await.unwrap();
        let now = Utc::now();

        insert_pending(db.pool(), "c1", "u1", "e1", now).await.unwrap();
        let err = insert_pending(db.pool(), "c2", "u1", "e1", now)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Same user, different event is fine
        insert_pending(db.pool(), "c3", "u1", "e2", now).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_claim_does_not_block_retry() {
        let db = Database::connect_in_memory().await.unwrap();
        let now = Utc::now();

        insert_pending(db.pool(), "c1", "u1", "e1", now).await.unwrap();
        mark_failed(db.pool(), "c1", "credit failed").await.unwrap();

        assert!(find_live_by_user_and_event(db.pool(), "u1", "e1")
            .await
            .unwrap()
            .is_none());

        // Retry inserts a fresh placeholder; the failed row stays for audit
        insert_pending(db.pool(), "c2", "u1", "e1", now).await.unwrap();
        assert_eq!(count_by_user(db.pool(), "u1").await.unwrap(), 2);

        let failed = find_by_id(db.pool(), "c1").await.unwrap().unwrap();
        assert_eq!(failed.status, ClaimStatus::Failed);
        assert_eq!(failed.rejection_reason, "credit failed");
    }

    #[tokio::test]
    async fn test_mark_approved_sets_timestamp() {
        let db = Database::connect_in_memory().await.unwrap();
        let now = Utc::now();

        insert_pending(db.pool(), "c1", "u1", "e1", now).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        mark_approved(&mut tx, "c1", now).await.unwrap();
        tx.commit().await.unwrap();

        let claim = find_by_id(db.pool(), "c1").await.unwrap().unwrap();
        assert_eq!(claim.status, ClaimStatus::Approved);
        assert_eq!(claim.approved_at, Some(now));
    }
}
