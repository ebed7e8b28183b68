//! User account persistence operations

use chrono::Utc;
use questline_core::{Error, Result, User};
use sqlx::SqlitePool;

/// Create a user account with a starting balance
pub async fn create_user(
    pool: &SqlitePool,
    user_id: &str,
    username: &str,
    balance: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (user_id, username, balance, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(balance)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(format!("user {} already exists", user_id))
        }
        _ => Error::DatabaseError(e.to_string()),
    })?;

    Ok(())
}

/// Look up a user by id
pub async fn find_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let row: Option<(String, String, i64)> =
        sqlx::query_as("SELECT user_id, username, balance FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(|(id, username, balance)| User {
        id,
        username,
        balance,
    }))
}

/// Current balance for a user
pub async fn get_balance(pool: &SqlitePool, user_id: &str) -> Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT balance FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(|r| r.0))
}
