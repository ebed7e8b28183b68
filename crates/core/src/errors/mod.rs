//! Error types and Result alias for the Questline service

use thiserror::Error;

/// Main error type for the Questline service
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Reward condition not met: {0}")]
    ConditionUnmet(String),

    #[error("Unsupported condition type: {0}")]
    UnsupportedCondition(String),

    #[error("Ledger credit failed: {0}")]
    LedgerFailure(String),

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
