//! Questline Persistence - Durable storage for users, events, claims,
//! and the point ledger

pub mod sqlite;

pub use sqlite::Database;
