//! SQLite database management

pub mod claims;
mod connection;
pub mod events;
pub mod ledger;
pub mod users;

pub use connection::Database;
