//! Data models for Questline entities

mod claim;
mod event;
mod ledger;
mod user;

pub use claim::*;
pub use event::*;
pub use ledger::*;
pub use user::*;
