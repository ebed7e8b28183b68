//! Questline Engine - Reward claim pipeline, point ledger, and
//! play-time tracking services

pub mod claim;
pub mod event;
pub mod ledger;
pub mod playtime;
pub mod validator;

pub use claim::ClaimService;
pub use event::EventService;
pub use ledger::PointLedger;
pub use playtime::{PlayTimeTracker, ReconcileWorker};
pub use validator::{ConditionValidator, Verdict};
