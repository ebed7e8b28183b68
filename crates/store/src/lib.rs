//! Questline Store - Shared counter/session store and distributed lock
//!
//! The counter store is the single shared coordination point between
//! stateless service instances: play sessions, durable counters, and the
//! reconciliation mutex all live here.

pub mod keys;
pub mod lock;
pub mod memory;
mod store;

pub use lock::StoreLock;
pub use memory::MemoryStore;
pub use store::{CounterStore, Ttl};
