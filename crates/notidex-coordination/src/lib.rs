//! Notidex Coordination - sequencer-based optimistic locking for
//! object-storage notifications
//!
//! Notifications for the same logical object can arrive out of order,
//! duplicated, or concurrently from multiple workers. This crate provides:
//! - Lock record and notification data model
//! - `LockStore` trait over any strongly-consistent store with an atomic
//!   conditional write, plus an in-memory implementation
//! - `Coordinator`, the retry/rollback loop that discards stale
//!   notifications and serializes processing per key

pub mod coordinator;
pub mod metrics;
pub mod model;
pub mod store;

// Re-export commonly used types
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use model::{LockRecord, Notification, Outcome, Sequencer};
pub use store::{LockStore, MemoryLockStore};
