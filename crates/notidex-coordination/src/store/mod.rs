//! Lock store abstraction and backends

mod memory;

pub use memory::MemoryLockStore;

use async_trait::async_trait;

use crate::model::{LockRecord, Sequencer};

/// Durable, strongly-consistent key/value store over lock records.
///
/// Any backend offering linearizable reads and an atomic conditional write
/// keyed by equality of prior field values can implement this. All
/// cross-worker coordination goes through `compare_and_swap` and `release`;
/// there is no unconditional write, so no code path can clobber a lock it
/// does not hold.
///
/// Backend failures unrelated to a write precondition propagate as
/// `anyhow::Error`, uninterpreted.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Strongly-consistent read of the record for `key`. Must never return a
    /// value stale relative to the most recent successful conditional write.
    async fn read(&self, key: &str) -> anyhow::Result<Option<LockRecord>>;

    /// Atomically write `{sequencer: new, locked: true, owner}` iff no record
    /// exists and `expected` is `None`, or the current record is unlocked and
    /// carries exactly `expected`.
    ///
    /// Returns `false` with no side effect when the precondition does not
    /// hold; this is the only expected, non-exceptional failure mode.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Sequencer>,
        new: &Sequencer,
        owner: &str,
    ) -> anyhow::Result<bool>;

    /// Conditionally unlock `key`, leaving `to` behind as the sequencer.
    ///
    /// The precondition is that the record is currently locked for `held` by
    /// `owner`. On success the record becomes `{sequencer: to, locked:
    /// false}`; `to = None` removes the record entirely, restoring the
    /// never-seen state. Returns `false` with no side effect when the
    /// precondition does not hold.
    async fn release(
        &self,
        key: &str,
        held: &Sequencer,
        owner: &str,
        to: Option<&Sequencer>,
    ) -> anyhow::Result<bool>;
}
