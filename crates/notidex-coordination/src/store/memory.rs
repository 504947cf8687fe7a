// In-memory lock store
// Atomicity per key comes from the exclusivity of the map's entry API

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::model::{LockRecord, Sequencer};
use crate::store::LockStore;

/// In-memory `LockStore` backed by a `DashMap`.
///
/// Suitable for single-process deployments and tests. Every check-and-mutate
/// runs while holding the entry for the key, which gives the same
/// single-writer guarantee a conditional write provides on a real backend.
pub struct MemoryLockStore {
    records: DashMap<String, LockRecord>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of records ever created and still retained
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn read(&self, key: &str) -> anyhow::Result<Option<LockRecord>> {
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Sequencer>,
        new: &Sequencer,
        owner: &str,
    ) -> anyhow::Result<bool> {
        match self.records.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                if expected.is_some() {
                    return Ok(false);
                }
                slot.insert(LockRecord::locked_for(key, new.clone(), owner));
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get();
                if record.locked || Some(&record.sequencer) != expected {
                    return Ok(false);
                }
                slot.insert(LockRecord::locked_for(key, new.clone(), owner));
            }
        }

        debug!(key = %key, sequencer = %new, owner = %owner, "Lock acquired");
        Ok(true)
    }

    async fn release(
        &self,
        key: &str,
        held: &Sequencer,
        owner: &str,
        to: Option<&Sequencer>,
    ) -> anyhow::Result<bool> {
        match self.records.entry(key.to_string()) {
            Entry::Vacant(_) => Ok(false),
            Entry::Occupied(mut slot) => {
                let record = slot.get();
                if !record.locked || &record.sequencer != held || record.owner != owner {
                    return Ok(false);
                }
                match to {
                    Some(sequencer) => {
                        slot.insert(LockRecord::unlocked_at(key, sequencer.clone(), owner));
                    }
                    None => {
                        slot.remove();
                    }
                }
                debug!(key = %key, owner = %owner, rolled_back_to = ?to, "Lock released");
                Ok(true)
            }
        }
    }
}
