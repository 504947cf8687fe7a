//! Notification-ordering coordinator
//!
//! Drives a retry loop around the lock store: discard stale or duplicate
//! notifications, acquire exclusive access for the object's key, invoke the
//! processing callback, and resolve lock state on success or failure. All
//! cross-worker coordination is mediated by the store's conditional writes;
//! the coordinator holds no locks of its own.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use notidex_common::NotidexError;

use crate::metrics;
use crate::model::{LockRecord, Notification, Outcome, Sequencer};
use crate::store::LockStore;

/// Coordinator tuning knobs
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// When false, notifications are processed directly, with no staleness
    /// check and no locking
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lower bound of the jittered backoff pause
    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,
    /// Upper bound of the jittered backoff pause
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Overall deadline for acquiring the key. `None` retries indefinitely,
    /// so under sustained contention a worker can wait forever; mutual
    /// exclusion and sequencer monotonicity hold either way.
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

fn default_backoff_min_ms() -> u64 {
    10
}

fn default_backoff_max_ms() -> u64 {
    1000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            acquire_timeout_ms: None,
        }
    }
}

/// State of a coordination key as observed by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyState {
    /// No record exists; older than any sequencer
    Unseen,
    /// Unlocked, carrying the last accepted sequencer
    Unlocked(Sequencer),
    /// Locked by another in-flight operation. A liveness condition, not an
    /// error; resolved by backoff.
    Contended,
}

impl KeyState {
    fn from_record(record: Option<LockRecord>) -> Self {
        match record {
            None => KeyState::Unseen,
            Some(record) if record.locked => KeyState::Contended,
            Some(record) => KeyState::Unlocked(record.sequencer),
        }
    }
}

/// Serializes notification processing per coordination key and discards
/// stale deliveries.
///
/// Workers on any number of processes may run coordinators against the same
/// store; the only shared state is the store itself.
pub struct Coordinator {
    store: Arc<dyn LockStore>,
    config: CoordinatorConfig,
    worker_id: String,
}

impl Coordinator {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self::with_config(store, CoordinatorConfig::default())
    }

    pub fn with_config(store: Arc<dyn LockStore>, config: CoordinatorConfig) -> Self {
        Self {
            store,
            config,
            worker_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Replace the autogenerated worker id. Recorded as the lock owner, for
    /// diagnostics and the release precondition.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Handle one notification, invoking `processing` only if the
    /// notification is not stale and this worker wins exclusive access for
    /// the key.
    ///
    /// Returns `Outcome::Stale` without side effects when the sequencer is
    /// not strictly newer than the last accepted one (re-delivery of the same
    /// sequencer counts as stale). On processing failure the lock is released
    /// and the sequencer rolled back to its last durable value before the
    /// error is propagated, so a retried delivery of the same notification
    /// can still make progress.
    ///
    /// `processing` must be idempotent with respect to its external effects:
    /// a crash between rollback and notification acknowledgement can lead to
    /// the same object version being processed more than once.
    pub async fn handle_notification<F, Fut, T>(
        &self,
        notification: &Notification,
        processing: F,
    ) -> Result<Outcome<T>, NotidexError>
    where
        F: FnOnce(&Notification) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let key = notification.coordination_key();

        if !self.config.enabled {
            debug!(key = %key, "Coordination disabled, processing without staleness check");
            let value = processing(notification)
                .await
                .map_err(|source| NotidexError::Processing {
                    key: key.clone(),
                    source,
                })?;
            return Ok(Outcome::Processed(value));
        }

        let incoming = &notification.sequencer;
        let deadline = self
            .config
            .acquire_timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        // Acquisition loop. Ends with the key locked for `incoming`, carrying
        // the sequencer that was durable before this attempt, or returns
        // early for stale notifications.
        let previous = loop {
            let record = self.store.read(&key).await.map_err(NotidexError::Store)?;

            let previous = match KeyState::from_record(record) {
                KeyState::Contended => {
                    metrics::record_contention();
                    debug!(key = %key, "Key locked by another worker, backing off");
                    self.backoff(&key, deadline).await?;
                    continue;
                }
                KeyState::Unseen => None,
                KeyState::Unlocked(old) => {
                    if *incoming <= old {
                        info!(
                            key = %key,
                            sequencer = %incoming,
                            current = %old,
                            "Stale or duplicate notification, skipping"
                        );
                        metrics::record_stale();
                        return Ok(Outcome::Stale);
                    }
                    Some(old)
                }
            };

            debug!(key = %key, from = ?previous, to = %incoming, "Attempting lock acquisition");
            if self
                .store
                .compare_and_swap(&key, previous.as_ref(), incoming, &self.worker_id)
                .await
                .map_err(NotidexError::Store)?
            {
                break previous;
            }

            // Lost the race. Re-read and re-evaluate staleness rather than
            // retrying the same swap; another worker may have advanced the
            // key past this notification already.
            metrics::record_cas_conflict();
            debug!(key = %key, sequencer = %incoming, "Lost compare-and-swap race, backing off");
            self.backoff(&key, deadline).await?;
        };

        info!(key = %key, sequencer = %incoming, owner = %self.worker_id, "Locked");

        match processing(notification).await {
            Ok(value) => {
                self.release(&key, incoming, Some(incoming)).await?;
                info!(key = %key, sequencer = %incoming, "Processed and unlocked");
                metrics::record_processed();
                Ok(Outcome::Processed(value))
            }
            Err(source) => {
                // Roll back to the last durably accepted sequencer. Keeping
                // the new one while unlocking would make a retried delivery
                // of this same notification look stale even though it was
                // never processed.
                self.release(&key, incoming, previous.as_ref()).await?;
                info!(
                    key = %key,
                    rolled_back_to = ?previous,
                    "Processing failed, unlocked and rolled back"
                );
                metrics::record_rollback();
                Err(NotidexError::Processing { key, source })
            }
        }
    }

    async fn release(
        &self,
        key: &str,
        held: &Sequencer,
        to: Option<&Sequencer>,
    ) -> Result<(), NotidexError> {
        let released = self
            .store
            .release(key, held, &self.worker_id, to)
            .await
            .map_err(NotidexError::Store)?;
        if !released {
            // The conditional write found the lock no longer ours. Nothing
            // was overwritten; whoever holds the key now owns its state.
            warn!(key = %key, sequencer = %held, "Release precondition failed, lock not held any more");
        }
        Ok(())
    }

    async fn backoff(&self, key: &str, deadline: Option<Instant>) -> Result<(), NotidexError> {
        if let Some(deadline) = deadline
            && Instant::now() >= deadline
        {
            return Err(NotidexError::AcquireTimeout(key.to_string()));
        }

        let delay = self.backoff_delay();
        debug!(delay_ms = delay.as_millis() as u64, "Backoff");
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Uniform random pause in `[backoff_min_ms, backoff_max_ms]`, so
    /// competing workers do not retry in lockstep
    fn backoff_delay(&self) -> Duration {
        let min = self.config.backoff_min_ms.min(self.config.backoff_max_ms);
        let span = self.config.backoff_max_ms.saturating_sub(min);
        let jitter = (rand::random::<f64>() * span as f64) as u64;
        Duration::from_millis(min + jitter)
    }
}
