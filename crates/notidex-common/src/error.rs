//! Error types for Notidex
//!
//! `NotidexError` is the error surface of the coordination core. Lock
//! contention and lost compare-and-swap races are not errors; they are
//! resolved internally by backoff and never reach this type.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum NotidexError {
    /// The acquisition deadline elapsed while the key was contended.
    #[error("timed out waiting to acquire coordination key '{0}'")]
    AcquireTimeout(String),

    /// A lock store backend failure unrelated to any write precondition.
    /// Propagated uninterpreted.
    #[error("lock store error: {0}")]
    Store(#[source] anyhow::Error),

    /// The processing callback failed. The lock has already been released
    /// and the sequencer rolled back to its last durable value.
    #[error("processing failed for '{key}': {source}")]
    Processing {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl NotidexError {
    /// True when the error is the acquisition-deadline case.
    pub fn is_timeout(&self) -> bool {
        matches!(self, NotidexError::AcquireTimeout(_))
    }
}
