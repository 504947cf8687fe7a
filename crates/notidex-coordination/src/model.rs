//! Coordination data model

use serde::{Deserialize, Serialize};

use notidex_common::{VERSION_SEPARATOR, current_timestamp_millis};

/// Opaque, totally-ordered token attached to each notification, indicating
/// its relative recency.
///
/// Ordering is byte-wise over the underlying string. All sequencers seen for
/// a given key must be comparison-compatible encodings of a monotonically
/// increasing value (fixed-width or zero-padded); mixed-width tokens break
/// the ordering and are not detected here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequencer(String);

impl Sequencer {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Sequencer {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for Sequencer {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Display for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lock record, one per coordination key
///
/// Created implicitly by the first successful acquisition for a key and
/// mutated only through the store's conditional writes. `owner` and
/// `updated_at` are diagnostics; correctness rests on `sequencer` and
/// `locked` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    /// The coordination key, immutable once created
    pub key: String,
    /// Most recently accepted (or in-flight) notification version
    pub sequencer: Sequencer,
    /// True while a worker holds exclusive access
    pub locked: bool,
    /// Identifier of the holder
    pub owner: String,
    /// Last mutation timestamp (Unix millis)
    pub updated_at: i64,
}

impl LockRecord {
    /// A record locked for `sequencer` by `owner`
    pub fn locked_for(
        key: impl Into<String>,
        sequencer: Sequencer,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            sequencer,
            locked: true,
            owner: owner.into(),
            updated_at: current_timestamp_millis(),
        }
    }

    /// An unlocked record carrying `sequencer`
    pub fn unlocked_at(
        key: impl Into<String>,
        sequencer: Sequencer,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            sequencer,
            locked: false,
            owner: owner.into(),
            updated_at: current_timestamp_millis(),
        }
    }

    pub fn is_held_by(&self, owner: &str) -> bool {
        self.locked && self.owner == owner
    }
}

/// An object-storage write notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Bucket the write happened in
    pub bucket: String,
    /// Object key within the bucket
    pub object_key: String,
    /// Object version, when the bucket is versioned
    #[serde(default)]
    pub version_id: Option<String>,
    /// Ordering token for this write
    pub sequencer: Sequencer,
    /// Opaque payload passed through to the processing callback
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn new(
        bucket: impl Into<String>,
        object_key: impl Into<String>,
        sequencer: impl Into<Sequencer>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
            version_id: None,
            sequencer: sequencer.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Key under which lock and sequencer state is tracked for this object:
    /// `bucket/object-key#version-id`, with an empty version qualifier for
    /// unversioned buckets.
    pub fn coordination_key(&self) -> String {
        format!(
            "{}/{}{}{}",
            self.bucket,
            self.object_key,
            VERSION_SEPARATOR,
            self.version_id.as_deref().unwrap_or("")
        )
    }
}

/// Outcome of handling a single notification
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The sequencer was not strictly newer than the last accepted one for
    /// its key; processing was not invoked.
    Stale,
    /// The notification was processed; carries the processing result.
    Processed(T),
}

impl<T> Outcome<T> {
    pub fn is_stale(&self) -> bool {
        matches!(self, Outcome::Stale)
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, Outcome::Processed(_))
    }

    /// The processing result, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Stale => None,
            Outcome::Processed(value) => Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequencer_ordering_is_bytewise() {
        assert!(Sequencer::new("05") < Sequencer::new("10"));
        assert!(Sequencer::new("006408F5B89B101BAC") < Sequencer::new("006408F5B89B102BAC"));
        assert_eq!(Sequencer::new("10"), Sequencer::new("10"));
        // Mixed-width tokens are where byte-wise ordering diverges from
        // numeric ordering; callers must keep widths consistent per key.
        assert!(Sequencer::new("9") > Sequencer::new("10"));
    }

    #[test]
    fn test_coordination_key_without_version() {
        let n = Notification::new("inputs", "photos/cat.jpg", "10");
        assert_eq!(n.coordination_key(), "inputs/photos/cat.jpg#");
    }

    #[test]
    fn test_coordination_key_with_version() {
        let n = Notification::new("inputs", "photos/cat.jpg", "10").with_version_id("v2");
        assert_eq!(n.coordination_key(), "inputs/photos/cat.jpg#v2");
    }

    #[test]
    fn test_notification_deserializes_with_defaults() {
        let n: Notification = serde_json::from_str(
            r#"{"bucket": "inputs", "object_key": "a.jpg", "sequencer": "0A"}"#,
        )
        .unwrap();
        assert_eq!(n.version_id, None);
        assert_eq!(n.payload, serde_json::Value::Null);
        assert_eq!(n.sequencer, Sequencer::new("0A"));
    }

    #[test]
    fn test_outcome_helpers() {
        let stale: Outcome<i32> = Outcome::Stale;
        assert!(stale.is_stale());
        assert_eq!(stale.into_value(), None);

        let processed = Outcome::Processed(7);
        assert!(processed.is_processed());
        assert_eq!(processed.into_value(), Some(7));
    }

    #[test]
    fn test_record_ownership() {
        let record = LockRecord::locked_for("inputs/a.jpg#", Sequencer::new("10"), "worker-1");
        assert!(record.is_held_by("worker-1"));
        assert!(!record.is_held_by("worker-2"));

        let record = LockRecord::unlocked_at("inputs/a.jpg#", Sequencer::new("10"), "worker-1");
        assert!(!record.is_held_by("worker-1"));
    }
}
