//! Event and state change records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Per-emit bookkeeping carried alongside the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Where the record originated (`emit` for all bus-produced records).
    pub source: String,

    /// Number of exact-topic listeners registered when the emit started.
    pub listener_count: usize,
}

/// A single emitted event.
///
/// Created per `emit` call and handed mutably to the middleware pipeline,
/// which may set `cancelled`. Once appended to history the record is never
/// mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique event id.
    pub id: Uuid,

    /// Concrete topic the event was emitted on.
    pub topic: String,

    /// Event payload.
    pub payload: Value,

    /// Set by middleware to abandon dispatch.
    pub cancelled: bool,

    /// Timestamp when the emit started.
    pub timestamp: DateTime<Utc>,

    /// Emit bookkeeping.
    pub metadata: EventMetadata,
}

impl EventRecord {
    /// Create a record for a fresh emit.
    pub fn new(topic: impl Into<String>, payload: Value, listener_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            cancelled: false,
            timestamp: Utc::now(),
            metadata: EventMetadata {
                source: "emit".to_string(),
                listener_count,
            },
        }
    }

    /// Mark the event as cancelled; remaining middleware and all listener
    /// dispatch are skipped.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

/// A single state mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    /// State key that changed.
    pub key: String,

    /// New value.
    pub value: Value,

    /// Previous value, if the key existed.
    pub old_value: Option<Value>,

    /// Timestamp of the mutation.
    pub timestamp: DateTime<Utc>,
}

impl StateChange {
    /// Create a change record for a mutation happening now.
    pub fn new(key: impl Into<String>, value: Value, old_value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            value,
            old_value,
            timestamp: Utc::now(),
        }
    }

    /// The change as an event payload for `state.*` notifications.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_record_is_not_cancelled() {
        let record = EventRecord::new("user.login", json!({"id": 1}), 2);
        assert_eq!(record.topic, "user.login");
        assert!(!record.cancelled);
        assert_eq!(record.metadata.listener_count, 2);
        assert_eq!(record.metadata.source, "emit");
    }

    #[test]
    fn cancel_flips_the_flag() {
        let mut record = EventRecord::new("user.login", Value::Null, 0);
        record.cancel();
        assert!(record.cancelled);
    }

    #[test]
    fn state_change_payload_round_trips() {
        let change = StateChange::new("credits", json!(50), Some(json!(10)));
        let payload = change.to_payload();
        assert_eq!(payload["key"], "credits");
        assert_eq!(payload["value"], 50);
        assert_eq!(payload["old_value"], 10);
    }

    #[test]
    fn first_write_has_no_old_value() {
        let change = StateChange::new("credits", json!(50), None);
        assert!(change.old_value.is_none());
        assert_eq!(change.to_payload()["old_value"], Value::Null);
    }
}
