//! Bounded event and state-change history.
//!
//! Two independent FIFO buffers, each trimmed to the configured cap on
//! insert so the oldest entries are evicted first and chronological order
//! is preserved.

use crate::event::{EventRecord, StateChange};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// FIFO-trimmed logs of emitted events and state changes.
pub struct HistoryRecorder {
    events: Mutex<VecDeque<EventRecord>>,
    changes: Mutex<VecDeque<StateChange>>,
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            changes: Mutex::new(VecDeque::new()),
        }
    }

    /// Append an event record, evicting the oldest entries beyond `cap`.
    pub fn record_event(&self, record: EventRecord, cap: usize) {
        let mut events = self.events.lock();
        events.push_back(record);
        while events.len() > cap {
            events.pop_front();
        }
    }

    /// Append a state change, evicting the oldest entries beyond `cap`.
    pub fn record_change(&self, change: StateChange, cap: usize) {
        let mut changes = self.changes.lock();
        changes.push_back(change);
        while changes.len() > cap {
            changes.pop_front();
        }
    }

    /// Chronological copy of the event log.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().iter().cloned().collect()
    }

    /// Chronological copy of the state-change log.
    pub fn changes(&self) -> Vec<StateChange> {
        self.changes.lock().iter().cloned().collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn change_count(&self) -> usize {
        self.changes.lock().len()
    }

    /// Drop both logs.
    pub fn clear(&self) {
        self.events.lock().clear();
        self.changes.lock().clear();
    }
}

impl Default for HistoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn event(topic: &str) -> EventRecord {
        EventRecord::new(topic, Value::Null, 0)
    }

    #[test]
    fn evicts_oldest_events_beyond_cap() {
        let history = HistoryRecorder::new();
        history.record_event(event("a"), 2);
        history.record_event(event("b"), 2);
        history.record_event(event("c"), 2);

        let topics: Vec<String> = history.events().into_iter().map(|e| e.topic).collect();
        assert_eq!(topics, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn evicts_oldest_changes_beyond_cap() {
        let history = HistoryRecorder::new();
        for i in 0..5 {
            history.record_change(StateChange::new("k", json!(i), None), 3);
        }
        let values: Vec<Value> = history.changes().into_iter().map(|c| c.value).collect();
        assert_eq!(values, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn zero_cap_keeps_nothing() {
        let history = HistoryRecorder::new();
        history.record_event(event("a"), 0);
        assert_eq!(history.event_count(), 0);
    }

    #[test]
    fn clear_drops_both_logs() {
        let history = HistoryRecorder::new();
        history.record_event(event("a"), 10);
        history.record_change(StateChange::new("k", json!(1), None), 10);
        history.clear();
        assert_eq!(history.event_count(), 0);
        assert_eq!(history.change_count(), 0);
    }
}
