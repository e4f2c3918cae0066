//! Per-topic listener registry.
//!
//! Owns subscription ordering (descending priority, stable for ties),
//! `once` bookkeeping, namespace tagging, and id-based removal. Dispatch
//! works from point-in-time snapshots so listener callbacks can freely
//! subscribe and unsubscribe without corrupting an iteration in progress.

use crate::error::HandlerError;
use crate::matcher;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Type-erased listener callback: `(payload, topic) -> async result`.
pub type ListenerFn =
    Arc<dyn Fn(Value, String) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Options accepted when subscribing a listener.
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,

    /// Higher priority listeners run first; ties run in registration order.
    pub priority: i32,

    /// Tag enabling bulk removal independent of topic.
    pub namespace: Option<String>,
}

impl ListenerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the listener for removal after its first invocation.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Set the dispatch priority (default 0).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Tag the listener with a namespace for bulk removal. Empty tags
    /// are rejected at subscribe time.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A registered listener for one topic.
#[derive(Clone)]
pub struct Subscription {
    /// Process-wide unique listener id.
    pub id: Uuid,

    /// The listener callback.
    pub callback: ListenerFn,

    /// Remove after first invocation.
    pub once: bool,

    /// Dispatch priority.
    pub priority: i32,

    /// Optional bulk-removal tag.
    pub namespace: Option<String>,

    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Build a subscription from a callback and options.
    pub fn new(callback: ListenerFn, options: &ListenerOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            callback,
            once: options.once,
            priority: options.priority,
            namespace: options.namespace.clone(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("once", &self.once)
            .field("priority", &self.priority)
            .field("namespace", &self.namespace)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Ordered listener collections keyed by topic, plus the tracked
/// namespace set.
pub struct ListenerRegistry {
    topics: DashMap<String, Vec<Subscription>>,
    namespaces: DashSet<String>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            namespaces: DashSet::new(),
        }
    }

    /// Insert a subscription, keeping the topic's sequence sorted by
    /// descending priority. The sort is stable, so equal priorities keep
    /// registration order.
    pub fn insert(&self, topic: &str, subscription: Subscription) {
        if let Some(ns) = &subscription.namespace {
            self.namespaces.insert(ns.clone());
        }
        let mut listeners = self.topics.entry(topic.to_string()).or_default();
        listeners.push(subscription);
        listeners.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Remove one subscription by id. Drops the topic entry when it
    /// becomes empty. Returns whether anything was removed.
    pub fn remove(&self, topic: &str, id: Uuid) -> bool {
        let removed = if let Some(mut listeners) = self.topics.get_mut(topic) {
            let before = listeners.len();
            listeners.retain(|s| s.id != id);
            before != listeners.len()
        } else {
            false
        };
        if removed {
            self.topics.remove_if(topic, |_, listeners| listeners.is_empty());
        }
        removed
    }

    /// Remove every subscription tagged with `namespace` across all
    /// topics, drop emptied topic entries, and forget the namespace.
    /// Returns the number of subscriptions removed.
    pub fn remove_namespace(&self, namespace: &str) -> usize {
        let mut removed = 0;
        for mut entry in self.topics.iter_mut() {
            let before = entry.len();
            entry.retain(|s| s.namespace.as_deref() != Some(namespace));
            removed += before - entry.len();
        }

        // Deferred cleanup; removing while holding the iterator would
        // deadlock on the shard lock.
        let emptied: Vec<String> = self
            .topics
            .iter()
            .filter(|entry| entry.is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        for topic in emptied {
            self.topics.remove_if(&topic, |_, listeners| listeners.is_empty());
        }

        self.namespaces.remove(namespace);
        removed
    }

    /// Point-in-time copy of a topic's listeners, in dispatch order.
    pub fn snapshot(&self, topic: &str) -> Vec<Subscription> {
        self.topics
            .get(topic)
            .map(|listeners| listeners.clone())
            .unwrap_or_default()
    }

    /// Snapshots of every wildcard pattern matching `topic`, each with its
    /// listeners in dispatch order.
    pub fn wildcard_snapshots(&self, topic: &str) -> Vec<(String, Vec<Subscription>)> {
        self.topics
            .iter()
            .filter(|entry| matcher::is_pattern(entry.key()) && matcher::matches(topic, entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of listeners registered on the exact topic.
    pub fn exact_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|l| l.len()).unwrap_or(0)
    }

    /// Number of topics with at least one listener.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Total listeners across all topics.
    pub fn listener_count(&self) -> usize {
        self.topics.iter().map(|entry| entry.len()).sum()
    }

    /// Number of tracked namespaces.
    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// Drop all subscriptions and namespaces.
    pub fn clear(&self) {
        self.topics.clear();
        self.namespaces.clear();
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned from a subscription, able to remove exactly that
/// listener. In lenient mode a failed subscription yields a no-op handle.
pub struct SubscriptionHandle {
    target: Option<(Arc<ListenerRegistry>, String, Uuid)>,
}

impl SubscriptionHandle {
    pub(crate) fn live(registry: Arc<ListenerRegistry>, topic: String, id: Uuid) -> Self {
        Self {
            target: Some((registry, topic, id)),
        }
    }

    pub(crate) fn noop() -> Self {
        Self { target: None }
    }

    /// The listener id, if the subscription was actually registered.
    pub fn id(&self) -> Option<Uuid> {
        self.target.as_ref().map(|(_, _, id)| *id)
    }

    /// Whether this handle refers to a real subscription.
    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    /// Remove the subscription. Returns whether it was still registered.
    pub fn unsubscribe(self) -> bool {
        match self.target {
            Some((registry, topic, id)) => registry.remove(&topic, id),
            None => false,
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn noop_listener() -> ListenerFn {
        Arc::new(|_, _| futures::future::ready(Ok(())).boxed())
    }

    fn subscription(options: ListenerOptions) -> Subscription {
        Subscription::new(noop_listener(), &options)
    }

    #[test]
    fn orders_by_descending_priority_with_stable_ties() {
        let registry = ListenerRegistry::new();
        let a = subscription(ListenerOptions::new().priority(1));
        let b = subscription(ListenerOptions::new().priority(5));
        let c = subscription(ListenerOptions::new().priority(5));
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        registry.insert("user.login", a);
        registry.insert("user.login", b);
        registry.insert("user.login", c);

        let order: Vec<Uuid> = registry
            .snapshot("user.login")
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(order, vec![b_id, c_id, a_id]);
    }

    #[test]
    fn remove_by_id_drops_empty_topics() {
        let registry = ListenerRegistry::new();
        let sub = subscription(ListenerOptions::new());
        let id = sub.id;
        registry.insert("video.play", sub);

        assert!(registry.remove("video.play", id));
        assert_eq!(registry.topic_count(), 0);
        assert!(!registry.remove("video.play", id));
    }

    #[test]
    fn namespace_removal_spans_topics() {
        let registry = ListenerRegistry::new();
        registry.insert(
            "video.play",
            subscription(ListenerOptions::new().namespace("video")),
        );
        registry.insert(
            "video.pause",
            subscription(ListenerOptions::new().namespace("video")),
        );
        registry.insert(
            "video.pause",
            subscription(ListenerOptions::new().namespace("video")),
        );
        registry.insert("audio.play", subscription(ListenerOptions::new()));

        assert_eq!(registry.namespace_count(), 1);
        assert_eq!(registry.remove_namespace("video"), 3);
        assert_eq!(registry.namespace_count(), 0);
        assert_eq!(registry.topic_count(), 1);
        assert_eq!(registry.exact_count("audio.play"), 1);
    }

    #[test]
    fn wildcard_snapshots_match_patterns_only() {
        let registry = ListenerRegistry::new();
        registry.insert("user.*", subscription(ListenerOptions::new()));
        registry.insert("user.**", subscription(ListenerOptions::new()));
        registry.insert("user.login", subscription(ListenerOptions::new()));

        let patterns: Vec<String> = registry
            .wildcard_snapshots("user.login")
            .into_iter()
            .map(|(pattern, _)| pattern)
            .collect();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.contains(&"user.*".to_string()));
        assert!(patterns.contains(&"user.**".to_string()));

        let deep: Vec<String> = registry
            .wildcard_snapshots("user.login.success")
            .into_iter()
            .map(|(pattern, _)| pattern)
            .collect();
        assert_eq!(deep, vec!["user.**".to_string()]);
    }

    #[test]
    fn noop_handle_unsubscribes_nothing() {
        let handle = SubscriptionHandle::noop();
        assert!(handle.is_noop());
        assert!(handle.id().is_none());
        assert!(!handle.unsubscribe());
    }
}
