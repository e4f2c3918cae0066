//! Event bus facade.
//!
//! Composes the listener registry, topic matcher, middleware pipeline,
//! state store, and history recorder behind the public contract. The bus
//! is cheap to clone; clones share the same underlying containers, so a
//! single bus value can be handed to every collaborator.

use crate::error::{BusError, HandlerError};
use crate::event::{EventRecord, StateChange};
use crate::history::HistoryRecorder;
use crate::matcher;
use crate::middleware::{Middleware, MiddlewareHandle, MiddlewarePipeline};
use crate::registry::{
    ListenerFn, ListenerOptions, ListenerRegistry, Subscription, SubscriptionHandle,
};
use crate::state::StateStore;
use crate::validate;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default bound for each history buffer.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Initial bus configuration.
///
/// All of these can also be flipped at runtime through the setters on
/// [`EventBus`].
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Raise validation/middleware/listener failures to the caller
    /// instead of logging and degrading.
    pub strict_mode: bool,

    /// Emit debug-level logs for bus activity.
    pub debug: bool,

    /// Record emitted events and state changes for replay.
    pub record_history: bool,

    /// Cap for each history buffer; oldest entries are evicted first.
    pub max_history_size: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            debug: false,
            record_history: true,
            max_history_size: DEFAULT_MAX_HISTORY,
        }
    }
}

/// Runtime-mutable switches shared by all clones of a bus.
struct Switches {
    strict: AtomicBool,
    debug: AtomicBool,
    record_history: AtomicBool,
    max_history: AtomicUsize,
}

impl Switches {
    fn from_config(config: &EventBusConfig) -> Self {
        Self {
            strict: AtomicBool::new(config.strict_mode),
            debug: AtomicBool::new(config.debug),
            record_history: AtomicBool::new(config.record_history),
            max_history: AtomicUsize::new(config.max_history_size),
        }
    }

    fn strict(&self) -> bool {
        self.strict.load(Ordering::Relaxed)
    }

    fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn record_history(&self) -> bool {
        self.record_history.load(Ordering::Relaxed)
    }

    fn max_history(&self) -> usize {
        self.max_history.load(Ordering::Relaxed)
    }
}

/// Snapshot of bus counters and mode flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Topics with at least one listener.
    pub topics: usize,
    /// Total registered listeners.
    pub listeners: usize,
    /// Stored state keys.
    pub state_keys: usize,
    /// Registered middleware.
    pub middleware: usize,
    /// Recorded events.
    pub event_history: usize,
    /// Recorded state changes.
    pub state_history: usize,
    /// Tracked namespaces.
    pub namespaces: usize,
    pub strict_mode: bool,
    pub debug: bool,
    pub record_history: bool,
}

/// In-process publish/subscribe event bus with an observable key/value
/// state store, an async middleware pipeline, and bounded replay history.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<ListenerRegistry>,
    state: Arc<StateStore>,
    middleware: Arc<MiddlewarePipeline>,
    history: Arc<HistoryRecorder>,
    switches: Arc<Switches>,
}

impl EventBus {
    /// Create a bus with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with a custom configuration.
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            registry: Arc::new(ListenerRegistry::new()),
            state: Arc::new(StateStore::new()),
            middleware: Arc::new(MiddlewarePipeline::new()),
            history: Arc::new(HistoryRecorder::new()),
            switches: Arc::new(Switches::from_config(&config)),
        }
    }

    // ========== Subscriptions ==========

    /// Subscribe a listener to a topic or wildcard pattern.
    ///
    /// The callback receives the payload and the concrete topic the event
    /// was emitted on. In strict mode invalid input is returned as
    /// [`BusError::Validation`]; in lenient mode it is logged and a no-op
    /// handle is returned.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let handle = bus.on(
    ///     "user.login",
    ///     |payload, _topic| async move {
    ///         println!("logged in: {payload}");
    ///         Ok(())
    ///     },
    ///     ListenerOptions::new().priority(10).namespace("auth"),
    /// )?;
    /// ```
    pub fn on<F, Fut>(
        &self,
        topic: &str,
        callback: F,
        options: ListenerOptions,
    ) -> Result<SubscriptionHandle, BusError>
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let callback: ListenerFn = Arc::new(move |payload, topic| callback(payload, topic).boxed());
        self.subscribe(topic, callback, options)
    }

    /// Subscribe a listener that is removed after its first invocation.
    pub fn once<F, Fut>(
        &self,
        topic: &str,
        callback: F,
        options: ListenerOptions,
    ) -> Result<SubscriptionHandle, BusError>
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.on(topic, callback, options.once())
    }

    fn subscribe(
        &self,
        topic: &str,
        callback: ListenerFn,
        options: ListenerOptions,
    ) -> Result<SubscriptionHandle, BusError> {
        let checked = validate::topic(topic).and_then(|()| match &options.namespace {
            Some(ns) => validate::namespace(ns),
            None => Ok(()),
        });
        if let Err(e) = checked {
            if self.switches.strict() {
                return Err(e);
            }
            warn!("Rejected subscription on '{topic}': {e}");
            return Ok(SubscriptionHandle::noop());
        }

        let subscription = Subscription::new(callback, &options);
        let id = subscription.id;
        self.registry.insert(topic, subscription);

        if self.switches.debug() {
            debug!("Subscribed listener {id} to '{topic}'");
        }

        Ok(SubscriptionHandle::live(
            self.registry.clone(),
            topic.to_string(),
            id,
        ))
    }

    /// Remove a listener by topic and id. Returns whether it was found.
    pub fn off(&self, topic: &str, id: Uuid) -> bool {
        if let Err(e) = validate::topic(topic) {
            warn!("Rejected unsubscribe: {e}");
            return false;
        }
        let removed = self.registry.remove(topic, id);
        if removed && self.switches.debug() {
            debug!("Unsubscribed listener {id} from '{topic}'");
        }
        removed
    }

    /// Remove every listener registered under `namespace`, across all
    /// topics. Returns the number removed.
    pub fn off_namespace(&self, namespace: &str) -> usize {
        if let Err(e) = validate::namespace(namespace) {
            warn!("Rejected namespace removal: {e}");
            return 0;
        }
        let removed = self.registry.remove_namespace(namespace);
        if self.switches.debug() {
            debug!("Removed {removed} listeners from namespace '{namespace}'");
        }
        removed
    }

    // ========== Emit ==========

    /// Emit an event.
    ///
    /// The event runs through the middleware pipeline, is recorded in
    /// history, then is dispatched sequentially to exact-topic listeners
    /// (priority order) and to every matching wildcard subscription.
    /// Resolves to `Ok(false)` when middleware cancelled the event.
    pub async fn emit(&self, topic: &str, payload: Value) -> Result<bool, BusError> {
        if let Err(e) = validate::topic(topic) {
            if self.switches.strict() {
                return Err(e);
            }
            warn!("Rejected emit: {e}");
            return Ok(false);
        }

        if self.switches.debug() {
            debug!("Emitting '{topic}'");
        }

        let mut record = EventRecord::new(topic, payload, self.registry.exact_count(topic));

        if let Err(e) = self.middleware.run(&mut record).await {
            error!("Middleware error for '{topic}': {e}");
            if self.switches.strict() {
                return Err(BusError::Middleware(e));
            }
            return Ok(false);
        }

        if record.cancelled {
            if self.switches.debug() {
                debug!("Event '{topic}' was cancelled by middleware");
            }
            return Ok(false);
        }

        if self.switches.record_history() {
            self.history
                .record_event(record.clone(), self.switches.max_history());
        }

        let listeners = self.registry.snapshot(topic);
        self.dispatch(topic, topic, &listeners, &record.payload)
            .await?;

        for (pattern, listeners) in self.registry.wildcard_snapshots(topic) {
            self.dispatch(&pattern, topic, &listeners, &record.payload)
                .await?;
        }

        Ok(true)
    }

    /// Invoke one snapshot of listeners sequentially, then batch-remove
    /// the `once` listeners that fired. `registered_topic` is the key the
    /// listeners live under (a pattern for wildcard dispatch);
    /// `emitted_topic` is what the callbacks see.
    async fn dispatch(
        &self,
        registered_topic: &str,
        emitted_topic: &str,
        listeners: &[Subscription],
        payload: &Value,
    ) -> Result<(), BusError> {
        let mut fired_once = Vec::new();
        let mut failure = None;

        for subscription in listeners {
            match (subscription.callback)(payload.clone(), emitted_topic.to_string()).await {
                Ok(()) => {
                    if subscription.once {
                        fired_once.push(subscription.id);
                    }
                }
                Err(e) => {
                    error!(
                        "Listener {} failed for '{emitted_topic}': {e}",
                        subscription.id
                    );
                    if self.switches.strict() {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        // Removal happens after the snapshot pass so a once listener can
        // never be yanked out from under the iteration that fired it.
        for id in fired_once {
            self.registry.remove(registered_topic, id);
        }

        match failure {
            Some(e) => Err(BusError::Listener(e)),
            None => Ok(()),
        }
    }

    // ========== State ==========

    /// Store a state value.
    ///
    /// Captures the previous value, records the change in history, and
    /// (unless `silent`) notifies `state.<key>` and `state.changed`
    /// listeners via detached tasks. A failing state listener is logged
    /// and never fails the mutation, so this must be called from within a
    /// Tokio runtime unless `silent` is set.
    pub fn set_state(&self, key: &str, value: Value, silent: bool) -> Result<bool, BusError> {
        if let Err(e) = validate::state_key(key) {
            if self.switches.strict() {
                return Err(e);
            }
            warn!("Rejected state update: {e}");
            return Ok(false);
        }

        let old_value = self.state.set(key, value.clone());
        let change = StateChange::new(key, value, old_value);

        if self.switches.record_history() {
            self.history
                .record_change(change.clone(), self.switches.max_history());
        }

        if self.switches.debug() {
            debug!("State '{key}' updated");
        }

        if !silent {
            let payload = change.to_payload();
            self.notify_detached(format!("state.{key}"), payload.clone());
            self.notify_detached("state.changed".to_string(), payload);
        }

        Ok(true)
    }

    /// Current value for a state key, if present.
    pub fn get_state(&self, key: &str) -> Result<Option<Value>, BusError> {
        if let Err(e) = validate::state_key(key) {
            if self.switches.strict() {
                return Err(e);
            }
            warn!("Rejected state read: {e}");
            return Ok(None);
        }
        Ok(self.state.get(key))
    }

    /// Current value for a state key, or `default` if absent.
    pub fn get_state_or(&self, key: &str, default: Value) -> Result<Value, BusError> {
        Ok(self.get_state(key)?.unwrap_or(default))
    }

    /// Subscribe to changes of one state key.
    ///
    /// Sugar for subscribing to `state.<key>`; the payload is the
    /// [`StateChange`] serialized via [`StateChange::to_payload`].
    pub fn on_state<F, Fut>(
        &self,
        key: &str,
        callback: F,
        options: ListenerOptions,
    ) -> Result<SubscriptionHandle, BusError>
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        if let Err(e) = validate::state_key(key) {
            if self.switches.strict() {
                return Err(e);
            }
            warn!("Rejected state subscription: {e}");
            return Ok(SubscriptionHandle::noop());
        }
        self.on(&format!("state.{key}"), callback, options)
    }

    /// Delete a state key. Notifies `state.<key>.removed` with the key
    /// and its last value. Returns whether the key existed.
    pub fn remove_state(&self, key: &str) -> Result<bool, BusError> {
        if let Err(e) = validate::state_key(key) {
            if self.switches.strict() {
                return Err(e);
            }
            warn!("Rejected state removal: {e}");
            return Ok(false);
        }

        match self.state.remove(key) {
            Some(value) => {
                self.notify_detached(
                    format!("state.{key}.removed"),
                    json!({ "key": key, "value": value }),
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fire-and-forget emit for state notifications. Failures land in the
    /// log, never at the mutating caller.
    fn notify_detached(&self, topic: String, payload: Value) {
        let bus = self.clone();
        tokio::spawn(async move {
            if let Err(e) = bus.emit(&topic, payload).await {
                error!("State notification on '{topic}' failed: {e}");
            }
        });
    }

    // ========== Middleware ==========

    /// Register a middleware at the end of the pipeline. The returned
    /// handle removes exactly this middleware.
    pub fn use_middleware<M: Middleware + 'static>(&self, middleware: M) -> MiddlewareHandle {
        let id = self.middleware.add(Arc::new(middleware));
        if self.switches.debug() {
            debug!("Middleware {id} registered");
        }
        MiddlewareHandle::new(self.middleware.clone(), id)
    }

    // ========== History & replay ==========

    /// Replay recorded events matching a topic or pattern to a callback.
    ///
    /// `pattern` may be a literal topic, the `*` match-everything
    /// sentinel, or a dotted wildcard pattern. Events are delivered in
    /// chronological order; callback errors are logged and skipped.
    /// Returns the number of successful invocations. Replay never mutates
    /// history and never registers the callback as a live listener.
    pub fn replay<F>(&self, pattern: &str, callback: F) -> usize
    where
        F: FnMut(&Value, &str) -> Result<(), HandlerError>,
    {
        self.replay_inner(pattern, callback, None)
    }

    /// [`replay`](Self::replay) with an additional record-level predicate.
    pub fn replay_filtered<F>(
        &self,
        pattern: &str,
        callback: F,
        filter: &dyn Fn(&EventRecord) -> bool,
    ) -> usize
    where
        F: FnMut(&Value, &str) -> Result<(), HandlerError>,
    {
        self.replay_inner(pattern, callback, Some(filter))
    }

    fn replay_inner<F>(
        &self,
        pattern: &str,
        mut callback: F,
        filter: Option<&dyn Fn(&EventRecord) -> bool>,
    ) -> usize
    where
        F: FnMut(&Value, &str) -> Result<(), HandlerError>,
    {
        if let Err(e) = validate::topic(pattern) {
            warn!("Rejected replay: {e}");
            return 0;
        }

        let mut replayed = 0;
        for record in self.history.events() {
            let matched = pattern == "*"
                || record.topic == pattern
                || matcher::matches(&record.topic, pattern);
            if !matched {
                continue;
            }
            if let Some(filter) = filter {
                if !filter(&record) {
                    continue;
                }
            }
            match callback(&record.payload, &record.topic) {
                Ok(()) => replayed += 1,
                Err(e) => error!("Replay callback failed for '{}': {e}", record.topic),
            }
        }

        if self.switches.debug() {
            debug!("Replayed {replayed} events for '{pattern}'");
        }
        replayed
    }

    /// Recorded events, oldest first, optionally filtered to one exact
    /// topic.
    pub fn event_history(&self, topic: Option<&str>) -> Vec<EventRecord> {
        match topic {
            Some(t) => {
                if let Err(e) = validate::topic(t) {
                    warn!("Rejected event history read: {e}");
                    return Vec::new();
                }
                self.history
                    .events()
                    .into_iter()
                    .filter(|record| record.topic == t)
                    .collect()
            }
            None => self.history.events(),
        }
    }

    /// Recorded state changes, oldest first, optionally filtered to one
    /// key.
    pub fn state_history(&self, key: Option<&str>) -> Vec<StateChange> {
        match key {
            Some(k) => {
                if let Err(e) = validate::state_key(k) {
                    warn!("Rejected state history read: {e}");
                    return Vec::new();
                }
                self.history
                    .changes()
                    .into_iter()
                    .filter(|change| change.key == k)
                    .collect()
            }
            None => self.history.changes(),
        }
    }

    // ========== Runtime switches ==========

    /// Enable or disable debug-level bus logging.
    pub fn set_debug(&self, enabled: bool) {
        self.switches.debug.store(enabled, Ordering::Relaxed);
    }

    /// Enable or disable strict mode.
    pub fn set_strict_mode(&self, enabled: bool) {
        self.switches.strict.store(enabled, Ordering::Relaxed);
    }

    /// Enable or disable history recording and set the buffer cap.
    /// Existing entries beyond a smaller cap are trimmed on the next
    /// insert.
    pub fn set_history_recording(&self, enabled: bool, max_size: usize) {
        self.switches.record_history.store(enabled, Ordering::Relaxed);
        self.switches.max_history.store(max_size, Ordering::Relaxed);
    }

    /// Reset listeners, state, history, and namespaces without
    /// destroying the bus. Installed middleware stays in place.
    pub fn clear(&self) {
        self.registry.clear();
        self.state.clear();
        self.history.clear();
        info!("Event bus cleared");
    }

    /// Snapshot of counters and mode flags.
    pub fn stats(&self) -> BusStats {
        BusStats {
            topics: self.registry.topic_count(),
            listeners: self.registry.listener_count(),
            state_keys: self.state.len(),
            middleware: self.middleware.len(),
            event_history: self.history.event_count(),
            state_history: self.history.change_count(),
            namespaces: self.registry.namespace_count(),
            strict_mode: self.switches.strict(),
            debug: self.switches.debug(),
            record_history: self.switches.record_history(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for [`EventBus`].
pub struct EventBusBuilder {
    config: EventBusConfig,
}

impl EventBusBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: EventBusConfig::default(),
        }
    }

    /// Raise failures to callers instead of logging and degrading.
    pub fn strict_mode(mut self, enabled: bool) -> Self {
        self.config.strict_mode = enabled;
        self
    }

    /// Emit debug-level logs for bus activity.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Record events and state changes for replay.
    pub fn record_history(mut self, enabled: bool) -> Self {
        self.config.record_history = enabled;
        self
    }

    /// Cap for each history buffer.
    pub fn max_history_size(mut self, size: usize) -> Self {
        self.config.max_history_size = size;
        self
    }

    /// Construct the bus with the accumulated configuration.
    pub fn build(self) -> EventBus {
        EventBus::with_config(self.config)
    }
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self::new()
    }
}
