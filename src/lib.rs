//! In-process publish/subscribe event bus with observable state.
//!
//! topicbus combines a topic-based event bus, a shared key/value state
//! store, and an asynchronous middleware pipeline behind one handle.
//!
//! ## Features
//!
//! - **Ordered dispatch** - listeners run sequentially by descending
//!   priority; ties keep registration order
//! - **Wildcard topics** - `user.*` matches one segment, `user.**` the
//!   rest of the path
//! - **Async middleware** - pre-dispatch interceptors that can cancel an
//!   event before any listener sees it
//! - **Observable state** - every `set_state` notifies `state.<key>` and
//!   `state.changed` listeners without blocking the mutator
//! - **Bounded history & replay** - FIFO-trimmed event and state logs,
//!   re-deliverable to late-joining listeners
//! - **Namespaces** - tag listeners for bulk teardown independent of topic
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use topicbus::{EventBus, ListenerOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = EventBus::new();
//!
//!     let handle = bus.on(
//!         "user.login",
//!         |payload, _topic| async move {
//!             println!("user logged in: {payload}");
//!             Ok(())
//!         },
//!         ListenerOptions::new().priority(10).namespace("auth"),
//!     )?;
//!
//!     bus.emit("user.login", json!({ "id": 123 })).await?;
//!
//!     handle.unsubscribe();
//!     Ok(())
//! }
//! ```
//!
//! ## Middleware
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use topicbus::{EventRecord, HandlerError, Middleware};
//!
//! struct PaymentGuard;
//!
//! #[async_trait]
//! impl Middleware for PaymentGuard {
//!     async fn handle(&self, event: &mut EventRecord) -> Result<(), HandlerError> {
//!         if event.topic.starts_with("payment.") {
//!             event.cancel();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let guard = bus.use_middleware(PaymentGuard);
//! // later:
//! guard.remove();
//! ```
//!
//! ## Observable state
//!
//! ```rust,ignore
//! bus.on_state("user.credits", |change, _topic| async move {
//!     println!("credits changed: {change}");
//!     Ok(())
//! }, ListenerOptions::new())?;
//!
//! bus.set_state("user.credits", json!(50), false)?;
//! ```
//!
//! ## Replay
//!
//! ```rust,ignore
//! // Deliver recorded `user.*` events to a late-joining component.
//! let replayed = bus.replay("user.*", |payload, topic| {
//!     println!("replaying {topic}: {payload}");
//!     Ok(())
//! });
//! ```

pub mod bus;
pub mod error;
pub mod event;
pub mod history;
pub mod matcher;
pub mod middleware;
pub mod registry;
pub mod state;
pub mod validate;

pub use bus::{BusStats, DEFAULT_MAX_HISTORY, EventBus, EventBusBuilder, EventBusConfig};
pub use error::{BusError, HandlerError};
pub use event::{EventMetadata, EventRecord, StateChange};
pub use history::HistoryRecorder;
pub use middleware::{FnMiddleware, Middleware, MiddlewareHandle, MiddlewarePipeline};
pub use registry::{
    ListenerFn, ListenerOptions, ListenerRegistry, Subscription, SubscriptionHandle,
};
pub use state::StateStore;
