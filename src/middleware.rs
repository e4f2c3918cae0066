//! Asynchronous pre-dispatch middleware pipeline.
//!
//! Middleware run strictly in registration order, awaited one at a time,
//! before an emitted event reaches any listener. Each middleware receives
//! the mutable [`EventRecord`] and may cancel it, after which the rest of
//! the chain and all listener dispatch are skipped.

use crate::error::HandlerError;
use crate::event::EventRecord;
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An event interceptor running before listener dispatch.
///
/// Middleware never sees listener results; it only inspects and mutates
/// the event record.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect or mutate the event. Returning an error aborts the
    /// pipeline and the emit.
    async fn handle(&self, event: &mut EventRecord) -> Result<(), HandlerError>;
}

/// Adapter turning a function into a [`Middleware`].
///
/// ```rust,ignore
/// fn require_auth(event: &mut EventRecord) -> BoxFuture<'_, Result<(), HandlerError>> {
///     if event.topic.starts_with("payment.") {
///         event.cancel();
///     }
///     futures::future::ready(Ok(())).boxed()
/// }
///
/// bus.use_middleware(FnMiddleware::new(require_auth));
/// ```
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut EventRecord) -> BoxFuture<'a, Result<(), HandlerError>> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut EventRecord) -> BoxFuture<'a, Result<(), HandlerError>> + Send + Sync,
{
    async fn handle(&self, event: &mut EventRecord) -> Result<(), HandlerError> {
        (self.f)(event).await
    }
}

/// Ordered middleware chain.
pub struct MiddlewarePipeline {
    chain: RwLock<Vec<(u64, Arc<dyn Middleware>)>>,
    next_id: AtomicU64,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self {
            chain: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Append a middleware; returns its removal id.
    pub fn add(&self, middleware: Arc<dyn Middleware>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.chain.write().push((id, middleware));
        id
    }

    /// Remove a middleware by id. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        let mut chain = self.chain.write();
        let before = chain.len();
        chain.retain(|(mid, _)| *mid != id);
        before != chain.len()
    }

    /// Run the chain against an event, in registration order, stopping
    /// early if the event is cancelled. The first error aborts the chain.
    pub async fn run(&self, event: &mut EventRecord) -> Result<(), HandlerError> {
        // Snapshot so middleware can add/remove middleware mid-flight.
        let chain: Vec<Arc<dyn Middleware>> =
            self.chain.read().iter().map(|(_, m)| m.clone()).collect();
        for middleware in chain {
            if event.cancelled {
                break;
            }
            middleware.handle(event).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.read().is_empty()
    }

    pub fn clear(&self) {
        self.chain.write().clear();
    }
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("len", &self.len())
            .finish()
    }
}

/// Handle for removing a registered middleware from its pipeline.
#[derive(Debug)]
pub struct MiddlewareHandle {
    pipeline: Arc<MiddlewarePipeline>,
    id: u64,
}

impl MiddlewareHandle {
    pub(crate) fn new(pipeline: Arc<MiddlewarePipeline>, id: u64) -> Self {
        Self { pipeline, id }
    }

    /// Remove the middleware. Returns whether it was still registered.
    pub fn remove(self) -> bool {
        self.pipeline.remove(self.id)
    }
}
