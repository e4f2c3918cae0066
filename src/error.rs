// Error types for the topicbus crate

use thiserror::Error;

/// Error returned by listener callbacks and middleware.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
}

impl HandlerError {
    /// Build a `Failed` error from anything displayable.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error surfaced by bus operations to the direct caller.
///
/// In lenient mode these are logged instead of returned; see
/// [`crate::EventBus::set_strict_mode`].
#[derive(Debug, Error)]
pub enum BusError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("middleware error: {0}")]
    Middleware(HandlerError),

    #[error("listener error: {0}")]
    Listener(HandlerError),
}
