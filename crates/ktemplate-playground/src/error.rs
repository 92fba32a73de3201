//! Error types for the playground request path.
//!
//! Request failures never change the HTTP status: every
//! [`ValidationError`] turns into an `{error}` [`Envelope`] answered with
//! `200 OK`, the same as a template that fails to compile.

use crate::envelope::Envelope;

/// Reasons a request body is rejected before it reaches the engine.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The body is not JSON of the expected shape.
    #[error("{0}")]
    Malformed(#[from] serde_json::Error),

    /// `source` is at or over the size limit.
    #[error("template source is too big")]
    SourceTooBig,

    /// The body could not be read (too large or interrupted).
    #[error("failed to read request body: {0}")]
    Body(String),
}

impl From<ValidationError> for Envelope {
    fn from(err: ValidationError) -> Self {
        Self::error(err.to_string())
    }
}

/// A failure while running engine work off the async runtime.
#[derive(Debug, thiserror::Error)]
pub enum EngineTaskError {
    /// The blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<EngineTaskError> for Envelope {
    fn from(err: EngineTaskError) -> Self {
        Self::error(err.to_string())
    }
}
