//! Dispatch-level error type.
//!
//! Handlers and middleware return `Result<(), HandlerError>`; any `Err`
//! reaching the dispatcher is converted centrally — a 500 with a generic
//! body when headers have not been flushed, a server-side log line when
//! they have. Error detail never leaks to the client.

use thiserror::Error;

use crate::body::BodyError;

/// An uncaught failure raised while executing middleware or a route handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A free-form failure raised by application code.
    #[error("{0}")]
    Message(String),

    /// Strict body decoding failed (see [`crate::body::decode`]).
    #[error(transparent)]
    Body(#[from] BodyError),

    /// JSON (de)serialization failed outside of body decoding.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O failure surfaced by handler code.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HandlerError {
    /// Shorthand for a [`HandlerError::Message`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
