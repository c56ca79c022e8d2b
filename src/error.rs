//! # Runtime Errors
//!
//! This module defines the single error type that flows through futures, refs,
//! proxies and the registry. Every fulfilled [`Future`](crate::Future) can be read
//! many times, so the error is `Clone`: foreign error sources are kept behind an
//! `Arc` instead of a `Box`.
//!
//! User handlers keep their own error type (`Actor::Error`). When such an error
//! escapes the worker it is wrapped in [`ActorError::Handler`], whose
//! [`source`](std::error::Error::source) points at the original error. That gives
//! the caller a caused-by chain from its own call site to the remote failure.

use std::sync::Arc;
use std::time::Duration;

/// Shared, thread-safe error source.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur within the actor runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActorError {
    /// The target actor has stopped. Raised by `tell`, reported through the
    /// future of `ask`, and returned when building a proxy.
    #[error("{actor} is dead")]
    ActorDead { actor: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A future was fulfilled twice.
    #[error("future is already fulfilled")]
    AlreadyFulfilled,

    #[error("{target} has no attribute {name:?}")]
    AttributeNotFound { target: String, name: String },

    #[error("attribute {name:?} of {target} is not callable")]
    NotCallable { target: String, name: String },

    #[error("attribute {name:?} of {target} is not traversable")]
    NotTraversable { target: String, name: String },

    /// A value had the wrong shape: bad proxy arguments, a non-array value fed
    /// to an elementwise combinator, an empty reduce.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// An error returned by user code while processing a message.
    #[error("{actor} failed: {source}")]
    Handler {
        actor: String,
        #[source]
        source: SharedError,
    },

    /// A user error the actor classified as fatal.
    #[error("{actor} failed fatally: {source}")]
    Fatal {
        actor: String,
        #[source]
        source: SharedError,
    },

    /// A panic escaped a hook or handler.
    #[error("{actor} panicked: {message}")]
    Panicked { actor: String, message: String },

    /// The scheduler could not start a worker.
    #[error("failed to spawn worker: {0}")]
    Spawn(String),
}

impl ActorError {
    /// Wraps an arbitrary error raised by code running inside an actor.
    ///
    /// Proxied methods use this to report their own failures; the runtime fills
    /// in the actor's name when the error leaves the worker.
    pub fn failed<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ActorError::Handler {
            actor: String::new(),
            source: Arc::new(error),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ActorError::InvalidValue(message.into())
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, ActorError::ActorDead { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ActorError::Timeout(_))
    }

    /// Whether this error belongs to the fatal category that stops every actor.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActorError::Fatal { .. } | ActorError::Panicked { .. })
    }

    /// Attaches the actor's identity to handler errors that were created
    /// without one.
    pub(crate) fn within(self, name: &str) -> Self {
        match self {
            ActorError::Handler { actor, source } if actor.is_empty() => ActorError::Handler {
                actor: name.to_string(),
                source,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for ActorError {
    fn from(error: serde_json::Error) -> Self {
        ActorError::InvalidValue(error.to_string())
    }
}

/// Convenience result type for runtime operations.
pub type Result<T, E = ActorError> = std::result::Result<T, E>;
