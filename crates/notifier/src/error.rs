//! Worker and collaborator error types.
//!
//! [`WorkerError`] is what producers see from `queue_email` and what the
//! lifecycle methods return. [`DeliveryError`] is the structured failure
//! reported by the delivery subsystem, status store and dead-letter sink; the
//! classifier inspects its variants to decide between retry and dead-letter.

use std::time::Duration;

use thiserror::Error;

/// Admission and lifecycle errors returned synchronously by the worker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("Worker is not active")]
    Inactive,

    #[error("Queue is full: no slot freed within {timeout:?}")]
    QueueFull { timeout: Duration },

    #[error("Worker is already running")]
    AlreadyRunning,
}

/// Failures reported by the external collaborators.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The request is malformed and will never succeed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The provider asked us to slow down.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Transient infrastructure failure in a downstream dependency.
    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
