//! Error type definitions.
//!
//! This module defines all error and info types used throughout the application.

use std::time::Duration;

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error binding the HTTP listener.
    #[error("Failed to bind listener on {addr}: {source}")]
    ListenerError {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

/// Errors returned by the registration path.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// `user_id` or `username` missing or empty.
    #[error("User ID and username are required.")]
    BadRequest,

    /// The client identity is already present.
    #[error("User ID already registered.")]
    AlreadyRegistered,

    /// The registration store could not be reached.
    #[error("Registration store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Errors from the rate limiter other than a throttle decision.
///
/// A throttle is not an error: it is reported as
/// [`Consumption::Throttled`](crate::rate_limiter::Consumption::Throttled).
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// `client_id` was empty.
    #[error("rate limiter key must not be empty")]
    EmptyKey,

    /// `points` was zero.
    #[error("points to consume must be positive")]
    InvalidPoints,

    /// Counter storage failed.
    #[error("rate limiter storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Errors from the task queue.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker could not be reached or refused the operation.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// The stored payload could not be decoded.
    #[error("corrupt queue item {id}: {reason}")]
    CorruptItem { id: i64, reason: String },

    /// Underlying database failure.
    #[error("queue storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        QueueError::Storage(DatabaseError::SqlError(e))
    }
}

/// Errors produced by the completion sink while processing a task.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The log file could not be opened or written.
    #[error("failed to append completion record to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced while admitting a task submission.
///
/// Each variant maps to one HTTP status in the API layer.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The client is not registered. An absent or empty `user_id` lands
    /// here too, since it cannot name a registered client.
    #[error("User not registered: {0:?}")]
    Unauthorized(String),

    /// The registration store could not answer.
    #[error("registration lookup failed: {0}")]
    RegistryUnavailable(#[source] DatabaseError),

    /// The rate limiter failed for a reason other than a throttle.
    #[error("rate limiter failure: {0}")]
    LimiterFailure(#[from] RateLimitError),

    /// The queue rejected the item; the submission was not admitted.
    #[error("failed to enqueue task: {0}")]
    QueueUnavailable(#[from] QueueError),
}

/// Types of errors counted while admitting or processing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    /// Registry lookups or inserts that failed
    RegistryError,
    /// Rate-limiter failures other than throttling
    LimiterError,
    /// Enqueue attempts the broker rejected
    EnqueueError,
    /// Dequeue/ack failures inside a worker
    DequeueError,
    /// Completion records that could not be written (task body failure)
    SinkWriteError,
    /// Worker tasks that exited unexpectedly
    WorkerCrash,
}

/// Submission outcomes and other notable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum InfoType {
    SubmissionAccepted,
    SubmissionThrottled,
    SubmissionUnauthorized,
    ClientRegistered,
    TaskProcessed,
    WorkerRestart,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::RegistryError => "Registry error",
            ErrorType::LimiterError => "Rate limiter error",
            ErrorType::EnqueueError => "Enqueue error",
            ErrorType::DequeueError => "Dequeue error",
            ErrorType::SinkWriteError => "Completion log write error",
            ErrorType::WorkerCrash => "Worker crash",
        }
    }

    /// Snake-case key used in JSON and Prometheus output.
    pub fn key(&self) -> &'static str {
        match self {
            ErrorType::RegistryError => "registry",
            ErrorType::LimiterError => "limiter",
            ErrorType::EnqueueError => "enqueue",
            ErrorType::DequeueError => "dequeue",
            ErrorType::SinkWriteError => "sink_write",
            ErrorType::WorkerCrash => "worker_crash",
        }
    }
}

impl std::fmt::Display for InfoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InfoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoType::SubmissionAccepted => "Submission accepted",
            InfoType::SubmissionThrottled => "Submission throttled but queued",
            InfoType::SubmissionUnauthorized => "Submission from unregistered client",
            InfoType::ClientRegistered => "Client registered",
            InfoType::TaskProcessed => "Task processed",
            InfoType::WorkerRestart => "Worker restarted",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            InfoType::SubmissionAccepted => "accepted",
            InfoType::SubmissionThrottled => "throttled",
            InfoType::SubmissionUnauthorized => "unauthorized",
            InfoType::ClientRegistered => "registered",
            InfoType::TaskProcessed => "processed",
            InfoType::WorkerRestart => "worker_restarts",
        }
    }
}

/// Renders a `retry_after` hint in whole seconds, rounding up.
pub(crate) fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
