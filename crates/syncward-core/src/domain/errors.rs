//! Domain error types
//!
//! Two families live here: [`DomainError`] for validation of domain values,
//! and [`ExecutorError`] for failures reported by sync executors. The latter
//! carries an explicit [`ErrorKind`] so the retry policy never has to guess
//! from message text.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

// ============================================================================
// ErrorKind - executor failure taxonomy
// ============================================================================

/// Category of an executor failure
///
/// Only the executor knows what the remote service actually said, so it picks
/// the kind. The retry policy reads [`ErrorKind::is_retryable`] and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network-level failure (connection refused, reset, DNS)
    Transient,
    /// The request did not complete in time
    Timeout,
    /// The remote asked us to slow down
    RateLimited,
    /// Server-side failure (5xx class)
    Server,
    /// Malformed request; the remote will reject it again
    InvalidRequest,
    /// Uniqueness violation (duplicate key, already exists)
    Duplicate,
    /// The target resource does not exist
    NotFound,
    /// Local and remote schemas disagree
    SchemaMismatch,
    /// Credentials missing or rejected
    Unauthorized,
    /// Remote and local versions diverged
    Conflict,
}

impl ErrorKind {
    /// Returns true if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transient | ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::Server
        )
    }

    /// Returns true if the failure is deterministic and must not be retried
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Server => "server",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::NotFound => "not_found",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// ExecutorError
// ============================================================================

/// Failure reported by a [`SyncExecutor`](crate::ports::SyncExecutor)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ExecutorError {
    kind: ErrorKind,
    message: String,
    retry_after: Option<Duration>,
}

impl ExecutorError {
    /// Creates an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Network-level failure, retryable
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Timed out, retryable
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Throttled by the remote, retryable
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(ErrorKind::RateLimited, message)
        }
    }

    /// Server-side failure, retryable
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    /// Malformed request, terminal
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Uniqueness violation, terminal
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate, message)
    }

    /// Missing resource, terminal
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Schema disagreement, terminal
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaMismatch, message)
    }

    /// Rejected credentials, terminal
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Diverged versions, terminal
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Attaches a minimum wait before the next attempt
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// Returns the failure category
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the remote's requested wait, if any
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Shorthand for `self.kind().is_retryable()`
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
