//! Error taxonomy and failure classification.
//!
//! The `(retryable, fatal)` pair for each category lives on
//! [`ErrorCategory`] and nowhere else; retry and abort decisions elsewhere
//! in the system consult it through [`SyncError::context`].

use std::io;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Typed category assigned to every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The remote API is throttling us.
    RateLimit,
    /// Credentials were rejected.
    Auth,
    /// A file or page does not exist.
    NotFound,
    /// The network or remote endpoint is unreachable.
    Network,
    /// Two sides disagree and the policy refused to pick a winner.
    Conflict,
    /// Invalid input or state; the run cannot proceed.
    Validation,
    /// Anything that matched no other category.
    Unknown,
}

impl ErrorCategory {
    /// Whether operations failing with this category may be retried.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Unknown
        )
    }

    /// Whether this category always aborts the run.
    #[must_use]
    pub const fn fatal(&self) -> bool {
        matches!(self, ErrorCategory::Auth | ErrorCategory::Validation)
    }
}

/// Derived view of a failure: category plus its fixed flags.
///
/// Computed fresh per failure, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Assigned category.
    pub category: ErrorCategory,
    /// Human-readable description.
    pub message: String,
    /// Copied from the category table.
    pub retryable: bool,
    /// Copied from the category table.
    pub fatal: bool,
    /// Extra detail (status code, system code), if any.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Builds a context for the given category, reading the flags from the
    /// category table.
    pub fn new(
        category: ErrorCategory,
        message: impl Into<String>,
        details: Option<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            retryable: category.retryable(),
            fatal: category.fatal(),
            details,
        }
    }
}

/// A normalized failure reported by an external collaborator.
///
/// Remote APIs surface failures as loose bags of optional status codes,
/// system codes and message text; this union is the single place those
/// shapes are represented, and [`classify`] is the single place they are
/// interpreted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteFailure {
    /// Failure carrying an HTTP-like status code.
    #[error("remote call failed with status {code}: {message}")]
    Status {
        /// HTTP-like status code.
        code: u16,
        /// Message supplied by the remote.
        message: String,
    },

    /// Failure carrying a system error code.
    #[error("remote call failed with code {code}: {message}")]
    Code {
        /// System error code such as `ENOENT`.
        code: String,
        /// Message supplied by the remote.
        message: String,
    },

    /// Failure with message text only.
    #[error("remote call failed: {0}")]
    Message(String),
}

impl RemoteFailure {
    /// Creates a status-code failure.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Creates a system-code failure.
    pub fn code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Code {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a message-only failure.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// The conventional "file not found" failure for a remote path.
    pub fn not_found(path: impl AsRef<str>) -> Self {
        Self::Status {
            code: 404,
            message: format!("not found: {}", path.as_ref()),
        }
    }
}

/// Maps a collaborator failure to its category. Pure and total; first match
/// wins.
#[must_use]
pub fn classify(failure: &RemoteFailure) -> ErrorContext {
    match failure {
        RemoteFailure::Status { code, message } => {
            let details = Some(format!("status {code}"));
            match code {
                403 => ErrorContext::new(ErrorCategory::RateLimit, message, details),
                401 => ErrorContext::new(ErrorCategory::Auth, message, details),
                404 => ErrorContext::new(ErrorCategory::NotFound, message, details),
                _ => classify_message(message, details),
            }
        }
        RemoteFailure::Code { code, message } => {
            let details = Some(format!("code {code}"));
            match code.to_ascii_uppercase().as_str() {
                "ENOENT" => ErrorContext::new(ErrorCategory::NotFound, message, details),
                "ECONNREFUSED" => ErrorContext::new(ErrorCategory::Network, message, details),
                _ => classify_message(message, details),
            }
        }
        RemoteFailure::Message(message) => classify_message(message, None),
    }
}

/// Pattern-matches message text against the known categories, in order.
fn classify_message(message: &str, details: Option<String>) -> ErrorContext {
    let text = message.to_ascii_lowercase();

    let category = if text.contains("rate limit") || text.contains("403") || text.contains("forbidden")
    {
        ErrorCategory::RateLimit
    } else if text.contains("401") || text.contains("unauthorized") {
        ErrorCategory::Auth
    } else if text.contains("enoent") || text.contains("not found") {
        ErrorCategory::NotFound
    } else if text.contains("network") || text.contains("timeout") || text.contains("econnrefused") {
        ErrorCategory::Network
    } else if text.contains("conflict") {
        ErrorCategory::Conflict
    } else {
        ErrorCategory::Unknown
    };

    ErrorContext::new(category, message, details)
}

/// Errors that can occur during a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote collaborator reported a failure.
    #[error(transparent)]
    Remote(#[from] RemoteFailure),

    /// Local filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The circuit breaker is open; the operation was not invoked.
    #[error("circuit breaker is open")]
    BreakerOpen,

    /// The transaction is not in the `Pending` state.
    #[error("no active transaction")]
    TransactionNotPending,

    /// Rollback was requested but the transaction holds no checkpoint.
    #[error("no checkpoint available for rollback")]
    NoCheckpointAvailable,

    /// The partial-failure threshold was strictly exceeded.
    #[error("failure threshold exceeded: more than {limit} operations failed")]
    FailureThresholdExceeded {
        /// Configured maximum tolerated failures.
        limit: usize,
    },

    /// An update was skipped by the `skip` conflict strategy.
    #[error("skipped due to conflict: {name}")]
    ConflictSkipped {
        /// Logical name of the conflicting document.
        name: String,
    },

    /// Invalid configuration or state.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// The run was cancelled or aborted mid-flight.
    #[error("sync aborted: {message}")]
    Aborted {
        /// Reason for the abort.
        message: String,
    },
}

impl SyncError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an aborted error.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Classifies this error, computing its category and flags.
    #[must_use]
    pub fn context(&self) -> ErrorContext {
        match self {
            SyncError::Remote(failure) => classify(failure),
            SyncError::Io(err) => {
                let category = match err.kind() {
                    io::ErrorKind::NotFound => ErrorCategory::NotFound,
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => {
                        ErrorCategory::Network
                    }
                    _ => ErrorCategory::Unknown,
                };
                ErrorContext::new(category, err.to_string(), Some(format!("{:?}", err.kind())))
            }
            SyncError::BreakerOpen => {
                ErrorContext::new(ErrorCategory::Unknown, self.to_string(), None)
            }
            SyncError::ConflictSkipped { .. } => {
                ErrorContext::new(ErrorCategory::Conflict, self.to_string(), None)
            }
            SyncError::TransactionNotPending
            | SyncError::NoCheckpointAvailable
            | SyncError::FailureThresholdExceeded { .. }
            | SyncError::Validation { .. }
            | SyncError::Aborted { .. } => {
                ErrorContext::new(ErrorCategory::Validation, self.to_string(), None)
            }
        }
    }

    /// Returns true if this error can be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    /// Returns true if this error always aborts the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.context().fatal
    }
}
