//! Retry with exponential backoff.

use crate::config::RetryConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use wikisync_core::{SyncError, SyncResult};

/// Cooperative cancellation handle.
///
/// The retry wrapper checks it before every attempt; a caller holding a
/// clone of the flag can abort a long backoff sequence from outside.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Clears a previous cancellation request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Invokes `operation` up to `config.max_attempts` times.
///
/// After a failure the error is classified; a non-retryable error or an
/// exhausted attempt budget re-raises immediately with no further delay,
/// otherwise the wrapper sleeps `delay_for_attempt(attempt)` and tries
/// again.
pub fn retry_with_backoff<T>(
    config: &RetryConfig,
    cancel: Option<&CancelToken>,
    mut operation: impl FnMut() -> SyncResult<T>,
) -> SyncResult<T> {
    let attempts = config.max_attempts.max(1);

    for attempt in 1..=attempts {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(SyncError::aborted("cancelled before attempt"));
            }
        }

        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                let last = attempt == attempts;
                if last || !err.is_retryable() {
                    return Err(err);
                }
                let delay = config.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                std::thread::sleep(delay);
            }
        }
    }

    // The loop always returns; attempts is at least 1.
    Err(SyncError::aborted("no attempts made"))
}
