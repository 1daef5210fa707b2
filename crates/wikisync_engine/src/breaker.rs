//! Circuit breaker guarding the apply step's remote calls.

use crate::config::BreakerConfig;
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, warn};
use wikisync_core::{SyncError, SyncResult};

/// The current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow through normally.
    Closed,
    /// Calls fail fast without invoking the operation.
    Open,
    /// One trial call is allowed through after the cooldown.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

/// Tracks consecutive failures of a guarded operation and short-circuits
/// calls while open.
///
/// A single run owns a single breaker; the failure counter is meaningless
/// under concurrent callers (see the crate docs on the sequential model).
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Current consecutive failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Runs `operation` under the breaker.
    ///
    /// While open and inside the cooldown this fails fast with
    /// [`SyncError::BreakerOpen`] without invoking the operation; after the
    /// cooldown the next call is a half-open trial. A trial success closes
    /// the breaker and clears the failure count; any failure increments the
    /// count and re-opens at the threshold (immediately, for a failed
    /// trial). The original error is always re-raised.
    pub fn execute<T>(&self, operation: impl FnOnce() -> SyncResult<T>) -> SyncResult<T> {
        {
            let mut inner = self.inner.lock();
            if inner.state == CircuitState::Open {
                let elapsed = inner.last_failure_at.map(|at| at.elapsed());
                match elapsed {
                    Some(elapsed) if elapsed > self.config.cooldown => {
                        debug!("cooldown elapsed, allowing trial call");
                        inner.state = CircuitState::HalfOpen;
                    }
                    _ => return Err(SyncError::BreakerOpen),
                }
            }
        }

        match operation() {
            Ok(value) => {
                let mut inner = self.inner.lock();
                if inner.state == CircuitState::HalfOpen {
                    debug!("trial call succeeded, closing breaker");
                }
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                Ok(value)
            }
            Err(err) => {
                let mut inner = self.inner.lock();
                inner.consecutive_failures += 1;
                inner.last_failure_at = Some(Instant::now());
                if inner.state == CircuitState::HalfOpen {
                    warn!("trial call failed, re-opening breaker");
                    inner.state = CircuitState::Open;
                } else if inner.consecutive_failures >= self.config.threshold {
                    warn!(
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening breaker"
                    );
                    inner.state = CircuitState::Open;
                }
                Err(err)
            }
        }
    }
}
