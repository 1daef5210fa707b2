//! Configuration for sync runs.

use std::path::PathBuf;
use std::time::Duration;
use wikisync_core::ConflictStrategy;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }

    /// Creates a configuration with no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed):
    /// `min(base · 2^(attempt−1), max_delay)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub threshold: u32,
    /// How long the breaker stays open before a trial call.
    pub cooldown: Duration,
}

impl BreakerConfig {
    /// Creates a breaker configuration.
    #[must_use]
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self { threshold, cooldown }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

/// Configuration for a sync engine instance.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Folder holding the primary markdown documents.
    pub docs_dir: PathBuf,
    /// Scratch directory the secondary working copy is cloned into.
    pub work_dir: PathBuf,
    /// Conflict resolution strategy for updates.
    pub strategy: ConflictStrategy,
    /// Whether primary-side deletions propagate to the secondary store.
    pub sync_deletes: bool,
    /// Whether per-change failures keep the run going.
    pub continue_on_error: bool,
    /// Tolerated per-change failures before the run aborts.
    pub max_failures: usize,
    /// Commit message for secondary-store commits.
    pub commit_message: String,
    /// Retry configuration for clone/commit/push.
    pub retry: RetryConfig,
    /// Circuit breaker configuration for the apply step.
    pub breaker: BreakerConfig,
}

impl SyncOptions {
    /// Creates options for the given docs folder and scratch directory.
    pub fn new(docs_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            work_dir: work_dir.into(),
            strategy: ConflictStrategy::PrimaryWins,
            sync_deletes: false,
            continue_on_error: true,
            max_failures: 5,
            commit_message: "Sync documentation".to_string(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }

    /// Sets the conflict strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables or disables delete synchronization.
    #[must_use]
    pub fn with_sync_deletes(mut self, enabled: bool) -> Self {
        self.sync_deletes = enabled;
        self
    }

    /// Sets whether per-change failures keep the run going.
    #[must_use]
    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// Sets the tolerated failure count.
    #[must_use]
    pub fn with_max_failures(mut self, max: usize) -> Self {
        self.max_failures = max;
        self
    }

    /// Sets the secondary commit message.
    #[must_use]
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the breaker configuration.
    #[must_use]
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}
