//! Per-run partial-failure accounting.

use serde::Serialize;
use wikisync_core::{RecordedOperation, SyncError, SyncResult};

/// A failed operation together with its rendered error.
#[derive(Debug, Clone, Serialize)]
pub struct FailedOperation {
    /// The operation that failed.
    pub operation: RecordedOperation,
    /// The failure, rendered for reporting.
    pub error: String,
}

/// Counts exposed for the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    /// Operations applied successfully.
    pub succeeded: usize,
    /// Operations that failed.
    pub failed: usize,
    /// The full failed-operation list.
    pub failures: Vec<FailedOperation>,
}

/// Accumulates per-operation outcomes within one sync run.
///
/// Not persisted across runs. Recording a failure past the configured
/// threshold fails loudly rather than signalling silently; reaching the
/// threshold exactly is still tolerated.
#[derive(Debug)]
pub struct PartialFailureHandler {
    continue_on_error: bool,
    max_failures: usize,
    successes: Vec<RecordedOperation>,
    failures: Vec<FailedOperation>,
}

impl PartialFailureHandler {
    /// Creates a handler for one run.
    #[must_use]
    pub fn new(continue_on_error: bool, max_failures: usize) -> Self {
        Self {
            continue_on_error,
            max_failures,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Records a successfully applied operation.
    pub fn record_success(&mut self, operation: RecordedOperation) {
        self.successes.push(operation);
    }

    /// Records a failed operation.
    ///
    /// Fails with [`SyncError::FailureThresholdExceeded`] the instant the
    /// failure list grows strictly beyond the threshold, aborting the run
    /// via propagation.
    pub fn record_failure(
        &mut self,
        operation: RecordedOperation,
        error: &SyncError,
    ) -> SyncResult<()> {
        self.failures.push(FailedOperation {
            operation,
            error: error.to_string(),
        });

        if self.failures.len() > self.max_failures {
            return Err(SyncError::FailureThresholdExceeded {
                limit: self.max_failures,
            });
        }
        Ok(())
    }

    /// Whether the run may continue applying further changes.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.continue_on_error && self.failures.len() <= self.max_failures
    }

    /// Success/failure counts and the failed-operation list.
    #[must_use]
    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            succeeded: self.successes.len(),
            failed: self.failures.len(),
            failures: self.failures.clone(),
        }
    }
}
