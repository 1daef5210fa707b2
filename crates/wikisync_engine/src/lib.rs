//! # WikiSync Engine
//!
//! Sync orchestrator and fault-tolerance layer for WikiSync.
//!
//! This crate provides:
//! - Change detection between the primary folder and the secondary wiki
//! - Conflict resolution under a configurable strategy
//! - A checkpoint/rollback transaction around each run's mutations
//! - Partial-failure accounting with a loud threshold
//! - Retry with exponential backoff and a circuit breaker wrapping every
//!   remote call
//!
//! ## Architecture
//!
//! One run is one sequential pass: clone the secondary store, snapshot and
//! checkpoint both sides, detect changes, apply them strictly in detection
//! order through the circuit breaker, then commit and push. Later changes
//! may depend on the working-copy state left by earlier ones, so there is
//! no parallel fan-out.
//!
//! ## Key Invariants
//!
//! - Every apply step flows through the breaker, whichever store it
//!   touches; clone/commit/push flow through the retry wrapper
//! - The first checkpoint of a transaction is the rollback baseline
//! - A terminal transaction (committed or rolled back) cannot be reused:
//!   `commit` and `rollback` consume the value
//! - The failure accumulator fails loudly the instant its threshold is
//!   strictly exceeded

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod breaker;
mod config;
mod engine;
mod failure;
mod retry;
mod transaction;

pub use breaker::{CircuitBreaker, CircuitState};
pub use config::{BreakerConfig, RetryConfig, SyncOptions};
pub use engine::{detect_changes, resolve_conflict, RunError, RunResult, SyncEngine, SyncStats};
pub use failure::{FailedOperation, FailureSummary, PartialFailureHandler};
pub use retry::{retry_with_backoff, CancelToken};
pub use transaction::{
    Checkpoint, RollbackOutcome, Transaction, TransactionManager, TransactionStats,
    TransactionStatus,
};
