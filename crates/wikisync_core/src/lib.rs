//! # WikiSync Core
//!
//! Data model and error taxonomy for WikiSync.
//!
//! This crate provides:
//! - File/change records shared by both sides of a sync run
//! - The error category table and the failure classifier
//! - Checkpoint fingerprinting and content-derived revision tokens
//!
//! ## Key Invariants
//!
//! - A change's direction always matches its origin (primary-originated
//!   changes flow primary→secondary and symmetrically); the constructors on
//!   [`Change`] are the only way to build one
//! - The `(retryable, fatal)` flags live in exactly one place,
//!   [`ErrorCategory`]; every retry/abort decision elsewhere consults it
//! - Classification is total: any failure maps to exactly one category

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod fingerprint;
mod types;

pub use error::{
    classify, ErrorCategory, ErrorContext, RemoteFailure, SyncError, SyncResult,
};
pub use fingerprint::{checkpoint_fingerprint, content_revision};
pub use types::{
    Change, ChangeKind, ChangeOrigin, ConflictStrategy, FileRecord, RecordedOperation,
    SyncDirection, TransactionId,
};
