//! # WikiSync Store
//!
//! Store adapter contracts for WikiSync, plus two implementations of each:
//!
//! - [`LocalStore`] with the filesystem-backed [`FsLocalStore`]
//! - [`RemoteStore`] with the in-memory [`MemoryRemoteStore`] (tests,
//!   scripted failures) and the directory-backed [`DirRemoteStore`]
//!
//! The sync engine only ever talks to the traits; which implementation sits
//! behind them is the caller's business.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod local;
mod remote;

pub use local::{logical_name_to_path, path_to_logical_name, FsLocalStore, LocalStore, LOGICAL_JOIN};
pub use remote::{DirRemoteStore, MemoryRemoteStore, RemoteFile, RemoteStore};
