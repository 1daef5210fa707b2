//! Command implementations.

pub mod diff;
pub mod sync;
