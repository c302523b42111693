//! CQL runner diagnostics and error handling
//!
//! This crate provides the error handling infrastructure for the CQL runner,
//! including error codes, the runner error type and the user-facing notices
//! raised while building and executing evaluations.

mod error;
mod error_code;
mod notice;

pub use error::*;
pub use error_code::*;
pub use notice::*;

/// Result type for CQL runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;
