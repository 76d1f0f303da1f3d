//! Core error types shared by every stage of resolution.
//!
//! - [`PrsError`] - enumerated failure kinds
//! - [`ResolveError`] - a `PrsError` plus its source location, as stored in results
//! - [`ErrorContext`] / [`user_friendly_error`] - suggestions for callers that
//!   present errors to people
//! - [`file_error`] - filesystem errors annotated with operation context

pub mod error;
pub mod file_error;

pub use error::{ErrorContext, PrsError, ResolveError, user_friendly_error};
pub use file_error::{FileOperation, FileOperationError, FileResultExt};
