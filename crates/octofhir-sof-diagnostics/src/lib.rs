//! Diagnostics and error handling for the SQL-on-FHIR engine
//!
//! This crate provides the error handling infrastructure shared by every
//! other crate in the workspace: structured error codes, source spans for
//! path-expression parsing, and the unified [`SofError`] type.

mod error;
mod error_code;
mod span;

pub use error::*;
pub use error_code::*;
pub use span::*;

/// Result type for SQL-on-FHIR operations
pub type Result<T> = std::result::Result<T, SofError>;
