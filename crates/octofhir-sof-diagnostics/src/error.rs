//! Unified error type for the SQL-on-FHIR engine

use crate::{ErrorCode, Span};
use thiserror::Error;

/// Errors surfaced by the view engine
///
/// The variants follow the engine's error taxonomy: parse and compile errors
/// are raised before any database round trip, execution errors carry the
/// identity of the failing statement, integrity errors come from the
/// materialized-view validator, and cache errors mark a speed-layer outage
/// that the serving layer must absorb.
#[derive(Debug, Error, Clone)]
pub enum SofError {
    /// Path expression parse error
    #[error("{code}: {message} in '{expression}'")]
    Parse {
        code: ErrorCode,
        message: String,
        expression: String,
        span: Option<Span>,
    },

    /// View compilation error (malformed definition, unsupported construct)
    #[error("{code}: {message}")]
    Compile {
        code: ErrorCode,
        message: String,
        view: Option<String>,
    },

    /// Statement execution error
    #[error("{code}: {message}")]
    Execution {
        code: ErrorCode,
        message: String,
        statement: Option<String>,
    },

    /// Integrity violation reported by the validator
    #[error("{code}: {message}")]
    Integrity {
        code: ErrorCode,
        message: String,
        check: Option<String>,
    },

    /// Speed-layer cache backend unavailable
    #[error("{code}: {message}")]
    Cache { code: ErrorCode, message: String },

    /// System error (configuration, I/O)
    #[error("{code}: {message}")]
    System { code: ErrorCode, message: String },

    /// Multiple errors collected
    #[error("Multiple errors: {}", .0.len())]
    Multiple(Vec<SofError>),
}

impl SofError {
    /// Create a parse error
    pub fn parse(code: ErrorCode, message: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            expression: expression.into(),
            span: None,
        }
    }

    /// Create a parse error with a source span
    pub fn parse_at(
        code: ErrorCode,
        message: impl Into<String>,
        expression: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            expression: expression.into(),
            span: Some(span),
        }
    }

    /// Create a compile error
    pub fn compile(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Compile {
            code,
            message: message.into(),
            view: None,
        }
    }

    /// Create a compile error attributed to a named view
    pub fn compile_in(code: ErrorCode, message: impl Into<String>, view: impl Into<String>) -> Self {
        Self::Compile {
            code,
            message: message.into(),
            view: Some(view.into()),
        }
    }

    /// Create an execution error
    pub fn execution(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            statement: None,
        }
    }

    /// Create an execution error carrying the failing statement's identity
    pub fn execution_of(
        code: ErrorCode,
        message: impl Into<String>,
        statement: impl Into<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            statement: Some(statement.into()),
        }
    }

    /// Create an integrity error
    pub fn integrity(code: ErrorCode, message: impl Into<String>, check: impl Into<String>) -> Self {
        Self::Integrity {
            code,
            message: message.into(),
            check: Some(check.into()),
        }
    }

    /// Create a cache backend error
    pub fn cache(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Cache {
            code,
            message: message.into(),
        }
    }

    /// Create a system error
    pub fn system(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::System {
            code,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { code, .. } => *code,
            Self::Compile { code, .. } => *code,
            Self::Execution { code, .. } => *code,
            Self::Integrity { code, .. } => *code,
            Self::Cache { code, .. } => *code,
            Self::System { code, .. } => *code,
            Self::Multiple(errors) => errors.first().map(|e| e.code()).unwrap_or(ErrorCode::new(0)),
        }
    }

    /// Whether this error was raised before any database access
    pub fn is_compile_time(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Compile { .. })
    }

    /// Whether this error marks a speed-layer outage the serving layer may absorb
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SOF0102, SOF0200, SOF0401};

    #[test]
    fn display_includes_code_and_message() {
        let err = SofError::compile(SOF0102, "unsupported function 'distinct'");
        assert_eq!(err.to_string(), "SOF0102: unsupported function 'distinct'");
    }

    #[test]
    fn parse_error_display_includes_expression() {
        let err = SofError::parse(crate::SOF0001, "unexpected token", "name..family");
        assert!(err.to_string().contains("name..family"));
    }

    #[test]
    fn classification_helpers() {
        assert!(SofError::compile(SOF0102, "x").is_compile_time());
        assert!(!SofError::execution(SOF0200, "x").is_compile_time());
        assert!(SofError::cache(SOF0401, "down").is_cache_unavailable());
    }
}
