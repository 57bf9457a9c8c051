//! Error codes following a structured numbering system
//!
//! Error code ranges:
//! - SOF0001-SOF0099: Parse errors (path expression syntax)
//! - SOF0100-SOF0199: Compile errors (view definitions, transpilation)
//! - SOF0200-SOF0299: Execution errors (database, statements)
//! - SOF0300-SOF0399: Integrity errors (materialized view validation)
//! - SOF0400-SOF0499: System errors (cache backend, configuration, I/O)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    /// Check if this is a parse error (0001-0099)
    pub const fn is_parse_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    /// Check if this is a compile error (0100-0199)
    pub const fn is_compile_error(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    /// Check if this is an execution error (0200-0299)
    pub const fn is_execution_error(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Check if this is an integrity error (0300-0399)
    pub const fn is_integrity_error(&self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Check if this is a system error (0400-0499)
    pub const fn is_system_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SOF{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Parse errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Invalid identifier"));
    map.insert(4, ErrorInfo::new("Invalid literal"));
    map.insert(5, ErrorInfo::new("Unterminated string literal"));
    map.insert(6, ErrorInfo::new("Invalid array index"));
    map.insert(7, ErrorInfo::new("Missing closing delimiter"));
    map.insert(8, ErrorInfo::new("Expected expression"));
    map.insert(9, ErrorInfo::new("Trailing input after expression"));

    // Compile errors (0100-0199)
    map.insert(100, ErrorInfo::new("Malformed view definition"));
    map.insert(101, ErrorInfo::new("Unknown resource type")
        .with_help("Check that the resource type is declared in the schema catalog"));
    map.insert(102, ErrorInfo::new("Unsupported expression construct")
        .with_help("Only field access, indexing, where(), exists(), count(), empty() and first() are supported"));
    map.insert(103, ErrorInfo::new("Ambiguous column name"));
    map.insert(104, ErrorInfo::new("Unknown view"));
    map.insert(105, ErrorInfo::new("Unknown search constraint"));
    map.insert(106, ErrorInfo::new("Conflicting row expansion modes"));
    map.insert(107, ErrorInfo::new("Invalid filter expression"));

    // Execution errors (0200-0299)
    map.insert(200, ErrorInfo::new("Statement execution failed"));
    map.insert(201, ErrorInfo::new("Connection failure"));
    map.insert(202, ErrorInfo::new("Statement timeout"));
    map.insert(203, ErrorInfo::new("Concurrent refresh in progress")
        .with_help("Materialized views are refreshed under single-writer discipline; retry later"));
    map.insert(204, ErrorInfo::new("Malformed result row"));

    // Integrity errors (0300-0399)
    map.insert(300, ErrorInfo::new("Integrity check failed"));
    map.insert(301, ErrorInfo::new("Missing reference column"));
    map.insert(302, ErrorInfo::new("Extracted identifier mismatch"));
    map.insert(303, ErrorInfo::new("Malformed reference value"));
    map.insert(304, ErrorInfo::new("Dangling reference"));

    // System errors (0400-0499)
    map.insert(400, ErrorInfo::new("Internal error"));
    map.insert(401, ErrorInfo::new("Cache backend unavailable")
        .with_help("The speed layer degrades to batch-only results when its backend is down"));
    map.insert(402, ErrorInfo::new("Configuration error"));
    map.insert(403, ErrorInfo::new("I/O error"));

    map
});

// Convenient error code constants

// Parse errors
pub const SOF0001: ErrorCode = ErrorCode::new(1);
pub const SOF0002: ErrorCode = ErrorCode::new(2);
pub const SOF0003: ErrorCode = ErrorCode::new(3);
pub const SOF0004: ErrorCode = ErrorCode::new(4);
pub const SOF0005: ErrorCode = ErrorCode::new(5);
pub const SOF0006: ErrorCode = ErrorCode::new(6);
pub const SOF0007: ErrorCode = ErrorCode::new(7);
pub const SOF0008: ErrorCode = ErrorCode::new(8);
pub const SOF0009: ErrorCode = ErrorCode::new(9);

// Compile errors
pub const SOF0100: ErrorCode = ErrorCode::new(100);
pub const SOF0101: ErrorCode = ErrorCode::new(101);
pub const SOF0102: ErrorCode = ErrorCode::new(102);
pub const SOF0103: ErrorCode = ErrorCode::new(103);
pub const SOF0104: ErrorCode = ErrorCode::new(104);
pub const SOF0105: ErrorCode = ErrorCode::new(105);
pub const SOF0106: ErrorCode = ErrorCode::new(106);
pub const SOF0107: ErrorCode = ErrorCode::new(107);

// Execution errors
pub const SOF0200: ErrorCode = ErrorCode::new(200);
pub const SOF0201: ErrorCode = ErrorCode::new(201);
pub const SOF0202: ErrorCode = ErrorCode::new(202);
pub const SOF0203: ErrorCode = ErrorCode::new(203);
pub const SOF0204: ErrorCode = ErrorCode::new(204);

// Integrity errors
pub const SOF0300: ErrorCode = ErrorCode::new(300);
pub const SOF0301: ErrorCode = ErrorCode::new(301);
pub const SOF0302: ErrorCode = ErrorCode::new(302);
pub const SOF0303: ErrorCode = ErrorCode::new(303);
pub const SOF0304: ErrorCode = ErrorCode::new(304);

// System errors
pub const SOF0400: ErrorCode = ErrorCode::new(400);
pub const SOF0401: ErrorCode = ErrorCode::new(401);
pub const SOF0402: ErrorCode = ErrorCode::new(402);
pub const SOF0403: ErrorCode = ErrorCode::new(403);
