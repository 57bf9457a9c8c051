//! Literal values in path expressions

use std::fmt;

/// A literal value on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Single-quoted string (`''` escapes an embedded quote in source)
    String(String),
    /// Integer literal
    Integer(i64),
    /// Decimal literal, kept as its source lexeme for deterministic rendering
    Decimal(String),
    /// Boolean literal
    Boolean(bool),
}

impl Literal {
    /// Render the literal as a SQL token
    ///
    /// Strings are single-quoted with embedded quotes doubled; the other
    /// variants render as bare tokens.
    pub fn as_sql(&self) -> String {
        match self {
            Self::String(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(raw) => raw.clone(),
            Self::Boolean(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "'{s}'"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(raw) => write!(f, "{raw}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}
