//! ViewDefinition model
//!
//! The external JSON shape (`select` blocks with `column`, `forEach` /
//! `forEachOrNull` and nested `select`, plus `where` filters) is validated
//! into a closed select-tree model at deserialization time, so the compiler's
//! recursion over it is exhaustive.

use octofhir_sof_diagnostics::{SOF0100, SOF0106, SofError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared output type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Text value (the default)
    #[default]
    String,
    /// Numeric value
    Number,
    /// Boolean value
    Boolean,
    /// Calendar date
    Date,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
            Self::Date => write!(f, "date"),
        }
    }
}

/// One output column of a select block
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDef {
    /// Output column name
    pub name: String,
    /// Source path expression
    pub path: String,
    /// Declared type (defaults to string)
    #[serde(default, rename = "type")]
    pub column_type: ColumnType,
}

/// Row-expansion mode for a collection-valued path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// One output row per array element; zero rows when the array is empty
    Each,
    /// One output row per element; exactly one null-valued row when empty
    EachOrNull,
}

/// A row expansion attached to a select block
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    /// Array-valued path, relative to the enclosing scope
    pub path: String,
    /// Expansion mode
    pub mode: ExpansionMode,
}

/// A node of the select tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawSelect")]
pub struct SelectBlock {
    /// Output columns evaluated in this block's scope
    pub columns: Vec<ColumnDef>,
    /// Row expansion opening a nested scope, if any
    pub expansion: Option<Expansion>,
    /// Nested select blocks (evaluated inside the expansion scope when one
    /// is present, otherwise in this block's scope)
    pub nested: Vec<SelectBlock>,
}

/// A boolean filter applied to the base resource
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterExpr {
    /// Boolean path expression
    pub path: String,
}

/// An immutable, named view specification
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawViewDefinition")]
pub struct ViewDefinition {
    /// View name; also names the materialized view when one exists
    pub name: String,
    /// Target resource type
    pub resource: String,
    /// Select tree
    pub select: Vec<SelectBlock>,
    /// Filter expressions, conjoined at compile time
    pub filters: Vec<FilterExpr>,
}

impl ViewDefinition {
    /// Parse a ViewDefinition from its JSON document form
    pub fn from_json(raw: &str) -> octofhir_sof_diagnostics::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SofError::compile(SOF0100, format!("invalid view definition: {e}")))
    }
}

// Raw serde-facing shapes, validated on conversion.

#[derive(Debug, Deserialize)]
struct RawSelect {
    #[serde(default)]
    column: Vec<ColumnDef>,
    #[serde(default, rename = "forEach")]
    for_each: Option<String>,
    #[serde(default, rename = "forEachOrNull")]
    for_each_or_null: Option<String>,
    #[serde(default)]
    select: Vec<SelectBlock>,
}

impl TryFrom<RawSelect> for SelectBlock {
    type Error = SofError;

    fn try_from(raw: RawSelect) -> Result<Self, Self::Error> {
        let expansion = match (raw.for_each, raw.for_each_or_null) {
            (Some(_), Some(_)) => {
                return Err(SofError::compile(
                    SOF0106,
                    "select block declares both forEach and forEachOrNull",
                ));
            }
            (Some(path), None) => Some(Expansion {
                path,
                mode: ExpansionMode::Each,
            }),
            (None, Some(path)) => Some(Expansion {
                path,
                mode: ExpansionMode::EachOrNull,
            }),
            (None, None) => None,
        };

        if raw.column.is_empty() && raw.select.is_empty() {
            return Err(SofError::compile(
                SOF0100,
                "select block has neither columns nor nested selects",
            ));
        }

        Ok(Self {
            columns: raw.column,
            expansion,
            nested: raw.select,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawViewDefinition {
    name: String,
    resource: String,
    #[serde(default)]
    select: Vec<SelectBlock>,
    #[serde(default, rename = "where")]
    where_: Vec<FilterExpr>,
}

impl TryFrom<RawViewDefinition> for ViewDefinition {
    type Error = SofError;

    fn try_from(raw: RawViewDefinition) -> Result<Self, Self::Error> {
        if raw.name.is_empty() {
            return Err(SofError::compile(SOF0100, "view definition has no name"));
        }
        if raw.resource.is_empty() {
            return Err(SofError::compile_in(
                SOF0100,
                "view definition has no resource type",
                raw.name,
            ));
        }
        if raw.select.is_empty() {
            return Err(SofError::compile_in(
                SOF0100,
                "view definition has no select blocks",
                raw.name,
            ));
        }

        Ok(Self {
            name: raw.name,
            resource: raw.resource,
            select: raw.select,
            filters: raw.where_,
        })
    }
}
