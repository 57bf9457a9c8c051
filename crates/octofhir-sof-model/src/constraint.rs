//! Search-constraint semantics
//!
//! Caller-supplied constraints are a flat name → value map with FHIR-style
//! semantics: token fields match by exact code (optionally `system|code`
//! qualified), string fields by case-insensitive prefix, date fields accept
//! `ge`/`le`-prefixed bounds. The same semantics are applied twice — as SQL
//! predicates by the query assembler and in memory by the speed layer — so
//! the value parsing and the document matcher live here, next to the field
//! definitions both sides share.

use chrono::NaiveDate;
use octofhir_sof_diagnostics::{Result, SOF0105, SofError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Matching behavior of a searchable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Exact match against a scalar code (status, gender, reference string)
    Token,
    /// Exact match against `code`/`system` keys of a coding array
    TokenCoding,
    /// Case-insensitive prefix match against a string field
    String,
    /// Comparison-prefixed calendar-date bound
    Date,
}

/// A searchable field of a resource type, as declared in the schema catalog
#[derive(Debug, Clone, PartialEq)]
pub struct SearchField {
    /// Matching behavior
    pub kind: ConstraintKind,
    /// Document path segments from the resource root
    pub segments: Vec<&'static str>,
    /// Index of the segment that yields an array, when the path crosses one
    pub array_at: Option<usize>,
}

impl SearchField {
    /// Scalar field definition
    pub fn scalar(kind: ConstraintKind, segments: Vec<&'static str>) -> Self {
        Self {
            kind,
            segments,
            array_at: None,
        }
    }

    /// Field definition whose path crosses an array at `array_at`
    pub fn collection(
        kind: ConstraintKind,
        segments: Vec<&'static str>,
        array_at: usize,
    ) -> Self {
        Self {
            kind,
            segments,
            array_at: Some(array_at),
        }
    }
}

/// A parsed token constraint value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValue {
    /// Optional system qualifier
    pub system: Option<String>,
    /// The code to match
    pub code: String,
}

impl TokenValue {
    /// Parse a raw token value, splitting an optional `system|code` qualifier
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('|') {
            Some((system, code)) if !system.is_empty() => Self {
                system: Some(system.to_string()),
                code: code.to_string(),
            },
            Some((_, code)) => Self {
                system: None,
                code: code.to_string(),
            },
            None => Self {
                system: None,
                code: raw.to_string(),
            },
        }
    }
}

/// Comparison operator of a date constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOp {
    Eq,
    Ge,
    Le,
}

impl DateOp {
    /// SQL rendering of the operator
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

/// A parsed date constraint value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBound {
    /// Comparison operator
    pub op: DateOp,
    /// The bound
    pub date: NaiveDate,
}

impl DateBound {
    /// Parse a raw date value with an optional `ge`/`le` prefix
    pub fn parse(raw: &str) -> Result<Self> {
        let (op, rest) = match raw {
            _ if raw.starts_with("ge") => (DateOp::Ge, &raw[2..]),
            _ if raw.starts_with("le") => (DateOp::Le, &raw[2..]),
            _ => (DateOp::Eq, raw),
        };
        let date = NaiveDate::parse_from_str(rest, "%Y-%m-%d").map_err(|_| {
            SofError::compile(SOF0105, format!("invalid date constraint value '{raw}'"))
        })?;
        Ok(Self { op, date })
    }

    /// The bound as its ISO date string
    pub fn as_iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// A canonicalized set of caller search constraints
///
/// Constraints are kept sorted by name so that two logically identical sets
/// compile to byte-identical statements and hash to the same cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchConstraints(BTreeMap<String, String>);

impl SearchConstraints {
    /// Empty constraint set
    pub fn none() -> Self {
        Self::default()
    }

    /// Canonicalize an arbitrary name/value collection
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Iterate constraints in canonical (name-sorted) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of constraints
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical fingerprint used in cache keys
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.iter() {
            if !out.is_empty() {
                out.push('&');
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Collect all values reachable through `segments`, flattening arrays
///
/// FHIR search semantics match against every repetition of a field, so a
/// path like `name.family` yields the family of every name in the document.
pub fn collect_values<'a>(doc: &'a Value, segments: &[&str]) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            let stepped = match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(v) = item.get(segment) {
                            next.push(v);
                        }
                    }
                    continue;
                }
                other => other.get(segment),
            };
            if let Some(v) = stepped {
                next.push(v);
            }
        }
        current = next;
    }

    // Flatten a trailing array so callers always see leaf values/elements
    let mut leaves = Vec::new();
    for value in current {
        match value {
            Value::Array(items) => leaves.extend(items.iter()),
            other => leaves.push(other),
        }
    }
    leaves
}

/// Check one constraint against a raw document
///
/// This is the speed layer's counterpart of the SQL predicates the query
/// assembler generates for the batch layer.
pub fn matches_document(field: &SearchField, raw_value: &str, doc: &Value) -> bool {
    let values = collect_values(doc, &field.segments);
    match field.kind {
        ConstraintKind::Token => {
            let token = TokenValue::parse(raw_value);
            values.iter().any(|v| match v {
                Value::String(s) => *s == token.code,
                Value::Bool(b) => b.to_string() == token.code,
                Value::Number(n) => n.to_string() == token.code,
                _ => false,
            })
        }
        ConstraintKind::TokenCoding => {
            let token = TokenValue::parse(raw_value);
            values.iter().any(|coding| {
                let code_matches = coding.get("code").and_then(Value::as_str) == Some(&token.code);
                let system_matches = match &token.system {
                    Some(system) => {
                        coding.get("system").and_then(Value::as_str) == Some(system.as_str())
                    }
                    None => true,
                };
                code_matches && system_matches
            })
        }
        ConstraintKind::String => {
            let prefix = raw_value.to_lowercase();
            values.iter().any(|v| {
                v.as_str()
                    .is_some_and(|s| s.to_lowercase().starts_with(&prefix))
            })
        }
        ConstraintKind::Date => {
            let Ok(bound) = DateBound::parse(raw_value) else {
                return false;
            };
            values.iter().any(|v| {
                let Some(text) = v.as_str() else { return false };
                let Some(date) = text
                    .get(..10)
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                else {
                    return false;
                };
                match bound.op {
                    DateOp::Eq => date == bound.date,
                    DateOp::Ge => date >= bound.date,
                    DateOp::Le => date <= bound.date,
                }
            })
        }
    }
}
