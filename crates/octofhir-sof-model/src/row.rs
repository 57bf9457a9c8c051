//! Result rows, schemas and query results

use crate::ColumnType;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Provenance of a result row in the serving layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowSource {
    /// Came from the batch layer (materialized view or live query)
    Batch,
    /// Came from the speed-layer cache and had no batch counterpart
    Speed,
    /// Speed-layer row that replaced a batch row with the same resource id
    Merged,
}

/// Ordered column name → scalar value mapping
///
/// Rows from the same query share a schema; the engine guarantees a leading
/// `id` column carrying the resource id that the serving layer merges on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    /// Column values in schema order
    pub values: IndexMap<String, Value>,
    /// Row provenance
    pub source: RowSource,
}

impl ResultRow {
    /// Create a batch-sourced row
    pub fn batch(values: IndexMap<String, Value>) -> Self {
        Self {
            values,
            source: RowSource::Batch,
        }
    }

    /// Create a speed-sourced row
    pub fn speed(values: IndexMap<String, Value>) -> Self {
        Self {
            values,
            source: RowSource::Speed,
        }
    }

    /// Get a column value
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// The resource id this row belongs to, when present and textual
    pub fn resource_id(&self) -> Option<&str> {
        self.values.get("id").and_then(Value::as_str)
    }
}

/// Ordered column name → declared type mapping
pub type ViewSchema = IndexMap<String, ColumnType>;

/// Which layers produced a query result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Batch layer only
    Batch,
    /// Batch overlaid with speed-layer rows
    Hybrid,
}

/// A complete query result as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Result rows, merged and bounded by the row limit
    pub rows: Vec<ResultRow>,
    /// Column name → type schema shared by all rows
    pub schema: ViewSchema,
    /// Number of rows returned
    pub row_count: usize,
    /// Which layers contributed
    pub source: ResultSource,
    /// True when the speed layer was enabled but unreachable for this call
    pub speed_skipped: bool,
}
