//! Document store seam
//!
//! All database access goes through [`DocumentStore`], so the runners can be
//! exercised against hand-rolled mocks in tests and against Postgres in
//! production.

use async_trait::async_trait;
use octofhir_sof_diagnostics::Result;
use serde_json::Value;

/// Read access to the backing document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a row query; every row comes back as a JSON object keyed by
    /// output column name
    async fn query_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Value>>;

    /// Execute a count query returning a single integer
    async fn query_count(&self, sql: &str, params: &[String]) -> Result<i64>;

    /// List materialized view names in a schema
    async fn list_matviews(&self, schema: &str) -> Result<Vec<String>>;

    /// Execute a DDL statement
    async fn execute_ddl(&self, sql: &str) -> Result<()>;

    /// Create or refresh a materialized view under single-writer discipline
    ///
    /// Implementations must take a per-view advisory lock on one connection
    /// for the whole operation and fail fast (execution error, concurrent
    /// refresh) when the lock is already held. Queries running during a
    /// refresh keep reading the prior version.
    async fn refresh_matview(&self, schema: &str, name: &str, definition: &str) -> Result<()>;
}
