//! Mock implementations of the engine's seams

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octofhir_sof_diagnostics::{Result, SOF0200, SofError};
use octofhir_sof_engine::{CachedDocument, DocumentStore, SpeedCacheBackend, cache_unavailable};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::VecDeque;

/// Configurable in-memory document store
///
/// Records every statement it executes; row queries are answered from a
/// queue of canned result sets, falling back to a default set.
#[derive(Default)]
pub struct MockDocumentStore {
    rows: RwLock<Vec<Value>>,
    queued_rows: RwLock<VecDeque<Vec<Value>>>,
    count: RwLock<i64>,
    matviews: RwLock<Vec<String>>,
    fail: RwLock<bool>,
    executed: RwLock<Vec<(String, Vec<String>)>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default rows returned by every row query
    pub fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.write() = rows;
    }

    /// Queue a one-shot result set, consumed before the default rows
    pub fn queue_rows(&self, rows: Vec<Value>) {
        self.queued_rows.write().push_back(rows);
    }

    pub fn set_count(&self, count: i64) {
        *self.count.write() = count;
    }

    pub fn set_matviews(&self, names: Vec<String>) {
        *self.matviews.write() = names;
    }

    /// Make every statement fail with an execution error
    pub fn set_failing(&self, failing: bool) {
        *self.fail.write() = failing;
    }

    /// Statements executed so far (row and count queries)
    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        self.executed.read().clone()
    }

    /// Number of executed statements
    pub fn executed_count(&self) -> usize {
        self.executed.read().len()
    }

    fn record(&self, sql: &str, params: &[String]) -> Result<()> {
        self.executed
            .write()
            .push((sql.to_string(), params.to_vec()));
        if *self.fail.read() {
            return Err(SofError::execution_of(SOF0200, "simulated failure", sql));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn query_rows(&self, sql: &str, params: &[String]) -> Result<Vec<Value>> {
        self.record(sql, params)?;
        if let Some(queued) = self.queued_rows.write().pop_front() {
            return Ok(queued);
        }
        Ok(self.rows.read().clone())
    }

    async fn query_count(&self, sql: &str, params: &[String]) -> Result<i64> {
        self.record(sql, params)?;
        Ok(*self.count.read())
    }

    async fn list_matviews(&self, _schema: &str) -> Result<Vec<String>> {
        if *self.fail.read() {
            return Err(SofError::execution_of(
                SOF0200,
                "simulated failure",
                "pg_matviews lookup",
            ));
        }
        Ok(self.matviews.read().clone())
    }

    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        self.record(sql, &[])
    }

    async fn refresh_matview(&self, schema: &str, name: &str, definition: &str) -> Result<()> {
        self.record(&format!("REFRESH {schema}.{name}"), &[])?;
        let mut matviews = self.matviews.write();
        if !matviews.iter().any(|n| n == name) {
            matviews.push(name.to_string());
        }
        drop(matviews);
        self.record(definition, &[]).ok();
        Ok(())
    }
}

/// Speed-cache backend that is always unreachable
pub struct FailingSpeedBackend;

#[async_trait]
impl SpeedCacheBackend for FailingSpeedBackend {
    async fn put(&self, _document: CachedDocument) -> Result<()> {
        Err(cache_unavailable("speed cache backend is down"))
    }

    async fn scan_type(
        &self,
        _resource_type: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<CachedDocument>> {
        Err(cache_unavailable("speed cache backend is down"))
    }

    async fn flush(&self) -> Result<()> {
        Err(cache_unavailable("speed cache backend is down"))
    }
}
