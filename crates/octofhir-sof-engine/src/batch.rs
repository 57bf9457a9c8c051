//! Batch runner
//!
//! Executes a logical query against the view's materialized form when one
//! exists (checked through a periodically invalidated existence snapshot),
//! otherwise compiles and runs against the live resource tables. Successful
//! row results are cached by (view, canonical constraints, limit) with a
//! fixed TTL.

use crate::{CacheStatistics, DocumentStore, ExecutionStatistics};
use indexmap::IndexMap;
use octofhir_sof_diagnostics::Result;
use octofhir_sof_model::{
    ResultRow, SchemaCatalog, SearchConstraints, ViewRegistry, ViewSchema,
};
use octofhir_sof_sql::{CompiledQuery, CompiledView, QueryAssembler, ViewCompiler};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Batch runner tuning knobs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Result-cache time-to-live
    pub cache_ttl: Duration,
    /// How long the materialized-view existence snapshot stays fresh
    pub matview_snapshot_ttl: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            matview_snapshot_ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    view: String,
    constraints: String,
    limit: usize,
}

struct CacheEntry {
    rows: Vec<ResultRow>,
    created: Instant,
}

struct MatviewSnapshot {
    names: HashSet<String>,
    taken: Instant,
}

/// Executes batch queries with result caching and statistics
pub struct BatchRunner {
    store: Arc<dyn DocumentStore>,
    catalog: SchemaCatalog,
    registry: Arc<ViewRegistry>,
    config: BatchConfig,
    result_cache: RwLock<HashMap<CacheKey, CacheEntry>>,
    matviews: RwLock<Option<MatviewSnapshot>>,
    exec_stats: Mutex<ExecutionStatistics>,
    cache_stats: Mutex<CacheStatistics>,
}

impl BatchRunner {
    /// Create a runner over a store, catalog and registry
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: SchemaCatalog,
        registry: Arc<ViewRegistry>,
        config: BatchConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            registry,
            config,
            result_cache: RwLock::new(HashMap::new()),
            matviews: RwLock::new(None),
            exec_stats: Mutex::new(ExecutionStatistics::default()),
            cache_stats: Mutex::new(CacheStatistics::default()),
        }
    }

    /// The backing document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The schema catalog
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// The view registry
    pub fn registry(&self) -> &Arc<ViewRegistry> {
        &self.registry
    }

    /// Compile a registered view
    pub fn compile_view(&self, view_name: &str) -> Result<CompiledView> {
        let view = self.registry.get(view_name)?;
        ViewCompiler::new(&self.catalog).compile(&view)
    }

    /// Column name → type schema of a registered view
    pub fn schema(&self, view_name: &str) -> Result<ViewSchema> {
        Ok(self.compile_view(view_name)?.schema)
    }

    /// Execute a row query, served from cache when possible
    pub async fn execute(
        &self,
        view_name: &str,
        constraints: &SearchConstraints,
        limit: usize,
    ) -> Result<Vec<ResultRow>> {
        let compiled = self.compile_view(view_name)?;
        let query = self.plan(&compiled, constraints, limit).await?;

        let key = CacheKey {
            view: view_name.to_string(),
            constraints: constraints.fingerprint(),
            limit,
        };
        if let Some(rows) = self.cache_get(&key) {
            self.cache_stats.lock().hits += 1;
            log::debug!("cache hit for view '{view_name}'");
            return Ok(rows);
        }
        self.cache_stats.lock().misses += 1;

        let started = Instant::now();
        let raw = self.store.query_rows(&query.sql, &query.params).await;
        match raw {
            Ok(raw) => {
                self.exec_stats.lock().record(started.elapsed());
                let rows: Vec<ResultRow> = raw
                    .into_iter()
                    .map(|row| shape_row(&compiled.schema, row))
                    .collect();
                self.cache_put(key, &rows);
                log::debug!(
                    "executed view '{view_name}' ({} rows in {:?})",
                    rows.len(),
                    started.elapsed()
                );
                Ok(rows)
            }
            Err(e) => {
                self.exec_stats.lock().record_error();
                Err(e)
            }
        }
    }

    /// Execute the count-only variant (never cached)
    pub async fn execute_count(
        &self,
        view_name: &str,
        constraints: &SearchConstraints,
    ) -> Result<i64> {
        let compiled = self.compile_view(view_name)?;
        // The limit does not appear in count queries; any value assembles
        // the same count statement.
        let query = self.plan(&compiled, constraints, 1).await?;

        let started = Instant::now();
        let count = self
            .store
            .query_count(&query.count_sql, &query.params)
            .await;
        match count {
            Ok(count) => {
                self.exec_stats.lock().record(started.elapsed());
                Ok(count)
            }
            Err(e) => {
                self.exec_stats.lock().record_error();
                Err(e)
            }
        }
    }

    /// Whether a materialized view currently backs the given view
    pub async fn is_materialized(&self, view_name: &str) -> Result<bool> {
        {
            let snapshot = self.matviews.read();
            if let Some(snapshot) = snapshot.as_ref() {
                if snapshot.taken.elapsed() < self.config.matview_snapshot_ttl {
                    return Ok(snapshot.names.contains(view_name));
                }
            }
        }

        let names: HashSet<String> = self
            .store
            .list_matviews(self.catalog.schema())
            .await?
            .into_iter()
            .collect();
        let contains = names.contains(view_name);
        *self.matviews.write() = Some(MatviewSnapshot {
            names,
            taken: Instant::now(),
        });
        Ok(contains)
    }

    /// Snapshot of execution statistics
    pub fn execution_statistics(&self) -> ExecutionStatistics {
        *self.exec_stats.lock()
    }

    /// Snapshot of result-cache statistics
    pub fn cache_statistics(&self) -> CacheStatistics {
        let mut stats = *self.cache_stats.lock();
        stats.entries = self.result_cache.read().len();
        stats
    }

    /// Drop every cached result and the materialized-view snapshot
    pub fn clear_cache(&self) {
        self.result_cache.write().clear();
        *self.matviews.write() = None;
        log::info!("batch result cache cleared");
    }

    async fn plan(
        &self,
        compiled: &CompiledView,
        constraints: &SearchConstraints,
        limit: usize,
    ) -> Result<CompiledQuery> {
        let assembler = QueryAssembler::new(&self.catalog);
        if self.is_materialized(&compiled.name).await? {
            assembler.assemble_materialized(compiled, constraints, limit)
        } else {
            assembler.assemble(compiled, constraints, limit)
        }
    }

    fn cache_get(&self, key: &CacheKey) -> Option<Vec<ResultRow>> {
        let cache = self.result_cache.read();
        let entry = cache.get(key)?;
        if entry.created.elapsed() >= self.config.cache_ttl {
            return None;
        }
        Some(entry.rows.clone())
    }

    fn cache_put(&self, key: CacheKey, rows: &[ResultRow]) {
        let mut cache = self.result_cache.write();
        // Expired entries are evicted opportunistically on insert
        cache.retain(|_, entry| entry.created.elapsed() < self.config.cache_ttl);
        cache.insert(
            key,
            CacheEntry {
                rows: rows.to_vec(),
                created: Instant::now(),
            },
        );
    }
}

/// Reorder a raw JSON row into schema order
///
/// `row_to_json` output carries the statement's column order, but shaping
/// through the compiled schema keeps the engine independent of how a store
/// implementation serializes rows.
fn shape_row(schema: &ViewSchema, raw: Value) -> ResultRow {
    let mut values = IndexMap::with_capacity(schema.len());
    for name in schema.keys() {
        let value = raw.get(name).cloned().unwrap_or(Value::Null);
        values.insert(name.clone(), value);
    }
    ResultRow::batch(values)
}
