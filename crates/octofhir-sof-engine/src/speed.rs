//! Speed-layer cache
//!
//! A time-windowed store of individually cached resource documents,
//! representing writes not yet reflected in the batch materialization.
//! Documents expire after a fixed TTL (default 24 hours, independent of the
//! batch result cache). Scans apply the same constraint semantics as the
//! batch layer and project documents into batch-shaped rows.

use crate::projection::{document_matches_filters, project_document};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octofhir_sof_diagnostics::{Result, SOF0401, SofError};
use octofhir_sof_model::{ResultRow, SchemaCatalog, SearchConstraints, matches_document};
use octofhir_sof_sql::CompiledView;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A document held by the speed layer
#[derive(Debug, Clone)]
pub struct CachedDocument {
    /// Resource type
    pub resource_type: String,
    /// Resource id
    pub id: String,
    /// Raw document body
    pub body: Value,
    /// Insertion time; drives both TTL expiry and recency scans
    pub inserted_at: DateTime<Utc>,
}

/// Storage backend of the speed layer
///
/// Backend failures are cache errors (SOF0401); the serving layer absorbs
/// them by degrading to batch-only results.
#[async_trait]
pub trait SpeedCacheBackend: Send + Sync {
    /// Idempotently upsert a document
    async fn put(&self, document: CachedDocument) -> Result<()>;

    /// Unexpired documents of a type inserted at or after `since`
    async fn scan_type(
        &self,
        resource_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CachedDocument>>;

    /// Drop every cached document
    async fn flush(&self) -> Result<()>;
}

/// In-process speed-cache backend
pub struct MemorySpeedCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), CachedDocument>>,
}

impl MemorySpeedCache {
    /// Create a backend with the given document TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn expired(&self, document: &CachedDocument, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        document.inserted_at + ttl <= now
    }
}

impl Default for MemorySpeedCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(24 * 60 * 60))
    }
}

#[async_trait]
impl SpeedCacheBackend for MemorySpeedCache {
    async fn put(&self, document: CachedDocument) -> Result<()> {
        let key = (document.resource_type.clone(), document.id.clone());
        self.entries.write().insert(key, document);
        Ok(())
    }

    async fn scan_type(
        &self,
        resource_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CachedDocument>> {
        let now = Utc::now();
        let mut entries = self.entries.write();
        entries.retain(|_, document| !self.expired(document, now));

        let mut matches: Vec<CachedDocument> = entries
            .values()
            .filter(|document| {
                document.resource_type == resource_type && document.inserted_at >= since
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches)
    }

    async fn flush(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// The speed layer: recent documents queryable in batch row shape
pub struct SpeedLayer {
    backend: Arc<dyn SpeedCacheBackend>,
    catalog: SchemaCatalog,
}

impl SpeedLayer {
    /// Create a speed layer over a backend
    pub fn new(backend: Arc<dyn SpeedCacheBackend>, catalog: SchemaCatalog) -> Self {
        Self { backend, catalog }
    }

    /// Insert or replace a recent document
    pub async fn put(&self, resource_type: &str, id: &str, body: Value) -> Result<()> {
        self.backend
            .put(CachedDocument {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                body,
                inserted_at: Utc::now(),
            })
            .await
    }

    /// Scan unexpired documents inserted at or after `since`, returning rows
    /// in the given view's shape
    ///
    /// Constraint and filter semantics match the batch layer: unknown
    /// constraint names are compile errors, matching documents are projected
    /// through the view's column ASTs.
    pub async fn scan_recent(
        &self,
        view: &CompiledView,
        since: DateTime<Utc>,
        constraints: &SearchConstraints,
        limit: usize,
    ) -> Result<Vec<ResultRow>> {
        // Resolve constraint fields before touching the backend, so compile
        // errors surface as such rather than being absorbed as outages.
        let mut fields = Vec::with_capacity(constraints.len());
        for (name, value) in constraints.iter() {
            fields.push((self.catalog.search_field(&view.resource, name)?, value));
        }

        let documents = self.backend.scan_type(&view.resource, since).await?;
        let mut rows = Vec::new();
        'documents: for document in &documents {
            for (field, value) in &fields {
                if !matches_document(field, value, &document.body) {
                    continue 'documents;
                }
            }
            if !document_matches_filters(view, &document.body) {
                continue;
            }
            for values in project_document(view, &document.body) {
                rows.push(ResultRow::speed(values));
                if rows.len() == limit {
                    break 'documents;
                }
            }
        }
        log::debug!(
            "speed scan over '{}' matched {} of {} documents",
            view.resource,
            rows.len(),
            documents.len()
        );
        Ok(rows)
    }

    /// Drop every cached document
    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await
    }
}

/// Convenience constructor for a cache-unavailable error
pub fn cache_unavailable(message: impl Into<String>) -> SofError {
    SofError::cache(SOF0401, message)
}
