//! Materialized-view refresh
//!
//! Rebuilding a view's materialization is a separate, out-of-band batch job.
//! Single-writer discipline comes from the store's per-view advisory lock;
//! a refresh that loses the lock race fails fast instead of queueing, and
//! in-flight queries keep reading the prior version throughout.

use crate::DocumentStore;
use octofhir_sof_diagnostics::Result;
use octofhir_sof_model::{SchemaCatalog, ViewRegistry};
use octofhir_sof_sql::{QueryAssembler, ViewCompiler};
use std::sync::Arc;
use std::time::Instant;

/// Rebuilds materialized views from their definitions
pub struct MatviewRefresher {
    store: Arc<dyn DocumentStore>,
    catalog: SchemaCatalog,
    registry: Arc<ViewRegistry>,
}

impl MatviewRefresher {
    /// Create a refresher
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: SchemaCatalog,
        registry: Arc<ViewRegistry>,
    ) -> Self {
        Self {
            store,
            catalog,
            registry,
        }
    }

    /// Create or refresh one view's materialization
    pub async fn refresh(&self, view_name: &str) -> Result<()> {
        let view = self.registry.get(view_name)?;
        let compiled = ViewCompiler::new(&self.catalog).compile(&view)?;
        let assembler = QueryAssembler::new(&self.catalog);
        // Validates the view name as a relation name as a side effect
        assembler.materialized_relation(&compiled)?;
        let definition = assembler.materialization_sql(&compiled)?;

        let started = Instant::now();
        self.store
            .refresh_matview(self.catalog.schema(), &compiled.name, &definition)
            .await?;
        log::info!(
            "refreshed materialized view '{}' in {:?}",
            compiled.name,
            started.elapsed()
        );
        Ok(())
    }

    /// Refresh every registered view, stopping at the first failure
    pub async fn refresh_all(&self) -> Result<usize> {
        let mut refreshed = 0;
        for name in self.registry.names() {
            self.refresh(name).await?;
            refreshed += 1;
        }
        Ok(refreshed)
    }
}
