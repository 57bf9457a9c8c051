//! Serving layer
//!
//! Routes a logical query to the batch runner and, when enabled, the speed
//! layer, then merges the two result sets. Speed-layer rows are presumed
//! newer and fully supersede batch rows with the same resource id. A speed
//! layer outage never fails the query: the call degrades to batch-only
//! results and the skip is recorded in the serving statistics.

use crate::{BatchRunner, IntegrityReport, IntegrityValidator, ServingStatistics, SpeedLayer};
use chrono::Utc;
use octofhir_sof_diagnostics::Result;
use octofhir_sof_model::{
    QueryResult, ResultRow, ResultSource, RowSource, SearchConstraints, ViewSchema,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;

/// Serving layer configuration
#[derive(Debug, Clone)]
pub struct ServingConfig {
    /// Whether the speed layer participates in queries
    pub speed_enabled: bool,
    /// Recency window for speed-layer scans (watermark = now - window)
    pub speed_window: Duration,
    /// Row limit applied when the caller passes zero
    pub default_limit: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            speed_enabled: true,
            speed_window: Duration::from_secs(24 * 60 * 60),
            default_limit: 1000,
        }
    }
}

/// The hybrid batch + speed query runner
pub struct ServingLayer {
    batch: BatchRunner,
    speed: Option<SpeedLayer>,
    config: ServingConfig,
    stats: Mutex<ServingStatistics>,
}

impl ServingLayer {
    /// Create a serving layer; statistics start at zero
    pub fn new(batch: BatchRunner, speed: Option<SpeedLayer>, config: ServingConfig) -> Self {
        Self {
            batch,
            speed,
            config,
            stats: Mutex::new(ServingStatistics::default()),
        }
    }

    /// The underlying batch runner
    pub fn batch(&self) -> &BatchRunner {
        &self.batch
    }

    /// The speed layer, when configured
    pub fn speed(&self) -> Option<&SpeedLayer> {
        self.speed.as_ref()
    }

    /// Execute a query through both layers and merge
    pub async fn execute(
        &self,
        view_name: &str,
        constraints: &SearchConstraints,
        max_rows: usize,
    ) -> Result<QueryResult> {
        let limit = if max_rows == 0 {
            self.config.default_limit
        } else {
            max_rows
        };

        let schema = self.batch.schema(view_name)?;
        let batch_rows = self.batch.execute(view_name, constraints, limit).await?;
        self.stats.lock().batch_calls += 1;

        let mut speed_rows = Vec::new();
        let mut speed_skipped = false;
        let mut speed_consulted = false;
        if self.config.speed_enabled {
            if let Some(speed) = &self.speed {
                speed_consulted = true;
                self.stats.lock().speed_calls += 1;
                let since = Utc::now()
                    - chrono::Duration::from_std(self.config.speed_window)
                        .unwrap_or_else(|_| chrono::Duration::hours(24));
                let compiled = self.batch.compile_view(view_name)?;
                match speed.scan_recent(&compiled, since, constraints, limit).await {
                    Ok(rows) => speed_rows = rows,
                    Err(e) if e.is_cache_unavailable() => {
                        log::warn!(
                            "speed layer unavailable for view '{view_name}', serving batch only: {e}"
                        );
                        self.stats.lock().speed_skipped += 1;
                        speed_skipped = true;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let rows = if speed_rows.is_empty() {
            batch_rows
        } else {
            self.stats.lock().merged_calls += 1;
            merge_rows(batch_rows, speed_rows, limit)
        };

        let source = if speed_consulted && !speed_skipped {
            ResultSource::Hybrid
        } else {
            ResultSource::Batch
        };

        Ok(QueryResult {
            row_count: rows.len(),
            rows,
            schema,
            source,
            speed_skipped,
        })
    }

    /// Count matching batch rows
    pub async fn execute_count(
        &self,
        view_name: &str,
        constraints: &SearchConstraints,
    ) -> Result<i64> {
        let count = self.batch.execute_count(view_name, constraints).await?;
        self.stats.lock().batch_calls += 1;
        Ok(count)
    }

    /// Column name → type schema of a view
    pub fn schema(&self, view_name: &str) -> Result<ViewSchema> {
        self.batch.schema(view_name)
    }

    /// Run the integrity battery over this layer's materialized views
    pub async fn validate_integrity(&self) -> Result<IntegrityReport> {
        let validator = IntegrityValidator::new(
            self.batch.store().clone(),
            self.batch.catalog().clone(),
            self.batch.registry().clone(),
        );
        validator.validate().await
    }

    /// Snapshot of the per-layer call counters
    pub fn serving_statistics(&self) -> ServingStatistics {
        *self.stats.lock()
    }

    /// Snapshot of the batch layer's result-cache statistics
    pub fn cache_statistics(&self) -> crate::CacheStatistics {
        self.batch.cache_statistics()
    }

    /// Snapshot of the batch layer's execution statistics
    pub fn execution_statistics(&self) -> crate::ExecutionStatistics {
        self.batch.execution_statistics()
    }

    /// Clear the batch result cache and, when present, the speed cache
    pub async fn clear_caches(&self) -> Result<()> {
        self.batch.clear_cache();
        if let Some(speed) = &self.speed {
            speed.flush().await?;
        }
        Ok(())
    }
}

/// Overlay speed rows onto batch rows
///
/// Batch rows whose resource id also appears in the speed results are
/// dropped in favor of the speed rows (full-row replacement, tagged
/// `merged`); speed rows without a batch counterpart are appended (tagged
/// `speed`). The row limit is re-applied after the overlay.
fn merge_rows(
    batch_rows: Vec<ResultRow>,
    speed_rows: Vec<ResultRow>,
    limit: usize,
) -> Vec<ResultRow> {
    let speed_ids: HashSet<String> = speed_rows
        .iter()
        .filter_map(|row| row.resource_id().map(str::to_string))
        .collect();
    let batch_ids: HashSet<String> = batch_rows
        .iter()
        .filter_map(|row| row.resource_id().map(str::to_string))
        .collect();

    let mut merged: Vec<ResultRow> = batch_rows
        .into_iter()
        .filter(|row| {
            row.resource_id()
                .map_or(true, |id| !speed_ids.contains(id))
        })
        .collect();

    for mut row in speed_rows {
        let replaced = row
            .resource_id()
            .is_some_and(|id| batch_ids.contains(id));
        row.source = if replaced {
            RowSource::Merged
        } else {
            RowSource::Speed
        };
        merged.push(row);
    }

    merged.truncate(limit);
    merged
}
