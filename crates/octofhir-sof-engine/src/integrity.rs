//! Integrity validator
//!
//! Out-of-band consistency battery over materialized views: dual reference
//! columns must exist, extracted identifiers must equal the substring after
//! the separator, reference values must be well-formed, extracted
//! identifiers must resolve in the referenced view, and a sampled join must
//! stay under a latency threshold. Any check with `valid < examined` is a
//! violation; promotion of a freshly materialized view must be blocked on a
//! failing report.

use crate::DocumentStore;
use octofhir_sof_diagnostics::{Result, SOF0204, SofError};
use octofhir_sof_model::{REFERENCE_SQL_PATTERN, SchemaCatalog, ViewRegistry};
use octofhir_sof_sql::{CompiledView, ViewCompiler};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One executed integrity check
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityCheck {
    /// Check identity, e.g. `observation_subjects.subject_id:extracted_id`
    pub name: String,
    /// Rows (or columns) examined
    pub examined: u64,
    /// Rows (or columns) that passed
    pub valid: u64,
    /// Wall-clock time spent, in milliseconds
    pub duration_millis: u64,
}

impl IntegrityCheck {
    /// Whether the check passed
    pub fn passed(&self) -> bool {
        self.valid >= self.examined
    }
}

/// Result of one validation run
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    /// Database schema the views live in
    pub schema: String,
    /// Executed checks in deterministic order
    pub checks: Vec<IntegrityCheck>,
}

impl IntegrityReport {
    /// Whether every check passed
    pub fn passed(&self) -> bool {
        self.checks.iter().all(IntegrityCheck::passed)
    }

    /// Total violations across all checks
    pub fn violations(&self) -> u64 {
        self.checks
            .iter()
            .map(|check| check.examined.saturating_sub(check.valid))
            .sum()
    }
}

/// Validator configuration
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Rows sampled by the join-latency check
    pub join_sample: usize,
    /// Latency above which the sampled join is a violation
    pub join_latency_threshold: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            join_sample: 1000,
            join_latency_threshold: Duration::from_secs(2),
        }
    }
}

/// Runs the integrity battery over every materialized registered view
pub struct IntegrityValidator {
    store: Arc<dyn DocumentStore>,
    catalog: SchemaCatalog,
    registry: Arc<ViewRegistry>,
    config: ValidatorConfig,
}

impl IntegrityValidator {
    /// Create a validator with default configuration
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: SchemaCatalog,
        registry: Arc<ViewRegistry>,
    ) -> Self {
        Self {
            store,
            catalog,
            registry,
            config: ValidatorConfig::default(),
        }
    }

    /// Override the validator configuration
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the full battery
    pub async fn validate(&self) -> Result<IntegrityReport> {
        let schema = self.catalog.schema().to_string();
        let materialized: HashSet<String> = self
            .store
            .list_matviews(&schema)
            .await?
            .into_iter()
            .collect();

        // Deterministic view order; compiled targets shared by the FK checks
        let mut targets: Vec<CompiledView> = Vec::new();
        let compiler = ViewCompiler::new(&self.catalog);
        for name in self.registry.names() {
            if materialized.contains(name) {
                targets.push(compiler.compile(self.registry.get(name)?.as_ref())?);
            }
        }

        let mut checks = Vec::new();
        for view in &targets {
            self.check_view(view, &targets, &schema, &mut checks).await?;
        }

        let report = IntegrityReport { schema, checks };
        if report.passed() {
            log::info!("integrity validation passed ({} checks)", report.checks.len());
        } else {
            log::warn!(
                "integrity validation found {} violations across {} checks",
                report.violations(),
                report.checks.len()
            );
        }
        Ok(report)
    }

    async fn check_view(
        &self,
        view: &CompiledView,
        targets: &[CompiledView],
        schema: &str,
        checks: &mut Vec<IntegrityCheck>,
    ) -> Result<()> {
        let relation = format!("{schema}.{}", view.name);

        for pair in &view.references {
            // 1. Both columns of the pair exist in the materialization
            let started = Instant::now();
            let column_count = self
                .store
                .query_count(
                    "SELECT count(*) FROM information_schema.columns \
                     WHERE table_schema = $1 AND table_name = $2 AND column_name IN ($3, $4)",
                    &[
                        schema.to_string(),
                        view.name.clone(),
                        pair.reference_column.clone(),
                        pair.id_column.clone(),
                    ],
                )
                .await?;
            checks.push(IntegrityCheck {
                name: format!("{}.{}:dual_columns", view.name, pair.id_column),
                examined: 2,
                valid: (column_count.max(0) as u64).min(2),
                duration_millis: started.elapsed().as_millis() as u64,
            });

            // 2. Extracted identifier equals the substring after the separator
            let started = Instant::now();
            let sql = format!(
                "SELECT count(*) AS total, \
                 count(*) FILTER (WHERE {id} = split_part({reference}, '/', 2)) AS valid \
                 FROM {relation} \
                 WHERE {reference} IS NOT NULL AND {reference} ~ '{pattern}'",
                id = pair.id_column,
                reference = pair.reference_column,
                pattern = REFERENCE_SQL_PATTERN,
            );
            let (examined, valid) = self.counts(&sql).await?;
            checks.push(IntegrityCheck {
                name: format!("{}.{}:extracted_id", view.name, pair.id_column),
                examined,
                valid,
                duration_millis: started.elapsed().as_millis() as u64,
            });

            // 3. Non-null references are well-formed
            let started = Instant::now();
            let sql = format!(
                "SELECT count(*) AS total, \
                 count(*) FILTER (WHERE {reference} ~ '{pattern}') AS valid \
                 FROM {relation} \
                 WHERE {reference} IS NOT NULL",
                reference = pair.reference_column,
                pattern = REFERENCE_SQL_PATTERN,
            );
            let (examined, valid) = self.counts(&sql).await?;
            checks.push(IntegrityCheck {
                name: format!("{}.{}:reference_format", view.name, pair.reference_column),
                examined,
                valid,
                duration_millis: started.elapsed().as_millis() as u64,
            });

            // 4. Foreign-key completeness against every candidate target view
            for target in targets {
                if target.name == view.name {
                    continue;
                }
                let started = Instant::now();
                let sql = format!(
                    "SELECT count(*) AS total, \
                     count(*) FILTER (WHERE t.id IS NOT NULL) AS valid \
                     FROM {relation} a \
                     LEFT JOIN {schema}.{target} t ON t.id = a.{id} \
                     WHERE a.{reference} LIKE '{target_type}/%'",
                    target = target.name,
                    id = pair.id_column,
                    reference = pair.reference_column,
                    target_type = target.resource,
                );
                let (examined, valid) = self.counts(&sql).await?;
                checks.push(IntegrityCheck {
                    name: format!(
                        "{}.{}->{}:fk_complete",
                        view.name, pair.id_column, target.name
                    ),
                    examined,
                    valid,
                    duration_millis: started.elapsed().as_millis() as u64,
                });

                // 5. Sampled join latency
                let started = Instant::now();
                let sql = format!(
                    "SELECT count(*) FROM (SELECT a.{id} FROM {relation} a \
                     JOIN {schema}.{target} t ON t.id = a.{id} LIMIT {sample}) s",
                    target = target.name,
                    id = pair.id_column,
                    sample = self.config.join_sample,
                );
                self.store.query_count(&sql, &[]).await?;
                let elapsed = started.elapsed();
                checks.push(IntegrityCheck {
                    name: format!(
                        "{}.{}->{}:join_latency",
                        view.name, pair.id_column, target.name
                    ),
                    examined: 1,
                    valid: u64::from(elapsed <= self.config.join_latency_threshold),
                    duration_millis: elapsed.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    /// Run a `total`/`valid` counting statement
    async fn counts(&self, sql: &str) -> Result<(u64, u64)> {
        let rows = self.store.query_rows(sql, &[]).await?;
        let row = rows.first().ok_or_else(|| {
            SofError::execution_of(SOF0204, "counting statement returned no rows", sql)
        })?;
        let total = field_u64(row, "total")
            .ok_or_else(|| SofError::execution_of(SOF0204, "missing 'total' column", sql))?;
        let valid = field_u64(row, "valid")
            .ok_or_else(|| SofError::execution_of(SOF0204, "missing 'valid' column", sql))?;
        Ok((total, valid))
    }
}

fn field_u64(row: &Value, field: &str) -> Option<u64> {
    row.get(field).and_then(Value::as_i64).map(|v| v.max(0) as u64)
}
