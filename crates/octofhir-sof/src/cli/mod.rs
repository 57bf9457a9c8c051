//! CLI functionality for the `sof` tool
//!
//! This module contains the command implementations:
//! - Compiling a ViewDefinition file to SQL
//! - Executing hybrid queries and counts
//! - Refreshing materialized views
//! - Validating materialized-view integrity
//! - Output formatting

pub mod compile;
pub mod execute;
pub mod output;
pub mod refresh;
pub mod validate;

use anyhow::{Context, Result, bail};
use octofhir_sof_engine::{
    BatchConfig, BatchRunner, PostgresConfig, PostgresStore, ServingConfig, ServingLayer,
};
use octofhir_sof_model::{SchemaCatalog, SearchConstraints, ViewRegistry};
use std::path::Path;
use std::sync::Arc;

/// Database connection options shared by the online commands
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub schema: String,
}

impl ConnectionOptions {
    fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            dbname: self.dbname.clone(),
            ..PostgresConfig::default()
        }
    }

    /// The schema catalog for these options
    pub fn catalog(&self) -> SchemaCatalog {
        SchemaCatalog::new(self.schema.clone())
    }
}

/// Load the view registry from a directory of ViewDefinition files
pub fn load_registry(views_dir: &Path) -> Result<Arc<ViewRegistry>> {
    let registry = ViewRegistry::from_dir(views_dir)
        .with_context(|| format!("failed to load views from {}", views_dir.display()))?;
    if registry.is_empty() {
        bail!("no view definitions found in {}", views_dir.display());
    }
    Ok(Arc::new(registry))
}

/// Connect and build a batch-only serving layer
pub async fn open_serving(
    conn: &ConnectionOptions,
    views_dir: &Path,
) -> Result<ServingLayer> {
    let registry = load_registry(views_dir)?;
    let store = PostgresStore::connect(conn.postgres_config())
        .await
        .context("failed to connect to postgres")?;
    let batch = BatchRunner::new(
        Arc::new(store),
        conn.catalog(),
        registry,
        BatchConfig::default(),
    );
    // One-shot CLI invocations have no recent-write feed; run batch-only.
    Ok(ServingLayer::new(
        batch,
        None,
        ServingConfig {
            speed_enabled: false,
            ..ServingConfig::default()
        },
    ))
}

/// Parse `name=value` constraint arguments
pub fn parse_constraints(params: &[String]) -> Result<SearchConstraints> {
    let mut pairs = Vec::with_capacity(params.len());
    for param in params {
        let Some((name, value)) = param.split_once('=') else {
            bail!("invalid constraint '{param}', expected name=value");
        };
        pairs.push((name.to_string(), value.to_string()));
    }
    Ok(SearchConstraints::from_pairs(pairs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_constraints_accepts_pairs() {
        let constraints =
            parse_constraints(&["gender=female".to_string(), "birthdate=ge1980-01-01".to_string()])
                .unwrap();
        assert_eq!(constraints.len(), 2);
        assert_eq!(
            constraints.fingerprint(),
            "birthdate=ge1980-01-01&gender=female"
        );
    }

    #[test]
    fn parse_constraints_rejects_bare_words() {
        assert!(parse_constraints(&["gender".to_string()]).is_err());
    }
}
