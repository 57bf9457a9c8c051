//! Refresh command implementation

use super::{ConnectionOptions, load_registry};
use anyhow::{Context, Result};
use octofhir_sof_engine::{MatviewRefresher, PostgresStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the refresh command
pub struct RefreshConfig {
    /// Specific view to refresh; every registered view when `None`
    pub view: Option<String>,
    pub views_dir: PathBuf,
    pub connection: ConnectionOptions,
}

/// Rebuild materialized views out-of-band
pub async fn refresh(config: RefreshConfig) -> Result<()> {
    let registry = load_registry(&config.views_dir)?;
    let store = PostgresStore::connect(config.connection.postgres_config())
        .await
        .context("failed to connect to postgres")?;
    let refresher = MatviewRefresher::new(
        Arc::new(store),
        config.connection.catalog(),
        registry,
    );

    match &config.view {
        Some(view) => {
            refresher.refresh(view).await?;
            println!("refreshed '{view}'");
        }
        None => {
            let refreshed = refresher.refresh_all().await?;
            println!("refreshed {refreshed} views");
        }
    }
    Ok(())
}
