//! Execute, count and schema command implementations

use super::output::{self, OutputFormat};
use super::{ConnectionOptions, open_serving, parse_constraints};
use anyhow::Result;
use std::path::PathBuf;

/// Configuration for the execute command
pub struct ExecuteConfig {
    pub view: String,
    pub views_dir: PathBuf,
    pub params: Vec<String>,
    pub limit: usize,
    pub connection: ConnectionOptions,
    pub format: OutputFormat,
    pub verbose: bool,
}

/// Run a hybrid query and print the result
pub async fn execute(config: ExecuteConfig) -> Result<()> {
    let constraints = parse_constraints(&config.params)?;
    let serving = open_serving(&config.connection, &config.views_dir).await?;

    let result = serving
        .execute(&config.view, &constraints, config.limit)
        .await?;
    if config.verbose {
        let stats = serving.batch().execution_statistics();
        eprintln!(
            "{} rows from '{}' in {} ms (source: {:?})",
            result.row_count, config.view, stats.total_millis, result.source
        );
    }

    output::print_query_result(&result, config.format)
}

/// Run the count-only variant
pub async fn count(config: ExecuteConfig) -> Result<()> {
    let constraints = parse_constraints(&config.params)?;
    let serving = open_serving(&config.connection, &config.views_dir).await?;
    let count = serving.execute_count(&config.view, &constraints).await?;
    println!("{count}");
    Ok(())
}

/// Print a view's column schema
pub async fn schema(config: ExecuteConfig) -> Result<()> {
    let serving = open_serving(&config.connection, &config.views_dir).await?;
    let schema = serving.schema(&config.view)?;
    output::print_schema(&schema, config.format)
}
