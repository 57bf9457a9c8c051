//! Validate command implementation

use super::output::{self, OutputFormat};
use super::{ConnectionOptions, open_serving};
use anyhow::{Result, bail};
use std::path::PathBuf;

/// Configuration for the validate command
pub struct ValidateConfig {
    pub views_dir: PathBuf,
    pub connection: ConnectionOptions,
    pub format: OutputFormat,
    /// Exit with an error when the report has violations
    pub strict: bool,
}

/// Run the integrity battery over materialized views
pub async fn validate(config: ValidateConfig) -> Result<()> {
    let serving = open_serving(&config.connection, &config.views_dir).await?;
    let report = serving.validate_integrity().await?;

    output::print_report(&report, config.format)?;

    if config.strict && !report.passed() {
        bail!(
            "integrity validation failed with {} violations",
            report.violations()
        );
    }
    Ok(())
}
