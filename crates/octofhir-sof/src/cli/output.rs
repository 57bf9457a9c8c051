//! Output formatting for CLI results

use anyhow::Result;
use colored::Colorize;
use octofhir_sof_engine::IntegrityReport;
use octofhir_sof_model::{QueryResult, ViewSchema};
use serde_json::Value;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown output format '{other}' (expected table or json)"),
        }
    }
}

/// Print a query result
pub fn print_query_result(result: &QueryResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = result.schema.keys().collect();
            let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
            let mut cells: Vec<Vec<String>> = Vec::with_capacity(result.rows.len());
            for row in &result.rows {
                let rendered: Vec<String> = columns
                    .iter()
                    .map(|c| render_cell(row.values.get(c.as_str())))
                    .collect();
                for (i, cell) in rendered.iter().enumerate() {
                    widths[i] = widths[i].max(cell.len());
                }
                cells.push(rendered);
            }

            let header: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{:width$}", c, width = widths[i]))
                .collect();
            println!("{}", header.join("  ").bold());
            for row in &cells {
                let line: Vec<String> = row
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
                    .collect();
                println!("{}", line.join("  "));
            }
            println!();
            println!(
                "{} rows ({:?}{})",
                result.row_count,
                result.source,
                if result.speed_skipped {
                    ", speed layer skipped"
                } else {
                    ""
                }
            );
        }
    }
    Ok(())
}

/// Print a view schema
pub fn print_schema(schema: &ViewSchema, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(schema)?);
        }
        OutputFormat::Table => {
            for (name, column_type) in schema {
                println!("{name}  {column_type}");
            }
        }
    }
    Ok(())
}

/// Print an integrity report
pub fn print_report(report: &IntegrityReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            for check in &report.checks {
                let status = if check.passed() {
                    "PASS".green()
                } else {
                    "FAIL".red()
                };
                println!(
                    "{status}  {}  {}/{} in {} ms",
                    check.name, check.valid, check.examined, check.duration_millis
                );
            }
            println!();
            if report.passed() {
                println!("{}", "integrity validation passed".green());
            } else {
                println!(
                    "{}",
                    format!(
                        "integrity validation failed ({} violations)",
                        report.violations()
                    )
                    .red()
                );
            }
        }
    }
    Ok(())
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
