//! Compile command implementation

use super::parse_constraints;
use anyhow::{Context, Result};
use octofhir_sof_model::{SchemaCatalog, ViewDefinition};
use octofhir_sof_sql::{QueryAssembler, ViewCompiler};
use std::fs;
use std::path::PathBuf;

/// Configuration for the compile command
pub struct CompileConfig {
    pub file: PathBuf,
    pub params: Vec<String>,
    pub limit: usize,
    pub schema: String,
    pub verbose: bool,
}

/// Compile a ViewDefinition file and print the generated statements
pub fn compile(config: CompileConfig) -> Result<()> {
    let raw = fs::read_to_string(&config.file)
        .with_context(|| format!("failed to read {}", config.file.display()))?;
    let view = ViewDefinition::from_json(&raw)
        .with_context(|| format!("failed to parse {}", config.file.display()))?;

    if config.verbose {
        eprintln!(
            "compiling view '{}' over {} ({} select blocks)",
            view.name,
            view.resource,
            view.select.len()
        );
    }

    let catalog = SchemaCatalog::new(config.schema);
    let compiled = ViewCompiler::new(&catalog).compile(&view)?;
    let assembler = QueryAssembler::new(&catalog);
    let constraints = parse_constraints(&config.params)?;
    let query = assembler.assemble(&compiled, &constraints, config.limit)?;

    println!("-- row query");
    println!("{};", query.sql);
    println!();
    println!("-- count query");
    println!("{};", query.count_sql);
    if !query.params.is_empty() {
        println!();
        println!("-- parameters");
        for (i, param) in query.params.iter().enumerate() {
            println!("-- ${} = {}", i + 1, param);
        }
    }

    println!();
    println!("-- materialization");
    println!("{};", assembler.materialization_sql(&compiled)?);

    Ok(())
}
