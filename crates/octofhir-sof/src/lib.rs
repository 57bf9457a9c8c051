//! SQL-on-FHIR ViewDefinition engine for Rust
//!
//! This crate turns declarative ViewDefinitions over FHIR resource
//! documents into executable Postgres queries and serves the results
//! through a two-speed architecture:
//! - Path expressions are parsed and transpiled into JSONB accessors
//! - ViewDefinitions compile into deterministic row/count statements
//! - The batch layer executes against materialized views (or live tables),
//!   the speed layer overlays recently written documents, and the serving
//!   layer merges both with speed-wins precedence
//!
//! # Example
//!
//! ```ignore
//! use octofhir_sof::{SchemaCatalog, ViewCompiler, ViewDefinition};
//!
//! let view = ViewDefinition::from_json(r#"{
//!     "name": "patient_demographics",
//!     "resource": "Patient",
//!     "select": [{"column": [{"name": "gender", "path": "gender"}]}]
//! }"#)?;
//!
//! let catalog = SchemaCatalog::default();
//! let compiled = ViewCompiler::new(&catalog).compile(&view)?;
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_sof_ast as ast;
pub use octofhir_sof_diagnostics as diagnostics;
pub use octofhir_sof_engine as engine;
pub use octofhir_sof_model as model;
pub use octofhir_sof_parser as parser;
pub use octofhir_sof_sql as sql;

// Convenience re-exports
pub use octofhir_sof_diagnostics::{Result, SofError};
pub use octofhir_sof_engine::{
    BatchConfig, BatchRunner, IntegrityReport, IntegrityValidator, MatviewRefresher,
    MemorySpeedCache, PostgresConfig, PostgresStore, ServingConfig, ServingLayer, SpeedLayer,
};
pub use octofhir_sof_model::{
    QueryResult, SchemaCatalog, SearchConstraints, ViewDefinition, ViewRegistry,
};
pub use octofhir_sof_parser::parse_path;
pub use octofhir_sof_sql::{CompiledQuery, CompiledView, QueryAssembler, ViewCompiler};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
