//! View compiler
//!
//! Depth-first walk of a ViewDefinition's select tree. Each row-expansion
//! boundary gets a generated alias (`e1`, `e2`, ... in visit order) and
//! nested columns compile against that alias; filters anywhere in the tree
//! are collected into one top-level conjunction. The walk order is fully
//! determined by the definition, so compiling the same view twice always
//! yields the same ordered output.

use crate::ExpressionTranspiler;
use octofhir_sof_ast::{Expression, Spanned};
use octofhir_sof_diagnostics::{Result, SOF0103, SofError};
use octofhir_sof_model::{
    ColumnDef, ColumnType, ExpansionMode, REFERENCE_SQL_PATTERN, SchemaCatalog, SelectBlock,
    ViewDefinition, ViewSchema, companion_column,
};
use octofhir_sof_parser::parse_path;

/// How a compiled column gets its value
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// Evaluated from a path expression
    Value,
    /// The implicit resource id from the identity table
    ResourceId,
    /// Extracted identifier derived from a sibling reference column
    ReferenceId {
        /// Name of the reference column this identifier is derived from
        reference_column: String,
    },
}

/// One output column of a compiled view
#[derive(Debug, Clone)]
pub struct CompiledColumn {
    /// Output name
    pub name: String,
    /// Value expression SQL, base accessor already substituted
    pub sql: String,
    /// Declared type
    pub column_type: ColumnType,
    /// How the value is produced
    pub kind: ColumnKind,
    /// Source AST for in-memory projection (absent for derived columns)
    pub expr: Option<Spanned<Expression>>,
    /// Index of the expansion scope this column evaluates in, root if `None`
    pub scope: Option<usize>,
}

/// One row-expansion join of a compiled view
#[derive(Debug, Clone)]
pub struct CompiledExpansion {
    /// Generated alias (`e1`, `e2`, ...)
    pub alias: String,
    /// Array path SQL relative to the parent scope
    pub path_sql: String,
    /// Array path AST for in-memory projection
    pub path_expr: Spanned<Expression>,
    /// Expansion mode
    pub mode: ExpansionMode,
    /// Parent expansion index, root if `None`
    pub parent: Option<usize>,
}

/// A reference column and its extracted-identifier companion
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePair {
    /// Column holding the full `Type/id` reference string
    pub reference_column: String,
    /// Companion column holding the extracted identifier
    pub id_column: String,
}

/// A compiled filter of the top-level conjunction
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    /// Predicate SQL against the root scope
    pub sql: String,
    /// Source AST for in-memory evaluation
    pub expr: Spanned<Expression>,
}

/// Deterministic compilation artifact of a ViewDefinition
#[derive(Debug, Clone)]
pub struct CompiledView {
    /// View name
    pub name: String,
    /// Target resource type
    pub resource: String,
    /// Ordered output columns (implicit `id` first)
    pub columns: Vec<CompiledColumn>,
    /// Ordered row expansions in visit order
    pub expansions: Vec<CompiledExpansion>,
    /// Top-level filter conjunction
    pub filters: Vec<CompiledFilter>,
    /// Reference column pairs for the integrity validator
    pub references: Vec<ReferencePair>,
    /// Column name → declared type
    pub schema: ViewSchema,
}

impl CompiledView {
    /// SQL base accessor for a column scope
    pub fn base_accessor(&self, scope: Option<usize>) -> String {
        match scope {
            None => "b.body".to_string(),
            Some(idx) => format!("{}.item", self.expansions[idx].alias),
        }
    }
}

/// Compiles ViewDefinitions against a schema catalog
pub struct ViewCompiler<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> ViewCompiler<'a> {
    /// Create a compiler over the given catalog
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Compile a ViewDefinition into its ordered column and expansion lists
    pub fn compile(&self, view: &ViewDefinition) -> Result<CompiledView> {
        // Unknown resource types fail before anything else is attempted
        self.catalog.resource_type(&view.resource)?;

        let mut compiled = CompiledView {
            name: view.name.clone(),
            resource: view.resource.clone(),
            columns: Vec::new(),
            expansions: Vec::new(),
            filters: Vec::new(),
            references: Vec::new(),
            schema: ViewSchema::new(),
        };

        // Implicit resource id column; the serving layer merges on it.
        compiled.columns.push(CompiledColumn {
            name: "id".to_string(),
            sql: "r.fhir_id".to_string(),
            column_type: ColumnType::String,
            kind: ColumnKind::ResourceId,
            expr: None,
            scope: None,
        });
        compiled.schema.insert("id".to_string(), ColumnType::String);

        for block in &view.select {
            self.walk(block, None, &mut compiled)
                .map_err(|e| attribute(e, &view.name))?;
        }

        for filter in &view.filters {
            let expr = parse_path(&filter.path).map_err(|e| attribute(e, &view.name))?;
            let sql = ExpressionTranspiler::new("b.body")
                .boolean(&expr.inner)
                .map_err(|e| attribute(e, &view.name))?;
            compiled.filters.push(CompiledFilter { sql, expr });
        }

        Ok(compiled)
    }

    fn walk(
        &self,
        block: &SelectBlock,
        scope: Option<usize>,
        out: &mut CompiledView,
    ) -> Result<()> {
        let block_scope = match &block.expansion {
            Some(expansion) => {
                let path_expr = parse_path(&expansion.path)?;
                let parent_base = out.base_accessor(scope);
                let path_sql =
                    ExpressionTranspiler::new(&parent_base).jsonb(&path_expr.inner)?;
                let alias = format!("e{}", out.expansions.len() + 1);
                out.expansions.push(CompiledExpansion {
                    alias,
                    path_sql,
                    path_expr,
                    mode: expansion.mode,
                    parent: scope,
                });
                Some(out.expansions.len() - 1)
            }
            None => scope,
        };

        for column in &block.columns {
            self.compile_column(column, block_scope, out)?;
        }
        for nested in &block.nested {
            self.walk(nested, block_scope, out)?;
        }
        Ok(())
    }

    fn compile_column(
        &self,
        column: &ColumnDef,
        scope: Option<usize>,
        out: &mut CompiledView,
    ) -> Result<()> {
        if out.schema.contains_key(&column.name) {
            return Err(SofError::compile(
                SOF0103,
                format!("duplicate output column '{}'", column.name),
            ));
        }

        let expr = parse_path(&column.path)?;
        let base = out.base_accessor(scope);
        let sql = ExpressionTranspiler::new(&base).value(&expr.inner, column.column_type)?;
        let is_reference = expr.inner.last_field() == Some("reference");

        out.schema
            .insert(column.name.clone(), column.column_type);
        out.columns.push(CompiledColumn {
            name: column.name.clone(),
            sql,
            column_type: column.column_type,
            kind: ColumnKind::Value,
            expr: Some(expr.clone()),
            scope,
        });

        // Reference columns get an extracted-identifier companion so views
        // can be joined on bare ids.
        if is_reference {
            let id_column = companion_column(&column.name);
            if out.schema.contains_key(&id_column) {
                return Err(SofError::compile(
                    SOF0103,
                    format!("duplicate output column '{id_column}'"),
                ));
            }
            let reference_sql = ExpressionTranspiler::new(&base).text(&expr.inner)?;
            let sql = format!(
                "CASE WHEN {reference_sql} ~ '{REFERENCE_SQL_PATTERN}' THEN split_part({reference_sql}, '/', 2) END"
            );
            out.schema.insert(id_column.clone(), ColumnType::String);
            out.columns.push(CompiledColumn {
                name: id_column.clone(),
                sql,
                column_type: ColumnType::String,
                kind: ColumnKind::ReferenceId {
                    reference_column: column.name.clone(),
                },
                expr: None,
                scope,
            });
            out.references.push(ReferencePair {
                reference_column: column.name.clone(),
                id_column,
            });
        }

        Ok(())
    }
}

fn attribute(err: SofError, view: &str) -> SofError {
    match err {
        SofError::Compile {
            code,
            message,
            view: None,
        } => SofError::compile_in(code, message, view),
        other => other,
    }
}
