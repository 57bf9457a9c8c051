//! Query assembler
//!
//! Combines a compiled view with caller search constraints into a complete
//! row query and its count-only variant. Two renderings exist: one against
//! the live resource tables (document accessors, expansion joins) and one
//! against a materialized view (plain column predicates). Both are
//! deterministic — identical inputs assemble to byte-identical statements.

use crate::{CompiledColumn, CompiledView, ExpressionTranspiler};
use octofhir_sof_diagnostics::{Result, SOF0100, SOF0105, SofError};
use octofhir_sof_model::{
    ConstraintKind, DateBound, ExpansionMode, SchemaCatalog, SearchConstraints, SearchField,
    TokenValue,
};

/// An executable statement pair for one query
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// View the query was compiled from
    pub view: String,
    /// Row query text
    pub sql: String,
    /// Count query text (same FROM/WHERE, no limit)
    pub count_sql: String,
    /// Positional text parameters shared by both statements
    pub params: Vec<String>,
}

/// Assembles executable statements from compiled views
pub struct QueryAssembler<'a> {
    catalog: &'a SchemaCatalog,
}

impl<'a> QueryAssembler<'a> {
    /// Create an assembler over the given catalog
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Assemble row and count queries against the live resource tables
    pub fn assemble(
        &self,
        view: &CompiledView,
        constraints: &SearchConstraints,
        limit: usize,
    ) -> Result<CompiledQuery> {
        let mut params = vec![view.resource.clone()];
        let mut predicates = vec![
            "r.deleted_at IS NULL".to_string(),
            "r.res_type = $1".to_string(),
        ];
        for filter in &view.filters {
            predicates.push(filter.sql.clone());
        }
        for (name, value) in constraints.iter() {
            let field = self.catalog.search_field(&view.resource, name)?;
            predicates.push(document_predicate(field, value, &mut params)?);
        }

        let select_list = view
            .columns
            .iter()
            .map(|c| format!("  {} AS {}", c.sql, c.name))
            .collect::<Vec<_>>()
            .join(",\n");
        let from = self.from_clause(view);
        let where_clause = render_where(&predicates);

        let sql = format!(
            "SELECT\n{select_list}\n{from}\n{where_clause}\nORDER BY r.fhir_id\nLIMIT {limit}"
        );
        let count_sql = format!("SELECT count(*)\n{from}\n{where_clause}");

        Ok(CompiledQuery {
            view: view.name.clone(),
            sql,
            count_sql,
            params,
        })
    }

    /// Assemble row and count queries against the view's materialization
    pub fn assemble_materialized(
        &self,
        view: &CompiledView,
        constraints: &SearchConstraints,
        limit: usize,
    ) -> Result<CompiledQuery> {
        let relation = self.materialized_relation(view)?;
        let mut params = Vec::new();
        let mut predicates = Vec::new();
        for (name, value) in constraints.iter() {
            let field = self.catalog.search_field(&view.resource, name)?;
            let column = resolve_constraint_column(view, name, field)?;
            predicates.push(column_predicate(column, field, value, &mut params)?);
        }

        let where_clause = render_where(&predicates);
        let sql = if where_clause.is_empty() {
            format!("SELECT *\nFROM {relation}\nORDER BY id\nLIMIT {limit}")
        } else {
            format!("SELECT *\nFROM {relation}\n{where_clause}\nORDER BY id\nLIMIT {limit}")
        };
        let count_sql = if where_clause.is_empty() {
            format!("SELECT count(*)\nFROM {relation}")
        } else {
            format!("SELECT count(*)\nFROM {relation}\n{where_clause}")
        };

        Ok(CompiledQuery {
            view: view.name.clone(),
            sql,
            count_sql,
            params,
        })
    }

    /// The SELECT statement a materialized view is defined as
    ///
    /// No caller constraints, no limit; the resource type is inlined because
    /// DDL cannot carry parameters.
    pub fn materialization_sql(&self, view: &CompiledView) -> Result<String> {
        self.materialized_relation(view)?;

        let mut predicates = vec![
            "r.deleted_at IS NULL".to_string(),
            format!("r.res_type = '{}'", view.resource.replace('\'', "''")),
        ];
        for filter in &view.filters {
            predicates.push(filter.sql.clone());
        }

        let select_list = view
            .columns
            .iter()
            .map(|c| format!("  {} AS {}", c.sql, c.name))
            .collect::<Vec<_>>()
            .join(",\n");
        let from = self.from_clause(view);
        let where_clause = render_where(&predicates);

        Ok(format!("SELECT\n{select_list}\n{from}\n{where_clause}"))
    }

    /// Schema-qualified materialized-view relation for a compiled view
    pub fn materialized_relation(&self, view: &CompiledView) -> Result<String> {
        let name = &view.name;
        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && name.chars().next().is_some_and(|c| c.is_ascii_lowercase() || c == '_');
        if !valid {
            return Err(SofError::compile_in(
                SOF0100,
                format!("view name '{name}' is not a valid relation name"),
                name.clone(),
            ));
        }
        Ok(format!("{}.{}", self.catalog.schema(), name))
    }

    fn from_clause(&self, view: &CompiledView) -> String {
        let tables = self.catalog.tables();
        let mut out = format!(
            "FROM {} r\nJOIN {} b ON b.res_id = r.res_id AND b.res_ver = r.res_ver",
            tables.identity, tables.payload
        );
        for expansion in &view.expansions {
            let join = match expansion.mode {
                ExpansionMode::Each => format!(
                    "CROSS JOIN LATERAL jsonb_array_elements({}) AS {}(item)",
                    expansion.path_sql, expansion.alias
                ),
                ExpansionMode::EachOrNull => format!(
                    "LEFT JOIN LATERAL jsonb_array_elements({}) AS {}(item) ON true",
                    expansion.path_sql, expansion.alias
                ),
            };
            out.push('\n');
            out.push_str(&join);
        }
        out
    }
}

fn render_where(predicates: &[String]) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let mut out = format!("WHERE {}", predicates[0]);
    for predicate in &predicates[1..] {
        out.push_str("\n  AND ");
        out.push_str(predicate);
    }
    out
}

/// Resolve a search constraint to a materialized-view column
///
/// The live path reads the search field's document accessor directly, so the
/// materialized path must find the column carrying the same value: first the
/// column whose root-relative path equals the field's path (`birthdate` →
/// a `birth_date` column over `birthDate`), then a column named after the
/// constraint. Constraints the view never selected stay compile errors.
fn resolve_constraint_column<'v>(
    view: &'v CompiledView,
    name: &str,
    field: &SearchField,
) -> Result<&'v str> {
    for column in &view.columns {
        if let Some(segments) = column_root_segments(view, column) {
            if segments == field.segments {
                return Ok(&column.name);
            }
        }
    }
    for column in &view.columns {
        if column.name == name {
            return Ok(&column.name);
        }
    }
    Err(SofError::compile_in(
        SOF0105,
        format!("constraint '{name}' has no matching column in materialized view"),
        view.name.clone(),
    ))
}

/// Root-relative document path of a column, when it is a pure field chain
///
/// Prefixes the column's own path with the paths of every enclosing row
/// expansion; anything other than plain field access yields `None`.
fn column_root_segments<'v>(
    view: &'v CompiledView,
    column: &'v CompiledColumn,
) -> Option<Vec<&'v str>> {
    let mut chain = Vec::new();
    let mut scope = column.scope;
    while let Some(idx) = scope {
        chain.push(idx);
        scope = view.expansions[idx].parent;
    }

    let mut segments = Vec::new();
    for idx in chain.iter().rev() {
        segments.extend(view.expansions[*idx].path_expr.inner.field_segments()?);
    }
    segments.extend(column.expr.as_ref()?.inner.field_segments()?);
    Some(segments)
}

/// Text accessor for a document path
fn doc_text(segments: &[&str], base: &str) -> String {
    if segments.len() == 1 {
        format!("{base} ->> '{}'", segments[0])
    } else {
        format!("{base} #>> '{{{}}}'", segments.join(","))
    }
}

/// JSONB accessor for a document path
fn doc_jsonb(segments: &[&str], base: &str) -> String {
    if segments.len() == 1 {
        format!("{base} -> '{}'", segments[0])
    } else {
        format!("{base} #> '{{{}}}'", segments.join(","))
    }
}

/// Constraint predicate over document accessors (live-table rendering)
fn document_predicate(
    field: &SearchField,
    value: &str,
    params: &mut Vec<String>,
) -> Result<String> {
    match field.kind {
        ConstraintKind::Token => {
            let token = TokenValue::parse(value);
            params.push(token.code);
            let n = params.len();
            Ok(format!("{} = ${n}", doc_text(&field.segments, "b.body")))
        }
        ConstraintKind::TokenCoding => {
            let token = TokenValue::parse(value);
            let array_at = field.array_at.unwrap_or(field.segments.len() - 1);
            let lead = doc_jsonb(&field.segments[..=array_at], "b.body");
            params.push(token.code);
            let code_param = params.len();
            let mut predicate = format!("c.item ->> 'code' = ${code_param}");
            if let Some(system) = token.system {
                params.push(system);
                predicate.push_str(&format!(" AND c.item ->> 'system' = ${}", params.len()));
            }
            Ok(format!(
                "EXISTS (SELECT 1 FROM jsonb_array_elements({lead}) AS c(item) WHERE {predicate})"
            ))
        }
        ConstraintKind::String => {
            params.push(value.to_string());
            let n = params.len();
            match field.array_at {
                Some(array_at) => {
                    let lead = doc_jsonb(&field.segments[..=array_at], "b.body");
                    let rest = &field.segments[array_at + 1..];
                    let elem = doc_text(rest, "c.item");
                    Ok(format!(
                        "EXISTS (SELECT 1 FROM jsonb_array_elements({lead}) AS c(item) WHERE LOWER({elem}) LIKE LOWER(${n}) || '%')"
                    ))
                }
                None => Ok(format!(
                    "LOWER({}) LIKE LOWER(${n}) || '%'",
                    doc_text(&field.segments, "b.body")
                )),
            }
        }
        ConstraintKind::Date => {
            let bound = DateBound::parse(value)?;
            params.push(bound.as_iso());
            let n = params.len();
            Ok(format!(
                "LEFT({}, 10)::date {} (${n})::date",
                doc_text(&field.segments, "b.body"),
                bound.op.as_sql()
            ))
        }
    }
}

/// Constraint predicate over plain columns (materialized-view rendering)
fn column_predicate(
    column: &str,
    field: &SearchField,
    value: &str,
    params: &mut Vec<String>,
) -> Result<String> {
    match field.kind {
        ConstraintKind::Token | ConstraintKind::TokenCoding => {
            let token = TokenValue::parse(value);
            params.push(token.code);
            Ok(format!("{column} = ${}", params.len()))
        }
        ConstraintKind::String => {
            params.push(value.to_string());
            Ok(format!("LOWER({column}) LIKE LOWER(${}) || '%'", params.len()))
        }
        ConstraintKind::Date => {
            let bound = DateBound::parse(value)?;
            params.push(bound.as_iso());
            Ok(format!(
                "({column})::date {} (${})::date",
                bound.op.as_sql(),
                params.len()
            ))
        }
    }
}
