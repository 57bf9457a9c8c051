//! Expression transpiler
//!
//! Converts a path-expression AST into JSONB accessor SQL relative to a base
//! accessor (the payload column `b.body` at the root, or an expansion
//! element like `e1.item`). Dispatch over the AST is exhaustive: every
//! construct the engine does not support is rejected here with an error
//! naming it, before any statement reaches the database.

use octofhir_sof_ast::{
    ComparisonExpr, Expression, FunctionCall, Literal, WhereFilter,
};
use octofhir_sof_diagnostics::{Result, SOF0102, SofError};
use octofhir_sof_model::ColumnType;

/// Transpiles path expressions against one base accessor
pub struct ExpressionTranspiler<'a> {
    base: &'a str,
}

impl<'a> ExpressionTranspiler<'a> {
    /// Create a transpiler with the given base accessor
    pub fn new(base: &'a str) -> Self {
        Self { base }
    }

    /// Render an expression as a column value of the declared type
    ///
    /// Aggregate functions carry their own type (`count()` is numeric,
    /// `exists()`/`empty()` are boolean); everything else is a text accessor
    /// with a cast when the column declares a non-string type.
    pub fn value(&self, expr: &Expression, column_type: ColumnType) -> Result<String> {
        match expr {
            Expression::Function(call) => match call.name.as_str() {
                "count" => self.count(call),
                "exists" | "empty" => self.boolean(expr),
                _ => self.typed_text(expr, column_type),
            },
            Expression::Comparison(_) => self.boolean(expr),
            _ => self.typed_text(expr, column_type),
        }
    }

    fn typed_text(&self, expr: &Expression, column_type: ColumnType) -> Result<String> {
        let text = self.text(expr)?;
        Ok(match column_type {
            ColumnType::String => text,
            ColumnType::Number => format!("({text})::numeric"),
            ColumnType::Boolean => format!("({text})::boolean"),
            ColumnType::Date => format!("({text})::date"),
        })
    }

    /// Render an expression as a JSONB value
    pub fn jsonb(&self, expr: &Expression) -> Result<String> {
        match expr {
            Expression::Field(access) => match &access.base {
                None => Ok(format!("{} -> '{}'", self.base, access.name)),
                Some(base) => Ok(format!("{} -> '{}'", self.jsonb(&base.inner)?, access.name)),
            },
            Expression::Index(idx) => {
                Ok(format!("{} -> {}", self.jsonb(&idx.base.inner)?, idx.index))
            }
            Expression::Where(filter) => self.where_subquery(filter),
            Expression::Function(call) => match call.name.as_str() {
                "first" => {
                    let base = self.function_base(call)?;
                    self.expect_no_args(call)?;
                    Ok(format!("{} -> 0", self.jsonb(base)?))
                }
                _ => Err(self.unsupported(call)),
            },
            Expression::Comparison(_) | Expression::Literal(_) => Err(SofError::compile(
                SOF0102,
                format!("expression '{expr}' is not valid in value position"),
            )),
        }
    }

    /// Render an expression as a text value
    pub fn text(&self, expr: &Expression) -> Result<String> {
        match expr {
            Expression::Field(access) => match &access.base {
                None => Ok(format!("{} ->> '{}'", self.base, access.name)),
                Some(base) => Ok(format!("{} ->> '{}'", self.jsonb(&base.inner)?, access.name)),
            },
            Expression::Index(idx) => {
                Ok(format!("{} ->> {}", self.jsonb(&idx.base.inner)?, idx.index))
            }
            Expression::Where(filter) => Ok(format!("{} #>> '{{}}'", self.where_subquery(filter)?)),
            Expression::Function(call) => match call.name.as_str() {
                "first" => {
                    let base = self.function_base(call)?;
                    self.expect_no_args(call)?;
                    Ok(format!("{} ->> 0", self.jsonb(base)?))
                }
                _ => Err(self.unsupported(call)),
            },
            Expression::Comparison(_) | Expression::Literal(_) => Err(SofError::compile(
                SOF0102,
                format!("expression '{expr}' is not valid in value position"),
            )),
        }
    }

    /// Render an expression as a boolean predicate
    pub fn boolean(&self, expr: &Expression) -> Result<String> {
        match expr {
            Expression::Comparison(cmp) => self.comparison(cmp),
            Expression::Field(_) | Expression::Index(_) => {
                Ok(format!("({})::boolean", self.text(expr)?))
            }
            Expression::Where(filter) => self.exists_subquery(filter, false),
            Expression::Function(call) => match call.name.as_str() {
                "exists" => {
                    let base = self.function_base(call)?;
                    self.expect_no_args(call)?;
                    match base {
                        Expression::Where(filter) => self.exists_subquery(filter, false),
                        other => Ok(exists_sql(&self.jsonb(other)?)),
                    }
                }
                "empty" => {
                    let base = self.function_base(call)?;
                    self.expect_no_args(call)?;
                    match base {
                        Expression::Where(filter) => self.exists_subquery(filter, true),
                        other => Ok(empty_sql(&self.jsonb(other)?)),
                    }
                }
                _ => Err(self.unsupported(call)),
            },
            Expression::Literal(Literal::Boolean(b)) => Ok(b.to_string()),
            Expression::Literal(_) => Err(SofError::compile(
                SOF0102,
                format!("literal '{expr}' is not a boolean predicate"),
            )),
        }
    }

    fn count(&self, call: &FunctionCall) -> Result<String> {
        let base = self.function_base(call)?;
        self.expect_no_args(call)?;
        let value = self.jsonb(base)?;
        // Guarded by type: a present non-array counts as zero, matching the
        // in-memory projector instead of raising a runtime error.
        Ok(format!(
            "CASE WHEN jsonb_typeof({value}) = 'array' THEN jsonb_array_length({value}) ELSE 0 END"
        ))
    }

    fn comparison(&self, cmp: &ComparisonExpr) -> Result<String> {
        let Expression::Literal(literal) = &cmp.right.inner else {
            return Err(SofError::compile(
                SOF0102,
                format!("comparison right-hand side '{}' must be a literal", cmp.right.inner),
            ));
        };

        let left = match &cmp.left.inner {
            Expression::Function(call) if call.name == "count" => self.count(call)?,
            other => match literal {
                Literal::String(_) => self.text(other)?,
                Literal::Integer(_) | Literal::Decimal(_) => {
                    format!("({})::numeric", self.text(other)?)
                }
                Literal::Boolean(_) => format!("({})::boolean", self.text(other)?),
            },
        };

        Ok(format!("{left} {} {}", cmp.op.as_sql(), literal.as_sql()))
    }

    /// Correlated subquery returning the first element matching a filter
    fn where_subquery(&self, filter: &WhereFilter) -> Result<String> {
        let array = self.jsonb(&filter.base.inner)?;
        let predicate = ExpressionTranspiler::new("w.item").boolean(&filter.predicate.inner)?;
        Ok(format!(
            "(SELECT w.item FROM jsonb_array_elements({array}) AS w(item) WHERE {predicate} LIMIT 1)"
        ))
    }

    /// EXISTS subquery over a filtered collection
    fn exists_subquery(&self, filter: &WhereFilter, negated: bool) -> Result<String> {
        let array = self.jsonb(&filter.base.inner)?;
        let predicate = ExpressionTranspiler::new("w.item").boolean(&filter.predicate.inner)?;
        let keyword = if negated { "NOT EXISTS" } else { "EXISTS" };
        Ok(format!(
            "{keyword} (SELECT 1 FROM jsonb_array_elements({array}) AS w(item) WHERE {predicate})"
        ))
    }

    fn function_base<'e>(&self, call: &'e FunctionCall) -> Result<&'e Expression> {
        call.base.as_deref().map(|b| &b.inner).ok_or_else(|| {
            SofError::compile(
                SOF0102,
                format!("function '{}()' requires a path to apply to", call.name),
            )
        })
    }

    fn expect_no_args(&self, call: &FunctionCall) -> Result<()> {
        if call.args.is_empty() {
            Ok(())
        } else {
            Err(SofError::compile(
                SOF0102,
                format!("function '{}()' takes no arguments", call.name),
            ))
        }
    }

    fn unsupported(&self, call: &FunctionCall) -> SofError {
        if call.name == "where" {
            return SofError::compile(
                SOF0102,
                "where() requires exactly one predicate argument",
            );
        }
        SofError::compile(
            SOF0102,
            format!("unsupported function '{}()' in path expression", call.name),
        )
    }
}

/// Truthiness of a JSONB value as a collection
///
/// Empty arrays and JSON nulls are empty collections, matching the
/// in-memory projector: `{"address": []}` must not satisfy `exists()`.
fn exists_sql(value: &str) -> String {
    format!(
        "CASE jsonb_typeof({value}) WHEN 'array' THEN jsonb_array_length({value}) > 0 \
         WHEN 'null' THEN false ELSE ({value}) IS NOT NULL END"
    )
}

/// Negation of [`exists_sql`] with the same collection semantics
fn empty_sql(value: &str) -> String {
    format!(
        "CASE jsonb_typeof({value}) WHEN 'array' THEN jsonb_array_length({value}) = 0 \
         WHEN 'null' THEN true ELSE ({value}) IS NULL END"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_sof_parser::parse_path;

    fn value_sql(path: &str) -> String {
        let expr = parse_path(path).unwrap();
        ExpressionTranspiler::new("b.body")
            .value(&expr.inner, ColumnType::String)
            .unwrap()
    }

    #[test]
    fn simple_field_uses_text_accessor() {
        assert_eq!(value_sql("gender"), "b.body ->> 'gender'");
    }

    #[test]
    fn nested_fields_chain_jsonb_accessors() {
        assert_eq!(
            value_sql("maritalStatus.text"),
            "b.body -> 'maritalStatus' ->> 'text'"
        );
    }

    #[test]
    fn index_access() {
        assert_eq!(value_sql("name[0].family"), "b.body -> 'name' -> 0 ->> 'family'");
    }

    #[test]
    fn exists_distinguishes_empty_arrays() {
        let expr = parse_path("address.exists()").unwrap();
        let sql = ExpressionTranspiler::new("b.body")
            .boolean(&expr.inner)
            .unwrap();
        assert_eq!(
            sql,
            "CASE jsonb_typeof(b.body -> 'address') \
             WHEN 'array' THEN jsonb_array_length(b.body -> 'address') > 0 \
             WHEN 'null' THEN false \
             ELSE (b.body -> 'address') IS NOT NULL END"
        );
    }

    #[test]
    fn empty_distinguishes_empty_arrays() {
        let expr = parse_path("address.empty()").unwrap();
        let sql = ExpressionTranspiler::new("b.body")
            .boolean(&expr.inner)
            .unwrap();
        assert_eq!(
            sql,
            "CASE jsonb_typeof(b.body -> 'address') \
             WHEN 'array' THEN jsonb_array_length(b.body -> 'address') = 0 \
             WHEN 'null' THEN true \
             ELSE (b.body -> 'address') IS NULL END"
        );
    }

    #[test]
    fn count_is_type_guarded() {
        let expr = parse_path("name.count()").unwrap();
        let sql = ExpressionTranspiler::new("b.body")
            .value(&expr.inner, ColumnType::Number)
            .unwrap();
        assert_eq!(
            sql,
            "CASE WHEN jsonb_typeof(b.body -> 'name') = 'array' \
             THEN jsonb_array_length(b.body -> 'name') ELSE 0 END"
        );
    }

    #[test]
    fn unsupported_function_names_the_construct() {
        let expr = parse_path("name.distinct()").unwrap();
        let err = ExpressionTranspiler::new("b.body")
            .value(&expr.inner, ColumnType::String)
            .unwrap_err();
        assert!(err.to_string().contains("distinct"));
        assert!(err.is_compile_time());
    }
}
