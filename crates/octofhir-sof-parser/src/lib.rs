//! Path expression parser using Winnow
//!
//! Parses the path-expression dialect used by ViewDefinition columns and
//! filters: dotted field access, array indexing, `where(<predicate>)`,
//! function invocations and comparisons against literals.
//!
//! The parser is deliberately permissive about function names — `distinct()`
//! parses into a [`octofhir_sof_ast::FunctionCall`] node just like
//! `exists()` does. Deciding which functions are supported is the
//! transpiler's job, so that rejection happens at compile time with an error
//! naming the construct.

mod combinators;
mod expression;

use octofhir_sof_ast::{Expression, Spanned};
use octofhir_sof_diagnostics::{Result, SOF0009, SofError, Span};

pub use expression::PathParser;

/// Parse a path expression
///
/// Returns the root AST node with source spans, or a parse error pointing at
/// the offending offset.
pub fn parse_path(source: &str) -> Result<Spanned<Expression>> {
    let parser = PathParser::new(source);
    let mut input = source;

    combinators::ws(&mut input).ok();
    let expr = parser
        .expression(&mut input)
        .map_err(|_| parser.error_at(&input))?;
    combinators::ws(&mut input).ok();

    if !input.is_empty() {
        let at = source.len() - input.len();
        return Err(SofError::parse_at(
            SOF0009,
            format!("trailing input '{input}'"),
            source,
            Span::new(at, source.len()),
        ));
    }

    Ok(expr)
}
