//! Recursive-descent expression parser
//!
//! The grammar is small enough that no precedence climbing is needed: a path
//! is a chain of segments (fields, indexes, function calls) and an optional
//! trailing comparison against a literal.

use crate::combinators::{Input, PResult, identifier, index_literal, literal, ws};
use octofhir_sof_ast::{
    BoxExpr, ComparisonExpr, ComparisonOp, Expression, FieldAccess, FunctionCall, IndexAccess,
    Spanned, WhereFilter,
};
use octofhir_sof_diagnostics::{SOF0001, SofError, Span};
use winnow::combinator::{alt, opt};
use winnow::prelude::*;

/// Parser for one path expression, tracking offsets against the full source
pub struct PathParser<'s> {
    source: &'s str,
}

impl<'s> PathParser<'s> {
    /// Create a parser over the given source expression
    pub fn new(source: &'s str) -> Self {
        Self { source }
    }

    fn offset(&self, input: &Input<'_>) -> usize {
        self.source.len() - input.len()
    }

    /// Map a winnow failure into a diagnostics error at the current offset
    pub fn error_at(&self, input: &Input<'_>) -> SofError {
        let at = self.offset(input);
        SofError::parse_at(
            SOF0001,
            "expected a path expression",
            self.source,
            Span::point(at),
        )
    }

    /// Parse a full expression: a path with an optional trailing comparison
    pub fn expression(&self, input: &mut Input<'s>) -> PResult<Spanned<Expression>> {
        let left = self.path(input)?;

        let checkpoint = *input;
        ws(input)?;
        if let Some(op) = opt(comparison_op).parse_next(input)? {
            ws(input)?;
            let start = self.offset(input);
            let lit = literal(input)?;
            let right = Spanned::new(
                Expression::Literal(lit),
                Span::new(start, self.offset(input)),
            );
            let span = left.span.merge(right.span);
            return Ok(Spanned::new(
                Expression::Comparison(ComparisonExpr {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                }),
                span,
            ));
        }

        *input = checkpoint;
        Ok(left)
    }

    /// Parse a dotted segment chain with postfix indexing
    fn path(&self, input: &mut Input<'s>) -> PResult<Spanned<Expression>> {
        let mut expr = self.segment(input, None)?;

        loop {
            expr = self.postfix_index(input, expr)?;
            if opt('.').parse_next(input)?.is_some() {
                expr = self.segment(input, Some(expr))?;
            } else {
                return Ok(expr);
            }
        }
    }

    /// Parse `[n]` suffixes onto an expression
    fn postfix_index(
        &self,
        input: &mut Input<'s>,
        mut expr: Spanned<Expression>,
    ) -> PResult<Spanned<Expression>> {
        while opt('[').parse_next(input)?.is_some() {
            let index = index_literal(input)?;
            ']'.parse_next(input)?;
            let span = Span::new(expr.span.start, self.offset(input));
            expr = Spanned::new(
                Expression::Index(IndexAccess {
                    base: Box::new(expr),
                    index,
                }),
                span,
            );
        }
        Ok(expr)
    }

    /// Parse one segment: a field access or a function invocation
    fn segment(
        &self,
        input: &mut Input<'s>,
        base: Option<Spanned<Expression>>,
    ) -> PResult<Spanned<Expression>> {
        let start = base.as_ref().map_or_else(|| self.offset(input), |b| b.span.start);
        let name = identifier(input)?;

        if opt('(').parse_next(input)?.is_some() {
            ws(input)?;
            let mut args: Vec<BoxExpr> = Vec::new();
            if !input.starts_with(')') {
                loop {
                    let arg = self.argument(input)?;
                    args.push(Box::new(arg));
                    ws(input)?;
                    if opt(',').parse_next(input)?.is_some() {
                        ws(input)?;
                    } else {
                        break;
                    }
                }
            }
            ')'.parse_next(input)?;
            let span = Span::new(start, self.offset(input));

            // where() with a single predicate becomes a dedicated filter node;
            // every other invocation stays generic for the transpiler to vet.
            if name == "where" && args.len() == 1 && base.is_some() {
                let predicate = args.into_iter().next().unwrap();
                return Ok(Spanned::new(
                    Expression::Where(WhereFilter {
                        base: Box::new(base.unwrap()),
                        predicate,
                    }),
                    span,
                ));
            }

            return Ok(Spanned::new(
                Expression::Function(FunctionCall {
                    base: base.map(Box::new),
                    name,
                    args,
                }),
                span,
            ));
        }

        let span = Span::new(start, self.offset(input));
        let access = match base {
            Some(b) => FieldAccess::chained(Box::new(b), name),
            None => FieldAccess::root(name),
        };
        Ok(Spanned::new(Expression::Field(access), span))
    }

    /// Parse a function argument: a literal or a nested expression
    fn argument(&self, input: &mut Input<'s>) -> PResult<Spanned<Expression>> {
        if input.starts_with('\'') || input.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let start = self.offset(input);
            let lit = literal(input)?;
            return Ok(Spanned::new(
                Expression::Literal(lit),
                Span::new(start, self.offset(input)),
            ));
        }
        self.expression(input)
    }
}

fn comparison_op(input: &mut Input<'_>) -> PResult<ComparisonOp> {
    alt((
        "!=".value(ComparisonOp::Ne),
        ">=".value(ComparisonOp::Ge),
        "<=".value(ComparisonOp::Le),
        "=".value(ComparisonOp::Eq),
        ">".value(ComparisonOp::Gt),
        "<".value(ComparisonOp::Lt),
    ))
    .parse_next(input)
}
