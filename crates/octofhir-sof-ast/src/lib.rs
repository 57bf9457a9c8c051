//! Path expression AST for the SQL-on-FHIR engine
//!
//! This crate defines the abstract syntax tree for the path-expression
//! dialect used by ViewDefinition columns and filters: dotted field access,
//! array indexing, `where()` filtering and a small set of collection
//! functions. The set of node variants is closed so that the transpiler's
//! dispatch is exhaustive; anything it does not handle is a compile error,
//! never a silently wrong query.

mod expression;
mod literal;

pub use expression::*;
pub use literal::*;

/// A node with source span information
pub type Spanned<T> = octofhir_sof_diagnostics::Spanned<T>;

/// Type alias for boxed expressions
pub type BoxExpr = Box<Spanned<Expression>>;
