//! Query compilation for the SQL-on-FHIR engine
//!
//! Three stages, used in order by the batch layer:
//!
//! 1. [`ExpressionTranspiler`] turns one path-expression AST into a JSONB
//!    document-accessor fragment (and correlated subqueries for `where()`).
//! 2. [`ViewCompiler`] walks a ViewDefinition's select tree into an ordered
//!    column list and an ordered list of row-expansion joins.
//! 3. [`QueryAssembler`] combines the compiled view with caller search
//!    constraints into an executable row query and its count-only variant.
//!
//! Compilation is deterministic: the same ViewDefinition and constraints
//! always assemble to byte-identical statements, which the batch layer's
//! result cache and the tests both rely on.

mod assembler;
mod compiler;
mod transpiler;

pub use assembler::*;
pub use compiler::*;
pub use transpiler::*;
