//! Expression node definitions

use crate::{BoxExpr, Literal};
use smallvec::SmallVec;
use std::fmt;

/// A path expression node
///
/// Expressions are left-nested: `name.family` parses to a `Field` whose base
/// is the `Field` for `name`. The root of a chain has no base and is resolved
/// against the current row-expansion scope at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Field access, optionally chained onto a base expression
    Field(FieldAccess),
    /// Array element access (`item[0]`)
    Index(IndexAccess),
    /// One level of collection filtering (`telecom.where(system = 'phone')`)
    Where(WhereFilter),
    /// Function invocation (`exists()`, `count()`, `empty()`, `first()`, ...)
    ///
    /// Any identifier followed by parentheses parses into this variant; the
    /// transpiler decides which functions are supported so that rejection can
    /// name the construct.
    Function(FunctionCall),
    /// Comparison against a literal (`gender = 'female'`)
    Comparison(ComparisonExpr),
    /// Literal value (only valid on the right-hand side of a comparison)
    Literal(Literal),
}

impl Expression {
    /// The function name if this node is a function invocation
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Self::Function(f) => Some(&f.name),
            _ => None,
        }
    }

    /// Flatten a pure field-access chain into its segment names
    ///
    /// Returns `None` as soon as the chain contains anything other than
    /// field access (indexing, filtering, functions).
    pub fn field_segments(&self) -> Option<SmallVec<[&str; 4]>> {
        match self {
            Self::Field(access) => match &access.base {
                None => Some(SmallVec::from_slice(&[access.name.as_str()])),
                Some(base) => {
                    let mut segments = base.inner.field_segments()?;
                    segments.push(&access.name);
                    Some(segments)
                }
            },
            _ => None,
        }
    }

    /// The final field name of the expression, if it ends in field access
    pub fn last_field(&self) -> Option<&str> {
        match self {
            Self::Field(access) => Some(&access.name),
            _ => None,
        }
    }
}

/// Field access with an optional base
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccess {
    /// Base expression (`None` at the root of a chain)
    pub base: Option<BoxExpr>,
    /// Field name
    pub name: String,
}

impl FieldAccess {
    /// Create a root field access
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            base: None,
            name: name.into(),
        }
    }

    /// Create a chained field access
    pub fn chained(base: BoxExpr, name: impl Into<String>) -> Self {
        Self {
            base: Some(base),
            name: name.into(),
        }
    }
}

/// Array element access by zero-based index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexAccess {
    /// The collection-valued base
    pub base: BoxExpr,
    /// Zero-based element index
    pub index: u64,
}

/// One level of `where(<predicate>)` filtering over a collection
#[derive(Debug, Clone, PartialEq)]
pub struct WhereFilter {
    /// The collection-valued base
    pub base: BoxExpr,
    /// Predicate evaluated against each element
    pub predicate: BoxExpr,
}

/// Function invocation on an optional base
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Base expression the function applies to (`None` for bare calls)
    pub base: Option<BoxExpr>,
    /// Function name as written
    pub name: String,
    /// Argument expressions
    pub args: Vec<BoxExpr>,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl ComparisonOp {
    /// SQL rendering of the operator
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// Source rendering of the operator
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

/// Comparison of a path against a literal
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonExpr {
    /// Left-hand path expression
    pub left: BoxExpr,
    /// Operator
    pub op: ComparisonOp,
    /// Right-hand literal
    pub right: BoxExpr,
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(access) => {
                if let Some(base) = &access.base {
                    write!(f, "{}.{}", base.inner, access.name)
                } else {
                    write!(f, "{}", access.name)
                }
            }
            Self::Index(idx) => write!(f, "{}[{}]", idx.base.inner, idx.index),
            Self::Where(filter) => {
                write!(f, "{}.where({})", filter.base.inner, filter.predicate.inner)
            }
            Self::Function(call) => {
                if let Some(base) = &call.base {
                    write!(f, "{}.{}(", base.inner, call.name)?;
                } else {
                    write!(f, "{}(", call.name)?;
                }
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg.inner)?;
                }
                write!(f, ")")
            }
            Self::Comparison(cmp) => write!(
                f,
                "{} {} {}",
                cmp.left.inner,
                cmp.op.as_str(),
                cmp.right.inner
            ),
            Self::Literal(lit) => write!(f, "{lit}"),
        }
    }
}
