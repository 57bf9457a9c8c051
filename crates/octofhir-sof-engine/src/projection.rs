//! In-memory row projection
//!
//! The speed layer holds raw documents, but must return rows in the same
//! shape as the batch layer. This module evaluates a compiled view's column
//! ASTs and expansion tree directly against a JSON document, mirroring the
//! SQL semantics: `each` over an N-element array yields N bindings (zero
//! when absent), `eachOrNull` yields a single null binding when absent,
//! `where()` takes the first matching element in value position, and
//! reference columns get their extracted-identifier companions.

use indexmap::IndexMap;
use octofhir_sof_ast::{ComparisonOp, Expression, Literal};
use octofhir_sof_model::{ColumnType, ExpansionMode, extract_id};
use octofhir_sof_sql::{ColumnKind, CompiledView};
use serde_json::Value;

/// Project one document into the view's row shape
pub fn project_document(view: &CompiledView, doc: &Value) -> Vec<IndexMap<String, Value>> {
    let bindings = expand_bindings(view, doc);

    let mut rows = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        let mut values: IndexMap<String, Value> = IndexMap::with_capacity(view.columns.len());
        for column in &view.columns {
            let value = match &column.kind {
                ColumnKind::ResourceId => doc.get("id").cloned().unwrap_or(Value::Null),
                ColumnKind::ReferenceId { reference_column } => values
                    .get(reference_column)
                    .and_then(Value::as_str)
                    .and_then(extract_id)
                    .map(|id| Value::String(id.to_string()))
                    .unwrap_or(Value::Null),
                ColumnKind::Value => {
                    let base = match column.scope {
                        None => Some(doc),
                        Some(idx) => binding[idx].as_ref(),
                    };
                    let expr = column.expr.as_ref().expect("value column keeps its AST");
                    match base {
                        Some(base) => {
                            coerce(evaluate(&expr.inner, base), column.column_type)
                        }
                        None => Value::Null,
                    }
                }
            };
            values.insert(column.name.clone(), value);
        }
        rows.push(values);
    }
    rows
}

/// Evaluate the top-level filter conjunction against a document
pub fn document_matches_filters(view: &CompiledView, doc: &Value) -> bool {
    view.filters
        .iter()
        .all(|filter| evaluate_boolean(&filter.expr.inner, doc))
}

/// Expand the view's row-expansion tree into per-row scope bindings
fn expand_bindings(view: &CompiledView, doc: &Value) -> Vec<Vec<Option<Value>>> {
    let mut bindings: Vec<Vec<Option<Value>>> = vec![vec![None; view.expansions.len()]];

    for (idx, expansion) in view.expansions.iter().enumerate() {
        let mut next = Vec::new();
        for binding in &bindings {
            let base = match expansion.parent {
                None => Some(doc),
                Some(parent) => binding[parent].as_ref(),
            };
            let elements = base
                .and_then(|b| evaluate(&expansion.path_expr.inner, b).into_option())
                .and_then(|v| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default();

            if elements.is_empty() {
                if expansion.mode == ExpansionMode::EachOrNull {
                    let mut row = binding.clone();
                    row[idx] = None;
                    next.push(row);
                }
                // `each` contributes no rows for an empty collection
            } else {
                for element in elements {
                    let mut row = binding.clone();
                    row[idx] = Some(element);
                    next.push(row);
                }
            }
        }
        bindings = next;
    }
    bindings
}

/// Evaluation result; `Missing` mirrors SQL NULL propagation
enum Evaluated {
    Missing,
    Value(Value),
}

impl Evaluated {
    fn into_option(self) -> Option<Value> {
        match self {
            Self::Missing | Self::Value(Value::Null) => None,
            Self::Value(v) => Some(v),
        }
    }
}

fn evaluate(expr: &Expression, base: &Value) -> Evaluated {
    match expr {
        Expression::Field(access) => {
            let parent = match &access.base {
                None => Some(base.clone()),
                Some(inner) => evaluate(&inner.inner, base).into_option(),
            };
            match parent.and_then(|p| p.get(&access.name).cloned()) {
                Some(v) => Evaluated::Value(v),
                None => Evaluated::Missing,
            }
        }
        Expression::Index(idx) => {
            let collection = evaluate(&idx.base.inner, base).into_option();
            match collection
                .and_then(|c| c.as_array().and_then(|a| a.get(idx.index as usize)).cloned())
            {
                Some(v) => Evaluated::Value(v),
                None => Evaluated::Missing,
            }
        }
        Expression::Where(filter) => {
            let collection = evaluate(&filter.base.inner, base).into_option();
            let Some(Value::Array(items)) = collection else {
                return Evaluated::Missing;
            };
            for item in items {
                if evaluate_boolean(&filter.predicate.inner, &item) {
                    return Evaluated::Value(item);
                }
            }
            Evaluated::Missing
        }
        Expression::Function(call) => {
            let inner_base = call
                .base
                .as_ref()
                .and_then(|b| evaluate(&b.inner, base).into_option());
            match call.name.as_str() {
                "first" => match inner_base
                    .and_then(|v| v.as_array().and_then(|a| a.first()).cloned())
                {
                    Some(v) => Evaluated::Value(v),
                    None => Evaluated::Missing,
                },
                "count" => {
                    let count = inner_base
                        .and_then(|v| v.as_array().map(Vec::len))
                        .unwrap_or(0);
                    Evaluated::Value(Value::from(count as u64))
                }
                "exists" => Evaluated::Value(Value::Bool(function_base_exists(call, base))),
                "empty" => Evaluated::Value(Value::Bool(!function_base_exists(call, base))),
                _ => Evaluated::Missing,
            }
        }
        Expression::Comparison(_) => Evaluated::Value(Value::Bool(evaluate_boolean(expr, base))),
        Expression::Literal(lit) => Evaluated::Value(literal_value(lit)),
    }
}

/// Evaluate an expression as a boolean predicate
pub fn evaluate_boolean(expr: &Expression, base: &Value) -> bool {
    match expr {
        Expression::Comparison(cmp) => {
            let Expression::Literal(literal) = &cmp.right.inner else {
                return false;
            };
            let left = evaluate(&cmp.left.inner, base).into_option();
            let Some(left) = left else { return false };
            compare(&left, cmp.op, literal)
        }
        Expression::Function(call) => match call.name.as_str() {
            "exists" => function_base_exists(call, base),
            "empty" => !function_base_exists(call, base),
            _ => false,
        },
        Expression::Where(filter) => {
            let collection = evaluate(&filter.base.inner, base).into_option();
            match collection {
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| evaluate_boolean(&filter.predicate.inner, item)),
                _ => false,
            }
        }
        Expression::Literal(Literal::Boolean(b)) => *b,
        other => matches!(
            evaluate(other, base).into_option(),
            Some(Value::Bool(true))
        ),
    }
}

fn function_base_exists(call: &octofhir_sof_ast::FunctionCall, base: &Value) -> bool {
    let Some(inner) = call.base.as_ref() else {
        return false;
    };
    match &inner.inner {
        // exists() over a filtered collection asks whether any element matched
        Expression::Where(filter) => {
            let collection = evaluate(&filter.base.inner, base).into_option();
            match collection {
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| evaluate_boolean(&filter.predicate.inner, item)),
                _ => false,
            }
        }
        other => match evaluate(other, base).into_option() {
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
            None => false,
        },
    }
}

fn compare(left: &Value, op: ComparisonOp, literal: &Literal) -> bool {
    match literal {
        Literal::String(expected) => {
            let Some(actual) = left.as_str() else {
                return false;
            };
            apply_ord(actual.cmp(expected.as_str()), op)
        }
        Literal::Integer(_) | Literal::Decimal(_) => {
            let expected = match literal {
                Literal::Integer(i) => *i as f64,
                Literal::Decimal(raw) => match raw.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => return false,
                },
                _ => unreachable!(),
            };
            let actual = match left {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            let Some(actual) = actual else { return false };
            let Some(ordering) = actual.partial_cmp(&expected) else {
                return false;
            };
            apply_ord(ordering, op)
        }
        Literal::Boolean(expected) => {
            let actual = match left {
                Value::Bool(b) => Some(*b),
                Value::String(s) => s.parse::<bool>().ok(),
                _ => None,
            };
            match (actual, op) {
                (Some(actual), ComparisonOp::Eq) => actual == *expected,
                (Some(actual), ComparisonOp::Ne) => actual != *expected,
                _ => false,
            }
        }
    }
}

fn apply_ord(ordering: std::cmp::Ordering, op: ComparisonOp) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match op {
        ComparisonOp::Eq => ordering == Equal,
        ComparisonOp::Ne => ordering != Equal,
        ComparisonOp::Gt => ordering == Greater,
        ComparisonOp::Lt => ordering == Less,
        ComparisonOp::Ge => ordering != Less,
        ComparisonOp::Le => ordering != Greater,
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Integer(i) => Value::from(*i),
        Literal::Decimal(raw) => raw
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .unwrap_or(Value::Null),
        Literal::Boolean(b) => Value::Bool(*b),
    }
}

/// Coerce a projected value to the column's declared type, mirroring the
/// casts the SQL rendering applies
fn coerce(evaluated: Evaluated, column_type: ColumnType) -> Value {
    let Some(value) = evaluated.into_option() else {
        return Value::Null;
    };
    match column_type {
        ColumnType::String | ColumnType::Date => value,
        ColumnType::Number => match &value {
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => value,
        },
        ColumnType::Boolean => match &value {
            Value::String(s) => s.parse::<bool>().map(Value::Bool).unwrap_or(Value::Null),
            _ => value,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_sof_model::{SchemaCatalog, ViewDefinition};
    use octofhir_sof_sql::ViewCompiler;
    use serde_json::json;

    fn compile(raw: &str) -> CompiledView {
        let catalog = SchemaCatalog::default();
        let view = ViewDefinition::from_json(raw).unwrap();
        ViewCompiler::new(&catalog).compile(&view).unwrap()
    }

    const NAMES_VIEW: &str = r#"{
        "name": "patient_names",
        "resource": "Patient",
        "select": [
            {
                "column": [{"name": "gender", "path": "gender"}],
                "select": [
                    {
                        "forEach": "name",
                        "column": [
                            {"name": "family", "path": "family"},
                            {"name": "name_use", "path": "use"}
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn for_each_yields_one_row_per_element() {
        let view = compile(NAMES_VIEW);
        let doc = json!({
            "id": "p1",
            "gender": "female",
            "name": [
                {"family": "Smith", "use": "official"},
                {"family": "Smythe", "use": "nickname"}
            ]
        });

        let rows = project_document(&view, &doc);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("p1"));
        assert_eq!(rows[0]["gender"], json!("female"));
        assert_eq!(rows[0]["family"], json!("Smith"));
        assert_eq!(rows[1]["family"], json!("Smythe"));
        assert_eq!(rows[1]["name_use"], json!("nickname"));
    }

    #[test]
    fn for_each_yields_nothing_for_missing_array() {
        let view = compile(NAMES_VIEW);
        let doc = json!({"id": "p2", "gender": "male"});
        assert!(project_document(&view, &doc).is_empty());
    }

    #[test]
    fn for_each_or_null_yields_single_null_row_when_empty() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Patient",
                "select": [
                    {
                        "forEachOrNull": "name",
                        "column": [{"name": "family", "path": "family"}]
                    }
                ]
            }"#,
        );
        let doc = json!({"id": "p3", "name": []});

        let rows = project_document(&view, &doc);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("p3"));
        assert_eq!(rows[0]["family"], Value::Null);
    }

    #[test]
    fn reference_companion_is_extracted() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Observation",
                "select": [
                    {"column": [{"name": "subject_reference", "path": "subject.reference"}]}
                ]
            }"#,
        );
        let doc = json!({"id": "o1", "subject": {"reference": "Patient/p1"}});

        let rows = project_document(&view, &doc);
        assert_eq!(rows[0]["subject_reference"], json!("Patient/p1"));
        assert_eq!(rows[0]["subject_id"], json!("p1"));
    }

    #[test]
    fn malformed_reference_yields_null_companion() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Observation",
                "select": [
                    {"column": [{"name": "subject_reference", "path": "subject.reference"}]}
                ]
            }"#,
        );
        let doc = json!({"id": "o2", "subject": {"reference": "urn:uuid:123"}});

        let rows = project_document(&view, &doc);
        assert_eq!(rows[0]["subject_reference"], json!("urn:uuid:123"));
        assert_eq!(rows[0]["subject_id"], Value::Null);
    }

    #[test]
    fn where_takes_first_match_in_value_position() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Patient",
                "select": [
                    {"column": [
                        {"name": "official_family", "path": "name.where(use = 'official').family"}
                    ]}
                ]
            }"#,
        );
        let doc = json!({
            "id": "p1",
            "name": [
                {"family": "Nick", "use": "nickname"},
                {"family": "Official", "use": "official"},
                {"family": "Second", "use": "official"}
            ]
        });

        let rows = project_document(&view, &doc);
        assert_eq!(rows[0]["official_family"], json!("Official"));
    }

    #[test]
    fn filters_evaluate_against_documents() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Patient",
                "select": [{"column": [{"name": "gender", "path": "gender"}]}],
                "where": [{"path": "active = true"}, {"path": "name.exists()"}]
            }"#,
        );

        let active = json!({"id": "p1", "active": true, "name": [{"family": "A"}], "gender": "female"});
        let inactive = json!({"id": "p2", "active": false, "name": [{"family": "B"}], "gender": "male"});
        let unnamed = json!({"id": "p3", "active": true, "gender": "other"});

        assert!(document_matches_filters(&view, &active));
        assert!(!document_matches_filters(&view, &inactive));
        assert!(!document_matches_filters(&view, &unnamed));
    }

    #[test]
    fn count_and_exists_columns() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Patient",
                "select": [{"column": [
                    {"name": "name_count", "path": "name.count()", "type": "number"},
                    {"name": "has_address", "path": "address.exists()", "type": "boolean"}
                ]}]
            }"#,
        );
        let doc = json!({"id": "p1", "name": [{"family": "A"}, {"family": "B"}]});

        let rows = project_document(&view, &doc);
        assert_eq!(rows[0]["name_count"], json!(2));
        assert_eq!(rows[0]["has_address"], json!(false));
    }

    #[test]
    fn empty_array_is_an_empty_collection() {
        // A present-but-empty array must behave exactly like the generated
        // SQL: exists() false, empty() true, count() zero.
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Patient",
                "select": [{"column": [
                    {"name": "has_address", "path": "address.exists()", "type": "boolean"},
                    {"name": "no_address", "path": "address.empty()", "type": "boolean"},
                    {"name": "address_count", "path": "address.count()", "type": "number"}
                ]}]
            }"#,
        );
        let doc = json!({"id": "p1", "address": []});

        let rows = project_document(&view, &doc);
        assert_eq!(rows[0]["has_address"], json!(false));
        assert_eq!(rows[0]["no_address"], json!(true));
        assert_eq!(rows[0]["address_count"], json!(0));
    }

    #[test]
    fn count_of_a_scalar_is_zero() {
        let view = compile(
            r#"{
                "name": "v",
                "resource": "Patient",
                "select": [{"column": [
                    {"name": "gender_count", "path": "gender.count()", "type": "number"}
                ]}]
            }"#,
        );
        let doc = json!({"id": "p1", "gender": "female"});

        let rows = project_document(&view, &doc);
        assert_eq!(rows[0]["gender_count"], json!(0));
    }
}
