//! Tests for parsing path expressions
//!
//! Covers the supported grammar:
//! - Simple and nested field access
//! - Array indexing
//! - where() filtering
//! - Function invocations
//! - Comparisons against literals

use octofhir_sof_ast::{ComparisonOp, Expression, Literal};
use octofhir_sof_parser::parse_path;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn parse_expr(input: &str) -> Expression {
    parse_path(input)
        .unwrap_or_else(|e| panic!("Failed to parse '{}': {:?}", input, e))
        .inner
}

fn assert_field<'a>(expr: &'a Expression, name: &str) -> Option<&'a Expression> {
    match expr {
        Expression::Field(access) => {
            assert_eq!(access.name, name);
            access.base.as_deref().map(|b| &b.inner)
        }
        _ => panic!("Expected Field '{}', got: {:?}", name, expr),
    }
}

#[test]
fn test_simple_field() {
    let expr = parse_expr("gender");
    assert!(assert_field(&expr, "gender").is_none());
}

#[test]
fn test_nested_field_chain() {
    let expr = parse_expr("name.family");
    let base = assert_field(&expr, "family").expect("chained base");
    assert!(assert_field(base, "name").is_none());
}

#[test]
fn test_deep_chain() {
    let expr = parse_expr("code.coding.display");
    let coding = assert_field(&expr, "display").unwrap();
    let code = assert_field(coding, "coding").unwrap();
    assert!(assert_field(code, "code").is_none());
}

#[test]
fn test_array_index() {
    let expr = parse_expr("name[0].family");
    let base = assert_field(&expr, "family").unwrap();
    match base {
        Expression::Index(idx) => {
            assert_eq!(idx.index, 0);
            assert!(assert_field(&idx.base.inner, "name").is_none());
        }
        _ => panic!("Expected Index, got: {:?}", base),
    }
}

#[test]
fn test_where_filter() {
    let expr = parse_expr("telecom.where(system = 'phone').value");
    let filtered = assert_field(&expr, "value").unwrap();
    match filtered {
        Expression::Where(filter) => {
            assert!(assert_field(&filter.base.inner, "telecom").is_none());
            match &filter.predicate.inner {
                Expression::Comparison(cmp) => {
                    assert_eq!(cmp.op, ComparisonOp::Eq);
                    assert!(matches!(
                        &cmp.right.inner,
                        Expression::Literal(Literal::String(s)) if s == "phone"
                    ));
                }
                other => panic!("Expected Comparison predicate, got: {:?}", other),
            }
        }
        _ => panic!("Expected Where, got: {:?}", filtered),
    }
}

#[test]
fn test_where_with_boolean_predicate() {
    let expr = parse_expr("name.where(active)");
    match &expr {
        Expression::Where(filter) => {
            assert!(matches!(&filter.predicate.inner, Expression::Field(_)));
            assert!(assert_field(&filter.base.inner, "name").is_none());
        }
        _ => panic!("Expected Where, got: {:?}", expr),
    }
}

#[rstest]
#[case("name.exists()", "exists")]
#[case("identifier.count()", "count")]
#[case("address.empty()", "empty")]
#[case("name.first()", "first")]
#[case("name.distinct()", "distinct")]
fn test_function_invocations(#[case] input: &str, #[case] name: &str) {
    let expr = parse_expr(input);
    match &expr {
        Expression::Function(call) => {
            assert_eq!(call.name, name);
            assert!(call.args.is_empty());
            assert!(call.base.is_some());
        }
        _ => panic!("Expected Function, got: {:?}", expr),
    }
}

#[test]
fn test_function_with_arguments_parses() {
    let expr = parse_expr("name.skip(2)");
    match &expr {
        Expression::Function(call) => {
            assert_eq!(call.name, "skip");
            assert_eq!(call.args.len(), 1);
            assert!(matches!(
                &call.args[0].inner,
                Expression::Literal(Literal::Integer(2))
            ));
        }
        _ => panic!("Expected Function, got: {:?}", expr),
    }
}

#[rstest]
#[case("gender = 'female'", ComparisonOp::Eq)]
#[case("gender != 'male'", ComparisonOp::Ne)]
#[case("multipleBirthInteger >= 2", ComparisonOp::Ge)]
#[case("multipleBirthInteger <= 3", ComparisonOp::Le)]
#[case("multipleBirthInteger > 1", ComparisonOp::Gt)]
#[case("multipleBirthInteger < 4", ComparisonOp::Lt)]
fn test_comparison_operators(#[case] input: &str, #[case] op: ComparisonOp) {
    let expr = parse_expr(input);
    match &expr {
        Expression::Comparison(cmp) => assert_eq!(cmp.op, op),
        _ => panic!("Expected Comparison, got: {:?}", expr),
    }
}

#[test]
fn test_comparison_against_boolean() {
    let expr = parse_expr("active = true");
    match &expr {
        Expression::Comparison(cmp) => {
            assert!(matches!(
                &cmp.right.inner,
                Expression::Literal(Literal::Boolean(true))
            ));
        }
        _ => panic!("Expected Comparison, got: {:?}", expr),
    }
}

#[test]
fn test_string_escape() {
    let expr = parse_expr("name.family = 'O''Brien'");
    match &expr {
        Expression::Comparison(cmp) => {
            assert!(matches!(
                &cmp.right.inner,
                Expression::Literal(Literal::String(s)) if s == "O'Brien"
            ));
        }
        _ => panic!("Expected Comparison, got: {:?}", expr),
    }
}

#[test]
fn test_decimal_literal_keeps_lexeme() {
    let expr = parse_expr("valueQuantity.value > 2.50");
    match &expr {
        Expression::Comparison(cmp) => {
            assert!(matches!(
                &cmp.right.inner,
                Expression::Literal(Literal::Decimal(raw)) if raw == "2.50"
            ));
        }
        _ => panic!("Expected Comparison, got: {:?}", expr),
    }
}

#[test]
fn test_spans_cover_source() {
    let spanned = parse_path("name.family").unwrap();
    assert_eq!(spanned.span.start, 0);
    assert_eq!(spanned.span.end, "name.family".len());
}

#[rstest]
#[case("")]
#[case(".family")]
#[case("name..family")]
#[case("name.family = ")]
#[case("name[x]")]
#[case("name.where(")]
fn test_parse_errors(#[case] input: &str) {
    assert!(parse_path(input).is_err(), "expected failure for '{input}'");
}

#[test]
fn test_whitespace_tolerance() {
    let expr = parse_expr("  gender =   'female' ");
    assert!(matches!(expr, Expression::Comparison(_)));
}
