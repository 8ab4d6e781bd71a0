use super::*;
use crate::front::lexer::tokenize;

fn parse_source(source: &str) -> ParseResult<SourceFile> {
    let (tokens, diagnostics) = tokenize(source);
    assert!(diagnostics.is_empty(), "lex errors: {diagnostics:?}");
    parse(&tokens)
}

fn parse_body(body: &str) -> Node {
    let file = parse_source(&format!("unit T -> i64 {{ {body} }}")).unwrap();
    file.units.into_iter().next().unwrap().body
}

#[test]
fn test_unit_with_package_and_lets() {
    let file = parse_source(
        "package com.acme;\nunit Sum -> i64 {\n  let a = row.i64(0);\n  a + row.i64(1)\n}",
    )
    .unwrap();
    assert_eq!(file.package, Some(vec!["com".to_string(), "acme".to_string()]));
    assert_eq!(file.units.len(), 1);

    let unit = &file.units[0];
    assert_eq!(unit.name, "Sum");
    assert_eq!(unit.name_pos, Position::new(2, 6));
    assert_eq!(unit.result, ScalarType::Int64);
    assert_eq!(unit.lets.len(), 1);
    assert_eq!(unit.lets[0].name, "a");
    assert_eq!(
        unit.lets[0].value.kind,
        NodeKind::Column {
            accessor: Accessor::I64,
            index: 0
        }
    );
    assert!(matches!(unit.body.kind, NodeKind::Binary(BinOp::Add, _, _)));
}

#[test]
fn test_precedence() {
    // 1 + 2 * 3 == 7 && true
    let node = parse_body("1 + 2 * 3 == 7 && true");
    let NodeKind::Binary(BinOp::And, cmp, _) = node.kind else {
        panic!("expected &&, got {node:?}");
    };
    let NodeKind::Binary(BinOp::Eq, sum, _) = cmp.kind else {
        panic!("expected ==");
    };
    let NodeKind::Binary(BinOp::Add, _, product) = sum.kind else {
        panic!("expected +");
    };
    assert!(matches!(product.kind, NodeKind::Binary(BinOp::Mul, _, _)));
}

#[test]
fn test_cast_binds_tighter_than_product() {
    let node = parse_body("row.i32(0) as i64 * 2");
    let NodeKind::Binary(BinOp::Mul, left, _) = node.kind else {
        panic!("expected *");
    };
    assert!(matches!(
        left.kind,
        NodeKind::Cast(_, CastTarget::Scalar(ScalarType::Int64))
    ));
}

#[test]
fn test_else_if_chain() {
    let node = parse_body("if row.i64(0) > 0 { 1 } else if row.i64(0) < 0 { -1 } else { 0 }");
    let NodeKind::If { else_branch, .. } = node.kind else {
        panic!("expected if");
    };
    assert!(matches!(else_branch.kind, NodeKind::If { .. }));
}

#[test]
fn test_calls() {
    let node = parse_body("coalesce(row.i64(0), 0)");
    let NodeKind::Call { name, args } = node.kind else {
        panic!("expected call");
    };
    assert_eq!(name, "coalesce");
    assert_eq!(args.len(), 2);
}

#[test]
fn test_multiple_units_parse() {
    let file = parse_source("unit A -> i64 { 1 } unit B -> f64 { 2.0 }").unwrap();
    assert_eq!(file.units.len(), 2);
    assert_eq!(file.units[1].result, ScalarType::Float64);
}

#[test]
fn test_missing_brace_reports_position() {
    let err = parse_source("unit A -> i64 {\n  1 + 2\n").unwrap_err();
    assert!(err.is_error());
    assert_eq!(err.message, "expected `}` after unit body, found end of input");
    assert_eq!(err.position, Some(Position::new(3, 1)));
}

#[test]
fn test_unknown_accessor() {
    let err = parse_source("unit A -> i64 { row.u8(0) }").unwrap_err();
    assert!(err.message.starts_with("unknown row accessor `u8`"));
    assert_eq!(err.position, Some(Position::new(1, 21)));
}

#[test]
fn test_bool_result_rejected() {
    let err = parse_source("unit A -> bool { true }").unwrap_err();
    assert_eq!(err.message, "unit result type must be one of i32, i64, f32, f64");
}

#[test]
fn test_chained_comparison_rejected() {
    let err = parse_source("unit A -> i64 { if 1 < 2 < 3 { 1 } else { 0 } }").unwrap_err();
    assert_eq!(err.message, "comparison operators cannot be chained");
}

#[test]
fn test_if_requires_else() {
    let err = parse_source("unit A -> i64 { if true { 1 } }").unwrap_err();
    assert!(err.message.contains("`if` needs an `else`"));
}

#[test]
fn test_deep_nesting_rejected() {
    let body = format!("{}1{}", "(".repeat(MAX_NESTING + 10), ")".repeat(MAX_NESTING + 10));
    let err = parse_source(&format!("unit A -> i64 {{ {body} }}")).unwrap_err();
    assert_eq!(err.message, "expression nesting too deep");
}

#[test]
fn test_nesting_at_limit_accepted() {
    let body = format!("{}1{}", "(".repeat(MAX_NESTING - 1), ")".repeat(MAX_NESTING - 1));
    assert!(parse_source(&format!("unit A -> i64 {{ {body} }}")).is_ok());
}

#[test]
fn test_long_operator_chain_rejected() {
    let body = vec!["1"; MAX_EXPR_DEPTH + 1].join(" + ");
    let err = parse_source(&format!("unit A -> i64 {{ {body} }}")).unwrap_err();
    assert_eq!(err.message, "expression too deep");
}

#[test]
fn test_chain_at_limit_accepted() {
    let body = vec!["1"; MAX_EXPR_DEPTH].join(" + ");
    assert_eq!(parse_body(&body).height, MAX_EXPR_DEPTH);
}

#[test]
fn test_node_height() {
    assert_eq!(parse_body("1").height, 1);
    assert_eq!(parse_body("(1 + 2) * 3").height, 3);
    assert_eq!(parse_body("if true { -1 } else { 0 }").height, 3);
    assert_eq!(parse_body("coalesce(row.i64(0), 1 + 2)").height, 3);
}

#[test]
fn test_moderate_chain_accepted() {
    let body = vec!["1"; 100].join(" + ");
    assert!(parse_source(&format!("unit A -> i64 {{ {body} }}")).is_ok());
}
