//! Parsing of row filter and computed-column expressions.

mod common;

use common::{parse, parse_err, round_trip};
use oxide_data_expr::{BinaryOp, Expr, Literal, UnaryOp};

#[test]
fn test_simple_comparison() {
    let expr = parse("Id > 1");
    let Expr::Binary { left, op, right } = expr else {
        panic!("expected binary expression");
    };
    assert!(matches!(*left, Expr::Column { ref name, .. } if name == "Id"));
    assert_eq!(op, BinaryOp::Gt);
    assert_eq!(*right, Expr::Literal(Literal::Integer(1)));
}

#[test]
fn test_bracketed_column_with_spaces() {
    let expr = parse("[Customer Name] = 'Ann'");
    assert_eq!(expr.referenced_columns(), vec!["Customer Name"]);
}

#[test]
fn test_and_binds_tighter_than_or() {
    let expr = parse("a = 1 OR b = 2 AND c = 3");
    let Expr::Binary { op, right, .. } = expr else {
        panic!("expected OR");
    };
    assert_eq!(op, BinaryOp::Or);
    assert!(matches!(
        *right,
        Expr::Binary {
            op: BinaryOp::And,
            ..
        }
    ));
}

#[test]
fn test_like_pattern() {
    let expr = parse("Name LIKE 'Jo*'");
    assert!(matches!(
        expr,
        Expr::Binary {
            op: BinaryOp::Like,
            ..
        }
    ));
}

#[test]
fn test_in_list() {
    let Expr::In { list, negated, .. } = parse("Region IN ('N', 'S', 'E')") else {
        panic!("expected IN");
    };
    assert!(!negated);
    assert_eq!(list.len(), 3);
}

#[test]
fn test_between_with_arithmetic_bounds() {
    let Expr::Between { low, high, .. } = parse("Total BETWEEN 10 - 5 AND 10 + 5") else {
        panic!("expected BETWEEN");
    };
    assert!(matches!(
        *low,
        Expr::Binary {
            op: BinaryOp::Sub,
            ..
        }
    ));
    assert!(matches!(
        *high,
        Expr::Binary {
            op: BinaryOp::Add,
            ..
        }
    ));
}

#[test]
fn test_date_literal() {
    assert_eq!(
        parse("#2024-02-29#"),
        Expr::Literal(Literal::Date("2024-02-29".to_string()))
    );
}

#[test]
fn test_nested_functions() {
    let Expr::Function(outer) = parse("Len(Trim(Name))") else {
        panic!("expected function");
    };
    assert_eq!(outer.name, "Len");
    assert!(matches!(outer.args[0], Expr::Function(ref inner) if inner.name == "Trim"));
}

#[test]
fn test_not_prefix() {
    assert!(matches!(
        parse("NOT (Active = true)"),
        Expr::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
}

#[test]
fn test_round_trips() {
    for input in [
        "Id > 1 AND [Customer Name] LIKE 'a*'",
        "NOT Price * Qty >= 100.5",
        "Region NOT IN ('N', 'S')",
        "Shipped IS NOT NULL OR Total BETWEEN -1 AND 2",
        "Iif(Len(Name) > 3, 'long', 'short') = 'long'",
        "[odd\\]name] <> #2024-01-01#",
        "Name NOT LIKE '%x%'",
    ] {
        round_trip(input);
    }
}

#[test]
fn test_errors() {
    assert!(parse_err("").message.contains("end of input"));
    assert!(parse_err("Id >").message.contains("end of input"));
    assert!(parse_err("Id = 'open").message.contains("Unterminated"));
    assert_eq!(parse_err("Id = 1 )").span.start, 7);
    assert!(parse_err("Id IS 1").expected.is_some());
    assert!(parse_err("Id IN 1, 2").expected.is_some());
    assert!(parse_err("a ! b").message.contains("Unexpected character"));
}
