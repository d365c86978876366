#![allow(dead_code)]

use oxide_data_expr::{parse_filter, parse_sort, Expr, ParseError, SortItem};

pub fn parse(input: &str) -> Expr {
    parse_filter(input).unwrap_or_else(|e| panic!("Failed to parse: {input}\nError: {e:?}"))
}

pub fn parse_err(input: &str) -> ParseError {
    parse_filter(input).expect_err(&format!("Expected parse error for: {input}"))
}

pub fn sort(input: &str) -> Vec<SortItem> {
    parse_sort(input).unwrap_or_else(|e| panic!("Failed to parse sort: {input}\nError: {e:?}"))
}

/// Verifies that `to_string()` produces a fixed point: the rendered text
/// re-parses and renders to the same string again.
pub fn round_trip(input: &str) {
    let rendered1 = parse(input).to_string();
    let rendered2 = parse(&rendered1).to_string();
    assert_eq!(
        rendered1, rendered2,
        "Round-trip failed.\n  Input:    {input}\n  First:    {rendered1}\n  Second:   {rendered2}"
    );
}
