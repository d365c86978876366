//! # oxide-data-expr
//!
//! The expression language used by `oxide-data` for row filters, sort lists,
//! computed columns and aggregate computations.
//!
//! This crate provides:
//! - A hand-written lexer that understands bracketed identifiers and `#date#` literals
//! - A Pratt expression parser producing a small AST
//! - A parser for sort lists such as `Name DESC, Id`
//!
//! ```rust
//! use oxide_data_expr::{parse_filter, parse_sort, Expr, SortDirection};
//!
//! let filter = parse_filter("Id > 1 AND [Customer Name] LIKE 'a*'").unwrap();
//! assert!(matches!(filter, Expr::Binary { .. }));
//!
//! let sort = parse_sort("Name DESC, Id").unwrap();
//! assert_eq!(sort[0].direction, SortDirection::Desc);
//! assert_eq!(sort[1].column, "Id");
//! ```
//!
//! The AST knows nothing about tables: column references are plain names that
//! the engine binds against a schema.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, FunctionCall, Literal, SortDirection, SortItem, UnaryOp};
pub use lexer::{Keyword, Lexer, Span, Token, TokenKind};
pub use parser::{ParseError, Parser};

/// Parses a complete filter or computed-column expression.
///
/// # Errors
///
/// Returns a `ParseError` if the input is not a single valid expression.
pub fn parse_filter(input: &str) -> Result<Expr, ParseError> {
    Parser::new(input).parse_complete_expression()
}

/// Parses a comma-separated sort list. An empty or blank input yields an
/// empty list.
///
/// # Errors
///
/// Returns a `ParseError` if the input is not a valid sort list.
pub fn parse_sort(input: &str) -> Result<Vec<SortItem>, ParseError> {
    Parser::new(input).parse_sort_list()
}
