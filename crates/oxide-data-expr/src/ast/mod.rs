//! Abstract Syntax Tree (AST) types for filter, sort and computed expressions.

mod expression;
mod sort;

pub use expression::{BinaryOp, Expr, FunctionCall, Literal, UnaryOp};
pub use sort::{SortDirection, SortItem};
