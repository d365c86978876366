//! Binding and evaluation of filter, computed-column and aggregate
//! expressions against a table.
//!
//! Parsing lives in `oxide-data-expr`; this module resolves column names to
//! column ids, checks function arity and compiles `LIKE` patterns once, so
//! that evaluation per row does no name lookups.

mod aggregate;
mod eval;
mod like;

use oxide_data_expr::{BinaryOp, Expr, Literal, UnaryOp};
use regex::Regex;

use crate::column::ColumnId;
use crate::error::{DataError, Result};
use crate::table::Table;
use crate::value::{parse_date_time, DataType, Value};

pub(crate) use aggregate::Aggregate;
pub(crate) use eval::{evaluate, evaluate_predicate, RowScope};
pub(crate) use like::like_regex;

/// Scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Len,
    IsNull,
    Iif,
    Trim,
    Substring,
    Convert(DataType),
}

/// A `LIKE` pattern: compiled once when literal, compiled per row otherwise.
#[derive(Debug, Clone)]
pub(crate) enum LikePattern {
    Static(Regex),
    Dynamic(Box<BoundExpr>),
}

/// An expression with column names resolved against one table.
#[derive(Debug, Clone)]
pub(crate) enum BoundExpr {
    Literal(Value),
    Column(ColumnId),
    Binary(Box<BoundExpr>, BinaryOp, Box<BoundExpr>),
    Like(Box<BoundExpr>, LikePattern),
    Not(Box<BoundExpr>),
    Neg(Box<BoundExpr>),
    IsNull(Box<BoundExpr>, bool),
    In(Box<BoundExpr>, Vec<BoundExpr>, bool),
    Between(Box<BoundExpr>, Box<BoundExpr>, Box<BoundExpr>, bool),
    Function(Function, Vec<BoundExpr>),
    Aggregate(Aggregate, Box<BoundExpr>),
}

impl BoundExpr {
    /// Returns true if the expression reads `column`.
    pub(crate) fn references(&self, column: ColumnId) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::Column(id) => *id == column,
            Self::Binary(left, _, right) => left.references(column) || right.references(column),
            Self::Like(expr, pattern) => {
                expr.references(column)
                    || matches!(pattern, LikePattern::Dynamic(p) if p.references(column))
            }
            Self::Not(expr) | Self::Neg(expr) | Self::IsNull(expr, _) => expr.references(column),
            Self::Aggregate(_, expr) => expr.references(column),
            Self::In(expr, list, _) => {
                expr.references(column) || list.iter().any(|e| e.references(column))
            }
            Self::Between(expr, low, high, _) => {
                expr.references(column) || low.references(column) || high.references(column)
            }
            Self::Function(_, args) => args.iter().any(|a| a.references(column)),
        }
    }
}

/// Where an expression is used; decides which references are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BindMode {
    /// Row filters: any column, no aggregates.
    Filter,
    /// Computed columns: stored columns only, no aggregates.
    ComputedColumn,
    /// `compute`: aggregates whose arguments read columns.
    Aggregate,
}

/// Resolves an expression tree against a table.
pub(crate) struct Binder<'t> {
    table: &'t Table,
    mode: BindMode,
    in_aggregate: bool,
}

impl<'t> Binder<'t> {
    pub(crate) const fn new(table: &'t Table, mode: BindMode) -> Self {
        Self {
            table,
            mode,
            in_aggregate: false,
        }
    }

    /// Parses and binds `text`.
    pub(crate) fn bind_text(table: &'t Table, text: &str, mode: BindMode) -> Result<BoundExpr> {
        let expr = oxide_data_expr::parse_filter(text)?;
        Self::new(table, mode).bind(&expr)
    }

    pub(crate) fn bind(&mut self, expr: &Expr) -> Result<BoundExpr> {
        match expr {
            Expr::Literal(literal) => Ok(BoundExpr::Literal(bind_literal(literal)?)),
            Expr::Column { name, .. } => self.bind_column(name),
            Expr::Paren(inner) => self.bind(inner),
            Expr::Binary {
                left,
                op: BinaryOp::Like,
                right,
            } => {
                let left = self.bind(left)?;
                let pattern = match self.bind(right)? {
                    BoundExpr::Literal(Value::Text(text)) => {
                        LikePattern::Static(like_regex(&text, self.table.case_sensitive())?)
                    }
                    BoundExpr::Literal(Value::Null) => {
                        return Ok(BoundExpr::Literal(Value::Null));
                    }
                    other => LikePattern::Dynamic(Box::new(other)),
                };
                Ok(BoundExpr::Like(Box::new(left), pattern))
            }
            Expr::Binary { left, op, right } => Ok(BoundExpr::Binary(
                Box::new(self.bind(left)?),
                *op,
                Box::new(self.bind(right)?),
            )),
            Expr::Unary { op, operand } => {
                let operand = Box::new(self.bind(operand)?);
                Ok(match op {
                    UnaryOp::Not => BoundExpr::Not(operand),
                    UnaryOp::Neg => BoundExpr::Neg(operand),
                })
            }
            Expr::IsNull { expr, negated } => {
                Ok(BoundExpr::IsNull(Box::new(self.bind(expr)?), *negated))
            }
            Expr::In {
                expr,
                list,
                negated,
            } => {
                let expr = Box::new(self.bind(expr)?);
                let list = list
                    .iter()
                    .map(|item| self.bind(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(BoundExpr::In(expr, list, *negated))
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => Ok(BoundExpr::Between(
                Box::new(self.bind(expr)?),
                Box::new(self.bind(low)?),
                Box::new(self.bind(high)?),
                *negated,
            )),
            Expr::Function(call) => self.bind_function(&call.name, &call.args),
        }
    }

    fn bind_column(&self, name: &str) -> Result<BoundExpr> {
        let ordinal = self
            .table
            .column_ordinal(name)
            .ok_or_else(|| self.table.column_not_found(name))?;
        let column = &self.table.columns()[ordinal];
        match self.mode {
            BindMode::ComputedColumn if column.is_computed() => Err(DataError::expression(
                format!("computed column '{name}' cannot be referenced by another computed column"),
            )),
            BindMode::Aggregate if !self.in_aggregate => Err(DataError::expression(format!(
                "column '{name}' must appear inside an aggregate function"
            ))),
            _ => Ok(BoundExpr::Column(column.id())),
        }
    }

    fn bind_function(&mut self, name: &str, args: &[Expr]) -> Result<BoundExpr> {
        if let Some(aggregate) = Aggregate::from_name(name) {
            return self.bind_aggregate(aggregate, name, args);
        }

        let (function, arity) = match name.to_ascii_lowercase().as_str() {
            "len" => (Function::Len, 1),
            "isnull" => (Function::IsNull, 2),
            "iif" => (Function::Iif, 3),
            "trim" => (Function::Trim, 1),
            "substring" => (Function::Substring, 3),
            "convert" => {
                check_arity(name, args, 2)?;
                let target = match &args[1] {
                    Expr::Literal(Literal::String(type_name)) => DataType::from_name(type_name)
                        .ok_or_else(|| {
                            DataError::expression(format!("unknown type '{type_name}' in Convert"))
                        })?,
                    _ => {
                        return Err(DataError::expression(
                            "the second argument of Convert must be a type name string",
                        ))
                    }
                };
                let value = self.bind(&args[0])?;
                return Ok(BoundExpr::Function(Function::Convert(target), vec![value]));
            }
            _ => {
                return Err(DataError::expression(format!(
                    "unknown function '{name}'"
                )))
            }
        };
        check_arity(name, args, arity)?;
        let args = args
            .iter()
            .map(|arg| self.bind(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(BoundExpr::Function(function, args))
    }

    fn bind_aggregate(
        &mut self,
        aggregate: Aggregate,
        name: &str,
        args: &[Expr],
    ) -> Result<BoundExpr> {
        if self.mode != BindMode::Aggregate {
            return Err(DataError::expression(format!(
                "aggregate function '{name}' is only allowed in compute expressions"
            )));
        }
        if self.in_aggregate {
            return Err(DataError::expression(format!(
                "aggregate function '{name}' cannot be nested"
            )));
        }
        check_arity(name, args, 1)?;
        self.in_aggregate = true;
        let inner = self.bind(&args[0]);
        self.in_aggregate = false;
        Ok(BoundExpr::Aggregate(aggregate, Box::new(inner?)))
    }
}

fn check_arity(name: &str, args: &[Expr], expected: usize) -> Result<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(DataError::expression(format!(
            "function '{name}' takes {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn bind_literal(literal: &Literal) -> Result<Value> {
    Ok(match literal {
        Literal::Integer(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Text(s.clone()),
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
        Literal::Date(text) => Value::DateTime(
            parse_date_time(text)
                .ok_or_else(|| DataError::expression(format!("invalid date literal #{text}#")))?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::error::ErrorKind;

    fn table() -> Table {
        let mut table = Table::new("Orders");
        table
            .add_column(ColumnDef::new("Price", DataType::Float))
            .unwrap();
        table
            .add_column(ColumnDef::new("Qty", DataType::Integer))
            .unwrap();
        table
            .add_column(ColumnDef::new("Total", DataType::Float).expression("Price * Qty"))
            .unwrap();
        table
    }

    #[test]
    fn test_bind_resolves_columns() {
        let table = table();
        let bound = Binder::bind_text(&table, "[price] > 2", BindMode::Filter).unwrap();
        let price = table.columns()[0].id();
        assert!(bound.references(price));
    }

    #[test]
    fn test_unknown_column() {
        let table = table();
        let err = Binder::bind_text(&table, "Missing = 1", BindMode::Filter).unwrap_err();
        assert!(matches!(err, DataError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_computed_columns_cannot_chain() {
        let table = table();
        let err = Binder::bind_text(&table, "Total * 2", BindMode::ComputedColumn).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expression);
        assert!(Binder::bind_text(&table, "Total * 2", BindMode::Filter).is_ok());
    }

    #[test]
    fn test_aggregate_rules() {
        let table = table();
        assert!(Binder::bind_text(&table, "Sum(Qty)", BindMode::Filter).is_err());
        assert!(Binder::bind_text(&table, "Qty", BindMode::Aggregate).is_err());
        assert!(Binder::bind_text(&table, "Sum(Sum(Qty))", BindMode::Aggregate).is_err());
        assert!(Binder::bind_text(&table, "Sum(Price * Qty) / Count(Qty)", BindMode::Aggregate).is_ok());
    }

    #[test]
    fn test_function_arity_and_convert() {
        let table = table();
        assert!(Binder::bind_text(&table, "Len(1, 2)", BindMode::Filter).is_err());
        assert!(Binder::bind_text(&table, "Convert(Qty, 'Nope')", BindMode::Filter).is_err());
        assert!(Binder::bind_text(&table, "Convert(Qty, 'System.String')", BindMode::Filter).is_ok());
        assert!(Binder::bind_text(&table, "Frobnicate(Qty)", BindMode::Filter).is_err());
        assert!(Binder::bind_text(&table, "#not a date#", BindMode::Filter).is_err());
    }
}
