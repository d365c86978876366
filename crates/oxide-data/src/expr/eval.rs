//! Expression evaluation with three-valued logic.

use core::cmp::Ordering;

use oxide_data_expr::BinaryOp;

use super::aggregate::fold_aggregate;
use super::{like_regex, BoundExpr, Function, LikePattern};
use crate::error::{DataError, Result};
use crate::row::{RowId, RowRecord};
use crate::table::Table;
use crate::value::Value;

/// What an expression is evaluated against.
#[derive(Clone, Copy)]
pub(crate) enum RowScope<'a> {
    /// One version of one row.
    Row {
        table: &'a Table,
        record: &'a RowRecord,
        slot: usize,
    },
    /// A set of rows, for aggregates.
    Rows { table: &'a Table, rows: &'a [RowId] },
}

impl<'a> RowScope<'a> {
    const fn table(&self) -> &'a Table {
        match self {
            Self::Row { table, .. } | Self::Rows { table, .. } => table,
        }
    }
}

/// Evaluates a predicate: only TRUE admits the row, NULL does not.
pub(crate) fn evaluate_predicate(expr: &BoundExpr, scope: RowScope<'_>) -> Result<bool> {
    match evaluate(expr, scope)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(DataError::expression(format!(
            "filter must evaluate to a boolean, got {}",
            other.describe()
        ))),
    }
}

/// Evaluates an expression.
pub(crate) fn evaluate(expr: &BoundExpr, scope: RowScope<'_>) -> Result<Value> {
    match expr {
        BoundExpr::Literal(value) => Ok(value.clone()),
        BoundExpr::Column(id) => match scope {
            RowScope::Row {
                table,
                record,
                slot,
            } => {
                let ordinal = table
                    .ordinal_of(*id)
                    .ok_or_else(|| table.column_not_found(&id.to_string()))?;
                table.cell_value(record, ordinal, slot)
            }
            RowScope::Rows { .. } => Err(DataError::expression(
                "column reference outside of an aggregate",
            )),
        },
        BoundExpr::Binary(left, op, right) => evaluate_binary(left, *op, right, scope),
        BoundExpr::Like(expr, pattern) => {
            let value = evaluate(expr, scope)?;
            let Some(text) = text_operand(&value)? else {
                return Ok(Value::Null);
            };
            match pattern {
                LikePattern::Static(regex) => Ok(Value::Bool(regex.is_match(&text))),
                LikePattern::Dynamic(pattern) => {
                    let pattern = evaluate(pattern, scope)?;
                    let Some(pattern) = text_operand(&pattern)? else {
                        return Ok(Value::Null);
                    };
                    let regex = like_regex(&pattern, scope.table().case_sensitive())?;
                    Ok(Value::Bool(regex.is_match(&text)))
                }
            }
        }
        BoundExpr::Not(operand) => {
            Ok(tri_value(truth(&evaluate(operand, scope)?)?.map(|b| !b)))
        }
        BoundExpr::Neg(operand) => match evaluate(operand, scope)? {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| DataError::expression("integer overflow in negation")),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(DataError::expression(format!(
                "cannot negate {}",
                other.describe()
            ))),
        },
        BoundExpr::IsNull(operand, negated) => {
            let is_null = evaluate(operand, scope)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        BoundExpr::In(operand, list, negated) => {
            let value = evaluate(operand, scope)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let case_sensitive = scope.table().case_sensitive();
            let mut saw_null = false;
            let mut found = false;
            for item in list {
                match compare(&value, &evaluate(item, scope)?, case_sensitive)? {
                    Some(Ordering::Equal) => {
                        found = true;
                        break;
                    }
                    Some(_) => {}
                    None => saw_null = true,
                }
            }
            let result = if found {
                Some(true)
            } else if saw_null {
                None
            } else {
                Some(false)
            };
            Ok(tri_value(result.map(|b| b != *negated)))
        }
        BoundExpr::Between(operand, low, high, negated) => {
            let value = evaluate(operand, scope)?;
            let case_sensitive = scope.table().case_sensitive();
            let above = compare(&value, &evaluate(low, scope)?, case_sensitive)?
                .map(|o| o != Ordering::Less);
            let below = compare(&value, &evaluate(high, scope)?, case_sensitive)?
                .map(|o| o != Ordering::Greater);
            Ok(tri_value(and(above, below).map(|b| b != *negated)))
        }
        BoundExpr::Function(function, args) => evaluate_function(*function, args, scope),
        BoundExpr::Aggregate(aggregate, inner) => match scope {
            RowScope::Rows { table, rows } => {
                let mut values = Vec::with_capacity(rows.len());
                for id in rows {
                    let record = table.record(*id)?;
                    let row_scope = RowScope::Row {
                        table,
                        record,
                        slot: record.view_slot(),
                    };
                    let value = evaluate(inner, row_scope)?;
                    if !value.is_null() {
                        values.push(value);
                    }
                }
                fold_aggregate(*aggregate, values, table.case_sensitive())
            }
            RowScope::Row { .. } => Err(DataError::expression(
                "aggregate functions need a set of rows",
            )),
        },
    }
}

fn evaluate_binary(
    left: &BoundExpr,
    op: BinaryOp,
    right: &BoundExpr,
    scope: RowScope<'_>,
) -> Result<Value> {
    match op {
        BinaryOp::And => {
            let lhs = truth(&evaluate(left, scope)?)?;
            if lhs == Some(false) {
                return Ok(Value::Bool(false));
            }
            let rhs = truth(&evaluate(right, scope)?)?;
            Ok(tri_value(and(lhs, rhs)))
        }
        BinaryOp::Or => {
            let lhs = truth(&evaluate(left, scope)?)?;
            if lhs == Some(true) {
                return Ok(Value::Bool(true));
            }
            let rhs = truth(&evaluate(right, scope)?)?;
            Ok(tri_value(match (lhs, rhs) {
                (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }))
        }
        op if op.is_comparison() => {
            let lhs = evaluate(left, scope)?;
            let rhs = evaluate(right, scope)?;
            let ordering = compare(&lhs, &rhs, scope.table().case_sensitive())?;
            Ok(tri_value(ordering.map(|o| match op {
                BinaryOp::Eq => o == Ordering::Equal,
                BinaryOp::NotEq => o != Ordering::Equal,
                BinaryOp::Lt => o == Ordering::Less,
                BinaryOp::LtEq => o != Ordering::Greater,
                BinaryOp::Gt => o == Ordering::Greater,
                _ => o != Ordering::Less,
            })))
        }
        _ => {
            let lhs = evaluate(left, scope)?;
            let rhs = evaluate(right, scope)?;
            arithmetic(&lhs, op, &rhs)
        }
    }
}

/// Compares two values; `None` when either is NULL. Values of different
/// types are compared after converting one to the other's type.
pub(crate) fn compare(a: &Value, b: &Value, case_sensitive: bool) -> Result<Option<Ordering>> {
    if a.is_null() || b.is_null() {
        return Ok(None);
    }
    let (Some(ta), Some(tb)) = (a.data_type(), b.data_type()) else {
        return Ok(None);
    };
    if ta == tb || (ta.is_numeric() && tb.is_numeric()) {
        return Ok(Some(a.cmp_with(b, case_sensitive)));
    }
    if let Some(b) = b.coerce(ta) {
        return Ok(Some(a.cmp_with(&b, case_sensitive)));
    }
    if let Some(a) = a.coerce(tb) {
        return Ok(Some(a.cmp_with(b, case_sensitive)));
    }
    Err(DataError::expression(format!(
        "cannot compare {} with {}",
        a.describe(),
        b.describe()
    )))
}

fn arithmetic(lhs: &Value, op: BinaryOp, rhs: &Value) -> Result<Value> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if op == BinaryOp::Add && (matches!(lhs, Value::Text(_)) || matches!(rhs, Value::Text(_))) {
        return Ok(Value::Text(format!("{lhs}{rhs}")));
    }
    let overflow = || DataError::expression(format!("integer overflow in {}", op.as_str()));
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinaryOp::Add => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mod if *b == 0 => Err(DataError::expression("division by zero")),
            BinaryOp::Mod => a.checked_rem(*b).map(Value::Int).ok_or_else(overflow),
            _ => divide(lhs, rhs),
        },
        _ => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Err(DataError::expression(format!(
                    "operator {} cannot be applied to {} and {}",
                    op.as_str(),
                    lhs.describe(),
                    rhs.describe()
                )));
            };
            match op {
                BinaryOp::Add => Ok(Value::Float(a + b)),
                BinaryOp::Sub => Ok(Value::Float(a - b)),
                BinaryOp::Mul => Ok(Value::Float(a * b)),
                BinaryOp::Mod if b == 0.0 => Err(DataError::expression("division by zero")),
                BinaryOp::Mod => Ok(Value::Float(a % b)),
                _ => divide(lhs, rhs),
            }
        }
    }
}

/// Division always yields a float.
fn divide(lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(_), Some(b)) if b == 0.0 => Err(DataError::expression("division by zero")),
        (Some(a), Some(b)) => Ok(Value::Float(a / b)),
        _ => Err(DataError::expression(format!(
            "cannot divide {} by {}",
            lhs.describe(),
            rhs.describe()
        ))),
    }
}

fn evaluate_function(function: Function, args: &[BoundExpr], scope: RowScope<'_>) -> Result<Value> {
    match function {
        Function::Iif => {
            let condition = truth(&evaluate(&args[0], scope)?)?;
            let branch = if condition == Some(true) { &args[1] } else { &args[2] };
            evaluate(branch, scope)
        }
        Function::IsNull => {
            let value = evaluate(&args[0], scope)?;
            if value.is_null() {
                evaluate(&args[1], scope)
            } else {
                Ok(value)
            }
        }
        Function::Len => Ok(match evaluate(&args[0], scope)? {
            Value::Null => Value::Null,
            value => Value::Int(i64::try_from(value.to_string().chars().count()).unwrap_or(i64::MAX)),
        }),
        Function::Trim => Ok(match evaluate(&args[0], scope)? {
            Value::Null => Value::Null,
            value => Value::Text(value.to_string().trim().to_string()),
        }),
        Function::Substring => {
            let value = evaluate(&args[0], scope)?;
            let start = evaluate(&args[1], scope)?;
            let length = evaluate(&args[2], scope)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let (Some(start), Some(length)) = (start.as_i64(), length.as_i64()) else {
                return Err(DataError::expression(
                    "Substring expects integer start and length",
                ));
            };
            let (Ok(start @ 1..), Ok(length)) = (usize::try_from(start), usize::try_from(length))
            else {
                return Err(DataError::expression(format!(
                    "Substring start {start} or length {length} out of range"
                )));
            };
            let text: String = value.to_string().chars().skip(start - 1).take(length).collect();
            Ok(Value::Text(text))
        }
        Function::Convert(target) => {
            let value = evaluate(&args[0], scope)?;
            value.coerce(target).ok_or_else(|| {
                DataError::expression(format!("cannot convert {} to {target}", value.describe()))
            })
        }
    }
}

fn text_operand(value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s.clone())),
        Value::Blob(_) => Err(DataError::expression("LIKE cannot be applied to a blob")),
        other => Ok(Some(other.to_string())),
    }
}

fn truth(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(DataError::expression(format!(
            "expected a boolean, got {}",
            other.describe()
        ))),
    }
}

const fn and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn tri_value(value: Option<bool>) -> Value {
    value.map_or(Value::Null, Value::Bool)
}
