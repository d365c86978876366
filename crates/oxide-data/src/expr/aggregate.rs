//! Aggregate functions for `compute`.

use crate::error::{DataError, Result};
use crate::value::Value;

/// An aggregate function. NULL inputs are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    StDev,
    Var,
}

impl Aggregate {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "count" => Some(Self::Count),
            "stdev" => Some(Self::StDev),
            "var" => Some(Self::Var),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Sum => "Sum",
            Self::Avg => "Avg",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Count => "Count",
            Self::StDev => "StDev",
            Self::Var => "Var",
        }
    }
}

/// Folds non-null values. Empty input yields NULL, except `Count` which
/// yields zero.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn fold_aggregate(
    aggregate: Aggregate,
    values: Vec<Value>,
    case_sensitive: bool,
) -> Result<Value> {
    match aggregate {
        Aggregate::Count => Ok(Value::Int(i64::try_from(values.len()).unwrap_or(i64::MAX))),
        _ if values.is_empty() => Ok(Value::Null),
        Aggregate::Min => Ok(values
            .into_iter()
            .min_by(|a, b| a.cmp_with(b, case_sensitive))
            .unwrap_or_default()),
        Aggregate::Max => Ok(values
            .into_iter()
            .max_by(|a, b| a.cmp_with(b, case_sensitive))
            .unwrap_or_default()),
        Aggregate::Sum if values.iter().all(|v| matches!(v, Value::Int(_))) => {
            let mut total: i64 = 0;
            for value in &values {
                if let Value::Int(i) = value {
                    total = total
                        .checked_add(*i)
                        .ok_or_else(|| DataError::expression("integer overflow in Sum"))?;
                }
            }
            Ok(Value::Int(total))
        }
        Aggregate::Sum => Ok(Value::Float(numbers(aggregate, &values)?.iter().sum())),
        Aggregate::Avg => {
            let numbers = numbers(aggregate, &values)?;
            Ok(Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64))
        }
        Aggregate::Var | Aggregate::StDev => {
            let numbers = numbers(aggregate, &values)?;
            if numbers.len() < 2 {
                return Ok(Value::Null);
            }
            let n = numbers.len() as f64;
            let mean = numbers.iter().sum::<f64>() / n;
            let variance = numbers.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            Ok(Value::Float(if aggregate == Aggregate::StDev {
                variance.sqrt()
            } else {
                variance
            }))
        }
    }
}

fn numbers(aggregate: Aggregate, values: &[Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|value| {
            value.as_f64().ok_or_else(|| {
                DataError::expression(format!(
                    "{} expects numbers, got {}",
                    aggregate.name(),
                    value.describe()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_sum_keeps_integers() {
        assert_eq!(
            fold_aggregate(Aggregate::Sum, ints(&[1, 2, 3]), true).unwrap(),
            Value::Int(6)
        );
        assert_eq!(
            fold_aggregate(Aggregate::Sum, vec![Value::Int(1), Value::Float(0.5)], true).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(
            fold_aggregate(Aggregate::Count, Vec::new(), true).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            fold_aggregate(Aggregate::Avg, Vec::new(), true).unwrap(),
            Value::Null
        );
        assert_eq!(
            fold_aggregate(Aggregate::Var, ints(&[4]), true).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_sample_statistics() {
        let var = fold_aggregate(Aggregate::Var, ints(&[2, 4, 4, 4, 5, 5, 7, 9]), true).unwrap();
        let Value::Float(var) = var else {
            panic!("expected float");
        };
        assert!((var - 32.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_text() {
        let values = vec![Value::from("b"), Value::from("A"), Value::from("c")];
        assert_eq!(
            fold_aggregate(Aggregate::Min, values.clone(), false).unwrap(),
            Value::from("A")
        );
        assert_eq!(
            fold_aggregate(Aggregate::Max, values, false).unwrap(),
            Value::from("c")
        );
        assert!(fold_aggregate(Aggregate::Avg, vec![Value::from("x")], true).is_err());
    }
}
