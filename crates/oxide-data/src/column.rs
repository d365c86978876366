//! Column definitions.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::BoundExpr;
use crate::value::{DataType, Value};

/// Stable identifier of a column within its table.
///
/// Unlike the ordinal, the id survives removal of earlier columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Auto-increment policy of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoIncrement {
    /// First generated value.
    pub seed: i64,
    /// Distance between generated values; never zero.
    pub step: i64,
    #[serde(skip)]
    next: Option<i64>,
}

impl AutoIncrement {
    /// Creates a policy starting at `seed`.
    #[must_use]
    pub const fn new(seed: i64, step: i64) -> Self {
        Self {
            seed,
            step,
            next: None,
        }
    }

    /// Returns the value the next row will receive.
    #[must_use]
    pub const fn next_value(&self) -> i64 {
        match self.next {
            Some(next) => next,
            None => self.seed,
        }
    }

    /// Hands out the next value and advances the counter.
    pub(crate) fn take(&mut self) -> i64 {
        let value = self.next_value();
        self.next = Some(value.saturating_add(self.step));
        value
    }

    /// Moves the counter past an explicitly stored value.
    pub(crate) fn observe(&mut self, value: i64) {
        let next = self.next_value();
        let beyond = if self.step > 0 {
            value >= next
        } else {
            value <= next
        };
        if beyond {
            self.next = Some(value.saturating_add(self.step));
        }
    }
}

/// A computed column's expression text and its bound form.
#[derive(Debug, Clone)]
pub(crate) struct ColumnExpression {
    pub(crate) text: String,
    pub(crate) bound: BoundExpr,
}

/// A column of a table.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) id: ColumnId,
    pub(crate) name: String,
    pub(crate) data_type: DataType,
    pub(crate) allow_null: bool,
    pub(crate) default_value: Value,
    pub(crate) auto_increment: Option<AutoIncrement>,
    pub(crate) max_length: Option<usize>,
    pub(crate) read_only: bool,
    pub(crate) expression: Option<ColumnExpression>,
}

impl Column {
    /// Returns the stable id.
    #[must_use]
    pub const fn id(&self) -> ColumnId {
        self.id
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns whether NULL is allowed.
    #[must_use]
    pub const fn allow_null(&self) -> bool {
        self.allow_null
    }

    /// Returns the value new rows start with.
    #[must_use]
    pub const fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Returns the auto-increment policy, if any.
    #[must_use]
    pub const fn auto_increment(&self) -> Option<&AutoIncrement> {
        self.auto_increment.as_ref()
    }

    /// Returns the maximum text length, if limited.
    #[must_use]
    pub const fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Returns true if values cannot change once the row is in the table.
    /// Computed columns are always read only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only || self.expression.is_some()
    }

    /// Returns the expression text of a computed column.
    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_ref().map(|e| e.text.as_str())
    }

    /// Returns true for computed columns.
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        self.expression.is_some()
    }

    /// Returns true if `name` refers to this column: exactly, or ignoring
    /// case.
    pub(crate) fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Definition of a column to add to a table.
///
/// ```rust
/// use oxide_data::{ColumnDef, DataType};
///
/// let id = ColumnDef::new("Id", DataType::Integer)
///     .not_null()
///     .unique()
///     .auto_increment(1, 1);
/// assert_eq!(id.name, "Id");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Whether NULL is allowed.
    pub allow_null: bool,
    /// Default value for new rows.
    pub default_value: Value,
    /// Auto-increment seed and step.
    pub auto_increment: Option<(i64, i64)>,
    /// Maximum text length.
    pub max_length: Option<usize>,
    /// Whether a single-column unique constraint is created.
    pub unique: bool,
    /// Whether values are frozen once the row is added.
    pub read_only: bool,
    /// Expression of a computed column.
    pub expression: Option<String>,
}

impl ColumnDef {
    /// Creates a nullable column definition.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            allow_null: true,
            default_value: Value::Null,
            auto_increment: None,
            max_length: None,
            unique: false,
            read_only: false,
            expression: None,
        }
    }

    /// Disallows NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = value.into();
        self
    }

    /// Generates values starting at `seed`, advancing by `step`.
    #[must_use]
    pub const fn auto_increment(mut self, seed: i64, step: i64) -> Self {
        self.auto_increment = Some((seed, step));
        self
    }

    /// Limits text length.
    #[must_use]
    pub const fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Requests a single-column unique constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Freezes values once the row is added.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Makes the column computed from `expression`.
    #[must_use]
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_increment_sequence() {
        let mut auto = AutoIncrement::new(10, 5);
        assert_eq!(auto.take(), 10);
        assert_eq!(auto.take(), 15);
        auto.observe(40);
        assert_eq!(auto.take(), 45);
        auto.observe(3);
        assert_eq!(auto.next_value(), 50);
    }

    #[test]
    fn test_negative_step() {
        let mut auto = AutoIncrement::new(-1, -1);
        assert_eq!(auto.take(), -1);
        auto.observe(-10);
        assert_eq!(auto.take(), -11);
    }

    #[test]
    fn test_builder() {
        let def = ColumnDef::new("Name", DataType::Text)
            .not_null()
            .max_length(20)
            .default_value("n/a");
        assert!(!def.allow_null);
        assert_eq!(def.max_length, Some(20));
        assert_eq!(def.default_value, Value::from("n/a"));
    }
}
