//! Unique constraints and their indexes.

use std::collections::BTreeMap;

use crate::column::ColumnId;
use crate::row::{RowId, RowRecord};
use crate::table::Table;
use crate::value::Value;

/// Uniqueness over a tuple of columns.
///
/// While the owning table enforces constraints, the index maps the key of
/// every non-deleted row (Current values, case-folded when the table is
/// case-insensitive) to that row. NULL is an ordinary key component, so two
/// NULL keys collide.
#[derive(Debug, Clone)]
pub struct UniqueConstraint {
    pub(crate) name: String,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) primary_key: bool,
    pub(crate) index: BTreeMap<Vec<Value>, RowId>,
}

impl UniqueConstraint {
    pub(crate) fn new(name: String, columns: Vec<ColumnId>, primary_key: bool) -> Self {
        Self {
            name,
            columns,
            primary_key,
            index: BTreeMap::new(),
        }
    }

    /// Returns the constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the constrained columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Returns true if this constraint is the table's primary key.
    #[must_use]
    pub const fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Builds the index key from a full row of values in ordinal order.
    pub(crate) fn key(&self, table: &Table, values: &[Value]) -> Vec<Value> {
        self.columns
            .iter()
            .map(|id| {
                table
                    .ordinal_of(*id)
                    .and_then(|ordinal| values.get(ordinal))
                    .map_or(Value::Null, |v| normalize(v, table.case_sensitive()))
            })
            .collect()
    }

    /// Builds the index key from one slot of a stored row.
    pub(crate) fn key_of(&self, table: &Table, record: &RowRecord, slot: usize) -> Vec<Value> {
        self.columns
            .iter()
            .map(|id| {
                table.ordinal_of(*id).map_or(Value::Null, |ordinal| {
                    normalize(record.cell(ordinal, slot), table.case_sensitive())
                })
            })
            .collect()
    }

    /// Returns the row holding `key`, other than `exclude`.
    pub(crate) fn conflict(&self, key: &[Value], exclude: Option<RowId>) -> Option<RowId> {
        self.index
            .get(key)
            .copied()
            .filter(|holder| Some(*holder) != exclude)
    }

    pub(crate) fn lookup(&self, key: &[Value]) -> Option<RowId> {
        self.index.get(key).copied()
    }

    pub(crate) fn insert(&mut self, key: Vec<Value>, id: RowId) {
        self.index.insert(key, id);
    }

    /// Removes `key` if it still maps to `id`.
    pub(crate) fn remove(&mut self, key: &[Value], id: RowId) {
        if self.index.get(key) == Some(&id) {
            self.index.remove(key);
        }
    }
}

/// Normalizes a key component: text is folded for case-insensitive tables.
pub(crate) fn normalize(value: &Value, case_sensitive: bool) -> Value {
    if case_sensitive {
        value.clone()
    } else {
        value.fold_case()
    }
}
