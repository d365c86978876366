//! One-shot queries: select, compute, find and table copies.

use core::cmp::Ordering;
use std::collections::BTreeMap;

use oxide_data_expr::SortDirection;

use crate::column::ColumnId;
use crate::constraint::Constraint;
use crate::error::{DataError, Result};
use crate::expr::{evaluate, evaluate_predicate, BindMode, Binder, BoundExpr, RowScope};
use crate::row::{RowId, RowRecord, RowStateMask};
use crate::value::Value;

use super::events::Listeners;
use super::Table;

/// A resolved sort order: column ids with directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SortKeys {
    pub(crate) keys: Vec<(ColumnId, SortDirection)>,
}

impl SortKeys {
    /// Parses a sort list. A blank list sorts by the primary key, or keeps
    /// insertion order when there is none.
    pub(crate) fn parse(table: &Table, text: &str) -> Result<Self> {
        let items = oxide_data_expr::parse_sort(text)?;
        if items.is_empty() {
            return Ok(Self {
                keys: table
                    .primary_key_ids()
                    .iter()
                    .map(|id| (*id, SortDirection::Asc))
                    .collect(),
            });
        }
        let keys = items
            .iter()
            .map(|item| {
                let column = table.column(item.column.as_str())?;
                Ok((column.id, item.direction))
            })
            .collect::<Result<_>>()?;
        Ok(Self { keys })
    }

    pub(crate) fn columns(&self) -> Vec<ColumnId> {
        self.keys.iter().map(|(id, _)| *id).collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sort key of a row, read from the version filters see.
    pub(crate) fn key(&self, table: &Table, record: &RowRecord) -> Result<Vec<Value>> {
        let slot = record.view_slot();
        self.keys
            .iter()
            .map(|(id, _)| {
                let ordinal = table
                    .ordinal_of(*id)
                    .ok_or_else(|| table.column_not_found(&id.to_string()))?;
                table.cell_value(record, ordinal, slot)
            })
            .collect()
    }

    /// Compares two keys; NULL sorts first in ascending order.
    pub(crate) fn compare(&self, a: &[Value], b: &[Value], case_sensitive: bool) -> Ordering {
        for ((x, y), (_, direction)) in a.iter().zip(b).zip(&self.keys) {
            let ordering = x.cmp_with(y, case_sensitive);
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Compares only the first `a.len()` keys, for prefix lookups.
    pub(crate) fn compare_prefix(&self, a: &[Value], b: &[Value], case_sensitive: bool) -> Ordering {
        let len = a.len().min(b.len());
        self.compare(&a[..len], &b[..len], case_sensitive)
    }
}

impl Table {
    /// Binds a filter; a blank filter admits every row.
    pub(crate) fn bind_filter(&self, filter: &str) -> Result<Option<BoundExpr>> {
        if filter.trim().is_empty() {
            return Ok(None);
        }
        Binder::bind_text(self, filter, BindMode::Filter).map(Some)
    }

    /// Returns true if the row is in `mask` and passes `filter`.
    pub(crate) fn admits(
        &self,
        filter: Option<&BoundExpr>,
        mask: RowStateMask,
        record: &RowRecord,
    ) -> Result<bool> {
        if !mask.contains(record.state) {
            return Ok(false);
        }
        let Some(filter) = filter else {
            return Ok(true);
        };
        evaluate_predicate(
            filter,
            RowScope::Row {
                table: self,
                record,
                slot: record.view_slot(),
            },
        )
    }

    /// Filters and sorts rows with already-bound parts.
    pub(crate) fn select_bound(
        &self,
        filter: Option<&BoundExpr>,
        sort: &SortKeys,
        mask: RowStateMask,
    ) -> Result<Vec<RowId>> {
        let mut matched = Vec::new();
        for (id, record) in &self.rows {
            if self.admits(filter, mask, record)? {
                matched.push((sort.key(self, record)?, *id));
            }
        }
        if !sort.is_empty() {
            let case_sensitive = self.case_sensitive();
            matched.sort_by(|(ka, ia), (kb, ib)| {
                sort.compare(ka, kb, case_sensitive).then(ia.cmp(ib))
            });
        }
        Ok(matched.into_iter().map(|(_, id)| id).collect())
    }

    /// Returns the ids of the rows in `mask` that pass `filter`, ordered by
    /// `sort`. This is a snapshot; later edits do not change it.
    ///
    /// Filters and sorts read the original values of deleted rows and the
    /// current values of every other row.
    ///
    /// # Errors
    ///
    /// Fails when the filter or sort list does not parse or bind, or the
    /// filter cannot be evaluated for some row.
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_data::{ColumnDef, DataType, RowStateMask, Table, Value};
    ///
    /// let mut people = Table::new("People");
    /// people.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
    /// people.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
    /// people.insert([Value::from(1), "ann".into()]).unwrap();
    /// let bob = people.insert([Value::from(2), "bob".into()]).unwrap();
    ///
    /// let found = people.select("Name LIKE 'b*'", "Id DESC", RowStateMask::CURRENT_ROWS).unwrap();
    /// assert_eq!(found, vec![bob]);
    /// ```
    pub fn select(&self, filter: &str, sort: &str, mask: RowStateMask) -> Result<Vec<RowId>> {
        let filter = self.bind_filter(filter)?;
        let sort = SortKeys::parse(self, sort)?;
        self.select_bound(filter.as_ref(), &sort, mask)
    }

    /// Evaluates an aggregate expression such as `Sum(Price * Qty)` over the
    /// current rows that pass `filter`.
    ///
    /// # Errors
    ///
    /// Fails when the expression is not an aggregate expression or cannot be
    /// evaluated.
    pub fn compute(&self, expression: &str, filter: &str) -> Result<Value> {
        let bound = Binder::bind_text(self, expression, BindMode::Aggregate)?;
        let filter = self.bind_filter(filter)?;
        let rows = self.select_bound(filter.as_ref(), &SortKeys::default(), RowStateMask::CURRENT_ROWS)?;
        evaluate(&bound, RowScope::Rows { table: self, rows: &rows })
    }

    /// Finds the non-deleted row holding `key` in the primary-key columns.
    ///
    /// # Errors
    ///
    /// Fails when the table has no primary key, the key has the wrong number
    /// of values, or a value does not convert to its column type.
    pub fn find<V: Into<Value>>(&self, key: impl IntoIterator<Item = V>) -> Result<Option<RowId>> {
        let columns = self.primary_key_ids().to_vec();
        if columns.is_empty() {
            return Err(DataError::invalid_schema(&self.name, "the table has no primary key"));
        }
        let key: Vec<Value> = key.into_iter().map(Into::into).collect();
        if key.len() != columns.len() {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("the primary key has {} column(s), got {} value(s)", columns.len(), key.len()),
            ));
        }
        let key = columns
            .iter()
            .zip(key)
            .map(|(id, value)| {
                let ordinal = self
                    .ordinal_of(*id)
                    .ok_or_else(|| self.column_not_found(&id.to_string()))?;
                self.coerce_value(ordinal, value)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.find_by_key(&columns, &key))
    }

    /// Returns a copy holding only the rows in `mask`, with their versions
    /// and states, or `None` when no row matches. Use
    /// [`RowStateMask::CHANGES`] for all pending changes.
    #[must_use]
    pub fn get_changes(&self, mask: RowStateMask) -> Option<Self> {
        let mut changes = self.clone_schema();
        changes.rows = self
            .rows
            .iter()
            .filter(|(_, r)| mask.contains(r.state))
            .map(|(id, r)| (*id, r.clone()))
            .collect();
        if changes.rows.is_empty() {
            return None;
        }
        changes.next_row_id = self.next_row_id;
        changes.finish_copy();
        Some(changes)
    }

    /// Returns an empty table with the same columns, unique constraints and
    /// options. Foreign keys and listeners are not copied.
    #[must_use]
    pub fn clone_schema(&self) -> Self {
        let constraints = self
            .constraints
            .iter()
            .filter_map(Constraint::as_unique)
            .map(|u| {
                let mut unique = u.clone();
                unique.index.clear();
                Constraint::Unique(unique)
            })
            .collect();
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            next_column_id: self.next_column_id,
            rows: BTreeMap::new(),
            next_row_id: 1,
            constraints,
            options: self.options,
            loading: false,
            listeners: Listeners::new(),
        }
    }

    /// Returns a copy of schema and rows, versions and states included.
    #[must_use]
    pub fn copy(&self) -> Self {
        let mut copy = self.clone_schema();
        copy.rows = self.rows.clone();
        copy.next_row_id = self.next_row_id;
        copy.finish_copy();
        copy
    }

    fn finish_copy(&mut self) {
        let errors = self.rebuild_indexes();
        if !errors.is_empty() {
            tracing::warn!(table = %self.name, violations = errors.len(), "copied rows violate unique constraints");
        }
    }
}
