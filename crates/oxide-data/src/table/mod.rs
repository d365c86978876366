//! Tables: columns, versioned rows and constraints.
//!
//! A [`Table`] is read directly. Every mutation goes through a [`TableMut`],
//! which borrows the table together with the other tables of its data set so
//! that foreign keys and cascades can reach them. A standalone table hands
//! one out through [`Table::edit`]; the common edits are also available
//! directly on [`Table`].

mod edit;
mod events;
mod query;
mod schema_ops;
mod txn;

use core::fmt;
use std::collections::BTreeMap;

use crate::column::{Column, ColumnDef, ColumnId};
use crate::constraint::{Constraint, ForeignKeyDef};
use crate::error::{DataError, Result};
use crate::expr::{evaluate, RowScope};
use crate::options::TableOptions;
use crate::row::{ColumnKey, DataRow, RowId, RowRecord, RowState, RowVersion, CURRENT};
use crate::value::Value;

pub use edit::{NewRow, TableMut};
pub use events::{EventKind, ListenerId, RowAction, TableEvent, TableListener};
pub(crate) use events::{dispatch, Notice};
pub(crate) use query::SortKeys;

use events::Listeners;

/// An in-memory table.
pub struct Table {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    pub(crate) next_column_id: u32,
    pub(crate) rows: BTreeMap<RowId, RowRecord>,
    pub(crate) next_row_id: u64,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) options: TableOptions,
    pub(crate) loading: bool,
    pub(crate) listeners: Listeners,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .field("constraints", &self.constraints)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Table {
    /// Creates an empty table with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, TableOptions::default())
    }

    /// Creates an empty table.
    #[must_use]
    pub fn with_options(name: impl Into<String>, options: TableOptions) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            next_column_id: 0,
            rows: BTreeMap::new(),
            next_row_id: 1,
            constraints: Vec::new(),
            options,
            loading: false,
            listeners: Listeners::new(),
        }
    }

    /// Returns a handle for editing this table on its own.
    pub fn edit(&mut self) -> TableMut<'_> {
        TableMut::new(core::slice::from_mut(self), 0)
    }

    // ===== Schema =====

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Returns true if text comparisons respect case.
    #[must_use]
    pub const fn case_sensitive(&self) -> bool {
        self.options.case_sensitive
    }

    /// Returns true while constraints are validated on every edit.
    #[must_use]
    pub const fn enforces_constraints(&self) -> bool {
        self.options.enforce_constraints && !self.loading
    }

    /// Returns true between `begin_load_data` and `end_load_data`.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns the columns in ordinal order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns a column by name, ordinal or id.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` for unknown columns.
    pub fn column(&self, key: impl ColumnKey) -> Result<&Column> {
        let ordinal = key.ordinal(self)?;
        Ok(&self.columns[ordinal])
    }

    /// Returns the ordinal of a column name. An exact match wins over a
    /// case-insensitive one.
    #[must_use]
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| self.columns.iter().position(|c| c.matches_name(name)))
    }

    /// Returns the current ordinal of a column id.
    #[must_use]
    pub fn ordinal_of(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Returns the constraints in registration order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns a constraint by name.
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name() == name)
    }

    /// Returns the primary-key columns; empty when there is no primary key.
    #[must_use]
    pub fn primary_key(&self) -> Vec<&Column> {
        self.primary_key_ids()
            .iter()
            .filter_map(|id| self.ordinal_of(*id).map(|o| &self.columns[o]))
            .collect()
    }

    pub(crate) fn primary_key_ids(&self) -> &[ColumnId] {
        self.constraints
            .iter()
            .filter_map(Constraint::as_unique)
            .find(|u| u.is_primary_key())
            .map_or(&[], |u| u.columns())
    }

    pub(crate) fn column_not_found(&self, column: &str) -> DataError {
        DataError::ColumnNotFound {
            table: self.name.clone(),
            column: column.to_string(),
        }
    }

    pub(crate) fn column_names(&self, ids: &[ColumnId]) -> String {
        ids.iter()
            .map(|id| {
                self.ordinal_of(*id)
                    .map_or_else(|| id.to_string(), |o| self.columns[o].name.clone())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ===== Rows =====

    /// Returns the number of rows, deleted rows included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the rows in insertion order, deleted rows included.
    pub fn rows(&self) -> impl Iterator<Item = DataRow<'_>> {
        self.rows.iter().map(|(id, record)| DataRow {
            table: self,
            id: *id,
            record,
        })
    }

    /// Returns a row by id.
    ///
    /// # Errors
    ///
    /// Returns `RowNotFound` if the row is not in the table.
    pub fn row(&self, id: RowId) -> Result<DataRow<'_>> {
        Ok(DataRow {
            table: self,
            id,
            record: self.record(id)?,
        })
    }

    /// Returns the row at a position in insertion order.
    #[must_use]
    pub fn row_at(&self, index: usize) -> Option<DataRow<'_>> {
        self.rows().nth(index)
    }

    /// Returns the state of a row; `Detached` when it is not in the table.
    #[must_use]
    pub fn row_state(&self, id: RowId) -> RowState {
        self.rows.get(&id).map_or(RowState::Detached, |r| r.state)
    }

    /// Reads one version of a cell.
    ///
    /// # Errors
    ///
    /// Same as [`DataRow::get_version`]. A row this table created that has
    /// since become detached has no Original or Proposed version
    /// (`VersionNotFound`); other reads of it fail with `RowNotFound`.
    pub fn get(&self, id: RowId, column: impl ColumnKey, version: RowVersion) -> Result<Value> {
        let ordinal = column.ordinal(self)?;
        let Some(record) = self.rows.get(&id) else {
            let issued = id.0 < self.next_row_id;
            return Err(match version {
                RowVersion::Original | RowVersion::Proposed if issued => {
                    DataError::VersionNotFound { row: id, version }
                }
                _ => DataError::RowNotFound(id),
            });
        };
        let slot = record.slot_for(id, version)?;
        self.cell_value(record, ordinal, slot)
    }

    /// Returns true if any row is added, modified or deleted.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.rows.values().any(|r| r.state != RowState::Unchanged)
    }

    /// Returns the rows carrying a row or column error.
    #[must_use]
    pub fn get_errors(&self) -> Vec<DataRow<'_>> {
        self.rows().filter(DataRow::has_errors).collect()
    }

    pub(crate) fn record(&self, id: RowId) -> Result<&RowRecord> {
        self.rows.get(&id).ok_or(DataError::RowNotFound(id))
    }

    /// Reads a cell, evaluating computed columns against the same slot.
    pub(crate) fn cell_value(&self, record: &RowRecord, ordinal: usize, slot: usize) -> Result<Value> {
        let column = self
            .columns
            .get(ordinal)
            .ok_or_else(|| self.column_not_found(&format!("#{ordinal}")))?;
        let Some(expression) = &column.expression else {
            return Ok(record.cell(ordinal, slot).clone());
        };
        let value = evaluate(
            &expression.bound,
            RowScope::Row {
                table: self,
                record,
                slot,
            },
        )?;
        value
            .coerce(column.data_type)
            .ok_or_else(|| DataError::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type,
                found: value.describe(),
            })
    }

    /// Returns the row that is not deleted and holds `values` in `columns`. Uses the unique index when one covers exactly
    /// these columns.
    pub(crate) fn find_by_key(&self, columns: &[ColumnId], values: &[Value]) -> Option<RowId> {
        if self.enforces_constraints() {
            let index = self
                .constraints
                .iter()
                .filter_map(Constraint::as_unique)
                .find(|u| u.columns() == columns);
            if let Some(unique) = index {
                let key: Vec<Value> = values
                    .iter()
                    .map(|v| crate::constraint::normalize_key(v, self.case_sensitive()))
                    .collect();
                return unique.lookup(&key);
            }
        }
        let ordinals: Vec<usize> = columns.iter().filter_map(|id| self.ordinal_of(*id)).collect();
        if ordinals.len() != columns.len() {
            return None;
        }
        self.rows
            .iter()
            .filter(|(_, r)| r.state != RowState::Deleted)
            .find(|(_, r)| {
                ordinals.iter().zip(values).all(|(o, v)| {
                    r.cell(*o, CURRENT).cmp_with(v, self.case_sensitive()).is_eq()
                })
            })
            .map(|(id, _)| *id)
    }

    // ===== Listeners =====

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: impl TableListener + 'static) -> ListenerId {
        self.listeners.subscribe(Box::new(listener))
    }

    /// Removes a change listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    // ===== Edits =====

    /// Adds a column. See [`TableMut::add_column`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::add_column`].
    pub fn add_column(&mut self, def: ColumnDef) -> Result<ColumnId> {
        self.edit().add_column(def)
    }

    /// Declares the primary key. See [`TableMut::set_primary_key`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::set_primary_key`].
    pub fn set_primary_key<K: ColumnKey>(&mut self, columns: impl IntoIterator<Item = K>) -> Result<()> {
        self.edit().set_primary_key(columns)
    }

    /// Adds a self-referencing foreign key. See [`TableMut::add_foreign_key`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::add_foreign_key`].
    pub fn add_foreign_key(&mut self, def: ForeignKeyDef) -> Result<String> {
        self.edit().add_foreign_key(def)
    }

    /// Creates a detached row pre-populated with defaults.
    pub fn new_row(&mut self) -> NewRow {
        self.edit().new_row()
    }

    /// Adds a detached row. See [`TableMut::add_row`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::add_row`].
    pub fn add_row(&mut self, row: NewRow) -> Result<RowId> {
        self.edit().add_row(row)
    }

    /// Adds a row from values in ordinal order. See [`TableMut::insert`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::insert`].
    pub fn insert<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<RowId> {
        self.edit().insert(values)
    }

    /// Sets a value. See [`TableMut::set_value`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::set_value`].
    pub fn set_value(&mut self, id: RowId, column: impl ColumnKey, value: impl Into<Value>) -> Result<()> {
        self.edit().set_value(id, column, value)
    }

    /// Deletes a row. See [`TableMut::delete_row`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::delete_row`].
    pub fn delete_row(&mut self, id: RowId) -> Result<()> {
        self.edit().delete_row(id)
    }

    /// Accepts every pending change. See [`TableMut::accept_changes`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::accept_changes`].
    pub fn accept_changes(&mut self) -> Result<()> {
        self.edit().accept_changes()
    }

    /// Rejects every pending change. See [`TableMut::reject_changes`].
    ///
    /// # Errors
    ///
    /// See [`TableMut::reject_changes`].
    pub fn reject_changes(&mut self) -> Result<()> {
        self.edit().reject_changes()
    }
}
