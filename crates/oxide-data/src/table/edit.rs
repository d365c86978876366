//! Row edits.

use core::ops::Deref;

use tracing::debug;

use crate::column::ColumnId;
use crate::error::{DataError, Result};
use crate::row::{ColumnKey, DataRow, RowId, RowRecord, RowState, RowVersion, CURRENT, ORIGINAL, PROPOSED};
use crate::value::{DataType, Value};

use super::events::{ListenerId, TableListener};
use super::txn::{self, Txn};
use super::Table;

/// Mutable access to one table of a set.
///
/// Dereferences to [`Table`] for reads. Edits that reach other tables
/// (foreign-key checks, cascades) see every table the handle was created
/// over: all tables of the data set, or just the table itself for
/// [`Table::edit`].
pub struct TableMut<'a> {
    pub(crate) tables: &'a mut [Table],
    pub(crate) index: usize,
}

impl Deref for TableMut<'_> {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.tables[self.index]
    }
}

impl<'a> TableMut<'a> {
    pub(crate) fn new(tables: &'a mut [Table], index: usize) -> Self {
        Self { tables, index }
    }

    pub(crate) fn table_mut(&mut self) -> &mut Table {
        &mut self.tables[self.index]
    }

    /// Runs an all-or-nothing edit against this table.
    pub(crate) fn run<R>(&mut self, edit: impl FnOnce(&mut Txn<'_>, usize) -> Result<R>) -> Result<R> {
        let index = self.index;
        txn::run(self.tables, |txn| edit(txn, index))
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: impl TableListener + 'static) -> ListenerId {
        self.table_mut().subscribe(listener)
    }

    /// Removes a change listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.table_mut().unsubscribe(id)
    }

    /// Creates a detached row holding column defaults and fresh
    /// auto-increment values.
    pub fn new_row(&mut self) -> NewRow {
        let table = self.table_mut();
        let values = table
            .columns
            .iter_mut()
            .map(|column| match (&column.expression, column.auto_increment.as_mut()) {
                (Some(_), _) => Value::Null,
                (None, Some(auto)) => Value::Int(auto.take()),
                (None, None) => column.default_value.clone(),
            })
            .collect();
        NewRow::new(table, values)
    }

    /// Adds a detached row; it becomes Added.
    ///
    /// # Errors
    ///
    /// Fails when the row was built for another schema, on non-null,
    /// max-length, unique or foreign-key violations while constraints are
    /// enforced, and when a `RowChanging` listener vetoes. Nothing is added
    /// on failure.
    pub fn add_row(&mut self, row: NewRow) -> Result<RowId> {
        let current: Vec<ColumnId> = self.columns.iter().map(|c| c.id).collect();
        if row.table != self.name || row.columns.iter().map(|c| c.0).ne(current) {
            return Err(DataError::invalid_schema(
                &self.name,
                "the row was created for a different schema",
            ));
        }
        self.run(|txn, t| txn.insert_record(t, RowRecord::added(row.values)))
    }

    /// Adds a row from values in ordinal order. Missing trailing values take
    /// column defaults; NULL in an auto-increment column takes the next
    /// generated value.
    ///
    /// # Errors
    ///
    /// Fails with `TypeMismatch` for unconvertible values, `ReadOnly` for
    /// values given to computed columns, and as [`TableMut::add_row`].
    pub fn insert<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> Result<RowId> {
        let supplied: Vec<Value> = values.into_iter().map(Into::into).collect();
        if supplied.len() > self.columns.len() {
            return Err(DataError::invalid_schema(
                &self.name,
                format!(
                    "{} values given for {} columns",
                    supplied.len(),
                    self.columns.len()
                ),
            ));
        }
        let mut row = Vec::with_capacity(self.columns.len());
        for (ordinal, column) in self.columns.iter().enumerate() {
            match supplied.get(ordinal) {
                Some(value) if !value.is_null() => {
                    if column.is_computed() {
                        return Err(DataError::ReadOnly(column.name.clone()));
                    }
                    row.push(self.coerce_value(ordinal, value.clone())?);
                }
                Some(_) => row.push(Value::Null),
                None if column.is_computed() => row.push(Value::Null),
                None => row.push(column.default_value.clone()),
            }
        }
        for (value, column) in row.iter_mut().zip(&mut self.table_mut().columns) {
            if let (Value::Null, Some(auto)) = (&*value, column.auto_increment.as_mut()) {
                *value = Value::Int(auto.take());
            }
        }
        self.run(|txn, t| txn.insert_record(t, RowRecord::added(row)))
    }

    /// Copies a row of another table, keeping its state and versions.
    /// Columns are matched by name; unknown columns are ignored.
    ///
    /// # Errors
    ///
    /// Fails as [`TableMut::add_row`] or when a value cannot be converted.
    pub fn import_row(&mut self, source: &DataRow<'_>) -> Result<RowId> {
        let record = self.adopt(source)?;
        self.run(|txn, t| txn.insert_record(t, record))
    }

    /// Builds a record of this table from a row of another one.
    fn adopt(&self, source: &DataRow<'_>) -> Result<RowRecord> {
        let mut record = RowRecord {
            cells: vec![[None, None, None]; self.columns.len()],
            state: source.state(),
            prior_state: source.record.prior_state,
            editing: false,
            error: source.record.error.clone(),
            column_errors: Default::default(),
        };
        for (ordinal, column) in self.columns.iter().enumerate() {
            if column.is_computed() {
                continue;
            }
            let from = source.table.column_ordinal(&column.name);
            for slot in [ORIGINAL, CURRENT] {
                let has_slot = match slot {
                    ORIGINAL => source.record.has_original(),
                    _ => true,
                };
                if !has_slot {
                    continue;
                }
                let value = match from {
                    Some(o) => self.coerce_value(ordinal, source.record.cell(o, slot).clone())?,
                    None => column.default_value.clone(),
                };
                record.cells[ordinal][slot] = Some(value);
            }
        }
        Ok(record)
    }

    // ===== Edit protocol =====

    /// Starts an edit: later writes go to the Proposed version until
    /// [`TableMut::end_edit`]. Does nothing when an edit is already open.
    ///
    /// # Errors
    ///
    /// Fails for detached and deleted rows.
    pub fn begin_edit(&mut self, id: RowId) -> Result<()> {
        let record = self
            .table_mut()
            .rows
            .get_mut(&id)
            .ok_or(DataError::RowNotFound(id))?;
        if record.state == RowState::Deleted {
            return Err(DataError::RowState {
                row: id,
                state: record.state,
                operation: "edit",
            });
        }
        if !record.editing {
            record.copy_slot(CURRENT, PROPOSED);
            record.editing = true;
        }
        Ok(())
    }

    /// Commits the proposed values. On failure the row stays in edit mode
    /// with its proposed values.
    ///
    /// # Errors
    ///
    /// Fails on constraint violations and vetoes.
    pub fn end_edit(&mut self, id: RowId) -> Result<()> {
        self.record(id)?;
        self.run(|txn, t| txn.end_edit(t, id))
    }

    /// Discards the proposed values.
    ///
    /// # Errors
    ///
    /// Fails for detached rows.
    pub fn cancel_edit(&mut self, id: RowId) -> Result<()> {
        let record = self
            .table_mut()
            .rows
            .get_mut(&id)
            .ok_or(DataError::RowNotFound(id))?;
        record.editing = false;
        record.clear_slot(PROPOSED);
        Ok(())
    }

    /// Sets a column value.
    ///
    /// Inside an edit the value goes to the Proposed version. Otherwise the
    /// write is a complete edit on its own: it commits immediately, or
    /// leaves the row untouched when it fails.
    ///
    /// # Errors
    ///
    /// Fails with `ReadOnly` for computed and read-only columns,
    /// `TypeMismatch` for unconvertible values, a row-state error for deleted
    /// rows, and constraint violations or vetoes for the implied commit.
    pub fn set_value(&mut self, id: RowId, column: impl ColumnKey, value: impl Into<Value>) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        let column = &self.columns[ordinal];
        if column.is_read_only() {
            return Err(DataError::ReadOnly(column.name.clone()));
        }
        let record = self.record(id)?;
        if record.state == RowState::Deleted {
            return Err(DataError::RowState {
                row: id,
                state: record.state,
                operation: "set a value on",
            });
        }
        let was_editing = record.editing;
        let value = self.coerce_value(ordinal, value.into())?;
        self.run(|txn, t| {
            txn.set_proposed(t, id, ordinal, value)?;
            if was_editing {
                Ok(())
            } else {
                txn.end_edit(t, id)
            }
        })
    }

    // ===== Deletes =====

    /// Marks a row Deleted; it stays until changes are accepted. Foreign-key
    /// delete rules run on child rows while constraints are enforced.
    ///
    /// # Errors
    ///
    /// Fails for detached or already deleted rows, when a `Rule::None`
    /// foreign key has child rows, and on vetoes.
    pub fn delete_row(&mut self, id: RowId) -> Result<()> {
        self.run(|txn, t| txn.delete_row(t, id))
    }

    /// Deletes a row and accepts the deletion, removing it at once.
    ///
    /// # Errors
    ///
    /// Same as [`TableMut::delete_row`].
    pub fn remove_row(&mut self, id: RowId) -> Result<()> {
        self.run(|txn, t| {
            txn.delete_row(t, id)?;
            txn.accept_row(t, id).map(|_| ())
        })
    }

    // ===== Accept / reject =====

    /// Accepts one row: Original takes Current, deleted rows are purged.
    ///
    /// # Errors
    ///
    /// Fails when an open edit cannot be committed or a listener vetoes.
    pub fn accept_row(&mut self, id: RowId) -> Result<()> {
        self.record(id)?;
        self.run(|txn, t| txn.accept_row(t, id).map(|_| ()))
    }

    /// Rejects one row: Current returns to Original, added rows leave the
    /// table.
    ///
    /// # Errors
    ///
    /// Fails when the restored values collide with a unique key or a
    /// listener vetoes.
    pub fn reject_row(&mut self, id: RowId) -> Result<()> {
        self.record(id)?;
        self.run(|txn, t| txn.reject_row(t, id).map(|_| ()))
    }

    /// Accepts every row of the table.
    ///
    /// # Errors
    ///
    /// As [`TableMut::accept_row`]; nothing is accepted on failure.
    pub fn accept_changes(&mut self) -> Result<()> {
        let ids: Vec<RowId> = self.rows.keys().copied().collect();
        let accepted = self.run(|txn, t| {
            ids.iter()
                .map(|id| txn.accept_row(t, *id))
                .try_fold(0usize, |n, r| r.map(|done| n + usize::from(done)))
        })?;
        debug!(table = %self.name, rows = accepted, "changes accepted");
        Ok(())
    }

    /// Rejects every row of the table.
    ///
    /// # Errors
    ///
    /// As [`TableMut::reject_row`]; nothing is rejected on failure.
    pub fn reject_changes(&mut self) -> Result<()> {
        let ids: Vec<RowId> = self.rows.keys().copied().collect();
        let rejected = self.run(|txn, t| {
            ids.iter()
                .map(|id| txn.reject_row(t, *id))
                .try_fold(0usize, |n, r| r.map(|done| n + usize::from(done)))
        })?;
        debug!(table = %self.name, rows = rejected, "changes rejected");
        Ok(())
    }

    /// Marks an unchanged row as Added; its Original version is dropped.
    ///
    /// # Errors
    ///
    /// Fails unless the row is Unchanged.
    pub fn set_added(&mut self, id: RowId) -> Result<()> {
        self.run(|txn, t| txn.set_state(t, id, RowState::Added))
    }

    /// Marks an unchanged row as Modified.
    ///
    /// # Errors
    ///
    /// Fails unless the row is Unchanged.
    pub fn set_modified(&mut self, id: RowId) -> Result<()> {
        self.run(|txn, t| txn.set_state(t, id, RowState::Modified))
    }

    // ===== Errors =====

    /// Sets the row error; an empty message clears it.
    ///
    /// # Errors
    ///
    /// Fails for detached rows.
    pub fn set_row_error(&mut self, id: RowId, message: impl Into<String>) -> Result<()> {
        self.record_mut(id)?.error = message.into();
        Ok(())
    }

    /// Sets the error of one column; an empty message clears it.
    ///
    /// # Errors
    ///
    /// Fails for detached rows and unknown columns.
    pub fn set_column_error(&mut self, id: RowId, column: impl ColumnKey, message: impl Into<String>) -> Result<()> {
        let column = self.columns[column.ordinal(self)?].id;
        let message = message.into();
        let record = self.record_mut(id)?;
        if message.is_empty() {
            record.column_errors.remove(&column);
        } else {
            record.column_errors.insert(column, message);
        }
        Ok(())
    }

    /// Clears the row error and every column error of a row.
    ///
    /// # Errors
    ///
    /// Fails for detached rows.
    pub fn clear_errors(&mut self, id: RowId) -> Result<()> {
        let record = self.record_mut(id)?;
        record.error.clear();
        record.column_errors.clear();
        Ok(())
    }

    fn record_mut(&mut self, id: RowId) -> Result<&mut RowRecord> {
        self.table_mut()
            .rows
            .get_mut(&id)
            .ok_or(DataError::RowNotFound(id))
    }

    /// Reads a cell of the default version; shorthand for reads through the
    /// handle.
    ///
    /// # Errors
    ///
    /// As [`DataRow::get`].
    pub fn value(&self, id: RowId, column: impl ColumnKey) -> Result<Value> {
        self.get(id, column, RowVersion::Default)
    }
}

/// A detached row being filled in before [`TableMut::add_row`].
///
/// ```rust
/// use oxide_data::{ColumnDef, DataType, Table};
///
/// let mut people = Table::new("People");
/// people.add_column(ColumnDef::new("Id", DataType::Integer).auto_increment(1, 1)).unwrap();
/// people.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
///
/// let mut row = people.new_row();
/// row.set("Name", "Ada").unwrap();
/// let id = people.add_row(row).unwrap();
/// assert_eq!(people.row(id).unwrap().get("Id").unwrap(), 1.into());
/// ```
#[derive(Debug, Clone)]
pub struct NewRow {
    table: String,
    columns: Vec<(ColumnId, String, DataType, bool)>,
    values: Vec<Value>,
}

impl NewRow {
    fn new(table: &Table, values: Vec<Value>) -> Self {
        Self {
            table: table.name.clone(),
            columns: table
                .columns
                .iter()
                .map(|c| (c.id, c.name.clone(), c.data_type, c.is_computed()))
                .collect(),
            values,
        }
    }

    fn ordinal(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.1 == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.1.to_lowercase() == name.to_lowercase())
            })
            .ok_or_else(|| DataError::ColumnNotFound {
                table: self.table.clone(),
                column: name.to_string(),
            })
    }

    /// Sets a value by column name.
    ///
    /// # Errors
    ///
    /// Fails for unknown and computed columns and unconvertible values.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let ordinal = self.ordinal(column)?;
        self.set_at(ordinal, value)
    }

    /// Sets a value by ordinal.
    ///
    /// # Errors
    ///
    /// Fails for unknown and computed columns and unconvertible values.
    pub fn set_at(&mut self, ordinal: usize, value: impl Into<Value>) -> Result<&mut Self> {
        let (_, name, data_type, computed) =
            self.columns
                .get(ordinal)
                .ok_or_else(|| DataError::ColumnNotFound {
                    table: self.table.clone(),
                    column: format!("#{ordinal}"),
                })?;
        if *computed {
            return Err(DataError::ReadOnly(name.clone()));
        }
        let value = value.into();
        let converted = value.coerce(*data_type).ok_or_else(|| DataError::TypeMismatch {
            column: name.clone(),
            expected: *data_type,
            found: value.describe(),
        })?;
        self.values[ordinal] = converted;
        Ok(self)
    }

    /// Returns a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.ordinal(column).ok().map(|o| &self.values[o])
    }

    /// Returns the values in ordinal order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}
