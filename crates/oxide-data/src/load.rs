//! Bulk loading from sequential tabular sources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::ColumnDef;
use crate::constraint::normalize_key;
use crate::error::{DataError, Result};
use crate::row::{RowId, RowRecord, RowState, CURRENT, ORIGINAL, PROPOSED};
use crate::table::TableMut;
use crate::value::{DataType, Value};

/// A forward-only cursor over rows of values, such as a query result.
pub trait TabularReader {
    /// Number of fields per row.
    fn field_count(&self) -> usize;

    /// Name of a field.
    fn name(&self, ordinal: usize) -> &str;

    /// Declared type of a field, if the source knows it.
    fn data_type(&self, _ordinal: usize) -> Option<DataType> {
        None
    }

    /// Advances to the next row. Returns false when there are no more rows.
    ///
    /// # Errors
    ///
    /// Fails when the source cannot produce the next row.
    fn read(&mut self) -> Result<bool>;

    /// Value of a field in the current row. NULL means "not supplied".
    ///
    /// # Errors
    ///
    /// Fails when there is no current row or no such field.
    fn value(&self, ordinal: usize) -> Result<Value>;
}

/// A [`TabularReader`] over rows held in memory.
///
/// ```
/// use oxide_data::{DataType, MemoryReader, TabularReader, Value};
///
/// let mut reader = MemoryReader::new()
///     .column("Id", Some(DataType::Integer))
///     .column("Name", None)
///     .row([Value::from(1), "ann".into()]);
/// assert!(reader.read().unwrap());
/// assert_eq!(reader.value(1).unwrap(), "ann".into());
/// assert!(!reader.read().unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    fields: Vec<(String, Option<DataType>)>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
}

impl MemoryReader {
    /// Creates a reader with no fields and no rows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, data_type: Option<DataType>) -> Self {
        self.fields.push((name.into(), data_type));
        self
    }

    /// Adds a row. Missing trailing values read as NULL.
    #[must_use]
    pub fn row<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }
}

impl TabularReader for MemoryReader {
    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn name(&self, ordinal: usize) -> &str {
        self.fields.get(ordinal).map_or("", |f| f.0.as_str())
    }

    fn data_type(&self, ordinal: usize) -> Option<DataType> {
        self.fields.get(ordinal).and_then(|f| f.1)
    }

    fn read(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        if ordinal >= self.fields.len() {
            return Err(DataError::ColumnNotFound {
                table: "reader".to_string(),
                column: format!("#{ordinal}"),
            });
        }
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| DataError::expression("the reader is not positioned on a row"))?;
        Ok(row.get(ordinal).cloned().unwrap_or_default())
    }
}

/// How loaded rows merge with existing rows holding the same primary key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadOption {
    /// Incoming values replace both original and current values; the row
    /// becomes Unchanged.
    OverwriteChanges,
    /// Incoming values replace the original values; pending changes to the
    /// current values are kept.
    #[default]
    PreserveChanges,
    /// Incoming values replace the current values as pending changes; new
    /// rows are Added.
    Upsert,
}

const READ_ONLY_CHANGED: &str = "a read-only column was modified by a load";

/// Primary-key lookup used while loading, when the unique indexes are off.
struct LoadIndex {
    columns: Vec<usize>,
    case_sensitive: bool,
    rows: BTreeMap<Vec<Value>, RowId>,
}

impl LoadIndex {
    fn build(table: &TableMut<'_>, option: LoadOption) -> Option<Self> {
        let columns = table.ordinals(table.primary_key_ids());
        if columns.is_empty() {
            return None;
        }
        let mut index = Self {
            columns,
            case_sensitive: table.case_sensitive(),
            rows: BTreeMap::new(),
        };
        for (id, record) in &table.rows {
            // Upsert matches current values; the other options match what
            // the source last delivered.
            let slot = match option {
                LoadOption::Upsert if record.state == RowState::Deleted => continue,
                LoadOption::Upsert => CURRENT,
                _ if record.has_original() => ORIGINAL,
                _ => CURRENT,
            };
            let key = index.key(&record.slot_values(slot));
            index.rows.insert(key, *id);
        }
        Some(index)
    }

    fn key(&self, values: &[Value]) -> Vec<Value> {
        self.columns
            .iter()
            .map(|o| normalize_key(values.get(*o).unwrap_or(&Value::Null), self.case_sensitive))
            .collect()
    }
}

impl TableMut<'_> {
    /// Loads every row of `reader`, merging rows that match an existing
    /// primary key according to `option`. Reader fields are matched to columns
    /// by name; unknown fields become new columns of the reader's type, or
    /// text when the type is unknown. Constraints are checked once, after the
    /// last row.
    ///
    /// Returns the number of rows read.
    ///
    /// # Errors
    ///
    /// Fails when the reader fails, a value does not convert, a listener
    /// vetoes, or the loaded data violates constraints (`Multiple`, with the
    /// table left in load mode as [`TableMut::end_load_data`] does).
    pub fn load(&mut self, reader: &mut dyn TabularReader, option: LoadOption) -> Result<usize> {
        let mut mapping = Vec::with_capacity(reader.field_count());
        for field in 0..reader.field_count() {
            let name = reader.name(field).to_string();
            let ordinal = match self.column_ordinal(&name) {
                Some(ordinal) => ordinal,
                None => {
                    let data_type = reader.data_type(field).unwrap_or(DataType::Text);
                    self.add_column(ColumnDef::new(name, data_type))?;
                    self.columns.len() - 1
                }
            };
            mapping.push(ordinal);
        }

        let was_loading = self.is_loading();
        self.begin_load_data();
        let loaded = self.load_rows(reader, &mapping, option);
        if was_loading {
            return loaded;
        }
        let ended = self.end_load_data();
        let count = loaded?;
        ended?;
        debug!(table = %self.name, rows = count, ?option, "rows loaded");
        Ok(count)
    }

    fn load_rows(&mut self, reader: &mut dyn TabularReader, mapping: &[usize], option: LoadOption) -> Result<usize> {
        let mut index = LoadIndex::build(self, option);
        let mut count = 0;
        while reader.read()? {
            let mut supplied = Vec::with_capacity(mapping.len());
            for (field, ordinal) in mapping.iter().enumerate() {
                let value = reader.value(field)?;
                if value.is_null() || self.columns[*ordinal].is_computed() {
                    continue;
                }
                supplied.push((*ordinal, self.coerce_value(*ordinal, value)?));
            }
            self.load_row(&supplied, option, index.as_mut())?;
            count += 1;
        }
        Ok(count)
    }

    /// Finds the row with the same primary key and merges `values` (in
    /// ordinal order) into it, or adds a new row. NULL values leave the
    /// existing value, or the column default, in place. With `accept` the
    /// row's changes are accepted afterwards.
    ///
    /// # Errors
    ///
    /// Fails on unconvertible values, constraint violations while enforced,
    /// and listener vetoes.
    pub fn load_data_row<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>, accept: bool) -> Result<RowId> {
        let mut supplied = Vec::new();
        for (ordinal, value) in values.into_iter().map(Into::into).enumerate() {
            if ordinal >= self.columns.len() {
                return Err(DataError::invalid_schema(
                    &self.name,
                    format!("value {ordinal} has no column"),
                ));
            }
            if value.is_null() || self.columns[ordinal].is_computed() {
                continue;
            }
            supplied.push((ordinal, self.coerce_value(ordinal, value)?));
        }
        let existing = self.match_key(&supplied);
        let id = match existing {
            Some(id) if self.rows.get(&id).is_some_and(|r| r.state != RowState::Deleted) => {
                let mut values = self.record(id)?.slot_values(CURRENT);
                for (ordinal, value) in supplied {
                    values[ordinal] = value;
                }
                self.run(|txn, t| {
                    txn.end_edit(t, id)?;
                    txn.commit_values(t, id, values, false)
                })?;
                id
            }
            _ => {
                let values = self.fresh_values(&supplied);
                self.run(|txn, t| txn.insert_record(t, RowRecord::added(values)))?
            }
        };
        if accept {
            self.accept_row(id)?;
        }
        Ok(id)
    }

    fn match_key(&self, supplied: &[(usize, Value)]) -> Option<RowId> {
        let columns = self.primary_key_ids().to_vec();
        if columns.is_empty() {
            return None;
        }
        let key: Option<Vec<Value>> = self
            .ordinals(&columns)
            .into_iter()
            .map(|o| supplied.iter().find(|(s, _)| *s == o).map(|(_, v)| v.clone()))
            .collect();
        key.and_then(|key| self.find_by_key(&columns, &key))
    }

    fn load_row(&mut self, supplied: &[(usize, Value)], option: LoadOption, index: Option<&mut LoadIndex>) -> Result<()> {
        let Some(index) = index else {
            self.add_loaded(supplied, option)?;
            return Ok(());
        };
        let complete = index.columns.iter().all(|o| supplied.iter().any(|(s, _)| s == o));
        let key = complete.then(|| {
            let mut values = vec![Value::Null; self.columns.len()];
            for (ordinal, value) in supplied {
                values[*ordinal] = value.clone();
            }
            index.key(&values)
        });
        let existing = key.as_ref().and_then(|k| index.rows.get(k).copied());
        match existing {
            Some(id) => {
                let record = self.merged_record(id, supplied, option)?;
                self.run(|txn, t| txn.replace_record(t, id, record))
            }
            None => {
                let id = self.add_loaded(supplied, option)?;
                if let Some(key) = key {
                    index.rows.insert(key, id);
                }
                Ok(())
            }
        }
    }

    fn add_loaded(&mut self, supplied: &[(usize, Value)], option: LoadOption) -> Result<RowId> {
        let values = self.fresh_values(supplied);
        let record = match option {
            LoadOption::Upsert => RowRecord::added(values),
            LoadOption::OverwriteChanges | LoadOption::PreserveChanges => RowRecord::unchanged(values),
        };
        self.run(|txn, t| txn.insert_record(t, record))
    }

    /// Full values for a new row: supplied values over defaults, with fresh
    /// auto-increment values where none was supplied.
    fn fresh_values(&mut self, supplied: &[(usize, Value)]) -> Vec<Value> {
        let table = self.table_mut();
        let mut values: Vec<Value> = table
            .columns
            .iter()
            .map(|c| if c.is_computed() { Value::Null } else { c.default_value.clone() })
            .collect();
        for (ordinal, value) in supplied {
            values[*ordinal] = value.clone();
        }
        for (ordinal, column) in table.columns.iter_mut().enumerate() {
            if let Some(auto) = column.auto_increment.as_mut() {
                if !supplied.iter().any(|(s, _)| *s == ordinal) {
                    values[ordinal] = Value::Int(auto.take());
                }
            }
        }
        values
    }

    fn merged_record(&self, id: RowId, supplied: &[(usize, Value)], option: LoadOption) -> Result<RowRecord> {
        let mut record = self.record(id)?.clone();
        record.editing = false;
        record.clear_slot(PROPOSED);
        let base = if record.has_original() { ORIGINAL } else { CURRENT };
        let mut incoming = record.slot_values(base);
        for (ordinal, value) in supplied {
            incoming[*ordinal] = value.clone();
        }
        let case_sensitive = self.case_sensitive();
        let differs = |slot: usize, record: &RowRecord, ordinal: usize| {
            !record.cell(ordinal, slot).cmp_with(&incoming[ordinal], case_sensitive).is_eq()
        };
        let read_only_changed = self.columns.iter().enumerate().any(|(o, c)| {
            c.read_only
                && !c.is_computed()
                && match option {
                    LoadOption::OverwriteChanges => differs(CURRENT, &record, o) || differs(ORIGINAL, &record, o),
                    LoadOption::Upsert => differs(CURRENT, &record, o),
                    LoadOption::PreserveChanges => record.has_original() && differs(ORIGINAL, &record, o),
                }
        });

        match option {
            LoadOption::OverwriteChanges => {
                record.set_slot(ORIGINAL, incoming.clone());
                record.set_slot(CURRENT, incoming);
                record.state = RowState::Unchanged;
                record.prior_state = None;
            }
            LoadOption::PreserveChanges => {
                record.set_slot(ORIGINAL, incoming.clone());
                match record.state {
                    RowState::Unchanged => record.set_slot(CURRENT, incoming),
                    RowState::Added => record.state = RowState::Modified,
                    RowState::Deleted => record.prior_state = Some(RowState::Modified),
                    RowState::Modified | RowState::Detached => {}
                }
            }
            LoadOption::Upsert => {
                let mut current = record.slot_values(CURRENT);
                for (ordinal, value) in supplied {
                    current[*ordinal] = value.clone();
                }
                let changed = current
                    .iter()
                    .enumerate()
                    .any(|(o, v)| !record.cell(o, CURRENT).cmp_with(v, case_sensitive).is_eq());
                if record.state == RowState::Unchanged && !changed {
                    record.set_slot(ORIGINAL, current.clone());
                } else if record.state == RowState::Unchanged {
                    record.state = RowState::Modified;
                }
                record.set_slot(CURRENT, current);
            }
        }
        if read_only_changed {
            record.error = if record.error.is_empty() {
                READ_ONLY_CHANGED.to_string()
            } else {
                format!("{} ]:[ {READ_ONLY_CHANGED}", record.error)
            };
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RowVersion;
    use crate::table::Table;

    fn customers() -> Table {
        let mut table = Table::new("Customers");
        table.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
        table.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
        table.set_primary_key(["Id"]).unwrap();
        table.insert([Value::from(1), "ann".into()]).unwrap();
        table.accept_changes().unwrap();
        table
    }

    fn incoming() -> MemoryReader {
        MemoryReader::new()
            .column("Id", Some(DataType::Integer))
            .column("Name", None)
            .row([Value::from(1), "anna".into()])
            .row([Value::from(2), "bob".into()])
    }

    #[test]
    fn test_reader_positions() {
        let mut reader = MemoryReader::new().column("A", None).row([1]);
        assert!(reader.value(0).is_err());
        assert!(reader.read().unwrap());
        assert_eq!(reader.value(0).unwrap(), Value::Int(1));
        assert!(!reader.read().unwrap());
        assert!(!reader.read().unwrap());
        assert!(reader.value(5).is_err());
    }

    #[test]
    fn test_preserve_keeps_pending_values() {
        let mut table = customers();
        let one = table.find([1]).unwrap().unwrap();
        table.set_value(one, "Name", "annie").unwrap();

        let count = table.edit().load(&mut incoming(), LoadOption::PreserveChanges).unwrap();
        assert_eq!(count, 2);
        assert_eq!(table.get(one, "Name", RowVersion::Original).unwrap(), "anna".into());
        assert_eq!(table.get(one, "Name", RowVersion::Current).unwrap(), "annie".into());
        assert_eq!(table.row_state(one), RowState::Modified);

        let two = table.find([2]).unwrap().unwrap();
        assert_eq!(table.row_state(two), RowState::Unchanged);
    }

    #[test]
    fn test_overwrite_discards_pending_values() {
        let mut table = customers();
        let one = table.find([1]).unwrap().unwrap();
        table.set_value(one, "Name", "annie").unwrap();
        table.edit().load(&mut incoming(), LoadOption::OverwriteChanges).unwrap();
        assert_eq!(table.get(one, "Name", RowVersion::Current).unwrap(), "anna".into());
        assert_eq!(table.row_state(one), RowState::Unchanged);
    }

    #[test]
    fn test_upsert_marks_changes() {
        let mut table = customers();
        table.edit().load(&mut incoming(), LoadOption::Upsert).unwrap();
        let one = table.find([1]).unwrap().unwrap();
        let two = table.find([2]).unwrap().unwrap();
        assert_eq!(table.row_state(one), RowState::Modified);
        assert_eq!(table.get(one, "Name", RowVersion::Original).unwrap(), "ann".into());
        assert_eq!(table.row_state(two), RowState::Added);
    }

    #[test]
    fn test_upsert_beside_deleted_row_adds() {
        let mut table = customers();
        let one = table.find([1]).unwrap().unwrap();
        table.delete_row(one).unwrap();
        table.edit().load(&mut incoming(), LoadOption::Upsert).unwrap();
        assert_eq!(table.row_state(one), RowState::Deleted);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_unknown_fields_become_columns() {
        let mut table = customers();
        let mut reader = MemoryReader::new()
            .column("Id", None)
            .column("Score", Some(DataType::Float))
            .column("Note", None)
            .row([Value::from(7), 1.5.into(), "x".into()]);
        table.edit().load(&mut reader, LoadOption::default()).unwrap();
        assert_eq!(table.column("Score").unwrap().data_type(), DataType::Float);
        assert_eq!(table.column("Note").unwrap().data_type(), DataType::Text);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_load_reports_every_violation() {
        let mut table = Table::new("Codes");
        table.add_column(ColumnDef::new("Code", DataType::Text).unique()).unwrap();
        let mut reader = MemoryReader::new()
            .column("Code", None)
            .row(["a"])
            .row(["a"])
            .row(["b"])
            .row(["b"]);
        let err = table.edit().load(&mut reader, LoadOption::default()).unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(table.is_loading());
        assert!(table.get_errors().len() >= 2);
    }

    #[test]
    fn test_read_only_change_sets_row_error() {
        let mut table = customers();
        table.edit().set_read_only("Name", true).unwrap();
        table.edit().load(&mut incoming(), LoadOption::OverwriteChanges).unwrap();
        let one = table.find([1]).unwrap().unwrap();
        assert_eq!(table.row(one).unwrap().row_error(), Some(READ_ONLY_CHANGED));
    }

    #[test]
    fn test_load_data_row_updates_and_adds() {
        let mut table = customers();
        let one = table.edit().load_data_row([Value::from(1), Value::Null], false).unwrap();
        assert_eq!(table.get(one, "Name", RowVersion::Current).unwrap(), "ann".into());
        table.edit().load_data_row([Value::from(1), "zed".into()], true).unwrap();
        assert_eq!(table.row_state(one), RowState::Unchanged);
        assert_eq!(table.get(one, "Name", RowVersion::Original).unwrap(), "zed".into());

        let three = table.edit().load_data_row([Value::from(3), "cy".into()], false).unwrap();
        assert_eq!(table.row_state(three), RowState::Added);
    }
}
