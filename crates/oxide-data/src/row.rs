//! Rows, row versions and row states.

use core::fmt;
use core::ops::BitOr;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::error::{DataError, Result};
use crate::table::Table;
use crate::value::Value;

/// Identifier of a row within its table.
///
/// Ids are handed out in insertion order and never reused, so iterating rows
/// by id follows insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowState {
    /// Created but not in a table, or rejected/purged from it.
    Detached,
    /// Accepted and not changed since.
    Unchanged,
    /// Added since the last accept.
    Added,
    /// Changed since the last accept.
    Modified,
    /// Deleted since the last accept; purged by the next accept.
    Deleted,
}

impl RowState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Detached => "Detached",
            Self::Unchanged => "Unchanged",
            Self::Added => "Added",
            Self::Modified => "Modified",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for RowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which copy of a row's values to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowVersion {
    /// Values as of the last accept.
    Original,
    /// Latest committed values.
    Current,
    /// Values of an edit in progress.
    Proposed,
    /// Proposed while editing, otherwise Current.
    Default,
}

impl fmt::Display for RowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Original => "Original",
            Self::Current => "Current",
            Self::Proposed => "Proposed",
            Self::Default => "Default",
        })
    }
}

/// A set of row states used to filter rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowStateMask(u8);

impl RowStateMask {
    /// Matches nothing.
    pub const NONE: Self = Self(0);
    /// Unchanged rows.
    pub const UNCHANGED: Self = Self(1);
    /// Added rows.
    pub const ADDED: Self = Self(1 << 1);
    /// Modified rows.
    pub const MODIFIED: Self = Self(1 << 2);
    /// Deleted rows.
    pub const DELETED: Self = Self(1 << 3);
    /// Every row that is not deleted.
    pub const CURRENT_ROWS: Self = Self(0b0111);
    /// Added, modified and deleted rows.
    pub const CHANGES: Self = Self(0b1110);
    /// Every row.
    pub const ALL: Self = Self(0b1111);

    /// Returns true if rows in `state` match.
    #[must_use]
    pub const fn contains(self, state: RowState) -> bool {
        let bit = match state {
            RowState::Detached => return false,
            RowState::Unchanged => Self::UNCHANGED.0,
            RowState::Added => Self::ADDED.0,
            RowState::Modified => Self::MODIFIED.0,
            RowState::Deleted => Self::DELETED.0,
        };
        self.0 & bit != 0
    }

    /// Returns true if no state matches.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for RowStateMask {
    fn default() -> Self {
        Self::CURRENT_ROWS
    }
}

impl BitOr for RowStateMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<RowState> for RowStateMask {
    fn from(state: RowState) -> Self {
        match state {
            RowState::Detached => Self::NONE,
            RowState::Unchanged => Self::UNCHANGED,
            RowState::Added => Self::ADDED,
            RowState::Modified => Self::MODIFIED,
            RowState::Deleted => Self::DELETED,
        }
    }
}

pub(crate) const ORIGINAL: usize = 0;
pub(crate) const CURRENT: usize = 1;
pub(crate) const PROPOSED: usize = 2;

static NULL: Value = Value::Null;

/// Storage of one row: three optional value slots per column.
#[derive(Debug, Clone)]
pub(crate) struct RowRecord {
    pub(crate) cells: Vec<[Option<Value>; 3]>,
    pub(crate) state: RowState,
    /// State before deletion; decides what a reject restores.
    pub(crate) prior_state: Option<RowState>,
    pub(crate) editing: bool,
    pub(crate) error: String,
    pub(crate) column_errors: BTreeMap<ColumnId, String>,
}

impl RowRecord {
    /// A freshly added row: Current values only.
    pub(crate) fn added(values: Vec<Value>) -> Self {
        Self {
            cells: values.into_iter().map(|v| [None, Some(v), None]).collect(),
            state: RowState::Added,
            prior_state: None,
            editing: false,
            error: String::new(),
            column_errors: BTreeMap::new(),
        }
    }

    /// An accepted row: Original and Current hold the same values.
    pub(crate) fn unchanged(values: Vec<Value>) -> Self {
        Self {
            cells: values
                .into_iter()
                .map(|v| [Some(v.clone()), Some(v), None])
                .collect(),
            state: RowState::Unchanged,
            ..Self::added(Vec::new())
        }
    }

    pub(crate) fn has_original(&self) -> bool {
        match self.state {
            RowState::Unchanged | RowState::Modified => true,
            RowState::Deleted => self.prior_state != Some(RowState::Added),
            RowState::Added | RowState::Detached => false,
        }
    }

    /// Slot that filters, sorts and indexes read: Original for deleted rows
    /// that have one, Current otherwise.
    pub(crate) fn view_slot(&self) -> usize {
        if self.state == RowState::Deleted && self.has_original() {
            ORIGINAL
        } else {
            CURRENT
        }
    }

    pub(crate) fn cell(&self, position: usize, slot: usize) -> &Value {
        self.cells
            .get(position)
            .and_then(|c| c[slot].as_ref())
            .unwrap_or(&NULL)
    }

    pub(crate) fn slot_values(&self, slot: usize) -> Vec<Value> {
        (0..self.cells.len())
            .map(|p| self.cell(p, slot).clone())
            .collect()
    }

    pub(crate) fn set_slot(&mut self, slot: usize, values: Vec<Value>) {
        for (cell, value) in self.cells.iter_mut().zip(values) {
            cell[slot] = Some(value);
        }
    }

    pub(crate) fn clear_slot(&mut self, slot: usize) {
        for cell in &mut self.cells {
            cell[slot] = None;
        }
    }

    /// Copies one slot over another.
    pub(crate) fn copy_slot(&mut self, from: usize, to: usize) {
        for cell in &mut self.cells {
            cell[to] = cell[from].clone();
        }
    }

    /// Resolves a requested version to a slot, failing when the version does
    /// not exist for this row.
    pub(crate) fn slot_for(&self, id: RowId, version: RowVersion) -> Result<usize> {
        match version {
            RowVersion::Original if self.has_original() => Ok(ORIGINAL),
            RowVersion::Original => Err(DataError::VersionNotFound { row: id, version }),
            RowVersion::Current | RowVersion::Default if self.state == RowState::Deleted => {
                Err(DataError::DeletedRowInaccessible(id))
            }
            RowVersion::Default if self.editing => Ok(PROPOSED),
            RowVersion::Current | RowVersion::Default => Ok(CURRENT),
            RowVersion::Proposed if self.editing => Ok(PROPOSED),
            RowVersion::Proposed => Err(DataError::VersionNotFound { row: id, version }),
        }
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.error.is_empty() || !self.column_errors.is_empty()
    }
}

/// Something that identifies a column of a table: its name, its ordinal or
/// its id.
pub trait ColumnKey {
    /// Returns the ordinal of the column in `table`.
    ///
    /// # Errors
    ///
    /// Returns `ColumnNotFound` if the table has no such column.
    fn ordinal(&self, table: &Table) -> Result<usize>;
}

impl ColumnKey for &str {
    fn ordinal(&self, table: &Table) -> Result<usize> {
        table
            .column_ordinal(self)
            .ok_or_else(|| table.column_not_found(self))
    }
}

impl ColumnKey for String {
    fn ordinal(&self, table: &Table) -> Result<usize> {
        self.as_str().ordinal(table)
    }
}

impl ColumnKey for &String {
    fn ordinal(&self, table: &Table) -> Result<usize> {
        self.as_str().ordinal(table)
    }
}

impl ColumnKey for usize {
    fn ordinal(&self, table: &Table) -> Result<usize> {
        if *self < table.columns().len() {
            Ok(*self)
        } else {
            Err(table.column_not_found(&format!("#{self}")))
        }
    }
}

impl ColumnKey for ColumnId {
    fn ordinal(&self, table: &Table) -> Result<usize> {
        table
            .ordinal_of(*self)
            .ok_or_else(|| table.column_not_found(&self.to_string()))
    }
}

/// Read access to a row of a table.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    pub(crate) table: &'a Table,
    pub(crate) id: RowId,
    pub(crate) record: &'a RowRecord,
}

impl<'a> DataRow<'a> {
    /// Returns the row id.
    #[must_use]
    pub const fn id(&self) -> RowId {
        self.id
    }

    /// Returns the owning table.
    #[must_use]
    pub const fn table(&self) -> &'a Table {
        self.table
    }

    /// Returns the row state.
    #[must_use]
    pub const fn state(&self) -> RowState {
        self.record.state
    }

    /// Returns true while an edit is in progress.
    #[must_use]
    pub const fn is_editing(&self) -> bool {
        self.record.editing
    }

    /// Returns true if `version` can be read.
    #[must_use]
    pub fn has_version(&self, version: RowVersion) -> bool {
        self.record.slot_for(self.id, version).is_ok()
    }

    /// Reads the default version of a column.
    ///
    /// # Errors
    ///
    /// Fails for unknown columns and for deleted rows.
    pub fn get(&self, column: impl ColumnKey) -> Result<Value> {
        self.get_version(column, RowVersion::Default)
    }

    /// Reads one version of a column. Computed columns are evaluated against
    /// the same version.
    ///
    /// # Errors
    ///
    /// Fails with `VersionNotFound` for missing versions and with
    /// `DeletedRowInaccessible` when reading Current of a deleted row.
    pub fn get_version(&self, column: impl ColumnKey, version: RowVersion) -> Result<Value> {
        let ordinal = column.ordinal(self.table)?;
        let slot = self.record.slot_for(self.id, version)?;
        self.table.cell_value(self.record, ordinal, slot)
    }

    /// Reads every column of one version, in ordinal order.
    ///
    /// # Errors
    ///
    /// Same as [`DataRow::get_version`].
    pub fn values(&self, version: RowVersion) -> Result<Vec<Value>> {
        let slot = self.record.slot_for(self.id, version)?;
        (0..self.table.columns().len())
            .map(|ordinal| self.table.cell_value(self.record, ordinal, slot))
            .collect()
    }

    /// Returns the row error, if set.
    #[must_use]
    pub fn row_error(&self) -> Option<&'a str> {
        let error = self.record.error.as_str();
        (!error.is_empty()).then_some(error)
    }

    /// Returns the error attached to a column, if set.
    #[must_use]
    pub fn column_error(&self, column: impl ColumnKey) -> Option<&'a str> {
        let ordinal = column.ordinal(self.table).ok()?;
        let id = self.table.columns()[ordinal].id();
        self.record.column_errors.get(&id).map(String::as_str)
    }

    /// Returns the columns that carry errors.
    #[must_use]
    pub fn columns_in_error(&self) -> Vec<ColumnId> {
        self.record.column_errors.keys().copied().collect()
    }

    /// Returns true if the row or any column carries an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.record.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_membership() {
        let mask = RowStateMask::ADDED | RowStateMask::DELETED;
        assert!(mask.contains(RowState::Added));
        assert!(mask.contains(RowState::Deleted));
        assert!(!mask.contains(RowState::Unchanged));
        assert!(!RowStateMask::ALL.contains(RowState::Detached));
        assert!(RowStateMask::NONE.is_empty());
        assert_eq!(RowStateMask::default(), RowStateMask::CURRENT_ROWS);
    }

    #[test]
    fn test_version_resolution() {
        let mut record = RowRecord::added(vec![Value::Int(1)]);
        let id = RowId(1);
        assert!(matches!(
            record.slot_for(id, RowVersion::Original),
            Err(DataError::VersionNotFound { .. })
        ));
        assert_eq!(record.slot_for(id, RowVersion::Default).unwrap(), CURRENT);

        record.editing = true;
        assert_eq!(record.slot_for(id, RowVersion::Default).unwrap(), PROPOSED);

        let mut record = RowRecord::unchanged(vec![Value::Int(1)]);
        record.prior_state = Some(RowState::Unchanged);
        record.state = RowState::Deleted;
        assert!(matches!(
            record.slot_for(id, RowVersion::Current),
            Err(DataError::DeletedRowInaccessible(_))
        ));
        assert_eq!(record.slot_for(id, RowVersion::Original).unwrap(), ORIGINAL);
        assert_eq!(record.view_slot(), ORIGINAL);
    }

    #[test]
    fn test_deleted_added_row_has_no_original() {
        let mut record = RowRecord::added(vec![Value::Int(1)]);
        record.prior_state = Some(RowState::Added);
        record.state = RowState::Deleted;
        assert!(!record.has_original());
        assert_eq!(record.view_slot(), CURRENT);
    }
}
