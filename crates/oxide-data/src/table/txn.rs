//! The edit engine.
//!
//! Every logical edit runs inside [`run`]: rows are journaled before their
//! first change, and the journal is replayed backwards when any step fails,
//! so a failed edit leaves no trace. `*Changed` notifications are queued and
//! delivered once the edit commits.

use std::collections::BTreeSet;

use tracing::trace;

use crate::column::ColumnId;
use crate::constraint::{AcceptRejectRule, Constraint, ForeignKeyConstraint, Rule, UniqueConstraint};
use crate::error::{DataError, Result};
use crate::row::{RowId, RowRecord, RowState, CURRENT, ORIGINAL, PROPOSED};
use crate::value::Value;

use super::events::{dispatch, EventKind, Notice, RowAction};
use super::Table;

/// An edit in progress over the tables of a set.
pub(crate) struct Txn<'t> {
    pub(crate) tables: &'t mut [Table],
    journal: Vec<(usize, RowId, Option<RowRecord>)>,
    seen: BTreeSet<(usize, RowId)>,
    reindex: BTreeSet<usize>,
    active: BTreeSet<(usize, RowId)>,
    queued: Vec<(usize, Notice)>,
}

/// Runs `edit` as one all-or-nothing unit.
pub(crate) fn run<R>(
    tables: &mut [Table],
    edit: impl FnOnce(&mut Txn<'_>) -> Result<R>,
) -> Result<R> {
    let mut txn = Txn {
        tables,
        journal: Vec::new(),
        seen: BTreeSet::new(),
        reindex: BTreeSet::new(),
        active: BTreeSet::new(),
        queued: Vec::new(),
    };
    match edit(&mut txn) {
        Ok(value) => {
            let Txn { tables, queued, .. } = txn;
            for (index, notice) in queued {
                if let Err(err) = dispatch(tables, index, notice, None) {
                    tracing::warn!(error = %err, "change notification failed");
                }
            }
            Ok(value)
        }
        Err(err) => {
            txn.rollback();
            Err(err)
        }
    }
}

impl Txn<'_> {
    fn rollback(&mut self) {
        let restored = self.journal.len();
        for (index, id, before) in self.journal.drain(..).rev() {
            let rows = &mut self.tables[index].rows;
            match before {
                Some(record) => {
                    rows.insert(id, record);
                }
                None => {
                    rows.remove(&id);
                }
            }
        }
        for index in core::mem::take(&mut self.reindex) {
            self.tables[index].rebuild_indexes();
        }
        trace!(rows = restored, "edit rolled back");
    }

    /// Saves the before-image of a row the first time it is touched.
    fn touch(&mut self, t: usize, id: RowId) {
        if self.seen.insert((t, id)) {
            let before = self.tables[t].rows.get(&id).cloned();
            self.journal.push((t, id, before));
        }
    }

    fn record_mut(&mut self, t: usize, id: RowId) -> Result<&mut RowRecord> {
        self.touch(t, id);
        self.tables[t]
            .rows
            .get_mut(&id)
            .ok_or(DataError::RowNotFound(id))
    }

    fn raise(&mut self, t: usize, kind: EventKind, action: RowAction, id: RowId) -> Result<()> {
        dispatch(self.tables, t, Notice::row(kind, action, id), None)
    }

    fn queue(&mut self, t: usize, kind: EventKind, action: RowAction, id: RowId) {
        self.queued.push((t, Notice::row(kind, action, id)));
    }

    fn index(&mut self, t: usize, id: RowId) {
        if self.tables[t].index_row(id) {
            self.reindex.insert(t);
        }
    }

    fn unindex(&mut self, t: usize, id: RowId) {
        if self.tables[t].unindex_row(id) {
            self.reindex.insert(t);
        }
    }

    // ===== Rows =====

    /// Adds a stored row to the table, validating it unless it is deleted.
    pub(crate) fn insert_record(&mut self, t: usize, record: RowRecord) -> Result<RowId> {
        let table = &mut self.tables[t];
        let id = RowId(table.next_row_id);
        table.next_row_id += 1;
        let values = record.slot_values(CURRENT);
        let deleted = record.state == RowState::Deleted;
        table.observe_auto_increment(&values);

        self.touch(t, id);
        self.tables[t].rows.insert(id, record);
        self.raise(t, EventKind::RowChanging, RowAction::Add, id)?;
        if !deleted {
            validate_row(self.tables, t, Some(id), &values)?;
            self.index(t, id);
        }
        self.queue(t, EventKind::RowChanged, RowAction::Add, id);
        trace!(table = %self.tables[t].name, row = %id, "row added");
        Ok(id)
    }

    /// Writes a proposed value, opening an edit when none is in progress.
    pub(crate) fn set_proposed(&mut self, t: usize, id: RowId, ordinal: usize, value: Value) -> Result<()> {
        let record = self.record_mut(t, id)?;
        if !record.editing {
            record.copy_slot(CURRENT, PROPOSED);
            record.editing = true;
        }
        let notice = Notice {
            kind: EventKind::ColumnChanging,
            action: None,
            row: Some(id),
            column: Some(ordinal),
        };
        dispatch(self.tables, t, notice, Some(&value))?;

        let record = self.record_mut(t, id)?;
        if let Some(cell) = record.cells.get_mut(ordinal) {
            cell[PROPOSED] = Some(value.clone());
        }
        let notice = Notice {
            kind: EventKind::ColumnChanged,
            ..notice
        };
        dispatch(self.tables, t, notice, Some(&value))
    }

    /// Commits the proposed values of a row in edit mode.
    pub(crate) fn end_edit(&mut self, t: usize, id: RowId) -> Result<()> {
        let record = self.tables[t].record(id)?;
        if !record.editing {
            return Ok(());
        }
        let values = record.slot_values(PROPOSED);
        self.commit_values(t, id, values, true)
    }

    /// Replaces the Current values of a row.
    ///
    /// With `finish_edit` the edit in progress ends; otherwise changed values
    /// are also written through to the proposed ones of an open edit.
    pub(crate) fn commit_values(
        &mut self,
        t: usize,
        id: RowId,
        values: Vec<Value>,
        finish_edit: bool,
    ) -> Result<()> {
        let record = self.tables[t].record(id)?;
        if record.state == RowState::Deleted {
            return Err(DataError::RowState {
                row: id,
                state: record.state,
                operation: "change",
            });
        }
        let old = record.slot_values(CURRENT);

        self.raise(t, EventKind::RowChanging, RowAction::Change, id)?;
        validate_row(self.tables, t, Some(id), &values)?;

        let changed = old != values;
        self.unindex(t, id);
        let record = self.record_mut(t, id)?;
        for (position, cell) in record.cells.iter_mut().enumerate() {
            let Some(value) = values.get(position) else {
                continue;
            };
            if !finish_edit && cell[PROPOSED].is_some() && old.get(position) != Some(value) {
                cell[PROPOSED] = Some(value.clone());
            }
            cell[CURRENT] = Some(value.clone());
        }
        if record.state == RowState::Unchanged {
            record.state = RowState::Modified;
        }
        if finish_edit {
            record.editing = false;
            record.clear_slot(PROPOSED);
        }
        self.index(t, id);

        if changed && self.tables[t].enforces_constraints() {
            self.apply_update_rules(t, id, &old, &values)?;
        }
        self.queue(t, EventKind::RowChanged, RowAction::Change, id);
        trace!(table = %self.tables[t].name, row = %id, changed, "row changed");
        Ok(())
    }

    /// Cancels an edit in progress.
    pub(crate) fn cancel_edit(&mut self, t: usize, id: RowId) -> Result<()> {
        let record = self.record_mut(t, id)?;
        if record.editing {
            record.editing = false;
            record.clear_slot(PROPOSED);
        }
        Ok(())
    }

    pub(crate) fn delete_row(&mut self, t: usize, id: RowId) -> Result<()> {
        let record = self.tables[t].record(id)?;
        if record.state == RowState::Deleted {
            return Err(DataError::RowState {
                row: id,
                state: record.state,
                operation: "delete",
            });
        }
        self.cancel_edit(t, id)?;
        self.raise(t, EventKind::RowDeleting, RowAction::Delete, id)?;

        self.active.insert((t, id));
        if self.tables[t].enforces_constraints() {
            self.apply_delete_rules(t, id)?;
        }
        self.active.remove(&(t, id));

        self.unindex(t, id);
        let record = self.record_mut(t, id)?;
        record.prior_state = Some(record.state);
        record.state = RowState::Deleted;
        self.queue(t, EventKind::RowDeleted, RowAction::Delete, id);
        trace!(table = %self.tables[t].name, row = %id, "row deleted");
        Ok(())
    }

    /// Accepts a row's changes. Rows already purged are skipped.
    pub(crate) fn accept_row(&mut self, t: usize, id: RowId) -> Result<bool> {
        if !self.tables[t].rows.contains_key(&id) {
            return Ok(false);
        }
        self.end_edit(t, id)?;
        let state = self.tables[t].record(id)?.state;
        if state == RowState::Unchanged {
            return Ok(false);
        }
        self.raise(t, EventKind::RowChanging, RowAction::Commit, id)?;
        self.cascade_accept_reject(t, id, true)?;

        if state == RowState::Deleted {
            self.touch(t, id);
            self.tables[t].rows.remove(&id);
        } else {
            let record = self.record_mut(t, id)?;
            record.copy_slot(CURRENT, ORIGINAL);
            record.state = RowState::Unchanged;
            record.prior_state = None;
        }
        self.queue(t, EventKind::RowChanged, RowAction::Commit, id);
        Ok(true)
    }

    /// Rejects a row's changes. Rows already removed are skipped.
    pub(crate) fn reject_row(&mut self, t: usize, id: RowId) -> Result<bool> {
        if !self.tables[t].rows.contains_key(&id) {
            return Ok(false);
        }
        self.cancel_edit(t, id)?;
        let record = self.tables[t].record(id)?;
        let state = record.state;
        if state == RowState::Unchanged {
            return Ok(false);
        }
        let was_added = state == RowState::Added
            || (state == RowState::Deleted && record.prior_state == Some(RowState::Added));

        self.raise(t, EventKind::RowChanging, RowAction::Rollback, id)?;
        self.cascade_accept_reject(t, id, false)?;

        self.unindex(t, id);
        if was_added {
            self.touch(t, id);
            self.tables[t].rows.remove(&id);
        } else {
            let record = self.record_mut(t, id)?;
            record.copy_slot(ORIGINAL, CURRENT);
            record.state = RowState::Unchanged;
            record.prior_state = None;
            let values = record.slot_values(CURRENT);
            self.tables[t].check_unique(Some(id), &values)?;
            self.index(t, id);
        }
        self.queue(t, EventKind::RowChanged, RowAction::Rollback, id);
        Ok(true)
    }

    /// Forces the state of an unchanged row to Added or Modified.
    pub(crate) fn set_state(&mut self, t: usize, id: RowId, state: RowState) -> Result<()> {
        let record = self.record_mut(t, id)?;
        if record.state != RowState::Unchanged {
            return Err(DataError::RowState {
                row: id,
                state: record.state,
                operation: if state == RowState::Added {
                    "mark as added"
                } else {
                    "mark as modified"
                },
            });
        }
        if state == RowState::Added {
            record.clear_slot(ORIGINAL);
        }
        record.state = state;
        self.queue(t, EventKind::RowChanged, RowAction::Change, id);
        Ok(())
    }

    /// Overwrites a stored row as bulk load does.
    pub(crate) fn replace_record(&mut self, t: usize, id: RowId, record: RowRecord) -> Result<()> {
        self.unindex(t, id);
        let values = record.slot_values(CURRENT);
        let deleted = record.state == RowState::Deleted;
        self.tables[t].observe_auto_increment(&values);
        *self.record_mut(t, id)? = record;
        if !deleted {
            validate_row(self.tables, t, Some(id), &values)?;
            self.index(t, id);
        }
        self.queue(t, EventKind::RowChanged, RowAction::Change, id);
        Ok(())
    }

    // ===== Relational rules =====

    /// Foreign keys in any table of the set that reference table `t`.
    fn referencing(&self, t: usize) -> Vec<(usize, ForeignKeyConstraint)> {
        let name = &self.tables[t].name;
        self.tables
            .iter()
            .enumerate()
            .flat_map(|(c, table)| {
                table
                    .constraints
                    .iter()
                    .filter_map(Constraint::as_foreign_key)
                    .filter(|fk| fk.parent_table == *name)
                    .map(move |fk| (c, fk.clone()))
            })
            .collect()
    }

    fn apply_update_rules(&mut self, t: usize, id: RowId, old: &[Value], new: &[Value]) -> Result<()> {
        for (c, fk) in self.referencing(t) {
            if !self.tables[c].enforces_constraints() {
                continue;
            }
            let parent = &self.tables[t];
            let old_key = parent.pick(&fk.parent_columns, old);
            let new_key = parent.pick(&fk.parent_columns, new);
            if old_key.iter().any(Value::is_null) || parent.keys_equal(&old_key, &new_key) {
                continue;
            }
            let children = self.children(c, &fk, &old_key, (t, id));
            if children.is_empty() {
                continue;
            }
            let replacement = match fk.update_rule {
                Rule::None => {
                    return Err(child_rows_exist(&self.tables[c], &fk, id, "change the key of"));
                }
                Rule::Cascade => new_key,
                Rule::SetNull => vec![Value::Null; fk.columns.len()],
                Rule::SetDefault => self.tables[c].defaults_of(&fk.columns),
            };
            self.rewrite_children(c, &fk, &children, &replacement)?;
        }
        Ok(())
    }

    fn apply_delete_rules(&mut self, t: usize, id: RowId) -> Result<()> {
        let values = self.tables[t].record(id)?.slot_values(CURRENT);
        for (c, fk) in self.referencing(t) {
            if !self.tables[c].enforces_constraints() {
                continue;
            }
            let key = self.tables[t].pick(&fk.parent_columns, &values);
            if key.iter().any(Value::is_null) {
                continue;
            }
            let children = self.children(c, &fk, &key, (t, id));
            if children.is_empty() {
                continue;
            }
            match fk.delete_rule {
                Rule::None => {
                    return Err(child_rows_exist(&self.tables[c], &fk, id, "delete"));
                }
                Rule::Cascade => {
                    for child in children {
                        if self.tables[c].row_state(child) != RowState::Deleted {
                            self.delete_row(c, child)?;
                        }
                    }
                }
                Rule::SetNull => {
                    let nulls = vec![Value::Null; fk.columns.len()];
                    self.rewrite_children(c, &fk, &children, &nulls)?;
                }
                Rule::SetDefault => {
                    let defaults = self.tables[c].defaults_of(&fk.columns);
                    self.rewrite_children(c, &fk, &children, &defaults)?;
                }
            }
        }
        Ok(())
    }

    fn cascade_accept_reject(&mut self, t: usize, id: RowId, accept: bool) -> Result<()> {
        let record = self.tables[t].record(id)?;
        let values = record.slot_values(record.view_slot());
        self.active.insert((t, id));
        for (c, fk) in self.referencing(t) {
            if fk.accept_reject_rule != AcceptRejectRule::Cascade {
                continue;
            }
            let key = self.tables[t].pick(&fk.parent_columns, &values);
            if key.iter().any(Value::is_null) {
                continue;
            }
            let children = self.tables[c].children_of(&fk, &key, true);
            for child in children {
                if (c, child) == (t, id) || self.active.contains(&(c, child)) {
                    continue;
                }
                if accept {
                    self.accept_row(c, child)?;
                } else {
                    self.reject_row(c, child)?;
                }
            }
        }
        self.active.remove(&(t, id));
        Ok(())
    }

    /// Non-deleted child rows of a parent key, minus the parent itself and
    /// rows whose own cascade is in progress.
    fn children(&self, c: usize, fk: &ForeignKeyConstraint, key: &[Value], parent: (usize, RowId)) -> Vec<RowId> {
        self.tables[c]
            .children_of(fk, key, false)
            .into_iter()
            .filter(|child| (c, *child) != parent && !self.active.contains(&(c, *child)))
            .collect()
    }

    fn rewrite_children(
        &mut self,
        c: usize,
        fk: &ForeignKeyConstraint,
        children: &[RowId],
        replacement: &[Value],
    ) -> Result<()> {
        let ordinals = self.tables[c].ordinals(&fk.columns);
        for child in children {
            let mut values = self.tables[c].record(*child)?.slot_values(CURRENT);
            for (ordinal, value) in ordinals.iter().zip(replacement) {
                let data_type = self.tables[c].columns[*ordinal].data_type;
                values[*ordinal] = value.coerce(data_type).unwrap_or(Value::Null);
            }
            self.commit_values(c, *child, values, false)?;
        }
        Ok(())
    }
}

fn child_rows_exist(child: &Table, fk: &ForeignKeyConstraint, parent: RowId, operation: &str) -> DataError {
    DataError::ConstraintViolation {
        constraint: fk.name.clone(),
        table: child.name.clone(),
        row: Some(parent),
        message: format!(
            "cannot {operation} parent row {parent} of '{}' because child rows exist in '{}'",
            fk.parent_table, child.name
        ),
    }
}

// ===== Validation =====

/// Checks a full row of values of table `t` against its column rules and
/// constraints, in registration order. Does nothing while the table does not
/// enforce constraints.
pub(crate) fn validate_row(tables: &[Table], t: usize, id: Option<RowId>, values: &[Value]) -> Result<()> {
    let table = &tables[t];
    if !table.enforces_constraints() {
        return Ok(());
    }
    table.check_columns(id, values)?;
    for constraint in &table.constraints {
        match constraint {
            Constraint::Unique(unique) => table.check_unique_constraint(unique, id, values)?,
            Constraint::ForeignKey(fk) => check_parent(tables, t, fk, id, values)?,
        }
    }
    Ok(())
}

/// Checks that the parent key referenced by `values` exists.
pub(crate) fn check_parent(
    tables: &[Table],
    t: usize,
    fk: &ForeignKeyConstraint,
    id: Option<RowId>,
    values: &[Value],
) -> Result<()> {
    let child = &tables[t];
    let child_key = child.pick(&fk.columns, values);
    if child_key.iter().any(Value::is_null) {
        return Ok(());
    }
    let p = table_index(tables, &fk.parent_table)
        .ok_or_else(|| DataError::TableNotFound(fk.parent_table.clone()))?;
    let parent = &tables[p];

    let key: Option<Vec<Value>> = fk
        .parent_columns
        .iter()
        .zip(&child_key)
        .map(|(column, value)| {
            parent
                .ordinal_of(*column)
                .and_then(|o| value.coerce(parent.columns[o].data_type))
        })
        .collect();
    if let Some(key) = key {
        if p == t && parent.keys_equal(&parent.pick(&fk.parent_columns, values), &key) {
            return Ok(());
        }
        let found = parent
            .find_by_key(&fk.parent_columns, &key)
            .filter(|found| p != t || Some(*found) != id);
        if found.is_some() {
            return Ok(());
        }
    }
    Err(DataError::ConstraintViolation {
        constraint: fk.name.clone(),
        table: child.name.clone(),
        row: id,
        message: format!(
            "value ({}) of column(s) '{}' has no matching row in '{}'",
            display_key(&child_key),
            child.column_names(&fk.columns),
            fk.parent_table
        ),
    })
}

pub(crate) fn table_index(tables: &[Table], name: &str) -> Option<usize> {
    tables.iter().position(|t| t.name == name)
}

pub(crate) fn display_key(key: &[Value]) -> String {
    key.iter()
        .map(|v| if v.is_null() { "NULL".to_string() } else { v.to_string() })
        .collect::<Vec<_>>()
        .join(", ")
}

impl Table {
    /// Checks nullability and maximum length of stored columns.
    pub(crate) fn check_columns(&self, id: Option<RowId>, values: &[Value]) -> Result<()> {
        for (column, value) in self.columns.iter().zip(values) {
            if column.is_computed() {
                continue;
            }
            if value.is_null() && !column.allow_null {
                return Err(DataError::NullViolation {
                    table: self.name.clone(),
                    column: column.name.clone(),
                    row: id,
                });
            }
            if let (Some(max), Value::Text(text)) = (column.max_length, value) {
                let length = text.chars().count();
                if length > max {
                    return Err(DataError::MaxLengthExceeded {
                        table: self.name.clone(),
                        column: column.name.clone(),
                        max,
                        length,
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks every unique constraint, ignoring the row itself.
    pub(crate) fn check_unique(&self, id: Option<RowId>, values: &[Value]) -> Result<()> {
        if !self.enforces_constraints() {
            return Ok(());
        }
        self.constraints
            .iter()
            .filter_map(Constraint::as_unique)
            .try_for_each(|unique| self.check_unique_constraint(unique, id, values))
    }

    fn check_unique_constraint(&self, unique: &UniqueConstraint, id: Option<RowId>, values: &[Value]) -> Result<()> {
        let key = unique.key(self, values);
        match unique.conflict(&key, id) {
            Some(_) => Err(self.unique_violation(unique, &self.pick(&unique.columns, values), id)),
            None => Ok(()),
        }
    }

    pub(crate) fn unique_violation(&self, unique: &UniqueConstraint, key: &[Value], id: Option<RowId>) -> DataError {
        DataError::ConstraintViolation {
            constraint: unique.name.clone(),
            table: self.name.clone(),
            row: id,
            message: format!(
                "column(s) '{}' are constrained to be unique; value ({}) is already present",
                self.column_names(&unique.columns),
                display_key(key)
            ),
        }
    }

    /// Adds a row to every unique index. Returns true if an index changed.
    pub(crate) fn index_row(&mut self, id: RowId) -> bool {
        if !self.enforces_constraints() {
            return false;
        }
        let Some(record) = self.rows.get(&id) else {
            return false;
        };
        if record.state == RowState::Deleted {
            return false;
        }
        let keys: Vec<(usize, Vec<Value>)> = self
            .constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_unique().map(|u| (i, u.key_of(self, record, CURRENT))))
            .collect();
        let changed = !keys.is_empty();
        for (i, key) in keys {
            if let Some(unique) = self.constraints[i].as_unique_mut() {
                unique.insert(key, id);
            }
        }
        changed
    }

    /// Removes a row from every unique index, keyed by its Current values.
    pub(crate) fn unindex_row(&mut self, id: RowId) -> bool {
        if !self.enforces_constraints() {
            return false;
        }
        let Some(record) = self.rows.get(&id) else {
            return false;
        };
        let keys: Vec<(usize, Vec<Value>)> = self
            .constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_unique().map(|u| (i, u.key_of(self, record, CURRENT))))
            .collect();
        let changed = !keys.is_empty();
        for (i, key) in keys {
            if let Some(unique) = self.constraints[i].as_unique_mut() {
                unique.remove(&key, id);
            }
        }
        changed
    }

    /// Fills a unique index from the non-deleted rows, returning one error per
    /// duplicate.
    pub(crate) fn build_index(&self, unique: &mut UniqueConstraint) -> Vec<DataError> {
        unique.index.clear();
        let mut errors = Vec::new();
        for (id, record) in &self.rows {
            if record.state == RowState::Deleted {
                continue;
            }
            let key = unique.key_of(self, record, CURRENT);
            if unique.lookup(&key).is_some() {
                let values = record.slot_values(CURRENT);
                errors.push(self.unique_violation(unique, &self.pick(&unique.columns, &values), Some(*id)));
            } else {
                unique.insert(key, *id);
            }
        }
        errors
    }

    /// Rebuilds every unique index; indexes stay empty while constraints are
    /// not enforced.
    pub(crate) fn rebuild_indexes(&mut self) -> Vec<DataError> {
        let mut constraints = core::mem::take(&mut self.constraints);
        let mut errors = Vec::new();
        for unique in constraints.iter_mut().filter_map(Constraint::as_unique_mut) {
            if self.enforces_constraints() {
                errors.extend(self.build_index(unique));
            } else {
                unique.index.clear();
            }
        }
        self.constraints = constraints;
        errors
    }

    /// Rows whose `fk` columns hold `key`. Deleted rows are matched on their
    /// original values when `include_deleted` is set.
    pub(crate) fn children_of(&self, fk: &ForeignKeyConstraint, key: &[Value], include_deleted: bool) -> Vec<RowId> {
        let ordinals = self.ordinals(&fk.columns);
        self.rows
            .iter()
            .filter(|(_, r)| include_deleted || r.state != RowState::Deleted)
            .filter(|(_, r)| {
                let slot = r.view_slot();
                ordinals.iter().zip(key).all(|(o, k)| {
                    let value = r.cell(*o, slot);
                    !value.is_null() && value.cmp_with(k, self.case_sensitive()).is_eq()
                })
            })
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn ordinals(&self, ids: &[ColumnId]) -> Vec<usize> {
        ids.iter().filter_map(|id| self.ordinal_of(*id)).collect()
    }

    /// Picks the values of `columns` out of a full row.
    pub(crate) fn pick(&self, columns: &[ColumnId], values: &[Value]) -> Vec<Value> {
        columns
            .iter()
            .map(|id| {
                self.ordinal_of(*id)
                    .and_then(|o| values.get(o))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }

    pub(crate) fn keys_equal(&self, a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(x, y)| x.cmp_with(y, self.case_sensitive()).is_eq())
    }

    pub(crate) fn defaults_of(&self, columns: &[ColumnId]) -> Vec<Value> {
        columns
            .iter()
            .map(|id| {
                self.ordinal_of(*id)
                    .map(|o| self.columns[o].default_value.clone())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Moves auto-increment counters past explicitly stored values.
    pub(crate) fn observe_auto_increment(&mut self, values: &[Value]) {
        for (column, value) in self.columns.iter_mut().zip(values) {
            if let (Some(auto), Value::Int(i)) = (column.auto_increment.as_mut(), value) {
                auto.observe(*i);
            }
        }
    }

    /// Converts a value to the type of the column at `ordinal`.
    pub(crate) fn coerce_value(&self, ordinal: usize, value: Value) -> Result<Value> {
        let column = &self.columns[ordinal];
        if value.is_null() || value.data_type() == Some(column.data_type) {
            return Ok(value);
        }
        value
            .coerce(column.data_type)
            .ok_or_else(|| DataError::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type,
                found: value.describe(),
            })
    }
}

