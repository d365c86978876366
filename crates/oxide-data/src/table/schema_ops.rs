//! Schema changes: columns, constraints, enforcement and bulk-load mode.

use tracing::debug;

use crate::column::{AutoIncrement, Column, ColumnDef, ColumnExpression, ColumnId};
use crate::constraint::{Constraint, ForeignKeyConstraint, ForeignKeyDef, UniqueConstraint};
use crate::error::{DataError, Result};
use crate::expr::{BindMode, Binder};
use crate::row::{ColumnKey, RowId, RowState, CURRENT};
use crate::value::{DataType, Value};

use super::events::{dispatch, EventKind, Notice};
use super::txn::{check_parent, table_index};
use super::{Table, TableMut};

impl TableMut<'_> {
    fn schema_changed(&mut self) {
        if let Err(err) = dispatch(self.tables, self.index, Notice::table(EventKind::SchemaChanged), None) {
            tracing::warn!(table = %self.name, error = %err, "schema notification failed");
        }
    }

    fn resolve<K: ColumnKey>(&self, columns: impl IntoIterator<Item = K>) -> Result<Vec<ColumnId>> {
        columns
            .into_iter()
            .map(|key| key.ordinal(self).map(|o| self.columns[o].id))
            .collect()
    }

    // ===== Columns =====

    /// Adds a column. Existing rows receive the default value, or fresh
    /// auto-increment values.
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateName` when the name is taken (ignoring case),
    /// `InvalidSchema` for contradictory definitions, `TypeMismatch` for an
    /// unconvertible default, expression errors for computed columns, and
    /// constraint violations when existing rows cannot satisfy a non-null
    /// or unique definition.
    pub fn add_column(&mut self, def: ColumnDef) -> Result<ColumnId> {
        if def.name.trim().is_empty() {
            return Err(DataError::invalid_schema(&self.name, "column names cannot be empty"));
        }
        if self.columns.iter().any(|c| c.matches_name(&def.name)) {
            return Err(DataError::DuplicateName {
                kind: "Column",
                name: def.name,
            });
        }
        let auto_increment = match def.auto_increment {
            Some((seed, step)) => {
                check_auto_increment(&self.name, def.data_type, step, &def.default_value)?;
                Some(AutoIncrement::new(seed, step))
            }
            None => None,
        };
        if def.max_length.is_some() && def.data_type != DataType::Text {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("max length applies to text columns only, '{}' is {}", def.name, def.data_type),
            ));
        }
        if def.expression.is_some() && (def.unique || auto_increment.is_some()) {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("computed column '{}' cannot be unique or auto-increment", def.name),
            ));
        }
        let default_value = coerce_default(&def.name, def.data_type, def.default_value)?;

        let table = self.table_mut();
        let id = ColumnId(table.next_column_id);
        table.next_column_id += 1;
        let mut column = Column {
            id,
            name: def.name,
            data_type: def.data_type,
            allow_null: def.allow_null,
            default_value,
            auto_increment,
            max_length: def.max_length,
            read_only: def.read_only,
            expression: None,
        };
        let computed = def.expression.is_some();
        for record in table.rows.values_mut() {
            let value = match column.auto_increment.as_mut() {
                Some(auto) if !computed => Value::Int(auto.take()),
                _ if computed => Value::Null,
                _ => column.default_value.clone(),
            };
            let original = record.has_original().then(|| value.clone());
            let proposed = record.editing.then(|| value.clone());
            record.cells.push([original, Some(value), proposed]);
        }
        table.columns.push(column);

        if let Err(err) = self.finish_column(def.expression, def.unique) {
            self.pop_column();
            return Err(err);
        }
        debug!(table = %self.name, column = %self.columns[self.columns.len() - 1].name, "column added");
        self.schema_changed();
        Ok(id)
    }

    fn finish_column(&mut self, expression: Option<String>, unique: bool) -> Result<()> {
        let ordinal = self.columns.len() - 1;
        if let Some(text) = expression {
            let bound = Binder::bind_text(self, &text, BindMode::ComputedColumn)?;
            self.table_mut().columns[ordinal].expression = Some(ColumnExpression { text, bound });
            // Evaluate once so that type errors surface now.
            for id in self.rows.keys() {
                let record = self.record(*id)?;
                self.cell_value(record, ordinal, record.view_slot())?;
            }
        }
        if self.enforces_constraints() {
            let values: Vec<(RowId, Vec<Value>)> = self
                .rows
                .iter()
                .filter(|(_, r)| r.state != RowState::Deleted)
                .map(|(id, r)| (*id, r.slot_values(CURRENT)))
                .collect();
            for (id, values) in values {
                self.check_columns(Some(id), &values)?;
            }
        }
        if unique {
            let name = self.columns[ordinal].name.clone();
            self.add_unique_constraint(None, [name.as_str()], false)?;
        }
        Ok(())
    }

    fn pop_column(&mut self) {
        let table = self.table_mut();
        table.columns.pop();
        for record in table.rows.values_mut() {
            record.cells.pop();
        }
    }

    /// Removes a column.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidSchema` while a constraint, a foreign key of any
    /// table, or a computed column references the column.
    pub fn remove_column(&mut self, column: impl ColumnKey) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        let id = self.columns[ordinal].id;
        let name = self.columns[ordinal].name.clone();
        if let Some(constraint) = self.constraints.iter().find(|c| c.references_column(id)) {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("column '{name}' is part of constraint '{}'", constraint.name()),
            ));
        }
        let referenced = self.tables.iter().any(|t| {
            t.constraints
                .iter()
                .filter_map(Constraint::as_foreign_key)
                .any(|fk| fk.references_parent(&self.name, id))
        });
        if referenced {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("column '{name}' is referenced by a foreign key"),
            ));
        }
        if let Some(computed) = self.columns.iter().find(|c| {
            c.expression
                .as_ref()
                .is_some_and(|e| e.bound.references(id))
        }) {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("column '{name}' is used by computed column '{}'", computed.name),
            ));
        }

        let table = self.table_mut();
        table.columns.remove(ordinal);
        for record in table.rows.values_mut() {
            record.cells.remove(ordinal);
            record.column_errors.remove(&id);
        }
        debug!(table = %self.name, column = %name, "column removed");
        self.schema_changed();
        Ok(())
    }

    /// Renames a column.
    ///
    /// # Errors
    ///
    /// Fails when the new name is taken by another column or a computed
    /// column refers to the column by name.
    pub fn rename_column(&mut self, column: impl ColumnKey, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        let ordinal = column.ordinal(self)?;
        let id = self.columns[ordinal].id;
        if new_name.trim().is_empty() {
            return Err(DataError::invalid_schema(&self.name, "column names cannot be empty"));
        }
        if self
            .columns
            .iter()
            .any(|c| c.id != id && c.matches_name(&new_name))
        {
            return Err(DataError::DuplicateName {
                kind: "Column",
                name: new_name,
            });
        }
        if let Some(computed) = self.columns.iter().find(|c| {
            c.expression
                .as_ref()
                .is_some_and(|e| e.bound.references(id))
        }) {
            return Err(DataError::invalid_schema(
                &self.name,
                format!(
                    "column '{}' is used by the expression of '{}'",
                    self.columns[ordinal].name, computed.name
                ),
            ));
        }
        let old = core::mem::replace(&mut self.table_mut().columns[ordinal].name, new_name);
        debug!(table = %self.name, from = %old, to = %self.columns[ordinal].name, "column renamed");
        self.schema_changed();
        Ok(())
    }

    /// Allows or forbids NULL.
    ///
    /// # Errors
    ///
    /// Forbidding fails while constraints are enforced and a row holds NULL.
    pub fn set_allow_null(&mut self, column: impl ColumnKey, allow: bool) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        if !allow {
            self.check_no_nulls(&[ordinal])?;
        }
        self.table_mut().columns[ordinal].allow_null = allow;
        self.schema_changed();
        Ok(())
    }

    fn check_no_nulls(&self, ordinals: &[usize]) -> Result<()> {
        if !self.enforces_constraints() {
            return Ok(());
        }
        for (id, record) in &self.rows {
            if record.state == RowState::Deleted {
                continue;
            }
            let null = ordinals
                .iter()
                .find(|o| !self.columns[**o].is_computed() && record.cell(**o, CURRENT).is_null());
            if let Some(o) = null {
                return Err(DataError::NullViolation {
                    table: self.name.clone(),
                    column: self.columns[*o].name.clone(),
                    row: Some(*id),
                });
            }
        }
        Ok(())
    }

    /// Adds or removes a single-column unique constraint.
    ///
    /// # Errors
    ///
    /// Adding fails on duplicate values; removing fails for the primary key
    /// and for keys referenced by foreign keys.
    pub fn set_unique(&mut self, column: impl ColumnKey, unique: bool) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        let id = self.columns[ordinal].id;
        let existing: Vec<String> = self
            .constraints
            .iter()
            .filter_map(Constraint::as_unique)
            .filter(|u| u.columns == [id])
            .map(|u| u.name.clone())
            .collect();
        if unique {
            if existing.is_empty() {
                self.add_unique_constraint(None, [ordinal], false)?;
            }
            return Ok(());
        }
        for name in existing {
            if self.constraint(&name).and_then(Constraint::as_unique).is_some_and(UniqueConstraint::is_primary_key) {
                return Err(DataError::invalid_schema(
                    &self.name,
                    format!("column '{}' is the primary key", self.columns[ordinal].name),
                ));
            }
            self.remove_constraint(&name)?;
        }
        Ok(())
    }

    /// Limits text length; `None` lifts the limit.
    ///
    /// # Errors
    ///
    /// Fails for non-text columns and, while enforced, when a stored value
    /// is longer.
    pub fn set_max_length(&mut self, column: impl ColumnKey, max: Option<usize>) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        let column = &self.columns[ordinal];
        if column.data_type != DataType::Text {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("max length applies to text columns only, '{}' is {}", column.name, column.data_type),
            ));
        }
        if let (Some(max), true) = (max, self.enforces_constraints()) {
            for record in self.rows.values().filter(|r| r.state != RowState::Deleted) {
                if let Value::Text(text) = record.cell(ordinal, CURRENT) {
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
        }
        self.table_mut().columns[ordinal].max_length = max;
        self.schema_changed();
        Ok(())
    }

    /// Sets the value new rows start with.
    ///
    /// # Errors
    ///
    /// Fails for auto-increment columns and unconvertible values.
    pub fn set_default_value(&mut self, column: impl ColumnKey, value: impl Into<Value>) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        let column = &self.columns[ordinal];
        let value = value.into();
        if column.auto_increment.is_some() && !value.is_null() {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("auto-increment column '{}' cannot have a default value", column.name),
            ));
        }
        let value = coerce_default(&column.name, column.data_type, value)?;
        self.table_mut().columns[ordinal].default_value = value;
        self.schema_changed();
        Ok(())
    }

    /// Turns auto-increment on with `(seed, step)`, or off with `None`. The
    /// counter starts past the values already stored.
    ///
    /// # Errors
    ///
    /// Fails for non-integer and computed columns, a zero step, and columns
    /// with a non-null default.
    pub fn set_auto_increment(&mut self, column: impl ColumnKey, policy: Option<(i64, i64)>) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        let column = &self.columns[ordinal];
        let auto = match policy {
            Some((seed, step)) => {
                check_auto_increment(&self.name, column.data_type, step, &column.default_value)?;
                if column.is_computed() {
                    return Err(DataError::invalid_schema(
                        &self.name,
                        format!("computed column '{}' cannot be auto-increment", column.name),
                    ));
                }
                let mut auto = AutoIncrement::new(seed, step);
                for record in self.rows.values() {
                    if let Value::Int(i) = record.cell(ordinal, CURRENT) {
                        auto.observe(*i);
                    }
                }
                Some(auto)
            }
            None => None,
        };
        self.table_mut().columns[ordinal].auto_increment = auto;
        self.schema_changed();
        Ok(())
    }

    /// Freezes or unfreezes the values of a column.
    ///
    /// # Errors
    ///
    /// Fails for unknown columns.
    pub fn set_read_only(&mut self, column: impl ColumnKey, read_only: bool) -> Result<()> {
        let ordinal = column.ordinal(self)?;
        self.table_mut().columns[ordinal].read_only = read_only;
        self.schema_changed();
        Ok(())
    }

    /// Switches case sensitivity of text comparisons.
    ///
    /// # Errors
    ///
    /// Fails, leaving the setting unchanged, when unique keys would collide
    /// or a computed column no longer binds.
    pub fn set_case_sensitive(&mut self, case_sensitive: bool) -> Result<()> {
        if self.case_sensitive() == case_sensitive {
            return Ok(());
        }
        self.table_mut().options.case_sensitive = case_sensitive;
        let result = self.rebind_after_case_change();
        if let Err(err) = result {
            self.table_mut().options.case_sensitive = !case_sensitive;
            self.table_mut().rebuild_indexes();
            self.rebind_expressions()?;
            return Err(err);
        }
        debug!(table = %self.name, case_sensitive, "case sensitivity changed");
        self.schema_changed();
        Ok(())
    }

    fn rebind_after_case_change(&mut self) -> Result<()> {
        let errors = self.table_mut().rebuild_indexes();
        if !errors.is_empty() {
            return Err(DataError::Multiple(errors));
        }
        self.rebind_expressions()
    }

    fn rebind_expressions(&mut self) -> Result<()> {
        let texts: Vec<(usize, String)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(o, c)| c.expression.as_ref().map(|e| (o, e.text.clone())))
            .collect();
        for (ordinal, text) in texts {
            let bound = Binder::bind_text(self, &text, BindMode::ComputedColumn)?;
            self.table_mut().columns[ordinal].expression = Some(ColumnExpression { text, bound });
        }
        Ok(())
    }

    // ===== Constraints =====

    /// Declares the primary key. An empty list drops the primary-key flag.
    ///
    /// Reuses a unique constraint over the same columns or adds one; the key
    /// columns stop allowing NULL. A previous primary key stays as a plain
    /// unique constraint.
    ///
    /// # Errors
    ///
    /// Fails when stored rows hold NULL or duplicate keys.
    pub fn set_primary_key<K: ColumnKey>(&mut self, columns: impl IntoIterator<Item = K>) -> Result<()> {
        let ids = self.resolve(columns)?;
        if ids.is_empty() {
            for unique in self.table_mut().constraints.iter_mut().filter_map(Constraint::as_unique_mut) {
                unique.primary_key = false;
            }
            self.schema_changed();
            return Ok(());
        }
        let ordinals = self.ordinals(&ids);
        self.check_no_nulls(&ordinals)?;

        let position = self
            .constraints
            .iter()
            .position(|c| c.as_unique().is_some_and(|u| u.columns == ids));
        let name = match position {
            Some(p) => self.constraints[p].name().to_string(),
            None => {
                let names: Vec<String> = ordinals.iter().map(|o| self.columns[*o].name.clone()).collect();
                self.add_unique_constraint(None, names.iter().map(String::as_str), false)?
            }
        };
        let table = self.table_mut();
        for unique in table.constraints.iter_mut().filter_map(Constraint::as_unique_mut) {
            unique.primary_key = unique.name == name;
        }
        for ordinal in ordinals {
            table.columns[ordinal].allow_null = false;
        }
        debug!(table = %self.name, constraint = %name, "primary key set");
        self.schema_changed();
        Ok(())
    }

    /// Adds a unique constraint and returns its name.
    ///
    /// # Errors
    ///
    /// Fails for duplicate constraint names, computed columns and, while
    /// enforced, duplicate stored keys.
    pub fn add_unique_constraint<K: ColumnKey>(
        &mut self,
        name: Option<&str>,
        columns: impl IntoIterator<Item = K>,
        primary_key: bool,
    ) -> Result<String> {
        let ids = self.resolve(columns)?;
        if ids.is_empty() {
            return Err(DataError::invalid_schema(&self.name, "a unique constraint needs columns"));
        }
        if let Some(column) = ids
            .iter()
            .filter_map(|id| self.ordinal_of(*id))
            .map(|o| &self.columns[o])
            .find(|c| c.is_computed())
        {
            return Err(DataError::invalid_schema(
                &self.name,
                format!("computed column '{}' cannot be part of a unique constraint", column.name),
            ));
        }
        let name = self.constraint_name(name)?;
        let mut unique = UniqueConstraint::new(name.clone(), ids, primary_key);
        if self.enforces_constraints() {
            if let Some(err) = self.build_index(&mut unique).into_iter().next() {
                return Err(err);
            }
        }
        let table = self.table_mut();
        if primary_key {
            for existing in table.constraints.iter_mut().filter_map(Constraint::as_unique_mut) {
                existing.primary_key = false;
            }
        }
        table.constraints.push(Constraint::Unique(unique));
        debug!(table = %self.name, constraint = %name, "unique constraint added");
        self.schema_changed();
        Ok(name)
    }

    /// Adds a foreign key to this table and returns its name. The parent
    /// table must be reachable through this handle; a unique constraint over
    /// the parent columns is added when missing.
    ///
    /// # Errors
    ///
    /// Fails for unknown tables or columns, mismatched column counts or
    /// types, duplicate names and, while enforced, child rows without a
    /// parent.
    pub fn add_foreign_key(&mut self, def: ForeignKeyDef) -> Result<String> {
        let fk = self.prepare_foreign_key(def, None)?;
        let name = fk.name.clone();
        self.attach_foreign_key(fk)?;
        Ok(name)
    }

    pub(crate) fn prepare_foreign_key(
        &self,
        def: ForeignKeyDef,
        relation: Option<String>,
    ) -> Result<ForeignKeyConstraint> {
        let columns = self.resolve(def.columns.iter())?;
        let p = table_index(self.tables, &def.parent_table)
            .ok_or_else(|| DataError::TableNotFound(def.parent_table.clone()))?;
        let parent = &self.tables[p];
        let parent_columns: Vec<ColumnId> = def
            .parent_columns
            .iter()
            .map(|key| key.ordinal(parent).map(|o| parent.columns[o].id))
            .collect::<Result<_>>()?;
        if columns.is_empty() || columns.len() != parent_columns.len() {
            return Err(DataError::invalid_schema(
                &self.name,
                "a foreign key needs the same non-zero number of child and parent columns",
            ));
        }
        for (child, parent_column) in columns.iter().zip(&parent_columns) {
            let child = self.column(*child)?;
            let parent_column = parent.column(*parent_column)?;
            if child.data_type != parent_column.data_type {
                return Err(DataError::invalid_schema(
                    &self.name,
                    format!(
                        "column '{}' ({}) cannot reference '{}.{}' ({})",
                        child.name, child.data_type, parent.name, parent_column.name, parent_column.data_type
                    ),
                ));
            }
        }
        Ok(ForeignKeyConstraint {
            name: self.constraint_name(def.name.as_deref())?,
            columns,
            parent_table: def.parent_table,
            parent_columns,
            delete_rule: def.delete_rule,
            update_rule: def.update_rule,
            accept_reject_rule: def.accept_reject_rule,
            relation,
        })
    }

    pub(crate) fn attach_foreign_key(&mut self, fk: ForeignKeyConstraint) -> Result<()> {
        if self.enforces_constraints() {
            for (id, record) in &self.rows {
                if record.state == RowState::Deleted {
                    continue;
                }
                check_parent(self.tables, self.index, &fk, Some(*id), &record.slot_values(CURRENT))?;
            }
        }
        let p = table_index(self.tables, &fk.parent_table)
            .ok_or_else(|| DataError::TableNotFound(fk.parent_table.clone()))?;
        let has_key = self.tables[p]
            .constraints
            .iter()
            .filter_map(Constraint::as_unique)
            .any(|u| u.columns == fk.parent_columns);
        if !has_key {
            let mut parent = TableMut::new(self.tables, p);
            let ordinals = parent.ordinals(&fk.parent_columns);
            parent.add_unique_constraint(None, ordinals, false)?;
        }
        debug!(table = %self.name, constraint = %fk.name, parent = %fk.parent_table, "foreign key added");
        self.table_mut().constraints.push(Constraint::ForeignKey(fk));
        self.schema_changed();
        Ok(())
    }

    /// Removes a constraint by name.
    ///
    /// # Errors
    ///
    /// Fails for unknown names, foreign keys owned by a relation, and unique
    /// constraints referenced by a foreign key.
    pub fn remove_constraint(&mut self, name: &str) -> Result<()> {
        let position = self
            .constraints
            .iter()
            .position(|c| c.name() == name)
            .ok_or_else(|| DataError::ConstraintNotFound(name.to_string()))?;
        match &self.constraints[position] {
            Constraint::ForeignKey(fk) => {
                if let Some(relation) = &fk.relation {
                    return Err(DataError::invalid_schema(
                        &self.name,
                        format!("constraint '{name}' belongs to relation '{relation}'"),
                    ));
                }
            }
            Constraint::Unique(unique) => {
                let referenced = self.tables.iter().any(|t| {
                    t.constraints
                        .iter()
                        .filter_map(Constraint::as_foreign_key)
                        .any(|fk| fk.parent_table == self.name && fk.parent_columns == unique.columns)
                });
                if referenced {
                    return Err(DataError::invalid_schema(
                        &self.name,
                        format!("constraint '{name}' is the parent key of a foreign key"),
                    ));
                }
            }
        }
        self.detach_constraint(position);
        Ok(())
    }

    pub(crate) fn detach_constraint(&mut self, position: usize) {
        let removed = self.table_mut().constraints.remove(position);
        debug!(table = %self.name, constraint = %removed.name(), "constraint removed");
        self.schema_changed();
    }

    fn constraint_name(&self, requested: Option<&str>) -> Result<String> {
        if let Some(name) = requested {
            if self.constraints.iter().any(|c| c.name() == name) {
                return Err(DataError::DuplicateName {
                    kind: "Constraint",
                    name: name.to_string(),
                });
            }
            return Ok(name.to_string());
        }
        let taken = |candidate: &str| {
            self.tables
                .iter()
                .any(|t| t.constraints.iter().any(|c| c.name() == candidate))
        };
        Ok((1..)
            .map(|n| format!("Constraint{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_default())
    }

    // ===== Enforcement =====

    /// Turns constraint enforcement on or off. Turning it on validates every
    /// row; on failure enforcement stays off, offending rows get a row error
    /// and every violation is reported.
    ///
    /// # Errors
    ///
    /// `Multiple` with one error per violation.
    pub fn set_enforce_constraints(&mut self, enforce: bool) -> Result<()> {
        if self.options.enforce_constraints == enforce {
            return Ok(());
        }
        self.table_mut().options.enforce_constraints = enforce;
        if !enforce {
            self.table_mut().rebuild_indexes();
            debug!(table = %self.name, "constraint enforcement suspended");
            return Ok(());
        }
        let errors = self.validate_all();
        if !errors.is_empty() {
            self.table_mut().options.enforce_constraints = false;
            self.table_mut().rebuild_indexes();
            self.mark_errors(&errors);
            return Err(DataError::Multiple(errors));
        }
        debug!(table = %self.name, "constraint enforcement resumed");
        Ok(())
    }

    /// Rebuilds indexes and checks every non-deleted row.
    pub(crate) fn validate_all(&mut self) -> Vec<DataError> {
        let mut errors = self.table_mut().rebuild_indexes();
        for (id, record) in &self.rows {
            if record.state == RowState::Deleted {
                continue;
            }
            let values = record.slot_values(CURRENT);
            if let Err(err) = self.check_columns(Some(*id), &values) {
                errors.push(err);
            }
            for fk in self.constraints.iter().filter_map(Constraint::as_foreign_key) {
                if let Err(err) = check_parent(self.tables, self.index, fk, Some(*id), &values) {
                    errors.push(err);
                }
            }
        }
        errors
    }

    pub(crate) fn mark_errors(&mut self, errors: &[DataError]) {
        for err in errors {
            let message = err.to_string();
            if let Some(record) = err.row().and_then(|id| self.table_mut().rows.get_mut(&id)) {
                record.error = message;
            }
        }
    }

    /// Suspends constraint checks for a bulk load.
    pub fn begin_load_data(&mut self) {
        if !self.loading {
            self.table_mut().loading = true;
            self.table_mut().rebuild_indexes();
            debug!(table = %self.name, "bulk load started");
        }
    }

    /// Ends a bulk load and validates every row.
    ///
    /// # Errors
    ///
    /// `Multiple` with every violation; the table then stays in load mode so
    /// that the rows can be repaired before trying again.
    pub fn end_load_data(&mut self) -> Result<()> {
        if !self.loading {
            return Ok(());
        }
        self.table_mut().loading = false;
        if self.options.enforce_constraints {
            let errors = self.validate_all();
            if !errors.is_empty() {
                self.table_mut().loading = true;
                self.table_mut().rebuild_indexes();
                self.mark_errors(&errors);
                return Err(DataError::Multiple(errors));
            }
        }
        debug!(table = %self.name, rows = self.len(), "bulk load finished");
        Ok(())
    }

    /// Removes every row without tracking deletions.
    ///
    /// # Errors
    ///
    /// Fails while another table enforces a foreign key with child rows
    /// referencing this one.
    pub fn clear(&mut self) -> Result<()> {
        for (c, child) in self.tables.iter().enumerate() {
            if c == self.index || !child.enforces_constraints() {
                continue;
            }
            for fk in child.constraints.iter().filter_map(Constraint::as_foreign_key) {
                if fk.parent_table != self.name {
                    continue;
                }
                let ordinals = child.ordinals(&fk.columns);
                let has_children = child.rows.values().any(|r| {
                    r.state != RowState::Deleted && ordinals.iter().all(|o| !r.cell(*o, CURRENT).is_null())
                });
                if has_children {
                    return Err(DataError::ConstraintViolation {
                        constraint: fk.name.clone(),
                        table: child.name.clone(),
                        row: None,
                        message: format!("cannot clear '{}' while child rows reference it", self.name),
                    });
                }
            }
        }
        self.clear_rows();
        Ok(())
    }

    /// Removes every row without looking at referencing tables.
    pub(crate) fn clear_rows(&mut self) {
        let table = self.table_mut();
        let removed = table.rows.len();
        table.rows.clear();
        table.rebuild_indexes();
        debug!(table = %self.name, rows = removed, "table cleared");
        if let Err(err) = dispatch(self.tables, self.index, Notice::table(EventKind::TableCleared), None) {
            tracing::warn!(table = %self.name, error = %err, "clear notification failed");
        }
    }
}

fn check_auto_increment(table: &str, data_type: DataType, step: i64, default: &Value) -> Result<()> {
    if data_type != DataType::Integer {
        return Err(DataError::invalid_schema(
            table,
            format!("auto-increment needs an integer column, not {data_type}"),
        ));
    }
    if step == 0 {
        return Err(DataError::invalid_schema(table, "auto-increment step cannot be zero"));
    }
    if !default.is_null() {
        return Err(DataError::invalid_schema(
            table,
            "auto-increment columns cannot have a default value",
        ));
    }
    Ok(())
}

fn coerce_default(column: &str, data_type: DataType, value: Value) -> Result<Value> {
    value.coerce(data_type).ok_or_else(|| DataError::TypeMismatch {
        column: column.to_string(),
        expected: data_type,
        found: value.describe(),
    })
}

impl Table {
    /// Adds a unique constraint to a standalone table.
    ///
    /// # Errors
    ///
    /// See [`TableMut::add_unique_constraint`].
    pub fn add_unique_constraint<K: ColumnKey>(
        &mut self,
        name: Option<&str>,
        columns: impl IntoIterator<Item = K>,
    ) -> Result<String> {
        self.edit().add_unique_constraint(name, columns, false)
    }

    /// Turns constraint enforcement on or off.
    ///
    /// # Errors
    ///
    /// See [`TableMut::set_enforce_constraints`].
    pub fn set_enforce_constraints(&mut self, enforce: bool) -> Result<()> {
        self.edit().set_enforce_constraints(enforce)
    }

    /// Removes every row.
    ///
    /// # Errors
    ///
    /// See [`TableMut::clear`].
    pub fn clear(&mut self) -> Result<()> {
        self.edit().clear()
    }
}
