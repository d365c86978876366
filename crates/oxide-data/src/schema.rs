//! Serializable descriptions of tables and data sets.
//!
//! These types are the hand-off point for external codecs: they carry the
//! schema (columns, constraints, relations) and the row versions of a table
//! without committing to any particular wire format.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::{ColumnDef, ColumnId};
use crate::constraint::{Constraint, ForeignKeyConstraint, ForeignKeyDef};
use crate::dataset::{DataSet, RelationDef};
use crate::error::{DataError, Result};
use crate::options::{DataSetOptions, TableOptions};
use crate::row::{RowId, RowRecord, RowState, CURRENT, ORIGINAL, PROPOSED};
use crate::table::Table;
use crate::value::Value;

/// A constraint as stored in a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintSchema {
    /// A unique constraint or the primary key.
    Unique {
        /// Constraint name.
        name: String,
        /// Column names.
        columns: Vec<String>,
        /// Whether this is the primary key.
        #[serde(default)]
        primary_key: bool,
    },
    /// A foreign key not owned by a relation. Its name is always set.
    ForeignKey(ForeignKeyDef),
}

/// Schema of a table: options, columns in ordinal order and constraints in
/// registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Table options.
    #[serde(default)]
    pub options: TableOptions,
    /// Columns. `unique` is always false; uniqueness is listed in
    /// `constraints`.
    pub columns: Vec<ColumnDef>,
    /// Constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintSchema>,
}

impl TableSchema {
    /// Returns a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the primary-key column names, empty when there is none.
    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        self.constraints
            .iter()
            .find_map(|c| match c {
                ConstraintSchema::Unique {
                    columns,
                    primary_key: true,
                    ..
                } => Some(columns.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }
}

/// The stored versions and bookkeeping of one row. Every version lists a
/// value per column in ordinal order; computed columns hold NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSnapshot {
    /// Row state.
    pub state: RowState,
    /// State before deletion, for deleted rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_state: Option<RowState>,
    /// Original version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<Vec<Value>>,
    /// Current version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Vec<Value>>,
    /// Proposed version of a row being edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed: Option<Vec<Value>>,
    /// Row error text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Column error texts keyed by column name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_errors: BTreeMap<String, String>,
}

/// A table's schema together with its rows in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// The schema.
    pub schema: TableSchema,
    /// The rows.
    #[serde(default)]
    pub rows: Vec<RowSnapshot>,
}

/// Schema of a data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSetSchema {
    /// Data set name.
    pub name: String,
    /// Data set options.
    #[serde(default)]
    pub options: DataSetOptions,
    /// Tables in order.
    pub tables: Vec<TableSchema>,
    /// Relations in order; each names its foreign key.
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

fn names(table: &Table, ids: &[ColumnId]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| table.ordinal_of(*id))
        .map(|o| table.columns[o].name.clone())
        .collect()
}

/// Describes a foreign key, or `None` when its parent is not among `tables`.
fn foreign_key_def(tables: &[Table], fk: &ForeignKeyConstraint, child: &Table) -> Option<ForeignKeyDef> {
    let parent = tables.iter().find(|t| t.name == fk.parent_table)?;
    Some(ForeignKeyDef {
        name: Some(fk.name.clone()),
        columns: names(child, &fk.columns),
        parent_table: fk.parent_table.clone(),
        parent_columns: names(parent, &fk.parent_columns),
        delete_rule: fk.delete_rule,
        update_rule: fk.update_rule,
        accept_reject_rule: fk.accept_reject_rule,
    })
}

impl Table {
    /// Describes the schema. Foreign keys to tables other than this one are
    /// only described through [`DataSet::schema`].
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        self.schema_in(core::slice::from_ref(self))
    }

    fn schema_in(&self, tables: &[Self]) -> TableSchema {
        let columns = self
            .columns
            .iter()
            .map(|c| ColumnDef {
                name: c.name.clone(),
                data_type: c.data_type,
                allow_null: c.allow_null,
                default_value: c.default_value.clone(),
                auto_increment: c.auto_increment.map(|a| (a.seed, a.step)),
                max_length: c.max_length,
                unique: false,
                read_only: c.read_only,
                expression: c.expression().map(str::to_string),
            })
            .collect();
        let constraints = self
            .constraints
            .iter()
            .filter_map(|constraint| match constraint {
                Constraint::Unique(unique) => Some(ConstraintSchema::Unique {
                    name: unique.name.clone(),
                    columns: names(self, &unique.columns),
                    primary_key: unique.primary_key,
                }),
                Constraint::ForeignKey(fk) if fk.relation.is_none() => {
                    foreign_key_def(tables, fk, self).map(ConstraintSchema::ForeignKey)
                }
                Constraint::ForeignKey(_) => None,
            })
            .collect();
        TableSchema {
            name: self.name.clone(),
            options: self.options,
            columns,
            constraints,
        }
    }

    /// Describes the schema and every row with all of its versions.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let version = |record: &RowRecord, slot: usize, present: bool| present.then(|| record.slot_values(slot));
        let rows = self
            .rows
            .values()
            .map(|record| RowSnapshot {
                state: record.state,
                prior_state: record.prior_state,
                original: version(record, ORIGINAL, record.has_original()),
                current: version(record, CURRENT, record.cells.iter().any(|c| c[CURRENT].is_some())),
                proposed: version(record, PROPOSED, record.editing),
                error: record.error.clone(),
                column_errors: record
                    .column_errors
                    .iter()
                    .filter_map(|(id, text)| {
                        self.ordinal_of(*id)
                            .map(|o| (self.columns[o].name.clone(), text.clone()))
                    })
                    .collect(),
            })
            .collect();
        TableSnapshot {
            schema: self.schema(),
            rows,
        }
    }

    /// Builds an empty table from a schema.
    ///
    /// # Errors
    ///
    /// Fails when the schema is inconsistent (see [`crate::TableMut::add_column`]
    /// and friends), and with `TableNotFound` for foreign keys to other
    /// tables; use [`DataSet::from_schema`] for those.
    pub fn from_schema(schema: &TableSchema) -> Result<Self> {
        let (table, external) = Self::build(schema)?;
        match external.into_iter().next() {
            Some(fk) => Err(DataError::TableNotFound(fk.parent_table)),
            None => Ok(table),
        }
    }

    /// Builds the table and hands back the foreign keys that reference other
    /// tables.
    fn build(schema: &TableSchema) -> Result<(Self, Vec<ForeignKeyDef>)> {
        let mut table = Self::with_options(schema.name.clone(), schema.options);
        let mut edit = table.edit();
        for column in &schema.columns {
            edit.add_column(column.clone())?;
        }
        let mut foreign_keys = Vec::new();
        for constraint in &schema.constraints {
            match constraint {
                ConstraintSchema::Unique {
                    name,
                    columns,
                    primary_key,
                } => {
                    edit.add_unique_constraint(Some(name.as_str()), columns.iter(), *primary_key)?;
                }
                ConstraintSchema::ForeignKey(def) => foreign_keys.push(def.clone()),
            }
        }
        let mut external = Vec::new();
        for def in foreign_keys {
            if def.parent_table == schema.name {
                edit.add_foreign_key(def)?;
            } else {
                external.push(def);
            }
        }
        Ok((table, external))
    }

    /// Rebuilds a table with its rows from a snapshot. Auto-increment
    /// counters continue after the largest stored value.
    ///
    /// # Errors
    ///
    /// Fails like [`Table::from_schema`], for rows whose versions do not fit
    /// their state or the columns, and, while enforced, with `Multiple`
    /// listing every constraint violation.
    pub fn from_snapshot(snapshot: &TableSnapshot) -> Result<Self> {
        let mut table = Self::from_schema(&snapshot.schema)?;
        for row in &snapshot.rows {
            let record = table.restore_record(row)?;
            for slot in [ORIGINAL, CURRENT] {
                let values = record.slot_values(slot);
                table.observe_auto_increment(&values);
            }
            let id = RowId(table.next_row_id);
            table.next_row_id += 1;
            table.rows.insert(id, record);
        }
        let mut edit = table.edit();
        if edit.enforces_constraints() {
            let errors = edit.validate_all();
            if !errors.is_empty() {
                return Err(DataError::Multiple(errors));
            }
        }
        debug!(table = %table.name, rows = table.rows.len(), "table restored from snapshot");
        Ok(table)
    }

    fn restore_record(&self, row: &RowSnapshot) -> Result<RowRecord> {
        let invalid = |message: &str| DataError::invalid_schema(&self.name, format!("row snapshot: {message}"));
        let has_original = match row.state {
            RowState::Detached => return Err(invalid("detached rows cannot be restored")),
            RowState::Added => false,
            RowState::Unchanged | RowState::Modified => true,
            RowState::Deleted => row.prior_state != Some(RowState::Added),
        };
        if has_original != row.original.is_some() {
            let verb = if has_original { "needs" } else { "cannot have" };
            return Err(invalid(&format!("a {} row {verb} an original version", row.state)));
        }
        if row.state != RowState::Deleted && row.current.is_none() {
            return Err(invalid(&format!("a {} row needs a current version", row.state)));
        }

        let mut record = RowRecord::added(Vec::new());
        record.cells = vec![[None, None, None]; self.columns.len()];
        for (slot, values) in [(ORIGINAL, &row.original), (CURRENT, &row.current), (PROPOSED, &row.proposed)] {
            let Some(values) = values else { continue };
            if values.len() != self.columns.len() {
                return Err(invalid(&format!(
                    "expected {} values per version, got {}",
                    self.columns.len(),
                    values.len()
                )));
            }
            let values = values
                .iter()
                .enumerate()
                .map(|(o, v)| self.coerce_value(o, v.clone()))
                .collect::<Result<Vec<_>>>()?;
            record.set_slot(slot, values);
        }
        record.state = row.state;
        record.prior_state = row.prior_state.filter(|_| row.state == RowState::Deleted);
        record.editing = row.proposed.is_some();
        record.error.clone_from(&row.error);
        for (column, text) in &row.column_errors {
            let ordinal = self
                .column_ordinal(column)
                .ok_or_else(|| self.column_not_found(column))?;
            record.column_errors.insert(self.columns[ordinal].id, text.clone());
        }
        Ok(record)
    }
}

impl DataSet {
    /// Describes every table and relation.
    #[must_use]
    pub fn schema(&self) -> DataSetSchema {
        let tables = self.tables().iter().map(|t| t.schema_in(self.tables())).collect();
        let relations = self
            .relations()
            .iter()
            .filter_map(|relation| {
                let child = self.table(relation.child_table())?;
                let fk = child
                    .constraint(relation.foreign_key())
                    .and_then(Constraint::as_foreign_key)?;
                Some(RelationDef {
                    name: Some(relation.name().to_string()),
                    child_table: relation.child_table().to_string(),
                    foreign_key: foreign_key_def(self.tables(), fk, child)?,
                })
            })
            .collect();
        DataSetSchema {
            name: self.name().to_string(),
            options: *self.options(),
            tables,
            relations,
        }
    }

    /// Builds an empty data set from a schema: tables first, then foreign
    /// keys between tables, then relations.
    ///
    /// # Errors
    ///
    /// Fails on the first inconsistency in the schema.
    pub fn from_schema(schema: &DataSetSchema) -> Result<Self> {
        let mut set = Self::with_options(schema.name.clone(), schema.options);
        let mut deferred = Vec::new();
        for table_schema in &schema.tables {
            let (table, external) = Table::build(table_schema)?;
            set.add_table(table)?;
            deferred.extend(external.into_iter().map(|fk| (table_schema.name.clone(), fk)));
        }
        for (child, fk) in deferred {
            set.table_mut(&child)?.add_foreign_key(fk)?;
        }
        for relation in &schema.relations {
            set.add_relation(relation.clone())?;
        }
        debug!(data_set = %set.name(), tables = set.tables().len(), "data set built from schema");
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Rule;
    use crate::error::ErrorKind;
    use crate::row::RowVersion;
    use crate::value::DataType;

    fn people() -> Table {
        let mut table = Table::new("People");
        table
            .add_column(ColumnDef::new("Id", DataType::Integer).auto_increment(1, 1))
            .unwrap();
        table
            .add_column(ColumnDef::new("Name", DataType::Text).not_null().max_length(10))
            .unwrap();
        table
            .add_column(ColumnDef::new("Shout", DataType::Text).expression("Name + '!'"))
            .unwrap();
        table.set_primary_key(["Id"]).unwrap();
        table
    }

    #[test]
    fn test_schema_describes_columns_and_keys() {
        let schema = people().schema();
        assert_eq!(schema.columns.len(), 3);
        assert_eq!(schema.primary_key(), ["Id".to_string()]);
        assert_eq!(schema.column("Shout").unwrap().expression.as_deref(), Some("Name + '!'"));
        assert_eq!(schema.column("Id").unwrap().auto_increment, Some((1, 1)));
    }

    #[test]
    fn test_schema_json_round_trip() {
        let schema = people().schema();
        let json = serde_json::to_string(&schema).unwrap();
        let back: TableSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);

        let table = Table::from_schema(&back).unwrap();
        assert_eq!(table.schema(), schema);
        assert!(table.is_empty());
    }

    #[test]
    fn test_snapshot_keeps_versions_and_states() {
        let mut table = people();
        let ann = table.insert([Value::Null, Value::from("Ann")]).unwrap();
        let bob = table.insert([Value::Null, Value::from("Bob")]).unwrap();
        let cy = table.insert([Value::Null, Value::from("Cy")]).unwrap();
        table.accept_changes().unwrap();
        table.set_value(ann, "Name", "Anna").unwrap();
        table.delete_row(bob).unwrap();
        table.edit().set_row_error(cy, "check me").unwrap();
        table.insert([Value::Null, Value::from("Dee")]).unwrap();

        let snapshot = table.snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();
        let back: TableSnapshot = serde_json::from_value(json).unwrap();
        let restored = Table::from_snapshot(&back).unwrap();

        let states: Vec<RowState> = restored.rows().map(|r| r.state()).collect();
        assert_eq!(
            states,
            [RowState::Modified, RowState::Deleted, RowState::Unchanged, RowState::Added]
        );
        let first = restored.row_at(0).unwrap();
        assert_eq!(first.get_version("Name", RowVersion::Original).unwrap(), Value::from("Ann"));
        assert_eq!(first.get("Shout").unwrap(), Value::from("Anna!"));
        assert_eq!(restored.row_at(2).unwrap().row_error(), Some("check me"));

        let mut restored = restored;
        let next = restored.insert([Value::Null, Value::from("Eve")]).unwrap();
        assert_eq!(restored.get(next, "Id", RowVersion::Current).unwrap(), Value::from(5));
    }

    #[test]
    fn test_snapshot_rejects_inconsistent_rows() {
        let mut snapshot = people().snapshot();
        snapshot.rows.push(RowSnapshot {
            state: RowState::Unchanged,
            prior_state: None,
            original: None,
            current: Some(vec![Value::from(1), Value::from("Ann"), Value::Null]),
            proposed: None,
            error: String::new(),
            column_errors: BTreeMap::new(),
        });
        let err = Table::from_snapshot(&snapshot).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);

        let row = snapshot.rows.last_mut().unwrap();
        row.state = RowState::Added;
        row.current = Some(vec![Value::from(1), Value::Null, Value::Null]);
        let err = Table::from_snapshot(&snapshot).unwrap_err();
        assert_eq!(err.errors().len(), 1);
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[test]
    fn test_data_set_schema_round_trip() {
        let mut set = DataSet::new("Shop");
        let mut customers = set.create_table("Customers").unwrap();
        customers.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
        customers.set_primary_key(["Id"]).unwrap();
        let mut orders = set.create_table("Orders").unwrap();
        orders.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
        orders.add_column(ColumnDef::new("CustomerId", DataType::Integer)).unwrap();
        orders.add_column(ColumnDef::new("ReferrerId", DataType::Integer)).unwrap();
        orders
            .add_foreign_key(ForeignKeyDef::new(["ReferrerId"], "Customers", ["Id"]).name("Referrer"))
            .unwrap();
        set.add_relation(
            RelationDef::new("Customers", ["Id"], "Orders", ["CustomerId"])
                .name("CustomerOrders")
                .on_delete(Rule::SetNull),
        )
        .unwrap();

        let schema = set.schema();
        assert_eq!(schema.relations.len(), 1);
        let orders = &schema.tables[1];
        assert!(orders
            .constraints
            .iter()
            .any(|c| matches!(c, ConstraintSchema::ForeignKey(fk) if fk.name.as_deref() == Some("Referrer"))));
        assert!(!orders
            .constraints
            .iter()
            .any(|c| matches!(c, ConstraintSchema::ForeignKey(fk) if fk.name.as_deref() == Some("CustomerOrders"))));

        let json = serde_json::to_string_pretty(&schema).unwrap();
        let back: DataSetSchema = serde_json::from_str(&json).unwrap();
        let rebuilt = DataSet::from_schema(&back).unwrap();
        assert_eq!(rebuilt.schema(), schema);

        assert!(matches!(
            Table::from_schema(&schema.tables[1]),
            Err(DataError::TableNotFound(name)) if name == "Customers"
        ));
    }
}
