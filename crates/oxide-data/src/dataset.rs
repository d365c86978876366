//! Data sets: named groups of tables joined by relations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::ColumnId;
use crate::constraint::{AcceptRejectRule, Constraint, ForeignKeyDef, Rule};
use crate::error::{DataError, Result};
use crate::options::DataSetOptions;
use crate::row::{RowId, RowState};
use crate::table::{Table, TableMut};
use crate::value::Value;

/// Definition of a relation to add to a data set.
///
/// ```rust
/// use oxide_data::{RelationDef, Rule};
///
/// let def = RelationDef::new("Customers", ["Id"], "Orders", ["CustomerId"])
///     .name("CustomerOrders")
///     .on_delete(Rule::SetNull);
/// assert_eq!(def.child_table, "Orders");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name; generated when absent.
    pub name: Option<String>,
    /// Table holding the foreign key.
    pub child_table: String,
    /// The foreign key added to the child table.
    pub foreign_key: ForeignKeyDef,
}

impl RelationDef {
    /// Creates a relation with cascading delete and update rules.
    pub fn new<P, C>(parent_table: impl Into<String>, parent_columns: P, child_table: impl Into<String>, child_columns: C) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            name: None,
            child_table: child_table.into(),
            foreign_key: ForeignKeyDef::new(child_columns, parent_table, parent_columns),
        }
    }

    /// Names the relation.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the delete rule of the foreign key.
    #[must_use]
    pub fn on_delete(mut self, rule: Rule) -> Self {
        self.foreign_key = self.foreign_key.on_delete(rule);
        self
    }

    /// Sets the update rule of the foreign key.
    #[must_use]
    pub fn on_update(mut self, rule: Rule) -> Self {
        self.foreign_key = self.foreign_key.on_update(rule);
        self
    }

    /// Sets the accept/reject rule of the foreign key.
    #[must_use]
    pub fn accept_reject(mut self, rule: AcceptRejectRule) -> Self {
        self.foreign_key = self.foreign_key.accept_reject(rule);
        self
    }
}

/// A named parent/child pairing of a unique constraint and a foreign key.
#[derive(Debug, Clone)]
pub struct DataRelation {
    name: String,
    parent_table: String,
    parent_columns: Vec<ColumnId>,
    child_table: String,
    child_columns: Vec<ColumnId>,
    parent_key: String,
    foreign_key: String,
}

impl DataRelation {
    /// Returns the relation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parent table name.
    #[must_use]
    pub fn parent_table(&self) -> &str {
        &self.parent_table
    }

    /// Returns the parent key columns.
    #[must_use]
    pub fn parent_columns(&self) -> &[ColumnId] {
        &self.parent_columns
    }

    /// Returns the child table name.
    #[must_use]
    pub fn child_table(&self) -> &str {
        &self.child_table
    }

    /// Returns the child columns.
    #[must_use]
    pub fn child_columns(&self) -> &[ColumnId] {
        &self.child_columns
    }

    /// Returns the name of the unique constraint on the parent table.
    #[must_use]
    pub fn parent_key(&self) -> &str {
        &self.parent_key
    }

    /// Returns the name of the foreign key on the child table.
    #[must_use]
    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    fn involves(&self, table: &str) -> bool {
        self.parent_table == table || self.child_table == table
    }
}

/// A named collection of tables and the relations between them.
///
/// Tables of a data set see each other: foreign keys, cascades and
/// accept/reject propagation reach across tables.
///
/// ```rust
/// use oxide_data::{ColumnDef, DataSet, DataType, RelationDef};
///
/// let mut set = DataSet::new("Shop");
/// let mut customers = set.create_table("Customers").unwrap();
/// customers.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
/// customers.set_primary_key(["Id"]).unwrap();
///
/// let mut orders = set.create_table("Orders").unwrap();
/// orders.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
/// orders.add_column(ColumnDef::new("CustomerId", DataType::Integer)).unwrap();
///
/// set.add_relation(RelationDef::new("Customers", ["Id"], "Orders", ["CustomerId"])).unwrap();
/// assert_eq!(set.relations().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DataSet {
    name: String,
    tables: Vec<Table>,
    relations: Vec<DataRelation>,
    options: DataSetOptions,
}

impl DataSet {
    /// Creates an empty data set with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, DataSetOptions::default())
    }

    /// Creates an empty data set.
    #[must_use]
    pub fn with_options(name: impl Into<String>, options: DataSetOptions) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            relations: Vec::new(),
            options,
        }
    }

    /// Returns the data set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &DataSetOptions {
        &self.options
    }

    // ===== Tables =====

    /// Returns the tables in the order they were added.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Returns a table by name. An exact match wins over a case-insensitive
    /// one.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.position(name).map(|i| &self.tables[i])
    }

    /// Returns an editing handle for a table.
    ///
    /// # Errors
    ///
    /// Returns `TableNotFound` for unknown names.
    pub fn table_mut(&mut self, name: &str) -> Result<TableMut<'_>> {
        let index = self
            .position(name)
            .ok_or_else(|| DataError::TableNotFound(name.to_string()))?;
        Ok(TableMut::new(&mut self.tables, index))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name).or_else(|| {
            let folded = name.to_lowercase();
            self.tables.iter().position(|t| t.name.to_lowercase() == folded)
        })
    }

    fn check_table_name(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(DataError::invalid_schema(name, "table names cannot be empty"));
        }
        let folded = name.to_lowercase();
        if self.tables.iter().any(|t| t.name.to_lowercase() == folded) {
            return Err(DataError::DuplicateName {
                kind: "Table",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Adds an existing table. Its own options are kept.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` when a table with the same name (ignoring
    /// case) is already present.
    pub fn add_table(&mut self, table: Table) -> Result<TableMut<'_>> {
        self.check_table_name(&table.name)?;
        debug!(data_set = %self.name, table = %table.name, "table added");
        self.tables.push(table);
        let index = self.tables.len() - 1;
        Ok(TableMut::new(&mut self.tables, index))
    }

    /// Creates an empty table using the data set's options.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` when the name is taken.
    pub fn create_table(&mut self, name: impl Into<String>) -> Result<TableMut<'_>> {
        let table = Table::with_options(name, self.options.table_options());
        self.add_table(table)
    }

    /// Removes a table and hands it back.
    ///
    /// # Errors
    ///
    /// Fails for unknown names, and while a relation or a foreign key of
    /// another table involves the table.
    pub fn remove_table(&mut self, name: &str) -> Result<Table> {
        let index = self
            .position(name)
            .ok_or_else(|| DataError::TableNotFound(name.to_string()))?;
        let name = self.tables[index].name.clone();
        if let Some(relation) = self.relations.iter().find(|r| r.involves(&name)) {
            return Err(DataError::invalid_schema(
                &name,
                format!("the table takes part in relation '{}'", relation.name),
            ));
        }
        for (i, table) in self.tables.iter().enumerate() {
            for fk in table.constraints.iter().filter_map(Constraint::as_foreign_key) {
                let outgoing = i == index && fk.parent_table != name;
                let incoming = i != index && fk.parent_table == name;
                if outgoing || incoming {
                    return Err(DataError::invalid_schema(
                        &name,
                        format!("the table takes part in foreign key '{}'", fk.name),
                    ));
                }
            }
        }
        debug!(data_set = %self.name, table = %name, "table removed");
        Ok(self.tables.remove(index))
    }

    // ===== Relations =====

    /// Returns the relations in the order they were added.
    #[must_use]
    pub fn relations(&self) -> &[DataRelation] {
        &self.relations
    }

    /// Returns a relation by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&DataRelation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Returns the relations in which `table` is the parent.
    pub fn child_relations<'s>(&'s self, table: &'s str) -> impl Iterator<Item = &'s DataRelation> + 's {
        self.relations.iter().filter(move |r| r.parent_table == table)
    }

    /// Returns the relations in which `table` is the child.
    pub fn parent_relations<'s>(&'s self, table: &'s str) -> impl Iterator<Item = &'s DataRelation> + 's {
        self.relations.iter().filter(move |r| r.child_table == table)
    }

    /// Adds a relation. The child table receives a foreign key named after
    /// the relation unless the definition names it; the parent table
    /// receives a unique constraint over the key when it has none.
    ///
    /// # Errors
    ///
    /// Fails for duplicate relation names, unknown tables or columns,
    /// mismatched key columns and, while enforced, child rows without a
    /// parent.
    pub fn add_relation(&mut self, def: RelationDef) -> Result<&DataRelation> {
        let name = match def.name {
            Some(name) => {
                if self.relation(&name).is_some() {
                    return Err(DataError::DuplicateName { kind: "Relation", name });
                }
                name
            }
            None => (1..)
                .map(|n| format!("Relation{n}"))
                .find(|candidate| self.relation(candidate).is_none())
                .unwrap_or_default(),
        };
        let child = self
            .position(&def.child_table)
            .ok_or_else(|| DataError::TableNotFound(def.child_table.clone()))?;
        let mut foreign_key = def.foreign_key;
        let parent = self
            .position(&foreign_key.parent_table)
            .ok_or_else(|| DataError::TableNotFound(foreign_key.parent_table.clone()))?;
        foreign_key.parent_table.clone_from(&self.tables[parent].name);
        if foreign_key.name.is_none() {
            foreign_key.name = Some(name.clone());
        }

        let mut handle = TableMut::new(&mut self.tables, child);
        let fk = handle.prepare_foreign_key(foreign_key, Some(name.clone()))?;
        let relation = DataRelation {
            name,
            parent_table: fk.parent_table.clone(),
            parent_columns: fk.parent_columns.clone(),
            child_table: handle.name.clone(),
            child_columns: fk.columns.clone(),
            parent_key: String::new(),
            foreign_key: fk.name.clone(),
        };
        handle.attach_foreign_key(fk)?;

        let parent_key = self.tables[parent]
            .constraints
            .iter()
            .filter_map(Constraint::as_unique)
            .find(|u| u.columns() == relation.parent_columns.as_slice())
            .map(|u| u.name().to_string())
            .unwrap_or_default();
        debug!(
            data_set = %self.name,
            relation = %relation.name,
            parent = %relation.parent_table,
            child = %relation.child_table,
            "relation added"
        );
        self.relations.push(DataRelation { parent_key, ..relation });
        Ok(&self.relations[self.relations.len() - 1])
    }

    /// Removes a relation together with its foreign key. The parent's unique
    /// constraint stays.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintNotFound` for unknown names.
    pub fn remove_relation(&mut self, name: &str) -> Result<()> {
        let position = self
            .relations
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| DataError::ConstraintNotFound(name.to_string()))?;
        let relation = self.relations.remove(position);
        if let Some(child) = self.position(&relation.child_table) {
            let fk = self.tables[child]
                .constraints
                .iter()
                .position(|c| c.name() == relation.foreign_key);
            if let Some(fk) = fk {
                TableMut::new(&mut self.tables, child).detach_constraint(fk);
            }
        }
        debug!(data_set = %self.name, relation = %name, "relation removed");
        Ok(())
    }

    fn resolve_relation(&self, name: &str) -> Result<(&DataRelation, &Table, &Table)> {
        let relation = self
            .relation(name)
            .ok_or_else(|| DataError::ConstraintNotFound(name.to_string()))?;
        let parent = self
            .table(&relation.parent_table)
            .ok_or_else(|| DataError::TableNotFound(relation.parent_table.clone()))?;
        let child = self
            .table(&relation.child_table)
            .ok_or_else(|| DataError::TableNotFound(relation.child_table.clone()))?;
        Ok((relation, parent, child))
    }

    /// Returns the child rows of a parent row through a relation. Deleted
    /// children are included only when the parent is deleted too; keys are
    /// read from the Original version of deleted rows.
    ///
    /// # Errors
    ///
    /// Fails for unknown relations and rows.
    pub fn child_rows(&self, relation: &str, parent_row: RowId) -> Result<Vec<RowId>> {
        let (relation, parent, child) = self.resolve_relation(relation)?;
        let record = parent.record(parent_row)?;
        let slot = record.view_slot();
        let key = parent
            .ordinals(&relation.parent_columns)
            .into_iter()
            .map(|o| parent.cell_value(record, o, slot))
            .collect::<Result<Vec<_>>>()?;
        if key.iter().any(Value::is_null) {
            return Ok(Vec::new());
        }
        let fk = child
            .constraint(&relation.foreign_key)
            .and_then(Constraint::as_foreign_key)
            .ok_or_else(|| DataError::ConstraintNotFound(relation.foreign_key.clone()))?;
        let deleted = record.state == RowState::Deleted;
        Ok(child.children_of(fk, &key, deleted))
    }

    /// Returns the parent row of a child row through a relation, or `None`
    /// when the child key is NULL or has no parent.
    ///
    /// # Errors
    ///
    /// Fails for unknown relations and rows.
    pub fn parent_row(&self, relation: &str, child_row: RowId) -> Result<Option<RowId>> {
        let (relation, parent, child) = self.resolve_relation(relation)?;
        let record = child.record(child_row)?;
        let slot = record.view_slot();
        let mut key = Vec::with_capacity(relation.child_columns.len());
        for (c, p) in child
            .ordinals(&relation.child_columns)
            .into_iter()
            .zip(parent.ordinals(&relation.parent_columns))
        {
            let value = child.cell_value(record, c, slot)?;
            match value.coerce(parent.columns[p].data_type) {
                Some(value) if !value.is_null() => key.push(value),
                _ => return Ok(None),
            }
        }
        Ok(parent.find_by_key(&relation.parent_columns, &key))
    }

    // ===== Set-wide operations =====

    /// Returns true if any table has pending changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.tables.iter().any(Table::has_changes)
    }

    /// Accepts the pending changes of every table, in table order.
    ///
    /// # Errors
    ///
    /// Stops at the first table that fails; earlier tables stay accepted.
    pub fn accept_changes(&mut self) -> Result<()> {
        for index in 0..self.tables.len() {
            TableMut::new(&mut self.tables, index).accept_changes()?;
        }
        debug!(data_set = %self.name, "changes accepted");
        Ok(())
    }

    /// Rejects the pending changes of every table, in table order.
    ///
    /// # Errors
    ///
    /// Stops at the first table that fails; earlier tables stay rejected.
    pub fn reject_changes(&mut self) -> Result<()> {
        for index in 0..self.tables.len() {
            TableMut::new(&mut self.tables, index).reject_changes()?;
        }
        debug!(data_set = %self.name, "changes rejected");
        Ok(())
    }

    /// Removes every row of every table. Relations and constraints stay.
    pub fn clear(&mut self) {
        for index in 0..self.tables.len() {
            TableMut::new(&mut self.tables, index).clear_rows();
        }
    }

    /// Turns constraint enforcement on or off for every table. Turning it on
    /// validates every table; if any fails, enforcement stays off everywhere
    /// and all violations are reported.
    ///
    /// # Errors
    ///
    /// `Multiple` with one error per violation across all tables.
    pub fn set_enforce_constraints(&mut self, enforce: bool) -> Result<()> {
        self.options.enforce_constraints = enforce;
        let mut errors = Vec::new();
        for index in 0..self.tables.len() {
            if let Err(err) = TableMut::new(&mut self.tables, index).set_enforce_constraints(enforce) {
                match err {
                    DataError::Multiple(inner) => errors.extend(inner),
                    other => errors.push(other),
                }
            }
        }
        if errors.is_empty() {
            return Ok(());
        }
        for index in 0..self.tables.len() {
            TableMut::new(&mut self.tables, index).set_enforce_constraints(false)?;
        }
        self.options.enforce_constraints = false;
        Err(DataError::Multiple(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDef;
    use crate::error::ErrorKind;
    use crate::value::DataType;

    fn shop() -> DataSet {
        let mut set = DataSet::new("Shop");
        let mut customers = set.create_table("Customers").unwrap();
        customers.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
        customers.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
        customers.set_primary_key(["Id"]).unwrap();
        customers.insert([Value::from(1), Value::from("Ann")]).unwrap();
        customers.insert([Value::from(2), Value::from("Bob")]).unwrap();

        let mut orders = set.create_table("Orders").unwrap();
        orders.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
        orders.add_column(ColumnDef::new("CustomerId", DataType::Integer)).unwrap();
        orders.set_primary_key(["Id"]).unwrap();
        orders.insert([10, 1]).unwrap();
        orders.insert([11, 1]).unwrap();
        orders.insert([12, 2]).unwrap();

        set.add_relation(RelationDef::new("Customers", ["Id"], "Orders", ["CustomerId"]).name("CustomerOrders"))
            .unwrap();
        set.accept_changes().unwrap();
        set
    }

    fn customer(set: &DataSet, id: i64) -> RowId {
        set.table("Customers")
            .unwrap()
            .find([Value::from(id)])
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_table_names_are_unique_ignoring_case() {
        let mut set = shop();
        assert!(matches!(
            set.create_table("customers"),
            Err(DataError::DuplicateName { kind: "Table", .. })
        ));
        assert_eq!(set.table("ORDERS").unwrap().name(), "Orders");
        assert!(set.table_mut("Missing").is_err());
    }

    #[test]
    fn test_relation_creates_constraints() {
        let set = shop();
        let relation = set.relation("CustomerOrders").unwrap();
        assert_eq!(relation.parent_table(), "Customers");
        assert_eq!(relation.foreign_key(), "CustomerOrders");
        let orders = set.table("Orders").unwrap();
        let fk = orders.constraint("CustomerOrders").unwrap().as_foreign_key().unwrap();
        assert_eq!(fk.relation(), Some("CustomerOrders"));
        let customers = set.table("Customers").unwrap();
        assert!(customers.constraint(relation.parent_key()).unwrap().as_unique().is_some());
    }

    #[test]
    fn test_generated_relation_names() {
        let mut set = shop();
        let mut lines = set.create_table("Lines").unwrap();
        lines.add_column(ColumnDef::new("OrderId", DataType::Integer)).unwrap();
        let relation = set.add_relation(RelationDef::new("Orders", ["Id"], "Lines", ["OrderId"])).unwrap();
        assert_eq!(relation.name(), "Relation1");

        let err = set
            .add_relation(RelationDef::new("Orders", ["Id"], "Lines", ["OrderId"]).name("CustomerOrders"))
            .unwrap_err();
        assert!(matches!(err, DataError::DuplicateName { kind: "Relation", .. }));
    }

    #[test]
    fn test_navigation() {
        let set = shop();
        let ann = customer(&set, 1);
        let children = set.child_rows("CustomerOrders", ann).unwrap();
        assert_eq!(children.len(), 2);
        let parent = set.parent_row("CustomerOrders", children[0]).unwrap();
        assert_eq!(parent, Some(ann));
        assert!(set.child_rows("Missing", ann).is_err());
    }

    #[test]
    fn test_cascade_delete_across_tables() {
        let mut set = shop();
        let ann = customer(&set, 1);
        set.table_mut("Customers").unwrap().delete_row(ann).unwrap();
        let orders = set.table("Orders").unwrap();
        let deleted = orders.rows().filter(|r| r.state() == RowState::Deleted).count();
        assert_eq!(deleted, 2);
        assert_eq!(set.child_rows("CustomerOrders", ann).unwrap().len(), 2);

        set.reject_changes().unwrap();
        assert!(!set.has_changes());
        assert_eq!(set.child_rows("CustomerOrders", ann).unwrap().len(), 2);
    }

    #[test]
    fn test_orphan_rejected() {
        let mut set = shop();
        let err = set.table_mut("Orders").unwrap().insert([13, 99]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[test]
    fn test_relation_blocks_removal() {
        let mut set = shop();
        assert!(set.remove_table("Orders").is_err());
        let err = set
            .table_mut("Orders")
            .unwrap()
            .remove_constraint("CustomerOrders")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);

        set.remove_relation("CustomerOrders").unwrap();
        assert!(set.table("Orders").unwrap().constraint("CustomerOrders").is_none());
        let orders = set.remove_table("Orders").unwrap();
        assert_eq!(orders.len(), 3);
        assert!(set.table("Orders").is_none());
    }

    #[test]
    fn test_enforcement_across_tables() {
        let mut set = shop();
        set.set_enforce_constraints(false).unwrap();
        set.table_mut("Orders").unwrap().insert([13, 99]).unwrap();
        set.table_mut("Customers").unwrap().insert([Value::from(1), Value::from("Dup")]).unwrap();

        let err = set.set_enforce_constraints(true).unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(set.tables().iter().all(|t| !t.enforces_constraints()));
        assert!(!set.options().enforce_constraints);

        set.reject_changes().unwrap();
        set.set_enforce_constraints(true).unwrap();
        assert!(set.tables().iter().all(Table::enforces_constraints));
    }

    #[test]
    fn test_clear_keeps_schema() {
        let mut set = shop();
        set.clear();
        assert!(set.tables().iter().all(Table::is_empty));
        assert_eq!(set.relations().len(), 1);
        assert_eq!(set.table("Orders").unwrap().columns().len(), 2);
    }
}
