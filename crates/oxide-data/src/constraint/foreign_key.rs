//! Foreign-key constraints.

use serde::{Deserialize, Serialize};

use super::{AcceptRejectRule, Rule};
use crate::column::ColumnId;

/// A reference from child columns to a unique key of a parent table.
///
/// The constraint lives in the child table and names the parent table, which
/// may be the child table itself.
#[derive(Debug, Clone)]
pub struct ForeignKeyConstraint {
    pub(crate) name: String,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) parent_table: String,
    pub(crate) parent_columns: Vec<ColumnId>,
    pub(crate) delete_rule: Rule,
    pub(crate) update_rule: Rule,
    pub(crate) accept_reject_rule: AcceptRejectRule,
    /// Relation that owns this constraint; it cannot be removed on its own.
    pub(crate) relation: Option<String>,
}

impl ForeignKeyConstraint {
    /// Returns the constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the child columns.
    #[must_use]
    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    /// Returns the parent table name.
    #[must_use]
    pub fn parent_table(&self) -> &str {
        &self.parent_table
    }

    /// Returns the referenced parent columns.
    #[must_use]
    pub fn parent_columns(&self) -> &[ColumnId] {
        &self.parent_columns
    }

    /// Returns the rule applied when a parent row is deleted.
    #[must_use]
    pub const fn delete_rule(&self) -> Rule {
        self.delete_rule
    }

    /// Returns the rule applied when a parent key changes.
    #[must_use]
    pub const fn update_rule(&self) -> Rule {
        self.update_rule
    }

    /// Returns the accept/reject propagation rule.
    #[must_use]
    pub const fn accept_reject_rule(&self) -> AcceptRejectRule {
        self.accept_reject_rule
    }

    /// Returns the relation owning this constraint, if any.
    #[must_use]
    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    pub(crate) fn references_parent(&self, table: &str, column: ColumnId) -> bool {
        self.parent_table == table && self.parent_columns.contains(&column)
    }
}

/// Definition of a foreign key to add to a child table.
///
/// ```rust
/// use oxide_data::{ForeignKeyDef, Rule};
///
/// let fk = ForeignKeyDef::new(["CustomerId"], "Customers", ["Id"]).on_delete(Rule::SetNull);
/// assert_eq!(fk.delete_rule, Rule::SetNull);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    /// Constraint name; generated when absent.
    pub name: Option<String>,
    /// Child column names.
    pub columns: Vec<String>,
    /// Parent table name.
    pub parent_table: String,
    /// Parent column names.
    pub parent_columns: Vec<String>,
    /// Delete rule.
    #[serde(default)]
    pub delete_rule: Rule,
    /// Update rule.
    #[serde(default)]
    pub update_rule: Rule,
    /// Accept/reject rule.
    #[serde(default)]
    pub accept_reject_rule: AcceptRejectRule,
}

impl ForeignKeyDef {
    /// Creates a definition with cascading delete and update rules.
    pub fn new<C, P>(columns: C, parent_table: impl Into<String>, parent_columns: P) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            parent_table: parent_table.into(),
            parent_columns: parent_columns.into_iter().map(Into::into).collect(),
            delete_rule: Rule::default(),
            update_rule: Rule::default(),
            accept_reject_rule: AcceptRejectRule::default(),
        }
    }

    /// Names the constraint.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the delete rule.
    #[must_use]
    pub const fn on_delete(mut self, rule: Rule) -> Self {
        self.delete_rule = rule;
        self
    }

    /// Sets the update rule.
    #[must_use]
    pub const fn on_update(mut self, rule: Rule) -> Self {
        self.update_rule = rule;
        self
    }

    /// Sets the accept/reject rule.
    #[must_use]
    pub const fn accept_reject(mut self, rule: AcceptRejectRule) -> Self {
        self.accept_reject_rule = rule;
        self
    }
}
