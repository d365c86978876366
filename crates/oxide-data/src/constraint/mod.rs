//! Unique and foreign-key constraints.

mod foreign_key;
mod unique;

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;

pub use foreign_key::{ForeignKeyConstraint, ForeignKeyDef};
pub use unique::UniqueConstraint;
pub(crate) use unique::normalize as normalize_key;

/// What happens to child rows when the referenced parent key is deleted or
/// changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    /// Fail the parent operation while child rows exist.
    None,
    /// Set the child columns to NULL.
    SetNull,
    /// Set the child columns to their default values.
    SetDefault,
    /// Delete the child rows, or update their keys.
    #[default]
    Cascade,
}

/// Whether accepting or rejecting a parent row does the same to its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcceptRejectRule {
    /// Children are left alone.
    #[default]
    None,
    /// Children are accepted or rejected with the parent.
    Cascade,
}

/// A constraint registered on a table.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Uniqueness over one or more columns, optionally the primary key.
    Unique(UniqueConstraint),
    /// Reference from this table's columns to a unique key of a parent table.
    ForeignKey(ForeignKeyConstraint),
}

impl Constraint {
    /// Returns the constraint name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Unique(unique) => unique.name(),
            Self::ForeignKey(fk) => fk.name(),
        }
    }

    /// Returns the constrained columns of the owning table.
    #[must_use]
    pub fn columns(&self) -> &[ColumnId] {
        match self {
            Self::Unique(unique) => unique.columns(),
            Self::ForeignKey(fk) => fk.columns(),
        }
    }

    /// Returns the unique constraint, if this is one.
    #[must_use]
    pub const fn as_unique(&self) -> Option<&UniqueConstraint> {
        match self {
            Self::Unique(unique) => Some(unique),
            Self::ForeignKey(_) => None,
        }
    }

    /// Returns the foreign key, if this is one.
    #[must_use]
    pub const fn as_foreign_key(&self) -> Option<&ForeignKeyConstraint> {
        match self {
            Self::ForeignKey(fk) => Some(fk),
            Self::Unique(_) => None,
        }
    }

    pub(crate) fn as_unique_mut(&mut self) -> Option<&mut UniqueConstraint> {
        match self {
            Self::Unique(unique) => Some(unique),
            Self::ForeignKey(_) => None,
        }
    }

    pub(crate) fn references_column(&self, column: ColumnId) -> bool {
        self.columns().contains(&column)
    }
}
