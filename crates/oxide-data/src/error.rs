//! Error types for table, view and data set operations.

use oxide_data_expr::ParseError;

use crate::row::{RowId, RowState, RowVersion};
use crate::value::DataType;

/// Broad classification of a [`DataError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Duplicate names, unknown columns or tables, invalid schema changes.
    SchemaViolation,
    /// Uniqueness, foreign-key, non-null or max-length violations.
    ConstraintViolation,
    /// A value could not be converted to the column type.
    TypeMismatch,
    /// The operation is invalid for the row's current state.
    RowState,
    /// The requested row version does not exist.
    VersionNotFound,
    /// An expression failed to parse, bind or evaluate.
    Expression,
    /// A change listener vetoed the edit.
    Cancelled,
}

/// Errors that can occur while working with tables, views and data sets.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// A column, table, constraint or relation name is already taken.
    #[error("{kind} '{name}' already exists")]
    DuplicateName {
        /// What kind of object carries the name.
        kind: &'static str,
        /// The duplicate name.
        name: String,
    },

    /// No column with the given name or ordinal exists.
    #[error("Column '{column}' does not belong to table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// The requested column.
        column: String,
    },

    /// No table with the given name exists.
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    /// No constraint or relation with the given name exists.
    #[error("Constraint or relation '{0}' not found")]
    ConstraintNotFound(String),

    /// A schema change is not allowed in the current state.
    #[error("Invalid schema change on table '{table}': {message}")]
    InvalidSchema {
        /// Table name.
        table: String,
        /// Why the change was rejected.
        message: String,
    },

    /// A unique or foreign-key constraint is violated.
    #[error("Constraint '{constraint}' on table '{table}' violated: {message}")]
    ConstraintViolation {
        /// Constraint name.
        constraint: String,
        /// Table owning the constraint.
        table: String,
        /// The offending row, if the violation is tied to one.
        row: Option<RowId>,
        /// Details.
        message: String,
    },

    /// A non-nullable column would hold NULL.
    #[error("Column '{column}' of table '{table}' does not allow nulls")]
    NullViolation {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The offending row, if already attached.
        row: Option<RowId>,
    },

    /// A value cannot be converted to the column type.
    #[error("Cannot store {found} in column '{column}' of type {expected}")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// The column type.
        expected: DataType,
        /// Description of the rejected value.
        found: String,
    },

    /// A text value is longer than the column allows.
    #[error("Column '{column}' of table '{table}' is limited to {max} characters, got {length}")]
    MaxLengthExceeded {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Maximum length.
        max: usize,
        /// Actual length.
        length: usize,
    },

    /// The operation is not valid for the row's state.
    #[error("Cannot {operation} row {row} in state {state}")]
    RowState {
        /// The row.
        row: RowId,
        /// Its state.
        state: RowState,
        /// The attempted operation.
        operation: &'static str,
    },

    /// The current values of a deleted row were requested.
    #[error("Row {0} has been deleted; only its original values are accessible")]
    DeletedRowInaccessible(RowId),

    /// The requested version does not exist for the row.
    #[error("Row {row} has no {version} version")]
    VersionNotFound {
        /// The row.
        row: RowId,
        /// The missing version.
        version: RowVersion,
    },

    /// The row is not part of the table (never added, rejected or purged).
    #[error("Row {0} is detached from the table")]
    RowNotFound(RowId),

    /// The column cannot be written.
    #[error("Column '{0}' is read only")]
    ReadOnly(String),

    /// An expression could not be bound or evaluated.
    #[error("Expression error: {0}")]
    Expression(String),

    /// An expression could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A change listener cancelled the edit.
    #[error("Change vetoed: {0}")]
    Vetoed(String),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<DataError>),
}

impl DataError {
    /// Returns the broad classification of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateName { .. }
            | Self::ColumnNotFound { .. }
            | Self::TableNotFound(_)
            | Self::ConstraintNotFound(_)
            | Self::InvalidSchema { .. }
            | Self::ReadOnly(_) => ErrorKind::SchemaViolation,
            Self::ConstraintViolation { .. }
            | Self::NullViolation { .. }
            | Self::MaxLengthExceeded { .. } => ErrorKind::ConstraintViolation,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::RowState { .. } | Self::DeletedRowInaccessible(_) | Self::RowNotFound(_) => {
                ErrorKind::RowState
            }
            Self::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            Self::Expression(_) | Self::Parse(_) => ErrorKind::Expression,
            Self::Vetoed(_) => ErrorKind::Cancelled,
            Self::Multiple(errors) => errors
                .first()
                .map_or(ErrorKind::ConstraintViolation, Self::kind),
        }
    }

    /// Returns the row the error is tied to, if any.
    #[must_use]
    pub const fn row(&self) -> Option<RowId> {
        match self {
            Self::ConstraintViolation { row, .. } | Self::NullViolation { row, .. } => *row,
            Self::RowState { row, .. } | Self::VersionNotFound { row, .. } => Some(*row),
            Self::DeletedRowInaccessible(row) | Self::RowNotFound(row) => Some(*row),
            _ => None,
        }
    }

    /// Returns the individual errors: the inner list for `Multiple`, or the
    /// error itself.
    #[must_use]
    pub fn errors(&self) -> Vec<&Self> {
        match self {
            Self::Multiple(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }

    pub(crate) fn expression(message: impl Into<String>) -> Self {
        Self::Expression(message.into())
    }

    pub(crate) fn invalid_schema(table: &str, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            table: table.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err = DataError::NullViolation {
            table: "T".into(),
            column: "Id".into(),
            row: None,
        };
        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
        assert_eq!(
            DataError::DeletedRowInaccessible(RowId(3)).kind(),
            ErrorKind::RowState
        );
        assert_eq!(DataError::Vetoed("no".into()).kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_multiple_lists_every_error() {
        let err = DataError::Multiple(vec![
            DataError::TableNotFound("A".into()),
            DataError::ReadOnly("B".into()),
        ]);
        let text = err.to_string();
        assert!(text.contains("Table 'A' not found"));
        assert!(text.contains("Column 'B' is read only"));
        assert_eq!(err.errors().len(), 2);
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
    }
}
