//! Sort list AST types.

use core::fmt;

/// Sort direction of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Returns the keyword for the direction.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One key of a sort list, e.g. `Name DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortItem {
    /// The column name as written, without delimiters.
    pub column: String,
    /// The direction.
    pub direction: SortDirection,
}

impl SortItem {
    /// Creates an ascending sort key.
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Creates a descending sort key.
    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.column.replace('\\', "\\\\").replace(']', "\\]"),
            self.direction.as_str()
        )
    }
}
