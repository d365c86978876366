//! Table and data set options.

use serde::{Deserialize, Serialize};

/// Behavior switches of a single table.
///
/// Deserializes from partial documents; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Compare text case-sensitively in unique indexes, sorting, filtering
    /// and lookups.
    pub case_sensitive: bool,
    /// Validate constraints on every edit.
    pub enforce_constraints: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            enforce_constraints: true,
        }
    }
}

impl TableOptions {
    /// Sets case sensitivity.
    #[must_use]
    pub const fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Sets constraint enforcement.
    #[must_use]
    pub const fn enforce_constraints(mut self, enforce: bool) -> Self {
        self.enforce_constraints = enforce;
        self
    }
}

/// Behavior switches of a data set, applied to the tables it creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetOptions {
    /// Case sensitivity given to tables created by the data set.
    pub case_sensitive: bool,
    /// Constraint enforcement across every table of the set.
    pub enforce_constraints: bool,
}

impl Default for DataSetOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            enforce_constraints: true,
        }
    }
}

impl DataSetOptions {
    /// Returns the options a newly created member table starts with.
    #[must_use]
    pub const fn table_options(&self) -> TableOptions {
        TableOptions {
            case_sensitive: self.case_sensitive,
            enforce_constraints: self.enforce_constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = TableOptions::default();
        assert!(!options.case_sensitive);
        assert!(options.enforce_constraints);
    }

    #[test]
    fn test_partial_deserialize() {
        let options: TableOptions = serde_json::from_str(r#"{"case_sensitive": true}"#).unwrap();
        assert!(options.case_sensitive);
        assert!(options.enforce_constraints);

        let options: DataSetOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, DataSetOptions::default());
    }
}
