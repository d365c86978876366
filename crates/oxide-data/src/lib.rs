//! # oxide-data
//!
//! In-memory relational tables with versioned rows, constraints and live
//! views.
//!
//! This crate provides:
//! - Tables of typed columns whose rows keep Original, Current and Proposed
//!   versions and move through a row-state machine
//! - Unique and foreign-key constraints with cascading delete and update rules
//! - Change events that listeners can veto, with the whole edit rolled back
//! - One-shot queries (`select`, `compute`, `get_changes`) and live
//!   [`DataView`]s that stay sorted and filtered as the table changes
//! - Data sets with relations, bulk loading and serializable schema snapshots
//!
//! ```rust
//! use oxide_data::{ColumnDef, DataType, RowState, RowStateMask, Table, Value};
//!
//! let mut people = Table::new("People");
//! people.add_column(ColumnDef::new("Id", DataType::Integer).auto_increment(1, 1)).unwrap();
//! people.add_column(ColumnDef::new("Name", DataType::Text).not_null()).unwrap();
//! people.set_primary_key(["Id"]).unwrap();
//!
//! let ann = people.insert([Value::Null, Value::from("Ann")]).unwrap();
//! people.insert([Value::Null, Value::from("Bob")]).unwrap();
//! people.accept_changes().unwrap();
//!
//! people.set_value(ann, "Name", "Anna").unwrap();
//! assert_eq!(people.row_state(ann), RowState::Modified);
//!
//! let found = people.select("Name LIKE 'a*'", "Name DESC", RowStateMask::CURRENT_ROWS).unwrap();
//! assert_eq!(found, vec![ann]);
//!
//! people.reject_changes().unwrap();
//! assert_eq!(people.row(ann).unwrap().get("Name").unwrap(), Value::from("Ann"));
//! ```
//!
//! Filters, sort lists and computed columns use the expression language of
//! the `oxide-data-expr` crate.

pub mod column;
pub mod constraint;
pub mod dataset;
pub mod error;
mod expr;
pub mod load;
pub mod options;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;
pub mod view;

pub use column::{AutoIncrement, Column, ColumnDef, ColumnId};
pub use constraint::{AcceptRejectRule, Constraint, ForeignKeyConstraint, ForeignKeyDef, Rule, UniqueConstraint};
pub use dataset::{DataRelation, DataSet, RelationDef};
pub use error::{DataError, ErrorKind, Result};
pub use load::{LoadOption, MemoryReader, TabularReader};
pub use options::{DataSetOptions, TableOptions};
pub use row::{ColumnKey, DataRow, RowId, RowState, RowStateMask, RowVersion};
pub use schema::{ConstraintSchema, DataSetSchema, RowSnapshot, TableSchema, TableSnapshot};
pub use table::{EventKind, ListenerId, NewRow, RowAction, Table, TableEvent, TableListener, TableMut};
pub use value::{parse_date_time, DataType, Value};
pub use view::{DataView, ListChanged, ListChangedType};
