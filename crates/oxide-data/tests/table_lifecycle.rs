//! Row lifecycle, the edit protocol, unique constraints and notifications
//! of a standalone table.

mod common;

use common::{add_person, init_tracing, people, record_events, Seen};
use oxide_data::{
    ColumnDef, DataError, DataType, ErrorKind, EventKind, RowAction, RowState, RowStateMask, RowVersion, Table,
    TableEvent, Value,
};

// =============================================================================
// Unique keys
// =============================================================================

fn ids_and_names() -> Table {
    let mut table = Table::new("T");
    table
        .add_column(ColumnDef::new("Id", DataType::Integer).not_null().unique())
        .unwrap();
    table.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
    table
}

#[test]
fn duplicate_key_is_rejected_and_table_is_unchanged() {
    init_tracing();
    let mut table = ids_and_names();
    table.insert([Value::from(1), Value::from("a")]).unwrap();

    let err = table.insert([Value::from(1), Value::from("b")]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(table.len(), 1);

    let second = table.insert([Value::from(2), Value::from("b")]).unwrap();
    let selected = table.select("Id > 1", "", RowStateMask::CURRENT_ROWS).unwrap();
    assert_eq!(selected, vec![second]);

    table.accept_changes().unwrap();
    let first = table.row_at(0).unwrap().id();
    table.delete_row(first).unwrap();
    table.accept_changes().unwrap();

    assert_eq!(table.len(), 1);
    let remaining = table.row_at(0).unwrap();
    assert_eq!(remaining.get("Id").unwrap(), Value::from(2));
}

#[test]
fn deleted_rows_release_their_key() {
    let mut table = ids_and_names();
    let first = table.insert([Value::from(1), Value::from("a")]).unwrap();
    table.accept_changes().unwrap();
    table.delete_row(first).unwrap();

    let replacement = table.insert([Value::from(1), Value::from("again")]).unwrap();
    assert_eq!(table.row_state(replacement), RowState::Added);

    let err = table.edit().reject_row(first).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(table.row_state(first), RowState::Deleted);
}

#[test]
fn failed_update_leaves_row_untouched() {
    let mut table = ids_and_names();
    table.insert([Value::from(1), Value::from("a")]).unwrap();
    let second = table.insert([Value::from(2), Value::from("b")]).unwrap();
    table.accept_changes().unwrap();

    let err = table.set_value(second, "Id", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(err.row(), Some(second));
    assert_eq!(table.get(second, "Id", RowVersion::Current).unwrap(), Value::from(2));
    assert_eq!(table.row_state(second), RowState::Unchanged);
    assert!(!table.row(second).unwrap().has_version(RowVersion::Proposed));

    let err = table.set_value(second, "Id", "two").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    table.set_value(second, "Id", "3").unwrap();
    assert_eq!(table.get(second, "Id", RowVersion::Current).unwrap(), Value::from(3));
}

#[test]
fn first_registered_constraint_reports_the_violation() {
    let mut table = Table::new("Pairs");
    table.add_column(ColumnDef::new("A", DataType::Integer)).unwrap();
    table.add_column(ColumnDef::new("B", DataType::Integer)).unwrap();
    table.add_unique_constraint(Some("UniqueA"), ["A"]).unwrap();
    table.add_unique_constraint(Some("UniqueB"), ["B"]).unwrap();
    table.insert([1, 1]).unwrap();

    match table.insert([1, 1]).unwrap_err() {
        DataError::ConstraintViolation { constraint, .. } => assert_eq!(constraint, "UniqueA"),
        other => panic!("Expected a constraint violation, got {other:?}"),
    }
}

#[test]
fn null_and_length_checks() {
    let mut table = people();
    let err = table.insert([Value::Null, Value::Null, Value::from(3)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(table.is_empty());

    let mut edit = table.edit();
    edit.set_max_length("Name", Some(3)).unwrap();
    let err = edit.insert([Value::Null, Value::from("Anna")]).unwrap_err();
    assert!(matches!(err, DataError::MaxLengthExceeded { max: 3, length: 4, .. }));
}

#[test]
fn computed_columns_can_disallow_null() {
    let mut table = people();
    table
        .add_column(ColumnDef::new("Label", DataType::Text).expression("Name + '!'"))
        .unwrap();
    let ann = table.insert([Value::Null, Value::from("Ann"), Value::Null]).unwrap();

    table.edit().set_allow_null("Label", false).unwrap();
    assert!(!table.column("Label").unwrap().allow_null());
    assert_eq!(table.get(ann, "Label", RowVersion::Current).unwrap(), Value::from("Ann!"));

    let err = table.edit().set_allow_null("Age", false).unwrap_err();
    assert!(matches!(err, DataError::NullViolation { ref column, .. } if column == "Age"));
}

// =============================================================================
// Row states and versions
// =============================================================================

#[test]
fn state_machine_round_trip() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    assert_eq!(table.row_state(ann), RowState::Added);
    let err = table.get(ann, "Name", RowVersion::Original).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);

    table.accept_changes().unwrap();
    assert_eq!(table.row_state(ann), RowState::Unchanged);

    table.set_value(ann, "Age", 31).unwrap();
    assert_eq!(table.row_state(ann), RowState::Modified);
    assert_eq!(table.get(ann, "Age", RowVersion::Original).unwrap(), Value::from(30));
    assert_eq!(table.get(ann, "Age", RowVersion::Current).unwrap(), Value::from(31));

    table.delete_row(ann).unwrap();
    assert_eq!(table.row_state(ann), RowState::Deleted);
    let err = table.get(ann, "Age", RowVersion::Current).unwrap_err();
    assert!(matches!(err, DataError::DeletedRowInaccessible(_)));
    assert_eq!(table.get(ann, "Age", RowVersion::Original).unwrap(), Value::from(30));

    table.edit().reject_row(ann).unwrap();
    assert_eq!(table.row_state(ann), RowState::Unchanged);
    assert_eq!(table.get(ann, "Age", RowVersion::Current).unwrap(), Value::from(30));
}

#[test]
fn reject_restores_original_values_everywhere() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    let bob = add_person(&mut table, "Bob", 40);
    table.accept_changes().unwrap();

    table.set_value(ann, "Name", "Annie").unwrap();
    table.set_value(ann, "Age", Value::Null).unwrap();
    table.delete_row(bob).unwrap();
    let cy = add_person(&mut table, "Cy", 20);
    assert!(table.has_changes());

    table.reject_changes().unwrap();
    assert!(!table.has_changes());
    assert_eq!(table.row_state(cy), RowState::Detached);
    for row in table.rows() {
        for column in table.columns() {
            assert_eq!(
                row.get_version(column.name(), RowVersion::Current).unwrap(),
                row.get_version(column.name(), RowVersion::Original).unwrap()
            );
        }
    }
    assert_eq!(table.get(ann, "Name", RowVersion::Current).unwrap(), Value::from("Ann"));
}

#[test]
fn detached_rows_have_no_original_version() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    let err = table.get(ann, "Id", RowVersion::Original).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);

    table.reject_changes().unwrap();
    assert_eq!(table.row_state(ann), RowState::Detached);
    let err = table.get(ann, "Id", RowVersion::Original).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);
    assert_eq!(err.row(), Some(ann));
    let err = table.get(ann, "Id", RowVersion::Current).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RowState);

    let unknown = oxide_data::RowId(99);
    let err = table.get(unknown, "Id", RowVersion::Original).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RowState);
}

#[test]
fn assigning_the_same_value_still_modifies() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    table.accept_changes().unwrap();

    table.set_value(ann, "Age", 30).unwrap();
    assert_eq!(table.row_state(ann), RowState::Modified);
    assert!(table.has_changes());
    assert_eq!(table.select("", "", RowStateMask::MODIFIED).unwrap(), vec![ann]);
    assert_eq!(table.get_changes(RowStateMask::CHANGES).unwrap().len(), 1);

    table.reject_changes().unwrap();
    assert_eq!(table.row_state(ann), RowState::Unchanged);
}

#[test]
fn accept_makes_original_equal_current() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    add_person(&mut table, "Bob", 40);
    table.accept_changes().unwrap();
    table.set_value(ann, "Age", 33).unwrap();
    table.accept_changes().unwrap();

    for row in table.rows() {
        assert_eq!(row.state(), RowState::Unchanged);
        assert_eq!(row.values(RowVersion::Current).unwrap(), row.values(RowVersion::Original).unwrap());
    }
}

#[test]
fn edit_protocol() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    table.accept_changes().unwrap();

    let mut edit = table.edit();
    edit.begin_edit(ann).unwrap();
    edit.set_value(ann, "Name", "Anna").unwrap();
    edit.set_value(ann, "Age", 31).unwrap();
    assert_eq!(edit.get(ann, "Name", RowVersion::Proposed).unwrap(), Value::from("Anna"));
    assert_eq!(edit.get(ann, "Name", RowVersion::Current).unwrap(), Value::from("Ann"));
    assert_eq!(edit.get(ann, "Name", RowVersion::Default).unwrap(), Value::from("Anna"));
    edit.cancel_edit(ann).unwrap();
    assert_eq!(edit.row_state(ann), RowState::Unchanged);

    edit.begin_edit(ann).unwrap();
    edit.set_value(ann, "Age", 32).unwrap();
    edit.end_edit(ann).unwrap();
    assert_eq!(edit.row_state(ann), RowState::Modified);
    assert_eq!(edit.get(ann, "Age", RowVersion::Current).unwrap(), Value::from(32));
    let err = edit.get(ann, "Age", RowVersion::Proposed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);
}

#[test]
fn new_row_then_add() {
    let mut table = people();
    let mut row = table.new_row();
    assert_eq!(row.get("Id"), Some(&Value::from(1)));
    row.set("Name", "Ann").unwrap().set("Age", 30).unwrap();
    let ann = table.add_row(row).unwrap();
    assert_eq!(table.row_state(ann), RowState::Added);
    assert_eq!(table.find([1]).unwrap(), Some(ann));
}

#[test]
fn remove_row_purges_immediately() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    table.accept_changes().unwrap();
    table.edit().remove_row(ann).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.row_state(ann), RowState::Detached);
}

// =============================================================================
// Notifications
// =============================================================================

#[test]
fn notifications_arrive_in_order() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    table.accept_changes().unwrap();
    let seen = record_events(&mut table);

    table.set_value(ann, "Name", "Anna").unwrap();
    let column = |kind| Seen {
        kind,
        action: None,
        row: Some(ann),
        column: Some("Name".to_string()),
    };
    let row = |kind, action| Seen {
        kind,
        action: Some(action),
        row: Some(ann),
        column: None,
    };
    assert_eq!(
        *seen.borrow(),
        vec![
            column(EventKind::ColumnChanging),
            column(EventKind::ColumnChanged),
            row(EventKind::RowChanging, RowAction::Change),
            row(EventKind::RowChanged, RowAction::Change),
        ]
    );

    seen.borrow_mut().clear();
    table.delete_row(ann).unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![
            row(EventKind::RowDeleting, RowAction::Delete),
            row(EventKind::RowDeleted, RowAction::Delete),
        ]
    );
}

#[test]
fn listener_can_veto_a_change() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    table.accept_changes().unwrap();
    table.subscribe(|event: &TableEvent<'_>| {
        if event.kind == EventKind::ColumnChanging && event.proposed == Some(&Value::from("Mallory")) {
            return Err(DataError::Vetoed("no Mallory".into()));
        }
        if event.kind == EventKind::RowDeleting {
            return Err(DataError::Vetoed("rows are permanent".into()));
        }
        Ok(())
    });

    let err = table.set_value(ann, "Name", "Mallory").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(table.get(ann, "Name", RowVersion::Current).unwrap(), Value::from("Ann"));
    assert_eq!(table.row_state(ann), RowState::Unchanged);

    let err = table.delete_row(ann).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(table.row_state(ann), RowState::Unchanged);

    table.set_value(ann, "Name", "Anna").unwrap();
    assert_eq!(table.row_state(ann), RowState::Modified);
}

#[test]
fn unsubscribed_listener_is_silent() {
    let mut table = people();
    let seen = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = std::rc::Rc::clone(&seen);
    let id = table.subscribe(move |_: &TableEvent<'_>| {
        counter.set(counter.get() + 1);
        Ok(())
    });
    add_person(&mut table, "Ann", 30);
    assert_eq!(seen.get(), 2);
    assert!(table.unsubscribe(id));
    add_person(&mut table, "Bob", 40);
    assert_eq!(seen.get(), 2);
    assert!(!table.unsubscribe(id));
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn select_sorts_and_filters() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    let bob = add_person(&mut table, "Bob", 40);
    let cy = add_person(&mut table, "cy", 30);

    let by_age = table.select("", "Age DESC, Name", RowStateMask::CURRENT_ROWS).unwrap();
    assert_eq!(by_age, vec![bob, ann, cy]);

    let young = table.select("Age < 35 AND Name LIKE 'C%'", "", RowStateMask::CURRENT_ROWS).unwrap();
    assert_eq!(young, vec![cy]);

    let added = table.select("", "", RowStateMask::ADDED).unwrap();
    assert_eq!(added.len(), 3);
    assert!(table.select("", "", RowStateMask::UNCHANGED).unwrap().is_empty());
    assert!(table.select("Nope = 1", "", RowStateMask::ALL).is_err());
}

#[test]
fn compute_aggregates() {
    let mut table = people();
    add_person(&mut table, "Ann", 30);
    add_person(&mut table, "Bob", 40);
    table.insert([Value::Null, Value::from("Cy"), Value::Null]).unwrap();

    assert_eq!(table.compute("Sum(Age)", "").unwrap(), Value::from(70));
    assert_eq!(table.compute("Count(Age)", "").unwrap(), Value::from(2));
    assert_eq!(table.compute("Avg(Age)", "").unwrap(), Value::from(35.0));
    assert_eq!(table.compute("Max(Age)", "Name <> 'Bob'").unwrap(), Value::from(30));
}

#[test]
fn get_changes_copies_only_matching_rows() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    add_person(&mut table, "Bob", 40);
    table.accept_changes().unwrap();
    assert!(table.get_changes(RowStateMask::CHANGES).is_none());

    table.set_value(ann, "Age", 31).unwrap();
    add_person(&mut table, "Cy", 20);
    let changes = table.get_changes(RowStateMask::CHANGES).unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes.columns().len(), 3);
    let states: Vec<RowState> = changes.rows().map(|r| r.state()).collect();
    assert_eq!(states, [RowState::Modified, RowState::Added]);
}
