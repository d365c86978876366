//! Bulk loading into tables that take part in relations.

mod common;

use common::{init_tracing, shop};
use oxide_data::{
    DataType, ErrorKind, LoadOption, MemoryReader, RowState, RowStateMask, RowVersion, Rule, Value,
};

fn orders_feed() -> MemoryReader {
    MemoryReader::new()
        .column("Id", Some(DataType::Integer))
        .column("CustomerId", Some(DataType::Integer))
        .column("Total", Some(DataType::Float))
        .row([Value::from(100), Value::from(5), Value::from(12.0)])
        .row([Value::from(103), Value::from(2), Value::from(4.5)])
        .row([Value::from(104), Value::from(3), Value::from(20.0)])
}

#[test]
fn load_merges_by_primary_key() {
    init_tracing();
    let mut set = shop(Rule::Cascade);
    let count = set
        .table_mut("Orders")
        .unwrap()
        .load(&mut orders_feed(), LoadOption::OverwriteChanges)
        .unwrap();
    assert_eq!(count, 3);

    let orders = set.table("Orders").unwrap();
    assert_eq!(orders.len(), 5);
    assert!(!orders.has_changes());
    let hundred = orders.find([100]).unwrap().unwrap();
    assert_eq!(orders.get(hundred, "Total", RowVersion::Original).unwrap(), Value::from(12.0));
    assert_eq!(orders.compute("Sum(Total)", "").unwrap(), Value::from(76.25));
    assert_eq!(orders.compute("Count(Id)", "CustomerId = 5").unwrap(), Value::from(2));
}

#[test]
fn upsert_leaves_pending_changes() {
    let mut set = shop(Rule::Cascade);
    set.table_mut("Orders")
        .unwrap()
        .load(&mut orders_feed(), LoadOption::Upsert)
        .unwrap();

    let orders = set.table("Orders").unwrap();
    let changed = orders.select("", "Id", RowStateMask::MODIFIED).unwrap();
    let added = orders.select("", "Id", RowStateMask::ADDED).unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(added.len(), 2);
    assert_eq!(orders.get(changed[0], "Total", RowVersion::Original).unwrap(), Value::from(10.0));

    set.reject_changes().unwrap();
    assert_eq!(set.table("Orders").unwrap().len(), 3);
}

#[test]
fn orphans_are_reported_when_the_load_ends() {
    let mut set = shop(Rule::Cascade);
    let mut reader = MemoryReader::new()
        .column("Id", None)
        .column("CustomerId", None)
        .row([200, 41])
        .row([201, 1])
        .row([202, 42]);

    let mut orders = set.table_mut("Orders").unwrap();
    let err = orders.load(&mut reader, LoadOption::PreserveChanges).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert_eq!(err.errors().len(), 2);
    assert!(orders.is_loading());
    assert_eq!(orders.get_errors().len(), 2);

    for id in [200, 202] {
        let orphan = orders.find([id]).unwrap().unwrap();
        orders.remove_row(orphan).unwrap();
    }
    orders.end_load_data().unwrap();
    assert!(!orders.is_loading());
    assert_eq!(orders.len(), 4);
}

#[test]
fn rows_loaded_one_at_a_time() {
    let mut set = shop(Rule::Cascade);
    let mut customers = set.table_mut("Customers").unwrap();
    customers.begin_load_data();
    let ann = customers.load_data_row([Value::from(1), Value::from("Ann")], true).unwrap();
    let six = customers.load_data_row([Value::from(6), Value::Null], false).unwrap();
    let dup = customers.insert([Value::from(6), Value::from("again")]).unwrap();
    let err = customers.end_load_data().unwrap_err();
    assert_eq!(err.errors().len(), 1);

    customers.remove_row(dup).unwrap();
    customers.end_load_data().unwrap();
    assert_eq!(customers.row_state(ann), RowState::Unchanged);
    assert_eq!(customers.get(ann, "Name", RowVersion::Original).unwrap(), Value::from("Ann"));
    assert_eq!(customers.row_state(six), RowState::Added);
    assert!(customers.get(six, "Name", RowVersion::Current).unwrap().is_null());
}
