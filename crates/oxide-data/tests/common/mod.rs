#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use oxide_data::{
    ColumnDef, DataSet, DataType, EventKind, RelationDef, RowAction, RowId, Rule, Table, TableEvent, Value,
};
use tracing::Level;

/// Installs a debug-level subscriber writing to the test output. Safe to
/// call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// `People(Id Integer auto PK, Name Text not null, Age Integer)`.
pub fn people() -> Table {
    let mut table = Table::new("People");
    table
        .add_column(ColumnDef::new("Id", DataType::Integer).auto_increment(1, 1))
        .unwrap();
    table
        .add_column(ColumnDef::new("Name", DataType::Text).not_null())
        .unwrap();
    table.add_column(ColumnDef::new("Age", DataType::Integer)).unwrap();
    table.set_primary_key(["Id"]).unwrap();
    table
}

pub fn add_person(table: &mut Table, name: &str, age: i64) -> RowId {
    table
        .insert([Value::Null, Value::from(name), Value::from(age)])
        .unwrap_or_else(|e| panic!("Failed to insert {name}: {e}"))
}

/// Customers 1..=5 and two orders for customer 5, joined by the
/// `CustomerOrders` relation with the given delete rule. Changes are
/// accepted.
pub fn shop(delete_rule: Rule) -> DataSet {
    let mut set = DataSet::new("Shop");
    let mut customers = set.create_table("Customers").unwrap();
    customers.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
    customers.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
    customers.set_primary_key(["Id"]).unwrap();
    for id in 1..=5 {
        customers
            .insert([Value::from(id), Value::from(format!("Customer {id}"))])
            .unwrap();
    }

    let mut orders = set.create_table("Orders").unwrap();
    orders.add_column(ColumnDef::new("Id", DataType::Integer)).unwrap();
    orders.add_column(ColumnDef::new("CustomerId", DataType::Integer)).unwrap();
    orders.add_column(ColumnDef::new("Total", DataType::Float)).unwrap();
    orders.set_primary_key(["Id"]).unwrap();
    orders.insert([Value::from(100), Value::from(5), Value::from(10.0)]).unwrap();
    orders.insert([Value::from(101), Value::from(5), Value::from(32.5)]).unwrap();
    orders.insert([Value::from(102), Value::from(1), Value::from(7.25)]).unwrap();

    set.add_relation(
        RelationDef::new("Customers", ["Id"], "Orders", ["CustomerId"])
            .name("CustomerOrders")
            .on_delete(delete_rule),
    )
    .unwrap();
    set.accept_changes().unwrap();
    set
}

pub fn customer(set: &DataSet, id: i64) -> RowId {
    set.table("Customers")
        .unwrap()
        .find([id])
        .unwrap()
        .unwrap_or_else(|| panic!("Customer {id} not found"))
}

/// One recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seen {
    pub kind: EventKind,
    pub action: Option<RowAction>,
    pub row: Option<RowId>,
    pub column: Option<String>,
}

/// Subscribes a listener recording every notification of `table`.
pub fn record_events(table: &mut Table) -> Rc<RefCell<Vec<Seen>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    table.subscribe(move |event: &TableEvent<'_>| {
        sink.borrow_mut().push(Seen {
            kind: event.kind,
            action: event.action,
            row: event.row,
            column: event.column.map(|c| c.name().to_string()),
        });
        Ok(())
    });
    seen
}
