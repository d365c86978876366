//! Live views: consistency with `select`, notifications and lookups.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{add_person, customer, init_tracing, people, shop};
use oxide_data::{
    DataView, ListChanged, ListChangedType, RowId, RowState, RowStateMask, Rule, Table, Value,
};

/// Small deterministic generator so the mutation sequence is reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }
}

fn assert_consistent(table: &Table, views: &[(DataView, &str, &str, RowStateMask)]) {
    for (view, filter, sort, mask) in views {
        let expected = table.select(filter, sort, *mask).unwrap();
        assert_eq!(view.row_ids(), expected, "view '{filter}' sorted by '{sort}' drifted");
    }
}

#[test]
fn view_matches_select_after_every_mutation() {
    init_tracing();
    let mut table = people();
    for (i, name) in ["Ann", "bob", "Cy", "dee", "Eve"].iter().enumerate() {
        add_person(&mut table, name, 20 + i64::try_from(i).unwrap() * 5);
    }
    table.accept_changes().unwrap();

    let shapes = [
        ("Age >= 30", "Name", RowStateMask::CURRENT_ROWS),
        ("", "Age DESC, Id", RowStateMask::ALL),
        ("Name LIKE '*e*'", "", RowStateMask::CHANGES),
        ("", "", RowStateMask::DELETED),
    ];
    let views: Vec<_> = shapes
        .iter()
        .map(|(filter, sort, mask)| {
            (
                DataView::new(&mut table, filter, sort, *mask).unwrap(),
                *filter,
                *sort,
                *mask,
            )
        })
        .collect();
    assert_consistent(&table, &views);

    let names = ["Fay", "gus", "Hal", "ivy", "Jo", "ann"];
    let mut rng = Lcg(7);
    for step in 0..200 {
        let ids: Vec<RowId> = table.rows().map(|r| r.id()).collect();
        let pick = |rng: &mut Lcg| ids[usize::try_from(rng.next(ids.len() as u64)).unwrap()];
        match rng.next(7) {
            0 => {
                let name = names[usize::try_from(rng.next(names.len() as u64)).unwrap()];
                let age = i64::try_from(rng.next(50)).unwrap();
                add_person(&mut table, name, age);
            }
            1 | 2 if !ids.is_empty() => {
                let age = i64::try_from(rng.next(60)).unwrap();
                let _ = table.set_value(pick(&mut rng), "Age", age);
            }
            3 if !ids.is_empty() => {
                let name = names[usize::try_from(rng.next(names.len() as u64)).unwrap()];
                let _ = table.set_value(pick(&mut rng), "Name", name);
            }
            4 if !ids.is_empty() => {
                let _ = table.delete_row(pick(&mut rng));
            }
            5 if !ids.is_empty() => {
                table.edit().reject_row(pick(&mut rng)).unwrap();
            }
            6 if step % 3 == 0 => table.accept_changes().unwrap(),
            _ => {}
        }
        assert_consistent(&table, &views);
    }
}

#[test]
fn notifications_describe_index_changes() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    let bob = add_person(&mut table, "Bob", 40);
    let view = DataView::new(&mut table, "Age > 18", "Age", RowStateMask::CURRENT_ROWS).unwrap();
    let changes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&changes);
    view.on_list_changed(move |change: &ListChanged| sink.borrow_mut().push(*change));

    let cy = add_person(&mut table, "Cy", 35);
    table.set_value(ann, "Age", 50).unwrap();
    table.set_value(bob, "Name", "Robert").unwrap();
    table.set_value(cy, "Age", 10).unwrap();
    view.set_sort(&table, "Name").unwrap();

    let kinds: Vec<(ListChangedType, Option<usize>, Option<usize>)> = changes
        .borrow()
        .iter()
        .map(|c| (c.kind, c.old_index, c.new_index))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (ListChangedType::ItemAdded, None, Some(1)),
            (ListChangedType::ItemMoved, Some(0), Some(2)),
            (ListChangedType::ItemChanged, Some(1), Some(1)),
            (ListChangedType::ItemDeleted, Some(0), None),
            (ListChangedType::Reset, None, None),
        ]
    );
    assert_eq!(view.row_ids(), vec![ann, bob]);
}

#[test]
fn find_uses_the_sort_key() {
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    let bob = add_person(&mut table, "Bob", 30);
    let cy = add_person(&mut table, "Cy", 25);
    let view = DataView::new(&mut table, "", "Age, Name", RowStateMask::CURRENT_ROWS).unwrap();

    assert_eq!(view.find(&table, [30]).unwrap(), Some(1));
    assert_eq!(view.find(&table, [Value::from(30), Value::from("bob")]).unwrap(), Some(2));
    assert_eq!(view.find(&table, [99]).unwrap(), None);
    assert_eq!(view.find_rows(&table, [30]).unwrap(), vec![ann, bob]);
    assert_eq!(view.find_by(&table, ["Name"], ["cy"]).unwrap(), vec![cy]);

    let by_key = DataView::new(&mut table, "", "", RowStateMask::CURRENT_ROWS).unwrap();
    assert_eq!(by_key.find(&table, [3]).unwrap(), Some(2));
    assert!(by_key.find(&table, [3, 4]).is_err());
}

#[test]
fn add_new_and_delete_through_the_view() {
    let mut table = people();
    add_person(&mut table, "Ann", 30);
    let view = DataView::new(&mut table, "", "Name", RowStateMask::CURRENT_ROWS).unwrap();

    let mut edit = table.edit();
    let zed = view
        .add_new(&mut edit, |row| {
            row.set("Name", "Aaron")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(view.row_id(0), Some(zed));
    assert_eq!(edit.row_state(zed), RowState::Added);

    view.delete(&mut edit, 1).unwrap();
    assert_eq!(view.len(), 1);
    assert!(view.delete(&mut edit, 5).is_err());
}

#[test]
fn view_follows_cascades_from_another_table() {
    let mut set = shop(Rule::Cascade);
    let view = {
        let mut orders = set.table_mut("Orders").unwrap();
        DataView::attach(&mut orders, "", "Id", RowStateMask::CURRENT_ROWS).unwrap()
    };
    assert_eq!(view.len(), 3);

    let five = customer(&set, 5);
    set.table_mut("Customers").unwrap().delete_row(five).unwrap();
    let orders = set.table("Orders").unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.row(orders, 0).unwrap().get("Id").unwrap(), Value::from(102));
}

#[test]
fn renamed_columns_keep_the_view_bound() {
    init_tracing();
    let mut table = people();
    let ann = add_person(&mut table, "Ann", 30);
    let bob = add_person(&mut table, "Bob", 40);
    let cy = add_person(&mut table, "Cy", 20);
    let view = DataView::new(
        &mut table,
        "Age >= 30 AND Name <> 'Zed'",
        "Age DESC, Name",
        RowStateMask::CURRENT_ROWS,
    )
    .unwrap();
    assert_eq!(view.row_ids(), vec![bob, ann]);

    table.edit().rename_column("Age", "Years").unwrap();
    assert_eq!(view.row_ids(), vec![bob, ann]);
    assert_eq!(view.filter(), "[Years] >= 30 AND Name <> 'Zed'");
    assert_eq!(view.sort(), "[Years] DESC, [Name] ASC");

    table.set_value(cy, "Years", 50).unwrap();
    assert_eq!(view.row_ids(), vec![cy, bob, ann]);
    view.set_sort(&table, "Name").unwrap();
    assert_eq!(view.row_ids(), vec![ann, bob, cy]);
    assert_eq!(view.row_ids(), table.select(&view.filter(), "Name", RowStateMask::CURRENT_ROWS).unwrap());

    table.edit().remove_column("Years").unwrap();
    assert!(view.is_empty());
}

#[test]
fn to_table_copies_visible_rows_in_order() {
    let mut table = people();
    add_person(&mut table, "Ann", 30);
    add_person(&mut table, "Bob", 40);
    add_person(&mut table, "Cy", 20);
    let view = DataView::new(&mut table, "Age >= 30", "Age DESC", RowStateMask::CURRENT_ROWS).unwrap();

    let copy = view.to_table(&table).unwrap();
    let names: Vec<Value> = copy.rows().map(|r| r.get("Name").unwrap()).collect();
    assert_eq!(names, vec![Value::from("Bob"), Value::from("Ann")]);
    assert!(copy.rows().all(|r| r.state() == RowState::Unchanged));
}
