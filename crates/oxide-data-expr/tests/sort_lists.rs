//! Parsing of sort lists.

mod common;

use common::sort;
use oxide_data_expr::{parse_sort, SortDirection, SortItem};

#[test]
fn test_default_direction_is_ascending() {
    assert_eq!(sort("Name"), vec![SortItem::asc("Name")]);
}

#[test]
fn test_mixed_directions() {
    let items = sort("Region DESC, [Customer Name] ASC, Id");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].direction, SortDirection::Desc);
    assert_eq!(items[1].column, "Customer Name");
    assert_eq!(items[2].direction, SortDirection::Asc);
}

#[test]
fn test_blank_sort_is_empty() {
    assert!(sort("").is_empty());
    assert!(sort("  ").is_empty());
}

#[test]
fn test_invalid_sort_lists() {
    assert!(parse_sort("Name DESC DESC").is_err());
    assert!(parse_sort(", Name").is_err());
    assert!(parse_sort("Len(Name)").is_err());
}

#[test]
fn test_display_reparses() {
    let items = sort(r"[a\]b] DESC, c");
    let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
    assert_eq!(sort(&rendered.join(", ")), items);
}
