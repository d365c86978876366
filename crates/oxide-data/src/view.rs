//! Live, filtered and sorted views over a table.
//!
//! A [`DataView`] keeps an ordered index of row ids. It subscribes to the
//! table's notifications and, for each changed row, re-evaluates the filter
//! for that row only and moves it to its sorted position. Schema changes and
//! `clear` rebuild the index.
//!
//! The view does not borrow the table: methods that read rows take the table
//! as an argument, and the subscription ends by itself once the view is
//! dropped.

use core::cmp::Ordering;
use core::fmt;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use oxide_data_expr::{Expr, SortItem, Span};
use tracing::{debug, warn};

use crate::column::ColumnId;
use crate::error::{DataError, Result};
use crate::expr::BoundExpr;
use crate::row::{ColumnKey, DataRow, RowId, RowRecord, RowStateMask};
use crate::table::{EventKind, NewRow, SortKeys, Table, TableEvent, TableListener, TableMut};
use crate::value::Value;

/// How the index of a view changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListChangedType {
    /// A row entered the view at `new_index`.
    ItemAdded,
    /// The row at `old_index` left the view.
    ItemDeleted,
    /// The row at `new_index` changed in place.
    ItemChanged,
    /// A row moved from `old_index` to `new_index`.
    ItemMoved,
    /// The whole index was rebuilt.
    Reset,
}

/// A change of the index of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListChanged {
    /// What happened.
    pub kind: ListChangedType,
    /// Position after the change.
    pub new_index: Option<usize>,
    /// Position before the change.
    pub old_index: Option<usize>,
}

impl ListChanged {
    const fn reset() -> Self {
        Self {
            kind: ListChangedType::Reset,
            new_index: None,
            old_index: None,
        }
    }
}

type Observer = Box<dyn FnMut(&ListChanged)>;

/// A column name in the filter text and the column it bound to.
#[derive(Debug, Clone)]
struct ColumnReference {
    span: Span,
    name: String,
    id: ColumnId,
}

fn column_references(table: &Table, text: &str) -> Vec<ColumnReference> {
    let Ok(expr) = oxide_data_expr::parse_filter(text) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    expr.walk(&mut |e| {
        if let Expr::Column { name, span } = e {
            if let Some(ordinal) = table.column_ordinal(name) {
                found.push(ColumnReference {
                    span: *span,
                    name: name.clone(),
                    id: table.columns[ordinal].id,
                });
            }
        }
    });
    found
}

struct ViewState {
    filter_text: String,
    filter: Option<BoundExpr>,
    filter_columns: Vec<ColumnReference>,
    sort_text: String,
    sort: SortKeys,
    mask: RowStateMask,
    case_sensitive: bool,
    /// Sort key and id of every visible row, in view order.
    entries: Vec<(Vec<Value>, RowId)>,
    /// Sort key of every visible row, to find its entry by binary search.
    keys: BTreeMap<RowId, Vec<Value>>,
    observers: Vec<Observer>,
}

impl ViewState {
    fn compare(&self, a: &(Vec<Value>, RowId), b: &(Vec<Value>, RowId)) -> Ordering {
        self.sort
            .compare(&a.0, &b.0, self.case_sensitive)
            .then(a.1.cmp(&b.1))
    }

    fn rebuild(&mut self, table: &Table) -> Result<()> {
        self.case_sensitive = table.case_sensitive();
        let mut entries = Vec::new();
        for (id, record) in &table.rows {
            if table.admits(self.filter.as_ref(), self.mask, record)? {
                entries.push((self.sort.key(table, record)?, *id));
            }
        }
        entries.sort_by(|a, b| self.compare(a, b));
        self.keys = entries.iter().map(|(key, id)| (*id, key.clone())).collect();
        self.entries = entries;
        Ok(())
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
    }

    /// Binds the filter and sort texts and rebuilds the index.
    fn rebind(&mut self, table: &Table) -> Result<()> {
        self.filter = table.bind_filter(&self.filter_text)?;
        self.sort = SortKeys::parse(table, &self.sort_text)?;
        self.filter_columns = column_references(table, &self.filter_text);
        self.rebuild(table)
    }

    /// Rewrites the filter and sort texts for renamed columns: a name that
    /// no longer resolves to the column it was bound to is replaced by that
    /// column's current name.
    fn follow_renames(&mut self, table: &Table) {
        let current_name = |id: ColumnId| table.ordinal_of(id).map(|o| table.columns[o].name.clone());
        let resolves_to = |name: &str, id: ColumnId| {
            table
                .column_ordinal(name)
                .is_some_and(|o| table.columns[o].id == id)
        };

        let mut filter = self.filter_text.clone();
        let mut references = self.filter_columns.clone();
        references.sort_by_key(|r| core::cmp::Reverse(r.span.start));
        for reference in references {
            if resolves_to(&reference.name, reference.id) {
                continue;
            }
            if let Some(name) = current_name(reference.id) {
                if filter.get(reference.span.start..reference.span.end).is_some() {
                    filter.replace_range(reference.span.start..reference.span.end, &Expr::column(name).to_string());
                }
            }
        }

        let sort_moved = !self.sort_text.trim().is_empty()
            && SortKeys::parse(table, &self.sort_text).map_or(true, |keys| keys.keys != self.sort.keys);
        let sort = if sort_moved {
            self.sort
                .keys
                .iter()
                .map(|(id, direction)| {
                    current_name(*id).map(|column| {
                        SortItem {
                            column,
                            direction: *direction,
                        }
                        .to_string()
                    })
                })
                .collect::<Option<Vec<_>>>()
                .map(|items| items.join(", "))
        } else {
            None
        };

        if filter != self.filter_text || sort.is_some() {
            self.filter_text = filter;
            if let Some(sort) = sort {
                self.sort_text = sort;
            }
            debug!(table = %table.name, filter = %self.filter_text, sort = %self.sort_text, "view follows renamed columns");
        }
    }

    fn entry_for(&self, table: &Table, id: RowId) -> Option<(Vec<Value>, RowId)> {
        let record: &RowRecord = table.rows.get(&id)?;
        let admitted = table
            .admits(self.filter.as_ref(), self.mask, record)
            .and_then(|admitted| {
                if admitted {
                    self.sort.key(table, record).map(Some)
                } else {
                    Ok(None)
                }
            });
        match admitted {
            Ok(entry) => entry.map(|key| (key, id)),
            Err(err) => {
                warn!(table = %table.name, row = %id, error = %err, "view cannot evaluate row");
                None
            }
        }
    }

    /// Moves one row to where it belongs now.
    fn update_row(&mut self, table: &Table, id: RowId) -> Option<ListChanged> {
        let old_index = self.keys.remove(&id).and_then(|key| {
            let entry = (key, id);
            let position = self
                .entries
                .partition_point(|other| self.compare(other, &entry) == Ordering::Less);
            match self.entries.get(position) {
                Some((_, found)) if *found == id => Some(position),
                _ => self.entries.iter().position(|(_, e)| *e == id),
            }
        });
        let entry = self.entry_for(table, id);
        if let Some(old) = old_index {
            self.entries.remove(old);
        }
        let new_index = entry.map(|entry| {
            let position = self
                .entries
                .partition_point(|other| self.compare(other, &entry) == Ordering::Less);
            self.keys.insert(id, entry.0.clone());
            self.entries.insert(position, entry);
            position
        });
        let kind = match (old_index, new_index) {
            (None, None) => return None,
            (None, Some(_)) => ListChangedType::ItemAdded,
            (Some(_), None) => ListChangedType::ItemDeleted,
            (Some(old), Some(new)) if old == new => ListChangedType::ItemChanged,
            (Some(_), Some(_)) => ListChangedType::ItemMoved,
        };
        Some(ListChanged {
            kind,
            new_index,
            old_index,
        })
    }

    fn handle(&mut self, event: &TableEvent<'_>) -> Option<ListChanged> {
        match (event.kind, event.row) {
            (EventKind::RowChanged | EventKind::RowDeleted, Some(id)) => self.update_row(event.table, id),
            (EventKind::TableCleared, _) => {
                self.clear();
                Some(ListChanged::reset())
            }
            (EventKind::SchemaChanged, _) => {
                self.follow_renames(event.table);
                if let Err(err) = self.rebind(event.table) {
                    warn!(table = %event.table.name, error = %err, "view no longer binds; it is now empty");
                    self.clear();
                }
                Some(ListChanged::reset())
            }
            _ => None,
        }
    }
}

fn notify(state: &Rc<RefCell<ViewState>>, change: ListChanged) {
    let Ok(mut inner) = state.try_borrow_mut() else {
        return;
    };
    let mut observers = core::mem::take(&mut inner.observers);
    drop(inner);
    for observer in &mut observers {
        observer(&change);
    }
    if let Ok(mut inner) = state.try_borrow_mut() {
        observers.append(&mut inner.observers);
        inner.observers = observers;
    }
}

/// The table-side subscription of a view.
struct ViewListener {
    state: Weak<RefCell<ViewState>>,
}

impl TableListener for ViewListener {
    fn on_event(&mut self, event: &TableEvent<'_>) -> Result<()> {
        let Some(state) = self.state.upgrade() else {
            return Ok(());
        };
        let change = match state.try_borrow_mut() {
            Ok(mut inner) => inner.handle(event),
            Err(_) => {
                warn!(table = %event.table.name, "view is busy; notification skipped");
                None
            }
        };
        if let Some(change) = change {
            notify(&state, change);
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }
}

/// A live filtered and sorted projection of a table.
///
/// ```
/// use oxide_data::{ColumnDef, DataType, DataView, RowStateMask, Table, Value};
///
/// let mut table = Table::new("Items");
/// table.add_column(ColumnDef::new("Name", DataType::Text)).unwrap();
/// let view = DataView::new(&mut table, "Name <> 'hidden'", "Name DESC", RowStateMask::CURRENT_ROWS).unwrap();
///
/// let a = table.insert([Value::from("a")]).unwrap();
/// table.insert([Value::from("hidden")]).unwrap();
/// let b = table.insert([Value::from("b")]).unwrap();
/// assert_eq!(view.row_ids(), vec![b, a]);
/// ```
pub struct DataView {
    table: String,
    state: Rc<RefCell<ViewState>>,
}

impl fmt::Debug for DataView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("DataView")
            .field("table", &self.table)
            .field("filter", &state.filter_text)
            .field("sort", &state.sort_text)
            .field("mask", &state.mask)
            .field("rows", &state.entries.len())
            .finish()
    }
}

impl DataView {
    /// Creates a view over a standalone table.
    ///
    /// # Errors
    ///
    /// Fails when the filter or sort does not parse or bind, or the filter
    /// cannot be evaluated for an existing row.
    pub fn new(table: &mut Table, filter: &str, sort: &str, mask: RowStateMask) -> Result<Self> {
        Self::attach(&mut table.edit(), filter, sort, mask)
    }

    /// Creates a view over a table of a data set.
    ///
    /// # Errors
    ///
    /// See [`DataView::new`].
    pub fn attach(table: &mut TableMut<'_>, filter: &str, sort: &str, mask: RowStateMask) -> Result<Self> {
        let mut state = ViewState {
            filter_text: filter.to_string(),
            filter: None,
            filter_columns: Vec::new(),
            sort_text: sort.to_string(),
            sort: SortKeys::default(),
            mask,
            case_sensitive: table.case_sensitive(),
            entries: Vec::new(),
            keys: BTreeMap::new(),
            observers: Vec::new(),
        };
        state.rebind(table)?;
        let state = Rc::new(RefCell::new(state));
        table.subscribe(ViewListener {
            state: Rc::downgrade(&state),
        });
        Ok(Self {
            table: table.name.clone(),
            state,
        })
    }

    /// Name of the underlying table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Number of visible rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Returns true if no row is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the row at a position.
    #[must_use]
    pub fn row_id(&self, index: usize) -> Option<RowId> {
        self.state.borrow().entries.get(index).map(|(_, id)| *id)
    }

    /// Ids of the visible rows, in view order.
    #[must_use]
    pub fn row_ids(&self) -> Vec<RowId> {
        self.state.borrow().entries.iter().map(|(_, id)| *id).collect()
    }

    /// The row at a position.
    #[must_use]
    pub fn row<'t>(&self, table: &'t Table, index: usize) -> Option<DataRow<'t>> {
        self.row_id(index).and_then(|id| table.row(id).ok())
    }

    /// The filter expression.
    #[must_use]
    pub fn filter(&self) -> String {
        self.state.borrow().filter_text.clone()
    }

    /// The sort list.
    #[must_use]
    pub fn sort(&self) -> String {
        self.state.borrow().sort_text.clone()
    }

    /// The row states shown.
    #[must_use]
    pub fn row_state_filter(&self) -> RowStateMask {
        self.state.borrow().mask
    }

    /// Registers a callback for index changes.
    pub fn on_list_changed(&self, observer: impl FnMut(&ListChanged) + 'static) {
        self.state.borrow_mut().observers.push(Box::new(observer));
    }

    fn reset(&self, table: &Table, change: impl FnOnce(&mut ViewState)) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let saved = (
            state.filter_text.clone(),
            state.sort_text.clone(),
            state.mask,
        );
        change(&mut state);
        if let Err(err) = state.rebind(table) {
            state.filter_text = saved.0;
            state.sort_text = saved.1;
            state.mask = saved.2;
            state.rebind(table)?;
            return Err(err);
        }
        drop(state);
        notify(&self.state, ListChanged::reset());
        Ok(())
    }

    /// Replaces the filter. Emits `Reset`.
    ///
    /// # Errors
    ///
    /// Fails, keeping the old filter, when the new one does not bind.
    pub fn set_filter(&self, table: &Table, filter: &str) -> Result<()> {
        self.reset(table, |state| state.filter_text = filter.to_string())
    }

    /// Replaces the sort list. Emits `Reset`.
    ///
    /// # Errors
    ///
    /// Fails, keeping the old sort, when the new one does not parse or bind.
    pub fn set_sort(&self, table: &Table, sort: &str) -> Result<()> {
        self.reset(table, |state| state.sort_text = sort.to_string())
    }

    /// Replaces the row states shown. Emits `Reset`.
    ///
    /// # Errors
    ///
    /// Fails when the filter cannot be evaluated for a newly visible row.
    pub fn set_row_state_filter(&self, table: &Table, mask: RowStateMask) -> Result<()> {
        self.reset(table, |state| state.mask = mask)
    }

    fn sort_key(&self, table: &Table, key: Vec<Value>) -> Result<Vec<Value>> {
        let state = self.state.borrow();
        if state.sort.is_empty() {
            return Err(DataError::invalid_schema(&table.name, "the view has no sort order to search"));
        }
        if key.is_empty() || key.len() > state.sort.keys.len() {
            return Err(DataError::invalid_schema(
                &table.name,
                format!("expected 1 to {} key values, got {}", state.sort.keys.len(), key.len()),
            ));
        }
        state
            .sort
            .keys
            .iter()
            .zip(key)
            .map(|((id, _), value)| {
                let ordinal = id.ordinal(table)?;
                table.coerce_value(ordinal, value)
            })
            .collect()
    }

    fn key_range(&self, key: &[Value]) -> (usize, usize) {
        let state = self.state.borrow();
        let cmp = |entry: &(Vec<Value>, RowId)| state.sort.compare_prefix(key, &entry.0, state.case_sensitive);
        let start = state.entries.partition_point(|entry| cmp(entry) == Ordering::Greater);
        let end = state.entries.partition_point(|entry| cmp(entry) != Ordering::Less);
        (start, end)
    }

    /// Position of the first row whose leading sort columns equal `key`,
    /// by binary search.
    ///
    /// # Errors
    ///
    /// Fails when the view is unsorted, or the key is longer than the sort
    /// list or does not convert to the sort column types.
    pub fn find<V: Into<Value>>(&self, table: &Table, key: impl IntoIterator<Item = V>) -> Result<Option<usize>> {
        let key = self.sort_key(table, key.into_iter().map(Into::into).collect())?;
        let (start, end) = self.key_range(&key);
        Ok((start < end).then_some(start))
    }

    /// Ids of every row whose leading sort columns equal `key`.
    ///
    /// # Errors
    ///
    /// See [`DataView::find`].
    pub fn find_rows<V: Into<Value>>(&self, table: &Table, key: impl IntoIterator<Item = V>) -> Result<Vec<RowId>> {
        let key = self.sort_key(table, key.into_iter().map(Into::into).collect())?;
        let (start, end) = self.key_range(&key);
        let state = self.state.borrow();
        Ok(state.entries[start..end].iter().map(|(_, id)| *id).collect())
    }

    /// Ids of the rows holding `values` in `columns`. Uses binary search when
    /// the columns lead the sort list, and scans otherwise.
    ///
    /// # Errors
    ///
    /// Fails for unknown columns and unconvertible values.
    pub fn find_by<K: ColumnKey, V: Into<Value>>(
        &self,
        table: &Table,
        columns: impl IntoIterator<Item = K>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Vec<RowId>> {
        let ordinals = columns
            .into_iter()
            .map(|c| c.ordinal(table))
            .collect::<Result<Vec<_>>>()?;
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if ordinals.len() != values.len() {
            return Err(DataError::invalid_schema(
                &table.name,
                format!("{} columns but {} values", ordinals.len(), values.len()),
            ));
        }
        let values = ordinals
            .iter()
            .zip(values)
            .map(|(o, v)| table.coerce_value(*o, v))
            .collect::<Result<Vec<_>>>()?;

        let leads_sort = {
            let state = self.state.borrow();
            !ordinals.is_empty()
                && ordinals.len() <= state.sort.keys.len()
                && ordinals
                    .iter()
                    .zip(&state.sort.keys)
                    .all(|(o, (id, _))| table.columns[*o].id == *id)
        };
        if leads_sort {
            let (start, end) = self.key_range(&values);
            let state = self.state.borrow();
            return Ok(state.entries[start..end].iter().map(|(_, id)| *id).collect());
        }

        let state = self.state.borrow();
        let mut found = Vec::new();
        for (_, id) in &state.entries {
            let record = table.record(*id)?;
            let mut matches = true;
            for (o, value) in ordinals.iter().zip(&values) {
                let cell = table.cell_value(record, *o, record.view_slot())?;
                if !cell.cmp_with(value, table.case_sensitive()).is_eq() {
                    matches = false;
                    break;
                }
            }
            if matches {
                found.push(*id);
            }
        }
        Ok(found)
    }

    /// Adds a row initialized by `init` to the table. The row appears in the
    /// view if it passes the filter.
    ///
    /// # Errors
    ///
    /// Fails when `init` fails or the row cannot be added.
    pub fn add_new(
        &self,
        table: &mut TableMut<'_>,
        init: impl FnOnce(&mut NewRow) -> Result<()>,
    ) -> Result<RowId> {
        self.check_table(table)?;
        let mut row = table.new_row();
        init(&mut row)?;
        table.add_row(row)
    }

    /// Deletes the row at a position.
    ///
    /// # Errors
    ///
    /// Fails for positions past the end and as [`TableMut::delete_row`].
    pub fn delete(&self, table: &mut TableMut<'_>, index: usize) -> Result<()> {
        self.check_table(table)?;
        let id = self.row_id(index).ok_or_else(|| {
            DataError::invalid_schema(&self.table, format!("no row at view position {index}"))
        })?;
        table.delete_row(id)
    }

    fn check_table(&self, table: &Table) -> Result<()> {
        if table.name == self.table {
            Ok(())
        } else {
            Err(DataError::invalid_schema(
                &table.name,
                format!("the view belongs to table '{}'", self.table),
            ))
        }
    }

    /// Copies the visible rows, in view order, into a new table with the same
    /// columns. The copies are Unchanged and hold the values the view sees.
    ///
    /// # Errors
    ///
    /// Fails when a visible row is gone or the copies violate a unique
    /// constraint.
    pub fn to_table(&self, table: &Table) -> Result<Table> {
        let mut copy = table.clone_schema();
        let state = self.state.borrow();
        for (_, id) in &state.entries {
            let record = table.record(*id)?;
            let slot = record.view_slot();
            let values = table
                .columns
                .iter()
                .enumerate()
                .map(|(o, c)| if c.is_computed() { Value::Null } else { record.cell(o, slot).clone() })
                .collect();
            let id = RowId(copy.next_row_id);
            copy.next_row_id += 1;
            copy.rows.insert(id, RowRecord::unchanged(values));
        }
        let errors = copy.rebuild_indexes();
        if let Some(err) = errors.into_iter().next() {
            return Err(err);
        }
        Ok(copy)
    }
}
