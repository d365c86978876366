//! Change notifications raised by a table.
//!
//! Listeners are called synchronously. An error returned from a
//! `*Changing` or `RowDeleting` notification cancels the edit; the
//! `*Changed`/`RowDeleted` notifications of an edit are delivered once the
//! whole edit, cascades included, has committed, and errors returned from
//! them are logged and otherwise ignored.

use core::fmt;

use crate::column::Column;
use crate::error::Result;
use crate::row::RowId;
use crate::value::Value;

use super::Table;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A column value is about to change. Can veto.
    ColumnChanging,
    /// A column value changed.
    ColumnChanged,
    /// A row is about to be added, changed, accepted or rejected. Can veto.
    RowChanging,
    /// A row was added, changed, accepted or rejected.
    RowChanged,
    /// A row is about to be deleted. Can veto.
    RowDeleting,
    /// A row was deleted.
    RowDeleted,
    /// Every row was removed.
    TableCleared,
    /// Columns or constraints changed.
    SchemaChanged,
}

impl EventKind {
    /// Returns true for the notifications that can cancel an edit.
    #[must_use]
    pub const fn can_veto(&self) -> bool {
        matches!(
            self,
            Self::ColumnChanging | Self::RowChanging | Self::RowDeleting
        )
    }
}

/// What happened to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    /// Added to the table.
    Add,
    /// Values changed.
    Change,
    /// Deleted.
    Delete,
    /// Changes accepted.
    Commit,
    /// Changes rejected.
    Rollback,
}

/// A notification.
///
/// The table is borrowed in the state of the moment: during `RowChanging`
/// the proposed values are readable through [`RowVersion::Default`], during
/// `RowChanged` the committed ones.
///
/// [`RowVersion::Default`]: crate::RowVersion::Default
#[derive(Clone, Copy)]
pub struct TableEvent<'a> {
    /// Kind of notification.
    pub kind: EventKind,
    /// Row action, for row notifications.
    pub action: Option<RowAction>,
    /// The table raising the notification.
    pub table: &'a Table,
    /// The affected row.
    pub row: Option<RowId>,
    /// The affected column, for column notifications.
    pub column: Option<&'a Column>,
    /// The proposed value, for column notifications.
    pub proposed: Option<&'a Value>,
}

impl fmt::Debug for TableEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableEvent")
            .field("kind", &self.kind)
            .field("action", &self.action)
            .field("table", &self.table.name())
            .field("row", &self.row)
            .field("column", &self.column.map(Column::name))
            .field("proposed", &self.proposed)
            .finish()
    }
}

/// Receives table notifications.
pub trait TableListener {
    /// Handles a notification. Returning an error from a vetoable
    /// notification cancels the edit.
    ///
    /// # Errors
    ///
    /// Any error; conventionally [`DataError::Vetoed`].
    ///
    /// [`DataError::Vetoed`]: crate::DataError::Vetoed
    fn on_event(&mut self, event: &TableEvent<'_>) -> Result<()>;

    /// Returns false once the listener should be dropped.
    fn is_alive(&self) -> bool {
        true
    }
}

impl<F> TableListener for F
where
    F: FnMut(&TableEvent<'_>) -> Result<()>,
{
    fn on_event(&mut self, event: &TableEvent<'_>) -> Result<()> {
        self(event)
    }
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct Listeners {
    entries: Vec<(ListenerId, Box<dyn TableListener>)>,
    next_id: u64,
}

impl Listeners {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn subscribe(&mut self, listener: Box<dyn TableListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }
}

/// A notification to build once the table can be borrowed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Notice {
    pub(crate) kind: EventKind,
    pub(crate) action: Option<RowAction>,
    pub(crate) row: Option<RowId>,
    pub(crate) column: Option<usize>,
}

impl Notice {
    pub(crate) const fn row(kind: EventKind, action: RowAction, row: RowId) -> Self {
        Self {
            kind,
            action: Some(action),
            row: Some(row),
            column: None,
        }
    }

    pub(crate) const fn table(kind: EventKind) -> Self {
        Self {
            kind,
            action: None,
            row: None,
            column: None,
        }
    }
}

/// Delivers `notice` to every listener of `tables[index]`.
///
/// Listeners are moved out while they run so that the event can borrow the
/// table. For vetoable notifications the first error stops delivery and is
/// returned; otherwise errors are logged.
pub(crate) fn dispatch(
    tables: &mut [Table],
    index: usize,
    notice: Notice,
    proposed: Option<&Value>,
) -> Result<()> {
    if tables[index].listeners.is_empty() {
        return Ok(());
    }
    let mut entries = core::mem::take(&mut tables[index].listeners.entries);
    let table = &tables[index];
    let event = TableEvent {
        kind: notice.kind,
        action: notice.action,
        table,
        row: notice.row,
        column: notice.column.and_then(|ordinal| table.columns().get(ordinal)),
        proposed,
    };

    let mut outcome = Ok(());
    for (id, listener) in &mut entries {
        if !listener.is_alive() {
            continue;
        }
        if let Err(err) = listener.on_event(&event) {
            if notice.kind.can_veto() {
                outcome = Err(err);
                break;
            }
            tracing::warn!(
                table = %table.name(),
                listener = id.0,
                kind = ?notice.kind,
                error = %err,
                "change listener failed"
            );
        }
    }

    entries.retain(|(_, listener)| listener.is_alive());
    let listeners = &mut tables[index].listeners;
    entries.append(&mut listeners.entries);
    listeners.entries = entries;
    outcome
}
