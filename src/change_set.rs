//! Batched deltas produced by a single edit transaction.

use std::ops::Deref;

use crate::{change::Change, list_change::ListChange};

/// Cached counters over a batch of changes, so consumers (e.g.
/// `count_changed`, `monitor_status`) don't need to re-scan the batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChangeSummary {
    /// Number of `Add` changes in the batch.
    pub adds: usize,
    /// Number of `Update` changes in the batch.
    pub updates: usize,
    /// Number of `Remove` changes in the batch.
    pub removes: usize,
    /// Number of `Refresh` changes in the batch.
    pub refreshes: usize,
    /// Number of `Moved` changes in the batch.
    pub moves: usize,
}

impl ChangeSummary {
    /// The net effect of this batch on a collection's size.
    #[must_use]
    pub fn size_delta(&self) -> isize {
        self.adds as isize - self.removes as isize
    }
}

/// An ordered batch of keyed [`Change`]s produced by one edit transaction.
///
/// Empty change sets are never published to subscribers; this type does not forbid construction of an
/// empty batch itself, since the reducer needs to build one up before
/// deciding whether to discard it.
#[derive(Clone, Debug)]
pub struct ChangeSet<T, K> {
    changes: Vec<Change<T, K>>,
    summary: ChangeSummary,
}

impl<T, K> ChangeSet<T, K> {
    /// Returns a new, empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            summary: ChangeSummary::default(),
        }
    }

    /// Returns a change set with its backing vector allocated for the given
    /// number of items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
            summary: ChangeSummary::default(),
        }
    }

    /// Appends a change, maintaining the cached [`ChangeSummary`].
    pub fn push(&mut self, change: Change<T, K>) {
        match change.reason() {
            crate::change::Reason::Add => self.summary.adds += 1,
            crate::change::Reason::Update => self.summary.updates += 1,
            crate::change::Reason::Remove => self.summary.removes += 1,
            crate::change::Reason::Refresh => self.summary.refreshes += 1,
            crate::change::Reason::Moved => self.summary.moves += 1,
        }
        self.changes.push(change);
    }

    /// True if this batch carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The cached counters for this batch.
    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        self.summary
    }

    /// Iterates the changes in transaction order.
    pub fn iter(&self) -> std::slice::Iter<'_, Change<T, K>> {
        self.changes.iter()
    }

    /// Consumes the batch, yielding its changes in transaction order.
    pub fn into_vec(self) -> Vec<Change<T, K>> {
        self.changes
    }

    /// Builds a [`ChangeSet`] from a pre-built, non-empty `Vec` of changes.
    #[must_use]
    pub fn from_vec(changes: Vec<Change<T, K>>) -> Self {
        let mut set = Self::with_capacity(changes.len());
        for change in changes {
            set.push(change);
        }
        set
    }
}

impl<T, K> Default for ChangeSet<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> IntoIterator for ChangeSet<T, K> {
    type Item = Change<T, K>;
    type IntoIter = std::vec::IntoIter<Change<T, K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, T, K> IntoIterator for &'a ChangeSet<T, K> {
    type Item = &'a Change<T, K>;
    type IntoIter = std::slice::Iter<'a, Change<T, K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<T, K> Deref for ChangeSet<T, K> {
    type Target = [Change<T, K>];

    fn deref(&self) -> &Self::Target {
        &self.changes
    }
}

/// An ordered batch of [`ListChange`]s produced by one edit transaction on
/// an indexed source.
#[derive(Clone, Debug)]
pub struct ListChangeSet<T> {
    changes: Vec<ListChange<T>>,
}

impl<T> ListChangeSet<T> {
    /// Returns a new, empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self { changes: Vec::new() }
    }

    /// Appends a change.
    pub fn push(&mut self, change: ListChange<T>) {
        self.changes.push(change);
    }

    /// True if this batch carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes in this batch (not the number of items touched;
    /// use [`ListChangeSet::item_count`] for that).
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Total number of items touched across all changes in this batch.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.changes.iter().map(ListChange::len).sum()
    }

    /// Iterates the changes in transaction order.
    pub fn iter(&self) -> std::slice::Iter<'_, ListChange<T>> {
        self.changes.iter()
    }

    /// Consumes the batch, yielding its changes in transaction order.
    pub fn into_vec(self) -> Vec<ListChange<T>> {
        self.changes
    }
}

impl<T> Default for ListChangeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for ListChangeSet<T> {
    type Item = ListChange<T>;
    type IntoIter = std::vec::IntoIter<ListChange<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ListChangeSet<T> {
    type Item = &'a ListChange<T>;
    type IntoIter = std::slice::Iter<'a, ListChange<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
