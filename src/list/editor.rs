//! The mutator API handed to a [`crate::list::SourceList::edit`] closure.

use crate::{list_change::ListChange, store::IndexedStore};

/// Records the first out-of-range index a [`ListWriter`] call hit during a
/// transaction; converted into [`crate::error::ListMutationError::IndexOutOfRange`]
/// by [`crate::list::SourceList::edit`] once the mutator closure returns.
#[derive(Clone, Copy, Debug)]
pub(super) struct BoundsError {
    pub index: usize,
    pub len: usize,
}

/// The sole way to mutate a [`crate::list::SourceList`]'s backing store.
///
/// Every method appends zero or more primitive [`ListChange`]s to the
/// transaction's outgoing batch in call order. A bounds-violating call
/// (an [`crate::error::ListMutationError::IndexOutOfRange`]) does not panic: it records the first such failure
/// and leaves the store untouched for that call; [`SourceList::edit`]
/// checks for a recorded failure once the closure returns and aborts the
/// whole transaction without publishing if one occurred.
pub struct ListWriter<'a, T> {
    pub(super) store: &'a mut IndexedStore<T>,
    pub(super) changes: &'a mut Vec<ListChange<T>>,
    pub(super) error: &'a mut Option<BoundsError>,
}

impl<'a, T> ListWriter<'a, T>
where
    T: Clone + PartialEq,
{
    /// Number of items currently present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True if the list currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Returns a reference to the item at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.store.get(index)
    }

    /// Appends `item` to the end of the list.
    pub fn add(&mut self, item: T) {
        let index = self.store.len();
        self.store.insert(index, item.clone());
        self.changes.push(ListChange::Add { index, item });
    }

    /// Inserts `item` at `index`, shifting later items right. Fails with
    /// `IndexOutOfRange` if `index > len()`.
    pub fn insert(&mut self, index: usize, item: T) {
        if index > self.store.len() {
            self.fail(index);
            return;
        }
        self.store.insert(index, item.clone());
        self.changes.push(ListChange::Add { index, item });
    }

    /// Inserts `items` starting at `index`, preserving their order. Fails
    /// with `IndexOutOfRange` if `index > len()`.
    pub fn add_range(&mut self, index: usize, items: Vec<T>) {
        if index > self.store.len() {
            self.fail(index);
            return;
        }
        if items.is_empty() {
            return;
        }
        self.store.insert_range(index, items.clone());
        self.changes.push(ListChange::AddRange { index, items });
    }

    /// Removes the item at `index`. Fails with `IndexOutOfRange` if out of
    /// bounds.
    pub fn remove_at(&mut self, index: usize) {
        match self.store.remove(index) {
            Some(item) => self.changes.push(ListChange::Remove { index, item }),
            None => self.fail(index),
        }
    }

    /// Removes `count` items starting at `index`. Fails with
    /// `IndexOutOfRange` if the range is out of bounds.
    pub fn remove_range(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        match self.store.remove_range(index, count) {
            Some(items) => self.changes.push(ListChange::RemoveRange { index, items }),
            None => self.fail(index),
        }
    }

    /// Removes up to one occurrence per entry of `values` (matched by
    /// equality), emitting a `Remove` per item actually found, in
    /// descending original-index order so each change's `index` is valid
    /// against the list state as it stood immediately before that
    /// particular removal.
    pub fn remove_many(&mut self, values: &[T]) {
        let mut removed = self.store.remove_many(values);
        removed.sort_by(|a, b| b.0.cmp(&a.0));
        for (index, item) in removed {
            self.changes.push(ListChange::Remove { index, item });
        }
    }

    /// Replaces the item at `index`. Fails with `IndexOutOfRange` if out
    /// of bounds.
    pub fn replace_at(&mut self, index: usize, item: T) {
        match self.store.replace(index, item.clone()) {
            Some(previous) => self.changes.push(ListChange::Replace {
                index,
                previous,
                current: item,
            }),
            None => self.fail(index),
        }
    }

    /// Moves the item at `from` to `to`. Fails with `IndexOutOfRange` if
    /// either index is out of bounds.
    pub fn move_item(&mut self, from: usize, to: usize) {
        let Some(item) = self.store.get(from).cloned() else {
            self.fail(from);
            return;
        };
        if to >= self.store.len() {
            self.fail(to);
            return;
        }
        self.store.move_item(from, to);
        self.changes.push(ListChange::Moved {
            item,
            previous_index: from,
            current_index: to,
        });
    }

    /// Raises a `Refresh` for the item at `index` without replacing it.
    /// Fails with `IndexOutOfRange` if out of bounds.
    pub fn refresh_at(&mut self, index: usize) {
        match self.store.get(index).cloned() {
            Some(item) => self.changes.push(ListChange::Refresh { index, item }),
            None => self.fail(index),
        }
    }

    /// Raises a `Refresh` for whichever currently-stored item equals
    /// `item`, by position of its first occurrence. A no-op (no failure)
    /// if no equal item is present.
    pub fn refresh(&mut self, item: &T) {
        if let Some(index) = self.store.iter().position(|stored| stored == item) {
            self.refresh_at(index);
        }
    }

    /// Removes every item, raising one `Clear` listing them in order.
    pub fn clear(&mut self) {
        let items = self.store.clear();
        if !items.is_empty() {
            self.changes.push(ListChange::Clear { items });
        }
    }

    fn fail(&mut self, index: usize) {
        if self.error.is_none() {
            *self.error = Some(BoundsError {
                index,
                len: self.store.len(),
            });
        }
    }
}
