//! The binding adaptor: applies a [`ListChangeSet`] to an
//! external, caller-owned mutable collection (a UI-framework observable
//! collection, a plain `Vec`, ...) with at most one notification per
//! change, preserving `Moved` as a single move rather than a remove/insert
//! pair when the target can express one.
//!
//! This module defines only the seam: the [`BoundCollection`] trait a
//! hosting application implements over its own collection type, and
//! [`adapt`], which walks one [`ListChangeSet`] and issues the minimal
//! sequence of calls against it. No concrete UI-framework collection is
//! implemented here — any particular UI-framework binding lives in the
//! hosting application, outside this crate's scope.

use crate::{change_set::ListChangeSet, list_change::ListChange};

/// An external mutable sequence the core can drive from a
/// [`ListChangeSet`], implemented by the hosting application over
/// whatever collection type its UI framework observes.
///
/// Each method corresponds to exactly one external notification; `adapt`
/// never issues more than one call per input [`ListChange`], so a target
/// that coalesces its own notifications per call sees one per change.
pub trait BoundCollection<T> {
    /// Inserts `item` at `index`.
    fn insert(&mut self, index: usize, item: T);

    /// Inserts `items` starting at `index`, in order. Default
    /// implementation issues one [`BoundCollection::insert`] per item;
    /// override it if the target has a genuine range-insert notification.
    fn insert_range(&mut self, index: usize, items: Vec<T>) {
        for (offset, item) in items.into_iter().enumerate() {
            self.insert(index + offset, item);
        }
    }

    /// Removes the item at `index`.
    fn remove(&mut self, index: usize);

    /// Removes `count` items starting at `index`. Default implementation
    /// issues one [`BoundCollection::remove`] per item; override it if the
    /// target has a genuine range-remove notification.
    fn remove_range(&mut self, index: usize, count: usize) {
        for _ in 0..count {
            self.remove(index);
        }
    }

    /// Replaces the item at `index` with `item`.
    fn replace(&mut self, index: usize, item: T);

    /// Moves the item currently at `from` to `to` as a single operation.
    /// Implement this (rather than relying on the default) whenever the
    /// target collection has a native move notification, since a
    /// remove/insert pair is visually a different event downstream (e.g.
    /// it drops item selection in a bound UI list where a move would not).
    fn move_item(&mut self, from: usize, to: usize) {
        let item = self.take(from);
        self.insert(to, item);
    }

    /// Removes and returns the item at `index`; used by the default
    /// [`BoundCollection::move_item`]. Implementors that override
    /// `move_item` need not implement this meaningfully.
    fn take(&mut self, index: usize) -> T;

    /// Clears the collection entirely.
    fn clear(&mut self);
}

/// Applies one [`ListChangeSet`] to `target` in order, translating each
/// [`ListChange`] into the matching [`BoundCollection`] call.
///
/// `Refresh` has no effect on the bound collection's shape — it is
/// dropped, since refresh exists to signal an external property change,
/// not a structural one; a hosting application that needs refresh to
/// repaint a bound row does so via its own item templates, not via this
/// adaptor.
pub fn adapt<T, C: BoundCollection<T>>(changes: ListChangeSet<T>, target: &mut C) {
    for change in changes {
        match change {
            ListChange::Add { index, item } => target.insert(index, item),
            ListChange::AddRange { index, items } => target.insert_range(index, items),
            ListChange::Remove { index, .. } => target.remove(index),
            ListChange::RemoveRange { index, items } => target.remove_range(index, items.len()),
            ListChange::Replace { index, current, .. } => target.replace(index, current),
            ListChange::Moved {
                previous_index,
                current_index,
                ..
            } => target.move_item(previous_index, current_index),
            ListChange::Refresh { .. } => {}
            ListChange::Clear { .. } => target.clear(),
        }
    }
}

impl<T> BoundCollection<T> for Vec<T> {
    fn insert(&mut self, index: usize, item: T) {
        Vec::insert(self, index, item);
    }

    fn remove(&mut self, index: usize) {
        Vec::remove(self, index);
    }

    fn replace(&mut self, index: usize, item: T) {
        self[index] = item;
    }

    fn take(&mut self, index: usize) -> T {
        Vec::remove(self, index)
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_apply_in_order() {
        let mut target: Vec<&str> = Vec::new();
        let mut changes = ListChangeSet::new();
        changes.push(ListChange::Add { index: 0, item: "a" });
        changes.push(ListChange::Add { index: 1, item: "b" });
        changes.push(ListChange::Remove { index: 0, item: "a" });
        adapt(changes, &mut target);
        assert_eq!(target, vec!["b"]);
    }

    #[test]
    fn moved_preserves_item_at_new_position() {
        let mut target = vec!["a", "b", "c"];
        let mut changes = ListChangeSet::new();
        changes.push(ListChange::Moved {
            item: "a",
            previous_index: 0,
            current_index: 2,
        });
        adapt(changes, &mut target);
        assert_eq!(target, vec!["b", "c", "a"]);
    }

    #[test]
    fn replace_and_clear() {
        let mut target = vec!["a", "b"];
        let mut changes = ListChangeSet::new();
        changes.push(ListChange::Replace {
            index: 1,
            previous: "b",
            current: "z",
        });
        adapt(changes, &mut target);
        assert_eq!(target, vec!["a", "z"]);

        let mut clear_changes = ListChangeSet::new();
        clear_changes.push(ListChange::Clear {
            items: target.clone(),
        });
        adapt(clear_changes, &mut target);
        assert!(target.is_empty());
    }

    #[test]
    fn refresh_does_not_change_shape() {
        let mut target = vec!["a"];
        let mut changes = ListChangeSet::new();
        changes.push(ListChange::Refresh { index: 0, item: "a" });
        adapt(changes, &mut target);
        assert_eq!(target, vec!["a"]);
    }
}
