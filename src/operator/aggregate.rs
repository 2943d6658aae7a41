//! The `aggregate` operator family:
//! incrementally folds a keyed change-set stream into a scalar, without
//! rescanning the whole collection on every batch.
//!
//! An [`Accumulator`] only needs to know how to add and remove one item's
//! contribution; [`Aggregate`] drives it from `Add`/`Update`/`Remove`
//! (`Update` is a `remove(previous)` followed by an `add(current)`,
//! `Refresh`/`Moved` are no-ops since neither changes an item's
//! contribution). [`ItemTaps`] covers the sibling `on_item_added` /
//! `on_item_removed` / `on_item_updated` side-effect hooks from the same
//! spec section.

use crate::{change::Change, change_set::ChangeSet, operator::Operator};

/// Something that can fold items in and out of a running scalar.
pub trait Accumulator<T> {
    /// The type of the folded result.
    type Output: Clone + PartialEq;

    /// Folds `item` into the running value.
    fn add(&mut self, item: &T);

    /// Removes `item`'s prior contribution from the running value.
    fn remove(&mut self, item: &T);

    /// The current accumulated value.
    fn value(&self) -> Self::Output;
}

/// Sums a `f64` projection of each item.
pub struct Sum<T, F> {
    selector: F,
    total: f64,
    _marker: std::marker::PhantomData<T>,
}

impl<T, F> Sum<T, F>
where
    F: Fn(&T) -> f64,
{
    /// Returns a new sum accumulator over `selector`.
    #[must_use]
    pub fn new(selector: F) -> Self {
        Self {
            selector,
            total: 0.0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, F> Accumulator<T> for Sum<T, F>
where
    F: Fn(&T) -> f64,
{
    type Output = f64;

    fn add(&mut self, item: &T) {
        self.total += (self.selector)(item);
    }

    fn remove(&mut self, item: &T) {
        self.total -= (self.selector)(item);
    }

    fn value(&self) -> f64 {
        self.total
    }
}

/// Averages a `f64` projection of each item, reporting `0.0` while empty.
pub struct Average<T, F> {
    selector: F,
    total: f64,
    count: usize,
    _marker: std::marker::PhantomData<T>,
}

impl<T, F> Average<T, F>
where
    F: Fn(&T) -> f64,
{
    /// Returns a new average accumulator over `selector`.
    #[must_use]
    pub fn new(selector: F) -> Self {
        Self {
            selector,
            total: 0.0,
            count: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, F> Accumulator<T> for Average<T, F>
where
    F: Fn(&T) -> f64,
{
    type Output = f64;

    fn add(&mut self, item: &T) {
        self.total += (self.selector)(item);
        self.count += 1;
    }

    fn remove(&mut self, item: &T) {
        self.total -= (self.selector)(item);
        self.count -= 1;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Drives an [`Accumulator`] from a keyed change-set stream, emitting the
/// new value whenever a batch actually changes it (suppressing a batch
/// that, e.g., only carries `Refresh`es).
pub struct Aggregate<K, T, Acc> {
    accumulator: Acc,
    last_emitted: Option<Acc::Output>,
    _marker: std::marker::PhantomData<(K, T)>,
}

impl<K, T, Acc> Aggregate<K, T, Acc>
where
    Acc: Accumulator<T>,
{
    /// Returns a new aggregate operator wrapping `accumulator`.
    #[must_use]
    pub fn new(accumulator: Acc) -> Self {
        Self {
            accumulator,
            last_emitted: None,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, Acc> Operator for Aggregate<K, T, Acc>
where
    Acc: Accumulator<T>,
{
    type Input = ChangeSet<T, K>;
    type Output = Acc::Output;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        for change in &input {
            match change {
                Change::Add { current, .. } => self.accumulator.add(current),
                Change::Update { current, previous, .. } => {
                    self.accumulator.remove(previous);
                    self.accumulator.add(current);
                }
                Change::Remove { current, .. } => self.accumulator.remove(current),
                Change::Refresh { .. } | Change::Moved { .. } => {}
            }
        }
        let value = self.accumulator.value();
        if self.last_emitted.as_ref() == Some(&value) {
            None
        } else {
            self.last_emitted = Some(value.clone());
            Some(value)
        }
    }
}

/// Invokes `on_added`/`on_removed`/`on_updated` exactly once per relevant
/// change in a batch, then passes the batch through unchanged.
///
/// `Refresh`-only transitions call neither `on_added` nor `on_removed` —
/// a `Refresh` never adds or removes visibility, so it would be
/// misleading to treat it as one for a side-effect tap whose whole point
/// is "this item newly exists" or "this item is gone".
pub struct ItemTaps<K, T, OnAdd, OnRemove, OnUpdate> {
    on_added: OnAdd,
    on_removed: OnRemove,
    on_updated: OnUpdate,
    _marker: std::marker::PhantomData<(K, T)>,
}

impl<K, T, OnAdd, OnRemove, OnUpdate> ItemTaps<K, T, OnAdd, OnRemove, OnUpdate>
where
    OnAdd: FnMut(&K, &T),
    OnRemove: FnMut(&K, &T),
    OnUpdate: FnMut(&K, &T, &T),
{
    /// Returns a new tap operator.
    #[must_use]
    pub fn new(on_added: OnAdd, on_removed: OnRemove, on_updated: OnUpdate) -> Self {
        Self {
            on_added,
            on_removed,
            on_updated,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, OnAdd, OnRemove, OnUpdate> Operator for ItemTaps<K, T, OnAdd, OnRemove, OnUpdate>
where
    OnAdd: FnMut(&K, &T),
    OnRemove: FnMut(&K, &T),
    OnUpdate: FnMut(&K, &T, &T),
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<T, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        if input.is_empty() {
            return None;
        }
        for change in &input {
            match change {
                Change::Add { key, current, .. } => (self.on_added)(key, current),
                Change::Remove { key, current, .. } => (self.on_removed)(key, current),
                Change::Update { key, current, previous, .. } => {
                    (self.on_updated)(key, current, previous);
                }
                Change::Refresh { .. } | Change::Moved { .. } => {}
            }
        }
        Some(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(k: &'static str, v: f64) -> Change<f64, &'static str> {
        Change::Add { key: k, current: v, index: None }
    }
    fn update(k: &'static str, prev: f64, cur: f64) -> Change<f64, &'static str> {
        Change::Update { key: k, current: cur, previous: prev, index: None }
    }
    fn remove(k: &'static str, v: f64) -> Change<f64, &'static str> {
        Change::Remove { key: k, current: v, index: None }
    }

    #[test]
    fn sum_tracks_add_update_remove() {
        let mut op: Aggregate<&str, f64, Sum<f64, _>> = Aggregate::new(Sum::new(|v: &f64| *v));
        let mut set = ChangeSet::new();
        set.push(add("a", 10.0));
        set.push(add("b", 5.0));
        assert_eq!(op.process(set), Some(15.0));

        let mut set2 = ChangeSet::new();
        set2.push(update("a", 10.0, 20.0));
        assert_eq!(op.process(set2), Some(25.0));

        let mut set3 = ChangeSet::new();
        set3.push(remove("b", 5.0));
        assert_eq!(op.process(set3), Some(20.0));
    }

    #[test]
    fn average_reports_zero_when_empty() {
        let mut op: Aggregate<&str, f64, Average<f64, _>> = Aggregate::new(Average::new(|v: &f64| *v));
        let mut set = ChangeSet::new();
        set.push(add("a", 10.0));
        set.push(add("b", 20.0));
        assert_eq!(op.process(set), Some(15.0));

        let mut set2 = ChangeSet::new();
        set2.push(remove("a", 10.0));
        set2.push(remove("b", 20.0));
        assert_eq!(op.process(set2), Some(0.0));
    }

    #[test]
    fn unchanged_value_suppresses_emission() {
        let mut op: Aggregate<&str, f64, Sum<f64, _>> = Aggregate::new(Sum::new(|v: &f64| *v));
        let mut set = ChangeSet::new();
        set.push(add("a", 10.0));
        op.process(set);

        let mut set2: ChangeSet<f64, &str> = ChangeSet::new();
        set2.push(Change::Refresh { key: "a", current: 10.0, index: None });
        assert_eq!(op.process(set2), None);
    }

    #[test]
    fn item_taps_fire_once_per_relevant_change_and_skip_refresh() {
        use std::{cell::RefCell, rc::Rc};

        let added: Rc<RefCell<Vec<&str>>> = Default::default();
        let removed: Rc<RefCell<Vec<&str>>> = Default::default();
        let updated: Rc<RefCell<Vec<&str>>> = Default::default();
        let (a, r, u) = (Rc::clone(&added), Rc::clone(&removed), Rc::clone(&updated));

        let mut op = ItemTaps::new(
            move |k: &&str, _v: &f64| a.borrow_mut().push(k),
            move |k: &&str, _v: &f64| r.borrow_mut().push(k),
            move |k: &&str, _new: &f64, _old: &f64| u.borrow_mut().push(k),
        );

        let mut set = ChangeSet::new();
        set.push(add("a", 1.0));
        set.push(update("a", 1.0, 2.0));
        set.push(Change::Refresh { key: "a", current: 2.0, index: None });
        set.push(remove("a", 2.0));
        op.process(set);

        assert_eq!(*added.borrow(), vec!["a"]);
        assert_eq!(*updated.borrow(), vec!["a"]);
        assert_eq!(*removed.borrow(), vec!["a"]);
    }
}
