//! The `distinct_values` operator:
//! projects each upstream item through a selector and reports the set of
//! distinct projected values as its own self-keyed change set — an `Add`
//! the first time a value is produced by any item, a `Remove` once the
//! last item producing it departs.

use std::hash::Hash;

use std::collections::HashMap;

use crate::{change::Change, change_set::ChangeSet, operator::Operator};

/// Tracks, per projected value, how many currently-live upstream items
/// produce it.
pub struct DistinctValues<K, T, V, F> {
    selector: F,
    /// Reference count per distinct projected value.
    counts: HashMap<V, usize>,
    /// Last projected value per upstream key, needed to know which
    /// count to decrement on `Update`/`Remove` without re-deriving it
    /// from a value that may no longer be available.
    last_value: HashMap<K, V>,
    _marker: std::marker::PhantomData<T>,
}

impl<K, T, V, F> DistinctValues<K, T, V, F>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
    F: Fn(&T) -> V,
{
    /// Returns a new distinct-values operator projecting through
    /// `selector`.
    #[must_use]
    pub fn new(selector: F) -> Self {
        Self {
            selector,
            counts: HashMap::new(),
            last_value: HashMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    fn increment(&mut self, value: V, out: &mut ChangeSet<V, V>) {
        let count = self.counts.entry(value.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            out.push(Change::Add {
                key: value.clone(),
                current: value,
                index: None,
            });
        }
    }

    fn decrement(&mut self, value: &V, out: &mut ChangeSet<V, V>) {
        if let Some(count) = self.counts.get_mut(value) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(value);
                out.push(Change::Remove {
                    key: value.clone(),
                    current: value.clone(),
                    index: None,
                });
            }
        }
    }
}

impl<K, T, V, F> Operator for DistinctValues<K, T, V, F>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
    F: Fn(&T) -> V,
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<V, V>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let mut out = ChangeSet::new();
        for change in input {
            match change {
                Change::Add { key, current, .. } => {
                    let value = (self.selector)(&current);
                    self.last_value.insert(key, value.clone());
                    self.increment(value, &mut out);
                }
                Change::Update { key, current, .. } => {
                    let new_value = (self.selector)(&current);
                    let old_value = self.last_value.insert(key, new_value.clone());
                    if old_value.as_ref() != Some(&new_value) {
                        if let Some(old_value) = old_value {
                            self.decrement(&old_value, &mut out);
                        }
                        self.increment(new_value, &mut out);
                    }
                }
                Change::Remove { key, .. } => {
                    if let Some(value) = self.last_value.remove(&key) {
                        self.decrement(&value, &mut out);
                    }
                }
                Change::Refresh { .. } | Change::Moved { .. } => {}
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(k: i32, v: i32) -> Change<i32, i32> {
        Change::Add { key: k, current: v, index: None }
    }
    fn remove(k: i32, v: i32) -> Change<i32, i32> {
        Change::Remove { key: k, current: v, index: None }
    }

    #[test]
    fn first_item_producing_a_value_emits_add() {
        let mut op = DistinctValues::new(|v: &i32| v % 2);
        let mut set = ChangeSet::new();
        set.push(add(1, 10)); // even
        set.push(add(2, 20)); // even, same distinct value
        let out = op.process(set).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason(), crate::change::Reason::Add);
    }

    #[test]
    fn last_item_producing_a_value_emits_remove() {
        let mut op = DistinctValues::new(|v: &i32| v % 2);
        let mut first = ChangeSet::new();
        first.push(add(1, 10));
        first.push(add(2, 20));
        op.process(first);

        let mut second = ChangeSet::new();
        second.push(remove(1, 10));
        assert!(op.process(second).is_none()); // "2" still produces value 0

        let mut third = ChangeSet::new();
        third.push(remove(2, 20));
        let out = op.process(third).unwrap();
        assert_eq!(out[0].reason(), crate::change::Reason::Remove);
    }
}
