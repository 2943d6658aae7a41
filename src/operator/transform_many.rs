//! The `transform_many` operator: expands each upstream item into zero or
//! more destination items, keyed independently of the upstream key, and
//! flattens every source item's contribution into one destination change
//! set. An upstream `Remove` evicts every destination item that source
//! item produced; an upstream `Update`/`Refresh` re-derives the produced
//! set and emits the minimal `Add`/`Update`/`Remove` diff against what
//! that source item produced last time.

use std::{collections::HashMap, hash::Hash};

use crate::{change::Change, change_set::ChangeSet, operator::Operator};

/// Expands each `T` into zero or more `(DK, D)` pairs via `selector`,
/// flattening the result of every upstream item into a single keyed
/// output. Destination keys are assumed unique across the whole upstream
/// (two different source items must never derive the same `DK`).
pub struct TransformMany<K, T, DK, D, F> {
    selector: F,
    /// What each live upstream key most recently produced, so `Update`/
    /// `Remove` can diff against or evict exactly those destination items
    /// without re-deriving from a value that may no longer be current.
    produced: HashMap<K, HashMap<DK, D>>,
}

impl<K, T, DK, D, F> TransformMany<K, T, DK, D, F>
where
    K: Hash + Eq + Clone,
    DK: Hash + Eq + Clone,
    D: Clone + PartialEq,
    F: Fn(&T) -> Vec<(DK, D)>,
{
    /// Returns a new `transform_many` operator.
    #[must_use]
    pub fn new(selector: F) -> Self {
        Self {
            selector,
            produced: HashMap::new(),
        }
    }

    fn derive(&self, current: &T) -> HashMap<DK, D> {
        (self.selector)(current).into_iter().collect()
    }

    fn diff(
        &mut self,
        key: K,
        new_map: HashMap<DK, D>,
        out: &mut ChangeSet<D, DK>,
    ) {
        let old_map = self.produced.remove(&key).unwrap_or_default();
        for (dk, value) in &new_map {
            match old_map.get(dk) {
                None => out.push(Change::Add {
                    key: dk.clone(),
                    current: value.clone(),
                    index: None,
                }),
                Some(previous) if previous != value => out.push(Change::Update {
                    key: dk.clone(),
                    current: value.clone(),
                    previous: previous.clone(),
                    index: None,
                }),
                Some(_) => {}
            }
        }
        for (dk, value) in old_map {
            if !new_map.contains_key(&dk) {
                out.push(Change::Remove {
                    key: dk,
                    current: value,
                    index: None,
                });
            }
        }
        self.produced.insert(key, new_map);
    }

    fn evict(&mut self, key: &K, out: &mut ChangeSet<D, DK>) {
        if let Some(old_map) = self.produced.remove(key) {
            for (dk, value) in old_map {
                out.push(Change::Remove {
                    key: dk,
                    current: value,
                    index: None,
                });
            }
        }
    }
}

impl<K, T, DK, D, F> Operator for TransformMany<K, T, DK, D, F>
where
    K: Hash + Eq + Clone,
    DK: Hash + Eq + Clone,
    D: Clone + PartialEq,
    F: Fn(&T) -> Vec<(DK, D)>,
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<D, DK>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let mut out = ChangeSet::new();
        for change in input {
            match change {
                Change::Add { key, current, .. } => {
                    let produced = self.derive(&current);
                    self.diff(key, produced, &mut out);
                }
                Change::Update { key, current, .. } => {
                    let produced = self.derive(&current);
                    self.diff(key, produced, &mut out);
                }
                Change::Refresh { key, current, .. } => {
                    let produced = self.derive(&current);
                    self.diff(key, produced, &mut out);
                }
                Change::Remove { key, .. } => {
                    self.evict(&key, &mut out);
                }
                Change::Moved { .. } => {
                    // Purely positional on the upstream; the items this
                    // source key derived are unaffected.
                }
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

    fn op() -> TransformMany<i32, Vec<i32>, i32, i32, impl Fn(&Vec<i32>) -> Vec<(i32, i32)>> {
        TransformMany::new(|v: &Vec<i32>| v.iter().map(|&n| (n, n * 10)).collect())
    }

    #[test]
    fn add_expands_into_one_item_per_entry() {
        let mut op = op();
        let mut set = ChangeSet::new();
        set.push(Change::Add { key: 1, current: vec![1, 2, 3], index: None });
        let out = op.process(set).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|c| c.reason() == crate::change::Reason::Add));
    }

    #[test]
    fn remove_evicts_every_item_that_source_key_produced() {
        let mut op = op();
        let mut first = ChangeSet::new();
        first.push(Change::Add { key: 1, current: vec![1, 2], index: None });
        op.process(first);

        let mut second: ChangeSet<Vec<i32>, i32> = ChangeSet::new();
        second.push(Change::Remove { key: 1, current: vec![1, 2], index: None });
        let out = op.process(second).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.reason() == crate::change::Reason::Remove));
    }

    #[test]
    fn update_diffs_against_previously_produced_set() {
        let mut op = op();
        let mut first = ChangeSet::new();
        first.push(Change::Add { key: 1, current: vec![1, 2], index: None });
        op.process(first);

        let mut second: ChangeSet<Vec<i32>, i32> = ChangeSet::new();
        second.push(Change::Update {
            key: 1,
            current: vec![2, 3],
            previous: vec![1, 2],
            index: None,
        });
        let out = op.process(second).unwrap();
        assert_eq!(out.len(), 2);
        let mut reasons: Vec<_> = out.iter().map(|c| (*c.key(), c.reason())).collect();
        reasons.sort_by_key(|(k, _)| *k);
        assert_eq!(
            reasons,
            vec![(1, crate::change::Reason::Remove), (3, crate::change::Reason::Add)]
        );
    }

    #[test]
    fn update_with_unchanged_derived_set_emits_nothing() {
        let mut op = op();
        let mut first = ChangeSet::new();
        first.push(Change::Add { key: 1, current: vec![1, 2], index: None });
        op.process(first);

        let mut second: ChangeSet<Vec<i32>, i32> = ChangeSet::new();
        second.push(Change::Update {
            key: 1,
            current: vec![1, 2],
            previous: vec![1, 2],
            index: None,
        });
        assert!(op.process(second).is_none());
    }
}
