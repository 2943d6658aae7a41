//! The `sort` operator: maintains a
//! [`SortedStore`] projection over a keyed source, emitting `Add`/`Update`/
//! `Remove`/`Refresh` with positions and `Moved` when a value's new sort
//! key changes its position, plus a way to re-sort under a new comparator
//! without resubmitting the whole upstream.

use std::hash::Hash;

use crate::{
    change::Change,
    change_set::ChangeSet,
    operator::Operator,
    store::{Comparator, SortedStore},
};

/// The two kinds of input a live [`Sort`] accepts: ordinary upstream
/// change sets, and an explicit request to re-sort under a new
/// comparator.
pub enum SortInput<K, T> {
    /// A batch of upstream changes to fold into the sorted projection.
    Edit(ChangeSet<T, K>),
    /// Replace the comparator and re-sort every currently held item.
    Resort(Comparator<T>),
}

/// Maintains a comparator-ordered projection of a keyed source.
pub struct Sort<K, T> {
    store: SortedStore<K, T>,
}

impl<K, T> Sort<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Returns a new sort operator ordered by `comparator`.
    #[must_use]
    pub fn new(comparator: Comparator<T>) -> Self {
        Self {
            store: SortedStore::new(comparator),
        }
    }
}

impl<K, T> Operator for Sort<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    type Input = SortInput<K, T>;
    type Output = ChangeSet<T, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        match input {
            SortInput::Edit(changes) => self.apply_edit(changes),
            SortInput::Resort(comparator) => self.apply_resort(comparator),
        }
    }
}

impl<K, T> Sort<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    fn apply_edit(&mut self, changes: ChangeSet<T, K>) -> Option<ChangeSet<T, K>> {
        if changes.is_empty() {
            return None;
        }
        let mut out = ChangeSet::new();
        for change in changes {
            match change {
                Change::Add { key, current, .. } => {
                    let index = self.store.insert(key.clone(), current.clone());
                    out.push(Change::Add {
                        key,
                        current,
                        index: Some(index),
                    });
                }
                Change::Update { key, current, previous, .. } => {
                    match self.store.update(&key, current.clone()) {
                        Some((prev_index, new_index)) if prev_index == new_index => {
                            out.push(Change::Update {
                                key,
                                current,
                                previous,
                                index: Some(new_index),
                            });
                        }
                        Some((prev_index, new_index)) => {
                            out.push(Change::moved(key, current, prev_index, new_index));
                        }
                        None => {
                            let index = self.store.insert(key.clone(), current.clone());
                            out.push(Change::Add {
                                key,
                                current,
                                index: Some(index),
                            });
                        }
                    }
                }
                Change::Remove { key, current, .. } => {
                    if let Some((index, value)) = self.store.remove(&key) {
                        out.push(Change::Remove {
                            key,
                            current: value,
                            index: Some(index),
                        });
                    } else {
                        let _ = current;
                    }
                }
                Change::Refresh { key, current, .. } => {
                    match self.store.update(&key, current.clone()) {
                        Some((prev_index, new_index)) if prev_index == new_index => {
                            out.push(Change::Refresh {
                                key,
                                current,
                                index: Some(new_index),
                            });
                        }
                        Some((prev_index, new_index)) => {
                            out.push(Change::moved(key, current, prev_index, new_index));
                        }
                        None => {}
                    }
                }
                Change::Moved { key, .. } => {
                    // The upstream's own ordering is irrelevant here — this
                    // operator establishes its own order from `current`'s
                    // sort key, which a pure position move does not change.
                    let _ = key;
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn apply_resort(&mut self, comparator: Comparator<T>) -> Option<ChangeSet<T, K>> {
        let moves = self.store.re_sort(comparator);
        if moves.is_empty() {
            return None;
        }
        let mut out = ChangeSet::new();
        for (key, previous_index, current_index) in moves {
            let current = self.store.get(current_index).expect("just re-sorted").1.clone();
            out.push(Change::moved(key, current, previous_index, current_index));
        }
        Some(out)
    }
}
