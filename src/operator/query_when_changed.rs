//! The `query_when_changed` operator:
//! maintains a mirror of upstream state and re-evaluates a user accessor
//! over it on every batch, rather than exposing the batch's deltas
//! directly — useful when the downstream only cares about some
//! whole-collection-derived view (a summary struct, a validity check)
//! and would otherwise have to reconstruct it from `ChangeSet`s itself.

use std::hash::Hash;

use crate::{change_set::ChangeSet, operator::cache_cloner, operator::Operator, store::KeyedStore};

/// Drives `accessor` over a private mirror of upstream state, emitting
/// its result once per upstream batch (including the initial snapshot
/// batch, so a subscriber joining a non-empty source sees a value
/// immediately).
pub struct QueryWhenChanged<K, T, R, F> {
    mirror: KeyedStore<K, T>,
    accessor: F,
    _marker: std::marker::PhantomData<R>,
}

impl<K, T, R, F> QueryWhenChanged<K, T, R, F>
where
    K: Hash + Eq + Clone,
    F: Fn(&KeyedStore<K, T>) -> R,
{
    /// Returns a new query-when-changed operator evaluating `accessor`
    /// over the mirrored upstream state.
    #[must_use]
    pub fn new(accessor: F) -> Self {
        Self {
            mirror: KeyedStore::new(),
            accessor,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, R, F> Operator for QueryWhenChanged<K, T, R, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&KeyedStore<K, T>) -> R,
{
    type Input = ChangeSet<T, K>;
    type Output = R;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        if input.is_empty() {
            return None;
        }
        cache_cloner::apply(&mut self.mirror, &input);
        Some((self.accessor)(&self.mirror))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Change;

    #[test]
    fn reevaluates_accessor_over_mirrored_state() {
        let mut op: QueryWhenChanged<&str, i32, usize, _> = QueryWhenChanged::new(|s| s.len());
        let mut set = ChangeSet::new();
        set.push(Change::Add { key: "a", current: 1, index: None });
        set.push(Change::Add { key: "b", current: 2, index: None });
        assert_eq!(op.process(set), Some(2));

        let mut set2 = ChangeSet::new();
        set2.push(Change::Remove { key: "a", current: 1, index: None });
        assert_eq!(op.process(set2), Some(1));
    }

    #[test]
    fn empty_batch_suppressed() {
        let mut op: QueryWhenChanged<&str, i32, usize, _> = QueryWhenChanged::new(|s| s.len());
        let set: ChangeSet<i32, &str> = ChangeSet::new();
        assert!(op.process(set).is_none());
    }
}
