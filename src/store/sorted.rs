//! The sorted projection over a keyed collection, used by
//! the `sort`, `page` and `virtualize` operators.

use std::{cmp::Ordering, collections::HashMap, hash::Hash};

/// A comparator over two values of a sorted projection's item type.
pub type Comparator<T> = std::rc::Rc<dyn Fn(&T, &T) -> Ordering>;

/// An ordered `(K, T)` sequence maintained under a [`Comparator`], with
/// O(log n) position lookup by key and O(n) positional insert/remove
/// (matching a `Vec`-backed projection, which is what every operator in
/// this crate needs: linear scans dominate anyway once downstream
/// `Moved`/`Add` events are applied to an external view).
pub struct SortedStore<K, T> {
    items: Vec<(K, T)>,
    positions: HashMap<K, usize>,
    comparator: Comparator<T>,
}

impl<K, T> SortedStore<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Returns a new, empty projection ordered by `comparator`.
    #[must_use]
    pub fn new(comparator: Comparator<T>) -> Self {
        Self {
            items: Vec::new(),
            positions: HashMap::new(),
            comparator,
        }
    }

    /// Number of items in the projection.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the projection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current position of `key`, if present.
    #[must_use]
    pub fn position_of(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Item at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&(K, T)> {
        self.items.get(index)
    }

    /// Iterates `(key, value)` pairs in sorted order.
    pub fn iter(&self) -> std::slice::Iter<'_, (K, T)> {
        self.items.iter()
    }

    /// The insertion point for `value` under the current comparator (the
    /// index of the first item that is not ordered strictly before
    /// `value`).
    fn insertion_point(&self, value: &T) -> usize {
        self.items
            .partition_point(|(_, existing)| (self.comparator)(existing, value) == Ordering::Less)
    }

    /// Inserts a new key/value pair, returning the index it was placed at.
    ///
    /// # Panics
    /// In debug builds, panics if `key` is already present (callers must
    /// `remove` or `update` an existing key instead).
    pub fn insert(&mut self, key: K, value: T) -> usize {
        debug_assert!(
            !self.positions.contains_key(&key),
            "SortedStore::insert called for a key already present"
        );
        let index = self.insertion_point(&value);
        self.items.insert(index, (key.clone(), value));
        self.reindex_from(index);
        index
    }

    /// Removes `key`, returning its prior index and value if present.
    pub fn remove(&mut self, key: &K) -> Option<(usize, T)> {
        let index = self.positions.remove(key)?;
        let (_, value) = self.items.remove(index);
        self.reindex_from(index);
        Some((index, value))
    }

    /// Replaces `key`'s value, re-sorting if needed.
    ///
    /// Returns `(previous_index, new_index)`; equal indices mean the
    /// value's sort position did not change (the caller should emit an
    /// `Update`, otherwise a `Moved`).
    pub fn update(&mut self, key: &K, value: T) -> Option<(usize, usize)> {
        let previous_index = *self.positions.get(key)?;
        let (_, slot) = self.items.remove(previous_index);
        drop(slot);
        let new_index = self.insertion_point(&value);
        self.items.insert(new_index, (key.clone(), value));
        let lo = previous_index.min(new_index);
        self.reindex_from(lo);
        Some((previous_index, new_index))
    }

    /// Replaces the comparator and fully re-sorts, returning the set of
    /// `(key, previous_index, new_index)` triples for every key whose
    /// position actually changed (stable: ties keep their relative order,
    /// and keys whose position is unchanged are omitted so callers emit no
    /// spurious `Moved`, per sort-controller clause).
    pub fn re_sort(&mut self, comparator: Comparator<T>) -> Vec<(K, usize, usize)>
    where
        T: Clone,
    {
        self.comparator = comparator;
        let before: Vec<K> = self.items.iter().map(|(k, _)| k.clone()).collect();
        self.items
            .sort_by(|(_, a), (_, b)| (self.comparator)(a, b));
        self.positions.clear();
        let mut moves = Vec::new();
        for (new_index, (key, _)) in self.items.iter().enumerate() {
            self.positions.insert(key.clone(), new_index);
            let previous_index = before.iter().position(|k| k == key).unwrap();
            if previous_index != new_index {
                moves.push((key.clone(), previous_index, new_index));
            }
        }
        moves
    }

    fn reindex_from(&mut self, start: usize) {
        for (index, (key, _)) in self.items.iter().enumerate().skip(start) {
            self.positions.insert(key.clone(), index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn asc() -> Comparator<i32> {
        Rc::new(|a: &i32, b: &i32| a.cmp(b))
    }

    #[test]
    fn insert_maintains_sort_order() {
        let mut s: SortedStore<&str, i32> = SortedStore::new(asc());
        s.insert("a", 5);
        s.insert("b", 1);
        s.insert("c", 3);
        let values: Vec<_> = s.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 3, 5]);
        assert_eq!(s.position_of(&"b"), Some(0));
    }

    #[test]
    fn update_without_key_change_reports_same_index() {
        let mut s: SortedStore<&str, i32> = SortedStore::new(asc());
        s.insert("a", 1);
        s.insert("b", 2);
        let (prev, new) = s.update(&"a", 1).unwrap();
        assert_eq!(prev, new);
    }

    #[test]
    fn update_with_key_change_reports_move() {
        let mut s: SortedStore<&str, i32> = SortedStore::new(asc());
        s.insert("a", 1);
        s.insert("b", 2);
        let (prev, new) = s.update(&"a", 5).unwrap();
        assert_eq!(prev, 0);
        assert_eq!(new, 1);
    }

    #[test]
    fn re_sort_reports_only_actual_moves() {
        let mut s: SortedStore<&str, i32> = SortedStore::new(asc());
        s.insert("a", 1);
        s.insert("b", 2);
        s.insert("c", 3);
        let desc: Comparator<i32> = Rc::new(|a: &i32, b: &i32| b.cmp(a));
        let moves = s.re_sort(desc);
        let keys: Vec<_> = moves.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(keys, vec!["a", "c"]); // "b" stays in the middle
    }

    #[test]
    fn re_sort_to_identical_order_reports_no_moves() {
        let mut s: SortedStore<&str, i32> = SortedStore::new(asc());
        s.insert("a", 1);
        s.insert("b", 2);
        let moves = s.re_sort(asc());
        assert!(moves.is_empty());
    }
}
