//! In-memory key→value store backing keyed sources and cloners.

use std::{
    collections::HashMap,
    hash::Hash,
};

/// A plain key→value map. Unlike [`std::collections::HashMap`] this type
/// exposes exactly the operations a keyed source and a cache cloner need,
/// with an `add_or_update` that reports the previous value in one call
/// (used by the reducer to build an `Update`'s `previous` field without a
/// separate lookup).
#[derive(Clone, Debug)]
pub struct KeyedStore<K, T> {
    items: HashMap<K, T>,
}

impl<K, T> KeyedStore<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Returns a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    /// Looks up a key, returning `None` if absent.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&T> {
        self.items.get(key)
    }

    /// True if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    /// Number of items currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts or overwrites a key's value, returning the previous value if
    /// any.
    pub fn add_or_update(&mut self, key: K, value: T) -> Option<T> {
        self.items.insert(key, value)
    }

    /// Removes a key, returning its value if present.
    pub fn remove(&mut self, key: &K) -> Option<T> {
        self.items.remove(key)
    }

    /// Removes every item, returning them as `(key, value)` pairs in
    /// arbitrary order.
    pub fn clear(&mut self) -> Vec<(K, T)> {
        self.items.drain().collect()
    }

    /// Iterates all items in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.items.iter()
    }

    /// Iterates all keys in arbitrary order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }

    /// Iterates all values in arbitrary order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }
}

impl<K, T> Default for KeyedStore<K, T>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_or_update_returns_previous() {
        let mut s = KeyedStore::new();
        assert_eq!(s.add_or_update("a", 1), None);
        assert_eq!(s.add_or_update("a", 2), Some(1));
        assert_eq!(s.get(&"a"), Some(&2));
    }

    #[test]
    fn remove_returns_removed_value() {
        let mut s = KeyedStore::new();
        s.add_or_update("a", 1);
        assert_eq!(s.remove(&"a"), Some(1));
        assert_eq!(s.remove(&"a"), None);
        assert!(s.is_empty());
    }

    #[test]
    fn clear_drains_everything() {
        let mut s = KeyedStore::new();
        s.add_or_update("a", 1);
        s.add_or_update("b", 2);
        let mut drained = s.clear();
        drained.sort_by_key(|(k, _)| *k);
        assert_eq!(drained, vec![("a", 1), ("b", 2)]);
        assert!(s.is_empty());
    }
}
