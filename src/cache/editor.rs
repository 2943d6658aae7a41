//! The mutator API handed to a [`crate::cache::SourceCache::edit`] closure.

use std::hash::Hash;

use crate::{change::Change, reducer::Reducer, store::KeyedStore};

/// The sole way to mutate a [`crate::cache::SourceCache`]'s backing store.
///
/// Every method folds one or more primitive [`Change`]s into the
/// transaction's [`Reducer`]; nothing is published until the enclosing
/// `edit()` call returns.
pub struct CacheWriter<'a, K, T> {
    pub(super) store: &'a mut KeyedStore<K, T>,
    pub(super) reducer: &'a mut Reducer<T, K>,
    pub(super) key_of: &'a dyn Fn(&T) -> K,
}

impl<'a, K, T> CacheWriter<'a, K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Looks up the current value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&T> {
        self.store.get(key)
    }

    /// True if `key` is currently present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.store.contains_key(key)
    }

    /// Number of items currently present (before this transaction's
    /// still-pending changes are accounted for).
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Inserts `value` if its key is new, or replaces the existing value
    /// under the same key, raising an `Add` or `Update` respectively.
    pub fn add_or_update(&mut self, value: T) {
        let key = (self.key_of)(&value);
        let change = match self.store.add_or_update(key.clone(), value.clone()) {
            Some(previous) => Change::Update {
                key,
                current: value,
                previous,
                index: None,
            },
            None => Change::Add {
                key,
                current: value,
                index: None,
            },
        };
        self.reducer.apply(change);
    }

    /// Calls [`CacheWriter::add_or_update`] for every value in order.
    pub fn add_or_update_many(&mut self, values: impl IntoIterator<Item = T>) {
        for value in values {
            self.add_or_update(value);
        }
    }

    /// Removes `key`, raising a `Remove` if it was present.
    pub fn remove(&mut self, key: &K) -> Option<T> {
        let removed = self.store.remove(key)?;
        self.reducer.apply(Change::Remove {
            key: key.clone(),
            current: removed.clone(),
            index: None,
        });
        Some(removed)
    }

    /// Calls [`CacheWriter::remove`] for every key in order.
    pub fn remove_many(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.remove(&key);
        }
    }

    /// Removes whichever currently-stored item has the same key as
    /// `value` (the key is derived the same way `add_or_update` derives
    /// it), raising a `Remove` if one was present.
    pub fn remove_value(&mut self, value: &T) -> Option<T> {
        let key = (self.key_of)(value);
        self.remove(&key)
    }

    /// Raises a `Refresh` for `key`'s current value without replacing it.
    /// Returns `false`, raising nothing, if `key` is absent.
    pub fn refresh(&mut self, key: &K) -> bool {
        match self.store.get(key).cloned() {
            Some(current) => {
                self.reducer.apply(Change::Refresh {
                    key: key.clone(),
                    current,
                    index: None,
                });
                true
            }
            None => false,
        }
    }

    /// Calls [`CacheWriter::refresh`] for every key in order.
    pub fn refresh_many(&mut self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.refresh(&key);
        }
    }

    /// Raises a `Refresh` for every currently-stored key, in arbitrary
    /// (store-iteration) order.
    pub fn refresh_all(&mut self) {
        let keys: Vec<K> = self.store.keys().cloned().collect();
        self.refresh_many(keys);
    }

    /// Removes every item, raising one `Remove` per item.
    pub fn clear(&mut self) {
        for (key, value) in self.store.clear() {
            self.reducer.apply(Change::Remove {
                key,
                current: value,
                index: None,
            });
        }
    }
}
