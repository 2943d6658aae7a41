//! Composite subscription lifecycle:
//! a handle that groups any number of per-item disposal actions so an
//! operator that owns a subscription forest (`merge_many`,
//! `filter_on_observable`, `transform_on_property`, `expire_after`'s timer
//! handles, ...) can release all of it in one place, the same way
//! [`crate::connect::RefCountSubscription`] releases its own single
//! upstream task on [`Drop`].
//!
//! There is no separate `dispose()` method anywhere in this crate —
//! dropping a handle *is* disposing it, so a [`CompositeDisposable`]
//! dropped mid-use (a panic unwinding through it, an operator being torn
//! down) still runs every registered disposer exactly once.

use std::{cell::RefCell, collections::HashMap, hash::Hash, rc::Rc};

/// A boxed disposer: runs an arbitrary closure when dropped. Useful for
/// wrapping a `JoinHandle` so aborting happens on drop rather than only
/// when explicitly called, or for combining several distinct releases
/// (an abort plus a counter decrement) into one handle.
pub struct OnDrop<F: FnMut()>(Option<F>);

impl<F: FnMut()> OnDrop<F> {
    /// Returns a handle that calls `f` exactly once, when dropped.
    #[must_use]
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }
}

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        if let Some(mut f) = self.0.take() {
            f();
        }
    }
}

/// Wraps a [`tokio::task::JoinHandle`] so the task is aborted on drop
/// instead of merely detached — a bare `JoinHandle`'s own `Drop` leaves
/// the task running to completion, which is never what a per-item
/// subscription forest wants when its owning entry disappears.
pub struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl AbortOnDrop {
    /// Wraps `handle`, aborting it when the wrapper is dropped.
    #[must_use]
    pub fn new(handle: tokio::task::JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// An unkeyed bag of disposables, released together when the bag itself
/// is dropped (or via [`CompositeDisposable::clear`], which releases them
/// immediately without waiting for the bag's own drop).
#[derive(Default)]
pub struct CompositeDisposable {
    items: Vec<Box<dyn std::any::Any>>,
}

impl CompositeDisposable {
    /// Returns a new, empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Adds one disposable to the bag; it is released no later than the
    /// bag's own drop.
    pub fn add<D: 'static>(&mut self, disposable: D) {
        self.items.push(Box::new(disposable));
    }

    /// Releases every disposable currently in the bag immediately,
    /// leaving it empty.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of disposables currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the bag holds no disposables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A keyed subscription forest: one disposable per live container member,
/// addressed by that member's key.
///
/// Inserting under a key already present replaces (and thereby disposes)
/// the previous entry; removing a key disposes its entry; dropping the
/// whole map disposes everything still in it.
pub struct DisposableMap<K, D> {
    entries: HashMap<K, D>,
}

impl<K, D> DisposableMap<K, D>
where
    K: Hash + Eq,
{
    /// Returns a new, empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts `disposable` under `key`, disposing (dropping) whatever was
    /// previously registered under that key.
    pub fn insert(&mut self, key: K, disposable: D) {
        self.entries.insert(key, disposable);
    }

    /// Removes and disposes the entry for `key`, if any; returns whether
    /// one was present.
    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// True if `key` currently has a live entry.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Disposes every entry, leaving the map empty.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, D> Default for DisposableMap<K, D>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a [`DisposableMap`], for the common case where both
/// the operator's own task and callbacks fired from elsewhere (a
/// completion from a per-item future) need to insert or remove entries.
pub type SharedDisposableMap<K, D> = Rc<RefCell<DisposableMap<K, D>>>;
