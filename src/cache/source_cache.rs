//! The keyed source: an editable
//! [`crate::store::KeyedStore`] that publishes the [`crate::change_set::ChangeSet`]
//! produced by each edit transaction.

use std::{cell::RefCell, hash::Hash, rc::Rc};

use futures::{
    future,
    stream::{self, LocalBoxStream, StreamExt as _},
};

use crate::{
    cache::editor::CacheWriter,
    change::Change,
    change_set::ChangeSet,
    error::CacheMutationError,
    reducer::Reducer,
    store::KeyedStore,
    subject::{Notification, Subject},
};

/// Governs what happens to a source's live subscribers when an `edit()`
/// mutator closure returns `Err`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorPolicy {
    /// The source publishes a terminal [`Notification::Error`] to every
    /// subscriber and is disposed; no further edits can produce visible
    /// output (`DisposedAfterError` rule).
    Terminate,
    /// The error is returned to the `edit()` caller only; subscribers see
    /// nothing and the source remains usable.
    SurfaceToCaller,
}

/// A keyed, observable cache.
///
/// `K` is derived from each stored `T` by the key selector passed to
/// [`SourceCache::new`], matching `medea-reactive`'s collections, which
/// are likewise keyed containers with a separate identity and value.
pub struct SourceCache<K, T, E = std::convert::Infallible> {
    store: RefCell<KeyedStore<K, T>>,
    key_of: Box<dyn Fn(&T) -> K>,
    subject: Subject<ChangeSet<T, K>, Rc<E>>,
    edit_pulses: Subject<(), Rc<E>>,
    has_loaded: RefCell<bool>,
    error_policy: ErrorPolicy,
}

impl<K, T, E> SourceCache<K, T, E>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Returns a new, empty source keyed by `key_of`, disposing on the
    /// first mutator error (the common case — see [`ErrorPolicy::Terminate`]).
    #[must_use]
    pub fn new(key_of: impl Fn(&T) -> K + 'static) -> Self {
        Self::with_error_policy(key_of, ErrorPolicy::Terminate)
    }

    /// As [`SourceCache::new`], with an explicit [`ErrorPolicy`].
    #[must_use]
    pub fn with_error_policy(key_of: impl Fn(&T) -> K + 'static, error_policy: ErrorPolicy) -> Self {
        Self {
            store: RefCell::new(KeyedStore::new()),
            key_of: Box::new(key_of),
            subject: Subject::new(),
            edit_pulses: Subject::new(),
            has_loaded: RefCell::new(false),
            error_policy,
        }
    }

    /// Runs one edit transaction: `f` receives a
    /// [`CacheWriter`] through which it issues any number of primitive
    /// mutations, which are coalesced by a [`Reducer`] and published as a
    /// single [`ChangeSet`] once `f` returns `Ok`.
    ///
    /// If `f` returns `Err`, no change set is published for this
    /// transaction and the backing store is rolled back to exactly the
    /// state it was in before `f` ran, even if some of its primitive
    /// mutations already touched the store — per §4.1, "subject state is
    /// unchanged". What happens to subscribers next depends on this
    /// source's [`ErrorPolicy`].
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut CacheWriter<'_, K, T>) -> Result<R, E>,
    ) -> Result<R, CacheMutationError<E>> {
        let mut reducer = Reducer::new();
        let snapshot = self.store.borrow().clone();
        let result = {
            let mut store = self.store.borrow_mut();
            let mut writer = CacheWriter {
                store: &mut store,
                reducer: &mut reducer,
                key_of: &self.key_of,
            };
            f(&mut writer)
        };
        match result {
            Ok(value) => {
                let changes = reducer.finish();
                *self.has_loaded.borrow_mut() = true;
                if !changes.is_empty() {
                    self.subject.publish(changes);
                }
                self.edit_pulses.publish(());
                Ok(value)
            }
            Err(error) => {
                *self.store.borrow_mut() = snapshot;
                if self.error_policy == ErrorPolicy::Terminate {
                    let shared = Rc::new(error.clone());
                    self.subject.error(Rc::clone(&shared));
                    self.edit_pulses.error(shared);
                }
                Err(CacheMutationError(error))
            }
        }
    }

    /// Subscribes, synchronously replaying the current contents as one
    /// `Add`-only [`ChangeSet`] before switching to live deltas.
    #[must_use]
    pub fn connect(&self) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>> {
        let initial = self.snapshot_as_change_set();
        let subscription = self.subject.subscribe();
        if initial.is_empty() {
            subscription
        } else {
            Box::pin(stream::once(future::ready(Notification::Next(initial))).chain(subscription))
        }
    }

    /// As [`SourceCache::connect`], but restricted to items matching
    /// `predicate` — a fast path equivalent to `connect()` piped through
    /// the `filter` operator, reusing its incremental membership tracking
    /// so items crossing the predicate boundary via `Update`/`Refresh`
    /// still raise the correct `Add`/`Remove`.
    #[must_use]
    pub fn connect_filtered(
        &self,
        predicate: impl Fn(&T) -> bool + 'static,
    ) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>> {
        crate::operator::filter::filter_changes(self.connect(), predicate)
    }

    /// Subscribes to a single key's value, immediately yielding its
    /// current value (or `None` if absent) and thereafter `Some(value)`
    /// on every `Add`/`Update`/`Refresh`/`Moved` touching that key and
    /// `None` on `Remove`.
    #[must_use]
    pub fn watch(&self, key: K) -> LocalBoxStream<'static, Notification<Option<T>, Rc<E>>> {
        let initial = self.store.borrow().get(&key).cloned();
        let upstream = self.subject.subscribe();
        let mapped = upstream
            .map(move |notification| match notification {
                Notification::Next(changes) => {
                    let mut touched = None;
                    for change in changes.iter() {
                        if *change.key() == key {
                            touched = Some(match change {
                                Change::Remove { .. } => None,
                                other => Some(other.current().clone()),
                            });
                        }
                    }
                    touched.map(Notification::Next)
                }
                Notification::Error(error) => Some(Notification::Error(error)),
            })
            .filter_map(future::ready);
        Box::pin(stream::once(future::ready(Notification::Next(initial))).chain(mapped))
    }

    /// A pulse stream firing once per completed edit transaction
    /// (including transactions that produced no visible change), plus one
    /// synthetic pulse at subscribe time if at least one transaction has
    /// already completed. Feeds [`crate::connect::monitor_status`]; not
    /// itself subject to the "no empty emission" rule, since an empty
    /// pulse *is* the signal `monitor_status` needs to move out of
    /// `Pending`.
    #[must_use]
    pub fn edits(&self) -> LocalBoxStream<'static, Notification<(), Rc<E>>> {
        let already_loaded = *self.has_loaded.borrow();
        let subscription = self.edit_pulses.subscribe();
        if already_loaded {
            Box::pin(stream::once(future::ready(Notification::Next(()))).chain(subscription))
        } else {
            subscription
        }
    }

    /// A stream of this cache's count, starting with its count at
    /// subscribe time (even if that count is zero) and thereafter emitting
    /// only on transactions that actually change it.
    #[must_use]
    pub fn count_changed(&self) -> LocalBoxStream<'static, Notification<usize, Rc<E>>> {
        let initial = self.count();
        let updates = self
            .connect()
            .scan(initial, |count, notification| {
                future::ready(Some(match notification {
                    Notification::Next(changes) => {
                        let delta = changes.summary().size_delta();
                        if delta == 0 {
                            None
                        } else {
                            *count = (*count as isize + delta).max(0) as usize;
                            Some(Notification::Next(*count))
                        }
                    }
                    Notification::Error(error) => Some(Notification::Error(error)),
                }))
            })
            .filter_map(future::ready);
        Box::pin(stream::once(future::ready(Notification::Next(initial))).chain(updates))
    }

    /// Instantaneous lookup; does not subscribe to anything.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<T> {
        self.store.borrow().get(key).cloned()
    }

    /// Current number of items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.store.borrow().len()
    }

    /// True if the cache currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// A snapshot of every currently stored key, in arbitrary order.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.store.borrow().keys().cloned().collect()
    }

    /// A snapshot of every currently stored value, in arbitrary order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.store.borrow().values().cloned().collect()
    }

    /// A snapshot of every currently stored `(key, value)` pair, in
    /// arbitrary order.
    #[must_use]
    pub fn key_values(&self) -> Vec<(K, T)> {
        self.store
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn snapshot_as_change_set(&self) -> ChangeSet<T, K> {
        let store = self.store.borrow();
        let mut initial = ChangeSet::with_capacity(store.len());
        for (key, value) in store.iter() {
            initial.push(Change::Add {
                key: key.clone(),
                current: value.clone(),
                index: None,
            });
        }
        initial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    #[test]
    fn edit_adds_and_updates_via_key_selector() {
        let cache: SourceCache<i32, (i32, &'static str), &'static str> =
            SourceCache::new(|item: &(i32, &'static str)| item.0);
        cache
            .edit(|w| {
                w.add_or_update((1, "a"));
                w.add_or_update((1, "b"));
                Ok::<_, &'static str>(())
            })
            .unwrap();
        assert_eq!(cache.lookup(&1), Some((1, "b")));
        assert_eq!(cache.count(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn connect_replays_snapshot_then_live_deltas() {
        let cache: SourceCache<i32, i32, &'static str> = SourceCache::new(|v: &i32| *v);
        cache.edit(|w| { w.add_or_update(1); Ok::<_, &'static str>(()) }).unwrap();

        let mut sub = cache.connect();
        let first = sub.next().await.unwrap().into_next().unwrap();
        assert_eq!(first.summary().adds, 1);

        cache.edit(|w| { w.add_or_update(2); Ok::<_, &'static str>(()) }).unwrap();
        let second = sub.next().await.unwrap().into_next().unwrap();
        assert_eq!(second.summary().adds, 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn empty_transaction_publishes_no_change_set_but_still_pulses() {
        let cache: SourceCache<i32, i32, &'static str> = SourceCache::new(|v: &i32| *v);
        let mut edits = cache.edits();
        let mut changes = cache.connect();

        cache
            .edit(|w| {
                w.add_or_update(1);
                w.remove(&1);
                Ok::<_, &'static str>(())
            })
            .unwrap();

        assert!(matches!(edits.next().await, Some(Notification::Next(()))));
        // No change set should ever arrive; dropping the sender lets us
        // observe that `changes` would block forever, so instead assert
        // indirectly via the cache's own state.
        assert!(cache.is_empty());
        drop(changes);
    }

    #[test]
    fn mutator_error_rolls_back_mutations_already_applied() {
        let cache: SourceCache<i32, i32, &'static str> =
            SourceCache::with_error_policy(|v: &i32| *v, ErrorPolicy::SurfaceToCaller);
        cache.edit(|w| { w.add_or_update(1); Ok::<_, &'static str>(()) }).unwrap();

        let result = cache.edit(|w| {
            w.add_or_update(99);
            Err("boom")
        });
        assert!(result.is_err());
        assert_eq!(cache.items(), vec![1]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn error_terminates_subscribers_under_default_policy() {
        let cache: SourceCache<i32, i32, &'static str> = SourceCache::new(|v: &i32| *v);
        let mut sub = cache.connect();
        let result = cache.edit(|_| Err::<(), _>("boom"));
        assert!(result.is_err());
        assert!(matches!(sub.next().await, Some(Notification::Error(_))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn watch_reports_current_value_then_updates() {
        let cache: SourceCache<i32, (i32, i32), &'static str> =
            SourceCache::new(|item: &(i32, i32)| item.0);
        cache.edit(|w| { w.add_or_update((1, 10)); Ok::<_, &'static str>(()) }).unwrap();

        let mut watch = cache.watch(1);
        assert!(matches!(watch.next().await, Some(Notification::Next(Some((1, 10))))));

        cache.edit(|w| { w.remove(&1); Ok::<_, &'static str>(()) }).unwrap();
        assert!(matches!(watch.next().await, Some(Notification::Next(None))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn count_changed_tracks_size_delta() {
        let cache: SourceCache<i32, i32, &'static str> = SourceCache::new(|v: &i32| *v);
        let mut counts = cache.count_changed();
        assert!(matches!(counts.next().await, Some(Notification::Next(0))));
        cache.edit(|w| { w.add_or_update(1); w.add_or_update(2); Ok::<_, &'static str>(()) }).unwrap();
        assert!(matches!(counts.next().await, Some(Notification::Next(2))));
        cache.edit(|w| { w.remove(&1); Ok::<_, &'static str>(()) }).unwrap();
        assert!(matches!(counts.next().await, Some(Notification::Next(1))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn count_changed_emits_current_count_on_subscribe_even_when_nonempty() {
        let cache: SourceCache<i32, i32, &'static str> = SourceCache::new(|v: &i32| *v);
        cache.edit(|w| { w.add_or_update(1); Ok::<_, &'static str>(()) }).unwrap();
        let mut counts = cache.count_changed();
        assert!(matches!(counts.next().await, Some(Notification::Next(1))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn count_changed_suppresses_pure_update_transactions() {
        let cache: SourceCache<i32, (i32, i32), &'static str> =
            SourceCache::new(|item: &(i32, i32)| item.0);
        cache.edit(|w| { w.add_or_update((1, 10)); Ok::<_, &'static str>(()) }).unwrap();
        let mut counts = cache.count_changed();
        assert!(matches!(counts.next().await, Some(Notification::Next(1))));

        cache.edit(|w| { w.add_or_update((1, 20)); Ok::<_, &'static str>(()) }).unwrap();
        cache.edit(|w| { w.remove(&1); Ok::<_, &'static str>(()) }).unwrap();
        assert!(matches!(counts.next().await, Some(Notification::Next(0))));
    }
}
