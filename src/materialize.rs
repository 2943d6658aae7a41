//! Terminal materialization:
//! `as_observable_cache`/`as_observable_list` reify a live change-set
//! stream into a queryable local store that multiple downstream
//! subscribers can share, the same way [`crate::cache::SourceCache`] and
//! [`crate::list::SourceList`] are themselves queryable — except the
//! materialized store is fed entirely by its upstream, with no mutator
//! API of its own.

use std::{cell::RefCell, hash::Hash, rc::Rc};

use futures::stream::{LocalBoxStream, StreamExt as _};

use crate::{
    change_set::{ChangeSet, ListChangeSet},
    operator::{cache_cloner, list_cloner},
    store::{IndexedStore, KeyedStore},
    subject::{Notification, Subject},
};

/// A keyed snapshot kept live by a standing subscription to its upstream,
/// queryable the way [`crate::cache::SourceCache`] is, with subscribers of
/// its own that replay the current snapshot before switching to upstream
/// deltas, re-broadcast rather than re-derived per subscriber.
pub struct ObservableCache<K, T, E> {
    store: Rc<RefCell<KeyedStore<K, T>>>,
    subject: Rc<Subject<ChangeSet<T, K>, Rc<E>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl<K, T, E> ObservableCache<K, T, E>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
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

    /// True if the materialized cache currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// A snapshot of every currently stored value, in arbitrary order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.store.borrow().values().cloned().collect()
    }
}

impl<K, T, E> ObservableCache<K, T, E>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Subscribes, synchronously replaying the current snapshot as one
    /// `Add`-only [`ChangeSet`] before switching to the re-broadcast
    /// upstream deltas.
    #[must_use]
    pub fn connect(&self) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>> {
        use futures::{future, stream};

        let mut initial = ChangeSet::with_capacity(self.store.borrow().len());
        for (key, value) in self.store.borrow().iter() {
            initial.push(crate::change::Change::Add {
                key: key.clone(),
                current: value.clone(),
                index: None,
            });
        }
        let subscription = self.subject.subscribe();
        if initial.is_empty() {
            subscription
        } else {
            Box::pin(stream::once(future::ready(Notification::Next(initial))).chain(subscription))
        }
    }
}

/// Materializes `upstream` into a live, queryable [`ObservableCache`].
/// Dropping the returned handle stops the standing subscription.
#[must_use]
pub fn as_observable_cache<K, T, E>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>,
) -> Rc<ObservableCache<K, T, E>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    let store = Rc::new(RefCell::new(KeyedStore::new()));
    let subject = Rc::new(Subject::new());
    let store_for_task = Rc::clone(&store);
    let subject_for_task = Rc::clone(&subject);
    let task = tokio::task::spawn_local(async move {
        let mut upstream = upstream;
        while let Some(notification) = upstream.next().await {
            match notification {
                Notification::Next(changes) => {
                    cache_cloner::apply(&mut store_for_task.borrow_mut(), &changes);
                    subject_for_task.publish(changes);
                }
                Notification::Error(error) => {
                    subject_for_task.error(error);
                    break;
                }
            }
        }
    });
    Rc::new(ObservableCache {
        store,
        subject,
        _task: task,
    })
}

/// As [`ObservableCache`], for an indexed source.
pub struct ObservableList<T, E> {
    store: Rc<RefCell<IndexedStore<T>>>,
    subject: Rc<Subject<ListChangeSet<T>, Rc<E>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl<T, E> ObservableList<T, E>
where
    T: Clone,
{
    /// Instantaneous lookup; does not subscribe to anything.
    #[must_use]
    pub fn lookup(&self, index: usize) -> Option<T> {
        self.store.borrow().get(index).cloned()
    }

    /// Current number of items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.store.borrow().len()
    }

    /// True if the materialized list currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// A snapshot of every currently stored item, in order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.store.borrow().iter().cloned().collect()
    }
}

impl<T, E> ObservableList<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Subscribes, synchronously replaying the current snapshot as one
    /// `AddRange` [`ListChangeSet`] before switching to the re-broadcast
    /// upstream deltas.
    #[must_use]
    pub fn connect(&self) -> LocalBoxStream<'static, Notification<ListChangeSet<T>, Rc<E>>> {
        use futures::{future, stream};

        let store = self.store.borrow();
        let subscription = self.subject.subscribe();
        if store.is_empty() {
            drop(store);
            subscription
        } else {
            let mut initial = ListChangeSet::new();
            initial.push(crate::list_change::ListChange::AddRange {
                index: 0,
                items: store.iter().cloned().collect(),
            });
            drop(store);
            Box::pin(stream::once(future::ready(Notification::Next(initial))).chain(subscription))
        }
    }
}

/// Materializes `upstream` into a live, queryable [`ObservableList`].
/// Dropping the returned handle stops the standing subscription.
#[must_use]
pub fn as_observable_list<T, E>(
    upstream: LocalBoxStream<'static, Notification<ListChangeSet<T>, Rc<E>>>,
) -> Rc<ObservableList<T, E>>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let store = Rc::new(RefCell::new(IndexedStore::new()));
    let subject = Rc::new(Subject::new());
    let store_for_task = Rc::clone(&store);
    let subject_for_task = Rc::clone(&subject);
    let task = tokio::task::spawn_local(async move {
        let mut upstream = upstream;
        while let Some(notification) = upstream.next().await {
            match notification {
                Notification::Next(changes) => {
                    list_cloner::apply(&mut store_for_task.borrow_mut(), &changes);
                    subject_for_task.publish(changes);
                }
                Notification::Error(error) => {
                    subject_for_task.error(error);
                    break;
                }
            }
        }
    });
    Rc::new(ObservableList {
        store,
        subject,
        _task: task,
    })
}
