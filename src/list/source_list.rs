//! The indexed source: an editable
//! [`crate::store::IndexedStore`] that publishes the
//! [`crate::change_set::ListChangeSet`] produced by each edit transaction.

use std::{cell::RefCell, rc::Rc};

use futures::{
    future,
    stream::{self, LocalBoxStream, StreamExt as _},
};

use crate::{
    cache::ErrorPolicy,
    change_set::ListChangeSet,
    error::ListMutationError,
    list::editor::{BoundsError, ListWriter},
    list_change::ListChange,
    store::IndexedStore,
    subject::{Notification, Subject},
};

/// An indexed, observable list.
///
/// Parallel to [`crate::cache::SourceCache`], but positionally addressed:
/// there is no key selector, and a transaction that violates list bounds
/// (`remove_at`/`remove_range`/`refresh_at`/`replace_at`/`insert`/
/// `move_item` with an out-of-range index) aborts without publishing and
/// without mutating the store, rather than coalescing into a reduced
/// change, since positions have no analogue to the keyed reducer's
/// "cancel an Add with a Remove".
pub struct SourceList<T, E = std::convert::Infallible> {
    store: RefCell<IndexedStore<T>>,
    subject: Subject<ListChangeSet<T>, Rc<E>>,
    edit_pulses: Subject<(), Rc<E>>,
    has_loaded: RefCell<bool>,
    error_policy: ErrorPolicy,
}

impl<T, E> SourceList<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + 'static,
{
    /// Returns a new, empty list, disposing on the first mutator error
    /// (see [`ErrorPolicy::Terminate`]).
    #[must_use]
    pub fn new() -> Self {
        Self::with_error_policy(ErrorPolicy::Terminate)
    }

    /// As [`SourceList::new`], with an explicit [`ErrorPolicy`].
    #[must_use]
    pub fn with_error_policy(error_policy: ErrorPolicy) -> Self {
        Self {
            store: RefCell::new(IndexedStore::new()),
            subject: Subject::new(),
            edit_pulses: Subject::new(),
            has_loaded: RefCell::new(false),
            error_policy,
        }
    }

    /// Runs one edit transaction: `f` receives a
    /// [`ListWriter`] through which it issues any number of positional
    /// mutations, published as a single [`ListChangeSet`] in call order
    /// once `f` returns `Ok` and no mutation hit list bounds.
    ///
    /// A bounds violation inside `f`, or `f` itself returning `Err`,
    /// aborts the whole transaction: the error is returned to the caller,
    /// no change set is published, and the backing store is rolled back
    /// to exactly the state it was in before `f` ran, even for mutations
    /// earlier in the same closure that already succeeded against it —
    /// per §4.3, a bounds error "aborts the edit without emitting".
    pub fn edit<R>(
        &self,
        f: impl FnOnce(&mut ListWriter<'_, T>) -> Result<R, E>,
    ) -> Result<R, ListMutationError<E>> {
        let mut changes = Vec::new();
        let mut bounds_error: Option<BoundsError> = None;
        let snapshot = self.store.borrow().clone();
        let result = {
            let mut store = self.store.borrow_mut();
            let mut writer = ListWriter {
                store: &mut store,
                changes: &mut changes,
                error: &mut bounds_error,
            };
            f(&mut writer)
        };
        if let Some(BoundsError { index, len }) = bounds_error {
            *self.store.borrow_mut() = snapshot;
            return Err(ListMutationError::IndexOutOfRange { index, len });
        }
        match result {
            Ok(value) => {
                *self.has_loaded.borrow_mut() = true;
                if !changes.is_empty() {
                    self.subject.publish(ListChangeSet::from_vec(changes));
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
                Err(ListMutationError::Mutator(error))
            }
        }
    }

    /// Subscribes, synchronously replaying the current contents as one
    /// `AddRange` [`ListChangeSet`] before switching to live deltas.
    #[must_use]
    pub fn connect(&self) -> LocalBoxStream<'static, Notification<ListChangeSet<T>, Rc<E>>> {
        let initial = self.snapshot_as_change_set();
        let subscription = self.subject.subscribe();
        if initial.is_empty() {
            subscription
        } else {
            Box::pin(stream::once(future::ready(Notification::Next(initial))).chain(subscription))
        }
    }

    /// A pulse stream firing once per completed edit transaction
    /// (including ones that produced no visible change), plus one
    /// synthetic pulse at subscribe time if at least one transaction has
    /// already completed. Feeds [`crate::connect::monitor_status`].
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

    /// A stream of this list's count, starting with its count at
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
                        let delta: isize = changes
                            .iter()
                            .map(|c| match c {
                                ListChange::Add { .. } => 1,
                                ListChange::AddRange { items, .. } => items.len() as isize,
                                ListChange::Remove { .. } => -1,
                                ListChange::RemoveRange { items, .. } => -(items.len() as isize),
                                ListChange::Clear { items } => -(items.len() as isize),
                                ListChange::Replace { .. }
                                | ListChange::Moved { .. }
                                | ListChange::Refresh { .. } => 0,
                            })
                            .sum();
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
    pub fn lookup(&self, index: usize) -> Option<T> {
        self.store.borrow().get(index).cloned()
    }

    /// Current number of items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.store.borrow().len()
    }

    /// True if the list currently holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// A snapshot of every currently stored item, in order.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.store.borrow().iter().cloned().collect()
    }

    fn snapshot_as_change_set(&self) -> ListChangeSet<T> {
        let store = self.store.borrow();
        if store.is_empty() {
            return ListChangeSet::new();
        }
        let mut set = ListChangeSet::new();
        set.push(ListChange::AddRange {
            index: 0,
            items: store.iter().cloned().collect(),
        });
        set
    }
}

impl<T, E> Default for SourceList<T, E>
where
    T: Clone + PartialEq + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    #[test]
    fn edit_applies_mutations_in_order() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            w.add(2);
            w.insert(1, 9);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        assert_eq!(list.items(), vec![1, 9, 2]);
    }

    #[test]
    fn remove_at_out_of_range_aborts_without_publishing() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        let result = list.edit(|w| {
            w.remove_at(5);
            Ok::<_, &'static str>(())
        });
        assert!(matches!(
            result,
            Err(ListMutationError::IndexOutOfRange { index: 5, len: 1 })
        ));
    }

    #[test]
    fn bounds_error_rolls_back_mutations_already_applied() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            Ok::<_, &'static str>(())
        })
        .unwrap();

        let result = list.edit(|w| {
            w.add(99);
            w.remove_at(5);
            Ok::<_, &'static str>(())
        });
        assert!(result.is_err());
        assert_eq!(list.items(), vec![1]);
    }

    #[test]
    fn mutator_error_rolls_back_mutations_already_applied() {
        let list: SourceList<i32, &'static str> =
            SourceList::with_error_policy(ErrorPolicy::SurfaceToCaller);
        list.edit(|w| {
            w.add(1);
            Ok::<_, &'static str>(())
        })
        .unwrap();

        let result = list.edit(|w| {
            w.add(99);
            Err("boom")
        });
        assert!(result.is_err());
        assert_eq!(list.items(), vec![1]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn connect_replays_snapshot_as_add_range() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            w.add(2);
            Ok::<_, &'static str>(())
        })
        .unwrap();

        let mut sub = list.connect();
        let first = sub.next().await.unwrap().into_next().unwrap();
        assert_eq!(first.item_count(), 2);
    }

    #[test]
    fn remove_many_matches_by_value_not_beyond_count() {
        let list: SourceList<&str, &'static str> = SourceList::new();
        list.edit(|w| {
            for v in ["a", "b", "a", "c"] {
                w.add(v);
            }
            Ok::<_, &'static str>(())
        })
        .unwrap();
        list.edit(|w| {
            w.remove_many(&["a"]);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        assert_eq!(list.items(), vec!["b", "a", "c"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn count_changed_tracks_size_delta() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        let mut counts = list.count_changed();
        assert!(matches!(counts.next().await, Some(Notification::Next(0))));
        list.edit(|w| {
            w.add(1);
            w.add(2);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        assert!(matches!(counts.next().await, Some(Notification::Next(2))));
        list.edit(|w| {
            w.remove_at(0);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        assert!(matches!(counts.next().await, Some(Notification::Next(1))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn count_changed_emits_current_count_on_subscribe_even_when_nonempty() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        let mut counts = list.count_changed();
        assert!(matches!(counts.next().await, Some(Notification::Next(1))));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn count_changed_suppresses_pure_refresh_transactions() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        let mut counts = list.count_changed();
        assert!(matches!(counts.next().await, Some(Notification::Next(1))));

        list.edit(|w| {
            w.refresh_at(0);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        list.edit(|w| {
            w.remove_at(0);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        assert!(matches!(counts.next().await, Some(Notification::Next(0))));
    }

    #[test]
    fn clear_emits_one_change_with_all_items() {
        let list: SourceList<i32, &'static str> = SourceList::new();
        list.edit(|w| {
            w.add(1);
            w.add(2);
            Ok::<_, &'static str>(())
        })
        .unwrap();
        list.edit(|w| {
            w.clear();
            Ok::<_, &'static str>(())
        })
        .unwrap();
        assert!(list.is_empty());
    }
}
