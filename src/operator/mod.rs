//! The operator composition framework:
//! the `Operator` trait every incremental operator implements, the
//! generic driver that turns an `Operator` into a live stream transform,
//! and the cache/list cloner utilities that reify a change-set stream
//! into a local store.

pub mod aggregate;
pub mod batch_if;
pub mod buffer_if;
pub mod combinators;
pub mod dispose_many;
pub mod distinct;
pub mod expire_after;
pub mod filter;
pub mod group;
pub mod limit_size_to;
pub mod merge_many;
pub mod page;
pub mod query_when_changed;
pub mod sort;
pub mod switch;
pub mod transform;
pub mod transform_many;
pub mod transform_to_tree;
pub mod virtualize;

use std::{cell::RefCell, rc::Rc};

use futures::stream::{LocalBoxStream, StreamExt as _};

use crate::subject::Notification;

/// Governs how an async-mapping operator (`transform`/`filter` with an
/// async predicate or selector) invokes its per-item
/// callback across the items of a single batch. Ordering of the output
/// batch always matches the input batch regardless of this setting —
/// this only controls whether the callbacks run concurrently.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Concurrency {
    /// Each item's callback is awaited to completion before the next
    /// item's callback starts.
    Ordered,
    /// Every item's callback in the batch is polled concurrently.
    Parallel,
}

/// A stateful node that receives one upstream batch at a time and
/// produces at most one downstream batch.
///
/// Implementors own whatever private projection of upstream state they
/// need (a cloned [`crate::store::KeyedStore`], a [`crate::store::SortedStore`],
/// a map of per-item subscriptions, ...) and never reach back into
/// upstream state directly. A disposal hook, where one is needed (e.g. to
/// cancel per-item subscriptions), is simply the type's [`Drop`] impl —
/// there is no separate `dispose()` method, since Rust already calls
/// `Drop` deterministically when the driving stream (and therefore the
/// operator) is dropped.
pub trait Operator {
    /// The upstream batch type this operator consumes.
    type Input;
    /// The downstream batch type this operator produces.
    type Output;

    /// Folds one upstream batch into this operator's private state,
    /// returning the derived downstream batch, or `None` to suppress an
    /// empty emission.
    fn process(&mut self, input: Self::Input) -> Option<Self::Output>;
}

/// Turns an [`Operator`] into a live stream transform: subscribes to
/// `upstream`, feeds every [`Notification::Next`] through
/// [`Operator::process`], and forwards [`Notification::Error`] unchanged
/// (after which, per the upstream's own contract, nothing further
/// arrives).
///
/// This is the single place batching/suppression is implemented; every
/// operator in this module is plain, synchronous, non-stream-aware logic
/// plugged in through this driver.
pub fn drive<Op, E>(
    operator: Op,
    upstream: LocalBoxStream<'static, Notification<Op::Input, E>>,
) -> LocalBoxStream<'static, Notification<Op::Output, E>>
where
    Op: Operator + 'static,
    Op::Input: 'static,
    Op::Output: 'static,
    E: 'static,
{
    let operator = Rc::new(RefCell::new(operator));
    Box::pin(upstream.filter_map(move |notification| {
        let operator = Rc::clone(&operator);
        async move {
            match notification {
                Notification::Next(input) => operator.borrow_mut().process(input).map(Notification::Next),
                Notification::Error(error) => Some(Notification::Error(error)),
            }
        }
    }))
}

/// Reifies a `ChangeSet<T, K>` stream into a local [`crate::store::KeyedStore`],
/// applying each change as it arrives.
///
/// Used both as the basis of `as_observable_cache` and internally by
/// operators that need to track upstream state (filter, sort, group, ...).
pub mod cache_cloner {
    use std::hash::Hash;

    use crate::{change::Change, change_set::ChangeSet, store::KeyedStore};

    /// Applies one change set to `store` in order.
    pub fn apply<K, T>(store: &mut KeyedStore<K, T>, changes: &ChangeSet<T, K>)
    where
        K: Hash + Eq + Clone,
        T: Clone,
    {
        for change in changes {
            apply_one(store, change);
        }
    }

    /// Applies a single change to `store`.
    pub fn apply_one<K, T>(store: &mut KeyedStore<K, T>, change: &Change<T, K>)
    where
        K: Hash + Eq + Clone,
        T: Clone,
    {
        match change {
            Change::Add { key, current, .. } | Change::Update { key, current, .. } => {
                store.add_or_update(key.clone(), current.clone());
            }
            Change::Remove { key, .. } => {
                store.remove(key);
            }
            Change::Refresh { .. } | Change::Moved { .. } => {
                // Neither changes the stored value.
            }
        }
    }
}

/// Reifies a `ListChangeSet<T>` stream into a local
/// [`crate::store::IndexedStore`], preserving index moves as a
/// delete-at-source/insert-at-destination pair.
pub mod list_cloner {
    use crate::{list_change::ListChange, store::IndexedStore};

    /// Applies one change set to `store` in order.
    pub fn apply<T>(store: &mut IndexedStore<T>, changes: &crate::change_set::ListChangeSet<T>)
    where
        T: Clone,
    {
        for change in changes {
            apply_one(store, change);
        }
    }

    /// Applies a single change to `store`.
    pub fn apply_one<T>(store: &mut IndexedStore<T>, change: &ListChange<T>)
    where
        T: Clone,
    {
        match change {
            ListChange::Add { index, item } => store.insert(*index, item.clone()),
            ListChange::AddRange { index, items } => {
                store.insert_range(*index, items.clone());
            }
            ListChange::Remove { index, .. } => {
                store.remove(*index);
            }
            ListChange::RemoveRange { index, items } => {
                store.remove_range(*index, items.len());
            }
            ListChange::Replace { index, current, .. } => {
                store.replace(*index, current.clone());
            }
            ListChange::Moved {
                previous_index,
                current_index,
                ..
            } => {
                store.move_item(*previous_index, *current_index);
            }
            ListChange::Refresh { .. } => {}
            ListChange::Clear { .. } => {
                store.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;

    struct Double;

    impl Operator for Double {
        type Input = i32;
        type Output = i32;

        fn process(&mut self, input: i32) -> Option<i32> {
            if input == 0 {
                None
            } else {
                Some(input * 2)
            }
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn drive_suppresses_none_and_forwards_errors() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Notification<i32, &'static str>>();
        let mut out = drive(Double, Box::pin(rx));

        tx.unbounded_send(Notification::Next(0)).unwrap(); // suppressed
        tx.unbounded_send(Notification::Next(5)).unwrap();
        tx.unbounded_send(Notification::Error("boom")).unwrap();
        drop(tx);

        assert!(matches!(out.next().await, Some(Notification::Next(10))));
        assert!(matches!(out.next().await, Some(Notification::Error("boom"))));
        assert!(out.next().await.is_none());
    }
}
