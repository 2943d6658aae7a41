//! The `limit_size_to` operator: caps a
//! [`crate::cache::SourceCache`] or [`crate::list::SourceList`] at a
//! maximum item count, evicting the oldest surviving items first once the
//! limit is exceeded.
//!
//! A burst of `Add`s arriving in the same or adjacent transactions would,
//! evicted eagerly, each trigger their own trim pass; instead, a trim is
//! scheduled at most once per outstanding burst (coalesced the same way
//! `buffer_if`/`batch_if` coalesce their own flushes) and runs on the next
//! turn of the event loop.
//!
//! The list-shaped sibling, [`limit_size_to_list`], evicts via a single
//! [`crate::list::editor::ListWriter::remove_range`] call rather than one
//! `Remove` per key: positions have no stable identity to track across
//! edits the way keys do, so instead of diffing an insertion-order queue
//! it simply evicts from the front of the list, which is where the oldest
//! surviving items always sit for an append-only list (the shape the
//! limit exists to cap in the first place).

use std::{cell::RefCell, collections::VecDeque, hash::Hash, rc::Rc};

use futures::stream::StreamExt as _;

use crate::{
    cache::SourceCache,
    change::Change,
    list::SourceList,
    scheduler::{ScheduleHandle, Scheduler},
    subject::Notification,
};

struct State<K> {
    order: VecDeque<K>,
    pending_trim: Option<ScheduleHandle>,
}

/// Keeps `source` at or under `limit` items, evicting in insertion order.
/// Returns a guard; dropping it stops enforcing the limit.
pub fn limit_size_to<K, T, E, S>(
    source: Rc<SourceCache<K, T, E>>,
    scheduler: Rc<S>,
    limit: usize,
) -> LimitSizeGuard<K>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
    S: Scheduler,
{
    let state = Rc::new(RefCell::new(State {
        order: VecDeque::new(),
        pending_trim: None,
    }));
    let state_for_task = Rc::clone(&state);
    let task = tokio::task::spawn_local(async move {
        let mut upstream = source.connect();
        while let Some(notification) = upstream.next().await {
            let changes = match notification {
                Notification::Next(changes) => changes,
                Notification::Error(_) => break,
            };
            let mut over_limit = false;
            {
                let mut state = state_for_task.borrow_mut();
                for change in changes.iter() {
                    match change {
                        Change::Add { key, .. } => state.order.push_back(key.clone()),
                        Change::Remove { key, .. } => state.order.retain(|k| k != key),
                        Change::Update { .. } | Change::Refresh { .. } | Change::Moved { .. } => {}
                    }
                }
                over_limit = state.order.len() > limit && state.pending_trim.is_none();
            }
            if over_limit {
                let source_for_trim = Rc::clone(&source);
                let state_for_trim = Rc::clone(&state_for_task);
                let handle = scheduler.schedule_relative(std::time::Duration::ZERO, Box::new(move || {
                    let mut state = state_for_trim.borrow_mut();
                    let mut evicted = Vec::new();
                    while state.order.len() > limit {
                        if let Some(oldest) = state.order.pop_front() {
                            evicted.push(oldest);
                        } else {
                            break;
                        }
                    }
                    state.pending_trim = None;
                    drop(state);
                    if !evicted.is_empty() {
                        let _ = source_for_trim.edit(|w| {
                            w.remove_many(evicted);
                            Ok::<(), E>(())
                        });
                    }
                }));
                state_for_task.borrow_mut().pending_trim = Some(handle);
            }
        }
    });
    LimitSizeGuard { task, state }
}

/// Owns the `limit_size_to` background task. Dropping it cancels any
/// pending trim and stops enforcing the limit.
pub struct LimitSizeGuard<K> {
    task: tokio::task::JoinHandle<()>,
    #[allow(dead_code)]
    state: Rc<RefCell<State<K>>>,
}

impl<K> Drop for LimitSizeGuard<K> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct ListState {
    pending_trim: Option<ScheduleHandle>,
}

/// Keeps `source` at or under `limit` items, evicting the oldest
/// surviving run of items (always the front of the list, for an
/// append-only source) via a single [`ListWriter::remove_range`] per trim
/// pass. Returns a guard; dropping it stops enforcing the limit.
pub fn limit_size_to_list<T, E, S>(
    source: Rc<SourceList<T, E>>,
    scheduler: Rc<S>,
    limit: usize,
) -> LimitSizeListGuard<T>
where
    T: Clone + PartialEq + 'static,
    E: Clone + 'static,
    S: Scheduler,
{
    let state = Rc::new(RefCell::new(ListState { pending_trim: None }));
    let state_for_task = Rc::clone(&state);
    let task = tokio::task::spawn_local(async move {
        let mut upstream = source.connect();
        while let Some(notification) = upstream.next().await {
            match notification {
                Notification::Next(_) => {}
                Notification::Error(_) => break,
            }
            let over_limit = {
                let state = state_for_task.borrow();
                source.count() > limit && state.pending_trim.is_none()
            };
            if over_limit {
                let source_for_trim = Rc::clone(&source);
                let state_for_trim = Rc::clone(&state_for_task);
                let handle = scheduler.schedule_relative(
                    std::time::Duration::ZERO,
                    Box::new(move || {
                        state_for_trim.borrow_mut().pending_trim = None;
                        let excess = source_for_trim.count().saturating_sub(limit);
                        if excess > 0 {
                            let _ = source_for_trim.edit(|w| {
                                w.remove_range(0, excess);
                                Ok::<(), E>(())
                            });
                        }
                    }),
                );
                state_for_task.borrow_mut().pending_trim = Some(handle);
            }
        }
    });
    LimitSizeListGuard {
        task,
        state,
        _marker: std::marker::PhantomData,
    }
}

/// Owns the `limit_size_to_list` background task. Dropping it cancels
/// any pending trim and stops enforcing the limit.
pub struct LimitSizeListGuard<T> {
    task: tokio::task::JoinHandle<()>,
    #[allow(dead_code)]
    state: Rc<RefCell<ListState>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Drop for LimitSizeListGuard<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{list_change::ListChange, scheduler::TokioScheduler};

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn evicts_oldest_once_limit_is_exceeded() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let source: Rc<SourceCache<i32, i32, &'static str>> = Rc::new(SourceCache::new(|v| *v));
                let _guard = limit_size_to(Rc::clone(&source), Rc::new(TokioScheduler), 2);
                tokio::task::yield_now().await;

                source
                    .edit(|w| {
                        w.add_or_update(1);
                        w.add_or_update(2);
                        w.add_or_update(3);
                        Ok::<_, &'static str>(())
                    })
                    .unwrap();
                tokio::task::yield_now().await;
                tokio::time::advance(std::time::Duration::from_millis(1)).await;
                tokio::task::yield_now().await;

                assert_eq!(source.count(), 2);
                assert_eq!(source.lookup(&1), None); // oldest evicted first
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn list_evicts_oldest_run_via_single_remove_range() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let source: Rc<SourceList<i32, &'static str>> = Rc::new(SourceList::new());
                let _guard = limit_size_to_list(Rc::clone(&source), Rc::new(TokioScheduler), 10);
                tokio::task::yield_now().await;

                let mut sub = source.connect(); // list starts empty: no replay batch to skip

                source
                    .edit(|w| {
                        w.add_range(0, (0..100).collect());
                        Ok::<_, &'static str>(())
                    })
                    .unwrap();

                let first = sub.next().await.unwrap().into_next().unwrap();
                assert_eq!(first.item_count(), 100);

                tokio::task::yield_now().await;
                tokio::time::advance(std::time::Duration::from_millis(1)).await;
                tokio::task::yield_now().await;

                let second = sub.next().await.unwrap().into_next().unwrap();
                assert_eq!(second.len(), 1);
                match second.into_iter().next().unwrap() {
                    ListChange::RemoveRange { index, items } => {
                        assert_eq!(index, 0);
                        assert_eq!(items.len(), 90);
                        assert_eq!(items, (0..90).collect::<Vec<_>>());
                    }
                    other => panic!("expected a single RemoveRange, got {other:?}"),
                }

                assert_eq!(source.count(), 10);
                assert_eq!(source.items(), (90..100).collect::<Vec<_>>());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn list_stays_untouched_when_under_limit() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let source: Rc<SourceList<i32, &'static str>> = Rc::new(SourceList::new());
                let _guard = limit_size_to_list(Rc::clone(&source), Rc::new(TokioScheduler), 10);
                tokio::task::yield_now().await;

                source
                    .edit(|w| {
                        w.add_range(0, vec![1, 2, 3]);
                        Ok::<_, &'static str>(())
                    })
                    .unwrap();
                tokio::task::yield_now().await;
                tokio::time::advance(std::time::Duration::from_millis(1)).await;
                tokio::task::yield_now().await;

                assert_eq!(source.items(), vec![1, 2, 3]);
            })
            .await;
    }
}
