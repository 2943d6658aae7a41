//! The `expire_after` operator: removes
//! each item from its owning [`crate::cache::SourceCache`] a fixed
//! duration after it was last added or updated, via the injected
//! [`crate::scheduler::Scheduler`] rather than a background poll loop.
//!
//! Unlike the pure [`crate::operator::Operator`] implementations elsewhere
//! in this module, expiry must act on the source itself (it issues its own
//! `edit()` transactions once a timer fires), so it is driven by a
//! standing `spawn_local` task rather than a `process` call per batch.

use std::{cell::RefCell, collections::HashMap, hash::Hash, rc::Rc};

use futures::stream::StreamExt as _;

use crate::{
    cache::SourceCache,
    change::Change,
    scheduler::{ScheduleHandle, Scheduler},
    subject::Notification,
};

/// Schedules a removal of each of `source`'s items `duration_of(value)`
/// after it was last touched by an `Add` or `Update`; cancels the pending
/// removal if the item is updated again (the timer restarts) or removed
/// by any other means.
///
/// Returns a [`ScheduleHandle`]-holding guard: dropping it cancels every
/// still-pending per-item timer and stops watching the source.
pub fn expire_after<K, T, E, S, D>(
    source: Rc<SourceCache<K, T, E>>,
    scheduler: Rc<S>,
    duration_of: D,
) -> ExpiryGuard<K>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
    S: Scheduler,
    D: Fn(&T) -> std::time::Duration + 'static,
{
    let handles: Rc<RefCell<HashMap<K, ScheduleHandle>>> = Rc::new(RefCell::new(HashMap::new()));
    let handles_for_task = Rc::clone(&handles);
    let task = tokio::task::spawn_local(async move {
        let mut upstream = source.connect();
        while let Some(notification) = upstream.next().await {
            let changes = match notification {
                Notification::Next(changes) => changes,
                Notification::Error(_) => break,
            };
            for change in changes.iter() {
                match change {
                    Change::Add { key, current, .. } | Change::Update { key, current, .. } => {
                        let key = key.clone();
                        let delay = duration_of(current);
                        let source_for_timer = Rc::clone(&source);
                        let handles_for_timer = Rc::clone(&handles_for_task);
                        let key_for_timer = key.clone();
                        let handle = scheduler.schedule_relative(
                            delay,
                            Box::new(move || {
                                let _ = source_for_timer.edit(|w| {
                                    w.remove(&key_for_timer);
                                    Ok::<(), E>(())
                                });
                                handles_for_timer.borrow_mut().remove(&key_for_timer);
                            }),
                        );
                        handles_for_task.borrow_mut().insert(key, handle);
                    }
                    Change::Remove { key, .. } => {
                        handles_for_task.borrow_mut().remove(key);
                    }
                    Change::Refresh { .. } | Change::Moved { .. } => {}
                }
            }
        }
    });
    ExpiryGuard { task, handles }
}

/// Owns the `expire_after` background task and every item's pending
/// timer. Dropping it cancels all of them.
pub struct ExpiryGuard<K> {
    task: tokio::task::JoinHandle<()>,
    handles: Rc<RefCell<HashMap<K, ScheduleHandle>>>,
}

impl<K> Drop for ExpiryGuard<K> {
    fn drop(&mut self) {
        self.task.abort();
        self.handles.borrow_mut().clear();
    }
}
