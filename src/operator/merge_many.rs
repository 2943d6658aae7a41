//! The `merge_many` operator: given a
//! container cache whose items each expose their own observable change
//! stream (a nested `SourceCache`, a `PropertyObservable`, ...), merges
//! every member's stream into one, tagging each emitted change with its
//! owning item's key the way `group_on`'s member caches are addressed by
//! their group key.
//!
//! One forwarding task per currently-live container member is spawned via
//! `spawn_local`, mirroring [`crate::connect::RefCount`]'s per-subscriber
//! task management; a member's task is aborted the moment it leaves the
//! container, and every still-running task is aborted when the container
//! itself ends.

use std::{cell::RefCell, collections::HashMap, hash::Hash, rc::Rc};

use futures::{
    channel::mpsc,
    stream::{LocalBoxStream, StreamExt as _},
};

use crate::{change::Change, change_set::ChangeSet, subject::Notification};

/// One change raised by a member item's own stream, tagged with the
/// member's key in the outer container.
pub struct MemberChange<K, C> {
    /// The container key of the item that raised this change.
    pub key: K,
    /// The change itself, in the member's own change type.
    pub change: C,
}

/// Merges the per-member streams of every item currently in `container`,
/// re-sourcing (spawning/aborting member tasks) as membership changes.
///
/// `stream_of` opens one member's own observable stream from its value;
/// it is called once per member, when it (re)enters the container.
pub fn merge_many<K, T, C, F, E>(
    container: LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>,
    stream_of: F,
) -> LocalBoxStream<'static, MemberChange<K, C>>
where
    K: Hash + Eq + Clone + 'static,
    T: 'static,
    C: 'static,
    F: Fn(&T) -> LocalBoxStream<'static, C> + 'static,
    E: 'static,
{
    let (tx, rx) = mpsc::unbounded();
    let tasks: Rc<RefCell<HashMap<K, tokio::task::JoinHandle<()>>>> = Rc::new(RefCell::new(HashMap::new()));
    let tasks_for_main = Rc::clone(&tasks);
    tokio::task::spawn_local(async move {
        let mut container = container;
        while let Some(notification) = container.next().await {
            let changes = match notification {
                Notification::Next(changes) => changes,
                Notification::Error(_) => break,
            };
            for change in changes.iter() {
                match change {
                    Change::Add { key, current, .. } => {
                        spawn_member_task(key.clone(), current, &stream_of, &tx, &tasks_for_main);
                    }
                    Change::Update { key, current, .. } => {
                        if let Some(old) = tasks_for_main.borrow_mut().remove(key) {
                            old.abort();
                        }
                        spawn_member_task(key.clone(), current, &stream_of, &tx, &tasks_for_main);
                    }
                    Change::Remove { key, .. } => {
                        if let Some(task) = tasks_for_main.borrow_mut().remove(key) {
                            task.abort();
                        }
                    }
                    Change::Refresh { .. } | Change::Moved { .. } => {}
                }
            }
        }
        for (_, task) in tasks_for_main.borrow_mut().drain() {
            task.abort();
        }
    });
    Box::pin(rx)
}

fn spawn_member_task<K, T, C, F>(
    key: K,
    value: &T,
    stream_of: &F,
    tx: &mpsc::UnboundedSender<MemberChange<K, C>>,
    tasks: &Rc<RefCell<HashMap<K, tokio::task::JoinHandle<()>>>>,
) where
    K: Hash + Eq + Clone + 'static,
    T: 'static,
    C: 'static,
    F: Fn(&T) -> LocalBoxStream<'static, C> + 'static,
{
    let member_stream = stream_of(value);
    let tx = tx.clone();
    let key_for_task = key.clone();
    let handle = tokio::task::spawn_local(async move {
        let mut member_stream = member_stream;
        while let Some(change) = member_stream.next().await {
            if tx
                .unbounded_send(MemberChange {
                    key: key_for_task.clone(),
                    change,
                })
                .is_err()
            {
                break;
            }
        }
    });
    tasks.borrow_mut().insert(key, handle);
}
