//! The `switch` operator: re-sources a
//! downstream subscription from a stream-of-streams, always following the
//! most recently produced inner source. The previous inner source's
//! subscription is dropped (cancelling it, the same way
//! [`crate::connect::RefCount`] cancels its own upstream task at zero
//! subscribers) the moment a new one arrives.
//!
//! Because the new inner source starts its own fresh snapshot, its first
//! notification is diffed against the outgoing mirror rather than
//! forwarded as-is: items common to both sources are left alone (no
//! spurious `Remove`+`Add` pair), items only in the old source are
//! removed, and items only in the new source are added.

use std::{collections::HashMap, hash::Hash, rc::Rc};

use futures::{
    channel::mpsc,
    stream::{LocalBoxStream, StreamExt as _},
};

use crate::{change::Change, change_set::ChangeSet, operator::cache_cloner, subject::Notification};

/// Follows whichever inner stream `sources` most recently produced,
/// diffing the switch-over against the previously mirrored state.
pub fn switch<K, T, E>(
    sources: LocalBoxStream<'static, LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>>,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + PartialEq + 'static,
    E: 'static,
{
    let (tx, rx) = mpsc::unbounded();
    tokio::task::spawn_local(async move {
        let mirror = Rc::new(std::cell::RefCell::new(HashMap::<K, T>::new()));
        let mut current_inner: Option<tokio::task::JoinHandle<()>> = None;
        let mut sources = sources;

        while let Some(inner) = sources.next().await {
            if let Some(previous) = current_inner.take() {
                previous.abort();
            }
            let tx = tx.clone();
            let mirror = Rc::clone(&mirror);
            let handle = tokio::task::spawn_local(async move {
                let mut inner = inner;
                let mut first = true;
                while let Some(notification) = inner.next().await {
                    match notification {
                        Notification::Next(changes) => {
                            let out = if first {
                                first = false;
                                diff_against_mirror(&mirror.borrow(), &changes)
                            } else {
                                changes
                            };
                            {
                                let mut mirror = mirror.borrow_mut();
                                cache_cloner::apply(&mut mirror, &out);
                            }
                            if !out.is_empty() && tx.unbounded_send(Notification::Next(out)).is_err() {
                                break;
                            }
                        }
                        Notification::Error(error) => {
                            let _ = tx.unbounded_send(Notification::Error(error));
                            break;
                        }
                    }
                }
            });
            current_inner = Some(handle);
        }
    });
    Box::pin(rx)
}

/// Builds the change set that turns `mirror` into the state implied by a
/// fresh inner source's first snapshot `changes` (itself normally an
/// `Add`-only replay, per every source's `connect()` contract).
fn diff_against_mirror<K, T>(mirror: &HashMap<K, T>, changes: &ChangeSet<T, K>) -> ChangeSet<T, K>
where
    K: Hash + Eq + Clone,
    T: Clone + PartialEq,
{
    let mut incoming = HashMap::new();
    for change in changes.iter() {
        incoming.insert(change.key().clone(), change.current().clone());
    }
    let mut out = ChangeSet::new();
    for (key, value) in mirror {
        if !incoming.contains_key(key) {
            out.push(Change::Remove {
                key: key.clone(),
                current: value.clone(),
                index: None,
            });
        }
    }
    for (key, value) in incoming {
        match mirror.get(&key) {
            None => out.push(Change::Add {
                key,
                current: value,
                index: None,
            }),
            Some(previous) if *previous != value => out.push(Change::Update {
                key,
                current: value,
                previous: previous.clone(),
                index: None,
            }),
            Some(_) => {}
        }
    }
    out
}
