//! The set-combinator operators: `and`,
//! `or`, `xor`, and `except` combine several keyed sources over the same
//! key space into one, the way SQL's set operators combine row sets.
//!
//! Each source owns one "slot" per key; a key's merged value, when
//! included, is the value held by the highest-indexed source currently
//! holding it (later sources in the argument list take precedence on
//! conflict, mirroring "last write wins" elsewhere in this crate).
//! Membership itself is decided per [`Combine`] independently of value
//! precedence.

use std::{collections::HashMap, hash::Hash, rc::Rc};

use futures::{
    channel::mpsc,
    stream::{self, LocalBoxStream, StreamExt as _},
};

use crate::{change::Change, change_set::ChangeSet, subject::Notification};

/// Which boolean combination of source membership decides inclusion in
/// the combined result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Combine {
    /// Included iff present in every source.
    And,
    /// Included iff present in at least one source.
    Or,
    /// Included iff present in exactly one source.
    Xor,
    /// Included iff present in the first source and absent from every
    /// other.
    Except,
}

impl Combine {
    fn includes(self, present: &[bool]) -> bool {
        match self {
            Self::And => present.iter().all(|p| *p),
            Self::Or => present.iter().any(|p| *p),
            Self::Xor => present.iter().filter(|p| **p).count() == 1,
            Self::Except => present[0] && present[1..].iter().all(|p| !p),
        }
    }
}

fn merged_value<T: Clone>(slots: &[Option<T>]) -> Option<T> {
    slots.iter().rev().find_map(|slot| slot.clone())
}

/// Combines `sources` (at least two) under `mode`, emitting one change
/// set per upstream transaction that actually alters the combined
/// membership or value.
pub fn combine<K, T, E>(
    sources: Vec<LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>>,
    mode: Combine,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + PartialEq + 'static,
    E: 'static,
{
    let num_sources = sources.len();
    assert!(num_sources >= 2, "combinators need at least two sources");

    let tagged = sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| source.map(move |notification| (index, notification)).boxed_local())
        .collect::<Vec<_>>();
    let mut merged_upstream = stream::select_all(tagged);

    let (tx, rx) = mpsc::unbounded();
    tokio::task::spawn_local(async move {
        let mut slots: HashMap<K, Vec<Option<T>>> = HashMap::new();
        let mut included: HashMap<K, T> = HashMap::new();

        while let Some((index, notification)) = merged_upstream.next().await {
            let changes = match notification {
                Notification::Next(changes) => changes,
                Notification::Error(error) => {
                    let _ = tx.unbounded_send(Notification::Error(error));
                    break;
                }
            };
            let mut out = ChangeSet::new();
            for change in changes.iter() {
                let key = change.key().clone();
                let entry = slots.entry(key.clone()).or_insert_with(|| vec![None; num_sources]);
                match change {
                    Change::Remove { .. } => entry[index] = None,
                    other => entry[index] = Some(other.current().clone()),
                };
                let present: Vec<bool> = entry.iter().map(Option::is_some).collect();
                let now_included = mode.includes(&present);
                let was_included = included.contains_key(&key);
                let new_value = merged_value(entry);

                match (was_included, now_included) {
                    (false, true) => {
                        let value = new_value.expect("included implies a merged value exists");
                        included.insert(key.clone(), value.clone());
                        out.push(Change::Add { key, current: value, index: None });
                    }
                    (true, false) => {
                        let value = included.remove(&key).expect("was_included implies tracked");
                        out.push(Change::Remove { key, current: value, index: None });
                    }
                    (true, true) => {
                        let value = new_value.expect("included implies a merged value exists");
                        let previous = included.insert(key.clone(), value.clone()).expect("was_included");
                        if previous != value {
                            out.push(Change::Update {
                                key,
                                current: value,
                                previous,
                                index: None,
                            });
                        }
                    }
                    (false, false) => {}
                }
            }
            if !out.is_empty() && tx.unbounded_send(Notification::Next(out)).is_err() {
                break;
            }
        }
    });
    Box::pin(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as test_mpsc;

    fn send_add(tx: &test_mpsc::UnboundedSender<Notification<ChangeSet<i32, i32>, Rc<&'static str>>>, key: i32, value: i32) {
        let mut set = ChangeSet::new();
        set.push(Change::Add { key, current: value, index: None });
        tx.unbounded_send(Notification::Next(set)).unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn and_requires_presence_in_both_sources() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (tx_a, rx_a) = test_mpsc::unbounded();
                let (tx_b, rx_b) = test_mpsc::unbounded();
                let mut out = combine(vec![Box::pin(rx_a), Box::pin(rx_b)], Combine::And);

                send_add(&tx_a, 1, 10);
                tokio::task::yield_now().await;
                assert!(futures::poll!(out.next()).is_pending());

                send_add(&tx_b, 1, 20);
                let received = out.next().await.unwrap().into_next().unwrap();
                assert_eq!(received[0].reason(), crate::change::Reason::Add);
                assert_eq!(*received[0].current(), 20); // second source wins the value
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn or_includes_as_soon_as_either_source_has_it() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (tx_a, rx_a) = test_mpsc::unbounded();
                let (_tx_b, rx_b) = test_mpsc::unbounded();
                let mut out = combine(vec![Box::pin(rx_a), Box::pin(rx_b)], Combine::Or);

                send_add(&tx_a, 1, 10);
                let received = out.next().await.unwrap().into_next().unwrap();
                assert_eq!(received[0].reason(), crate::change::Reason::Add);
            })
            .await;
    }
}
