//! The `filter` operator: projects a keyed
//! or indexed source down to the items matching a predicate, tracking
//! which keys currently pass so that an `Update`/`Refresh` crossing the
//! predicate boundary raises the correct `Add`/`Remove` instead of a
//! `Update`/`Refresh` the downstream never asked to see.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
    rc::Rc,
};

use futures::{
    channel::mpsc,
    stream::{LocalBoxStream, StreamExt as _},
};

use crate::{
    change::Change,
    change_set::ChangeSet,
    contracts::PropertyObservable,
    disposable::{AbortOnDrop, DisposableMap},
    operator::{drive, Operator},
    subject::Notification,
};

/// Filters a `ChangeSet<T, K>` stream down to items matching `predicate`.
pub struct FilterCache<K, T, F> {
    included: HashSet<K>,
    predicate: F,
    _marker: std::marker::PhantomData<T>,
}

impl<K, T, F> FilterCache<K, T, F>
where
    K: Hash + Eq + Clone,
    F: Fn(&T) -> bool,
{
    /// Returns a new filter operator, starting with no keys known to pass
    /// (the first batch it processes establishes the initial membership).
    #[must_use]
    pub fn new(predicate: F) -> Self {
        Self {
            included: HashSet::new(),
            predicate,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, F> Operator for FilterCache<K, T, F>
where
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&T) -> bool,
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<T, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let mut out = ChangeSet::new();
        for change in input {
            match change {
                Change::Add { key, current, index } => {
                    if (self.predicate)(&current) {
                        self.included.insert(key.clone());
                        out.push(Change::Add { key, current, index });
                    }
                }
                Change::Update {
                    key,
                    current,
                    previous,
                    index,
                } => {
                    let was_included = self.included.contains(&key);
                    let now_matches = (self.predicate)(&current);
                    match (was_included, now_matches) {
                        (true, true) => out.push(Change::Update {
                            key,
                            current,
                            previous,
                            index,
                        }),
                        (true, false) => {
                            self.included.remove(&key);
                            out.push(Change::Remove {
                                key,
                                current: previous,
                                index,
                            });
                        }
                        (false, true) => {
                            self.included.insert(key.clone());
                            out.push(Change::Add { key, current, index });
                        }
                        (false, false) => {}
                    }
                }
                Change::Remove { key, current, index } => {
                    if self.included.remove(&key) {
                        out.push(Change::Remove { key, current, index });
                    }
                }
                Change::Refresh { key, current, index } => {
                    let was_included = self.included.contains(&key);
                    let now_matches = (self.predicate)(&current);
                    match (was_included, now_matches) {
                        (true, true) => out.push(Change::Refresh { key, current, index }),
                        (true, false) => {
                            self.included.remove(&key);
                            out.push(Change::Remove { key, current, index });
                        }
                        (false, true) => {
                            self.included.insert(key.clone());
                            out.push(Change::Add { key, current, index });
                        }
                        (false, false) => {}
                    }
                }
                Change::Moved {
                    key,
                    current,
                    previous_index,
                    current_index,
                } => {
                    if self.included.contains(&key) {
                        out.push(Change::Moved {
                            key,
                            current,
                            previous_index,
                            current_index,
                        });
                    }
                }
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

/// Drives a [`FilterCache`] over a live notification stream.
pub fn filter_changes<K, T, F, E>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>,
    predicate: F,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    F: Fn(&T) -> bool + 'static,
    E: 'static,
{
    drive(FilterCache::<K, T, F>::new(predicate), upstream)
}

/// As [`filter_changes`], but re-evaluates `predicate` for an item
/// whenever `trigger_of(&item)`'s stream pulses, issuing a synthetic
/// `Refresh` through the same boundary-crossing logic `Update` uses.
///
/// One forwarding task per currently-matched-by-upstream item is spawned
/// via `spawn_local` and aborted (via [`AbortOnDrop`]) the moment that
/// item leaves upstream or is replaced by an `Update`, mirroring
/// `crate::operator::merge_many`'s per-member task management.
pub fn filter_on_observable<K, T, F, P, E>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>,
    trigger_of: F,
    predicate: P,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    F: Fn(&T) -> LocalBoxStream<'static, ()> + 'static,
    P: Fn(&T) -> bool + 'static,
    E: 'static,
{
    enum Event<T, K, E> {
        Upstream(Notification<ChangeSet<T, K>, Rc<E>>),
        Trigger(K),
    }

    let (out_tx, out_rx) = mpsc::unbounded();
    let (trig_tx, trig_rx) = mpsc::unbounded::<K>();
    let mut merged = futures::stream::select(upstream.map(Event::Upstream), trig_rx.map(Event::Trigger));

    tokio::task::spawn_local(async move {
        let mut mirror: HashMap<K, T> = HashMap::new();
        let mut tasks: DisposableMap<K, AbortOnDrop> = DisposableMap::new();
        let mut filter_op = FilterCache::<K, T, P>::new(predicate);

        while let Some(event) = merged.next().await {
            match event {
                Event::Upstream(Notification::Next(changes)) => {
                    for change in changes.iter() {
                        match change {
                            Change::Add { key, current, .. } | Change::Update { key, current, .. } => {
                                mirror.insert(key.clone(), current.clone());
                                spawn_trigger_task(key.clone(), current, &trigger_of, &trig_tx, &mut tasks);
                            }
                            Change::Remove { key, .. } => {
                                mirror.remove(key);
                                tasks.remove(key);
                            }
                            Change::Refresh { .. } | Change::Moved { .. } => {}
                        }
                    }
                    if let Some(out) = filter_op.process(changes) {
                        if out_tx.unbounded_send(Notification::Next(out)).is_err() {
                            break;
                        }
                    }
                }
                Event::Upstream(Notification::Error(error)) => {
                    let _ = out_tx.unbounded_send(Notification::Error(error));
                    break;
                }
                Event::Trigger(key) => {
                    if let Some(value) = mirror.get(&key) {
                        let mut synthetic = ChangeSet::new();
                        synthetic.push(Change::Refresh {
                            key: key.clone(),
                            current: value.clone(),
                            index: None,
                        });
                        if let Some(out) = filter_op.process(synthetic) {
                            if out_tx.unbounded_send(Notification::Next(out)).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    });

    Box::pin(out_rx)
}

fn spawn_trigger_task<K, T, F>(
    key: K,
    value: &T,
    trigger_of: &F,
    trig_tx: &mpsc::UnboundedSender<K>,
    tasks: &mut DisposableMap<K, AbortOnDrop>,
) where
    K: Hash + Eq + Clone + 'static,
    F: Fn(&T) -> LocalBoxStream<'static, ()>,
{
    let mut trigger = trigger_of(value);
    let trig_tx = trig_tx.clone();
    let key_for_task = key.clone();
    let handle = tokio::task::spawn_local(async move {
        while trigger.next().await.is_some() {
            if trig_tx.unbounded_send(key_for_task.clone()).is_err() {
                break;
            }
        }
    });
    tasks.insert(key, AbortOnDrop::new(handle));
}

/// As [`filter_on_observable`], sourcing the per-item trigger from a
/// [`PropertyObservable`] instead of a caller-supplied closure.
pub fn filter_on_property<K, T, Prop, P, E>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>,
    property: Prop,
    predicate: P,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, Rc<E>>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    Prop: PropertyObservable<T> + 'static,
    P: Fn(&T) -> bool + 'static,
    E: 'static,
{
    let property = Rc::new(property);
    filter_on_observable(upstream, move |item: &T| property.observe(item), predicate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt as _;
    use std::cell::RefCell;

    fn add(k: i32, v: i32) -> Change<i32, i32> {
        Change::Add { key: k, current: v, index: None }
    }
    fn update(k: i32, prev: i32, cur: i32) -> Change<i32, i32> {
        Change::Update { key: k, current: cur, previous: prev, index: None }
    }

    #[test]
    fn only_matching_adds_pass_through() {
        let mut op = FilterCache::new(|v: &i32| *v % 2 == 0);
        let mut set = ChangeSet::new();
        set.push(add(1, 1));
        set.push(add(2, 2));
        let out = op.process(set).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(*out[0].key(), 2);
    }

    #[test]
    fn update_crossing_boundary_becomes_remove() {
        let mut op = FilterCache::new(|v: &i32| *v % 2 == 0);
        let mut first = ChangeSet::new();
        first.push(add(1, 2));
        op.process(first);

        let mut second = ChangeSet::new();
        second.push(update(1, 2, 3));
        let out = op.process(second).unwrap();
        assert_eq!(out[0].reason(), crate::change::Reason::Remove);
    }

    #[test]
    fn update_entering_boundary_becomes_add() {
        let mut op = FilterCache::new(|v: &i32| *v % 2 == 0);
        let mut first = ChangeSet::new();
        first.push(add(1, 1)); // doesn't match, not included
        op.process(first);

        let mut second = ChangeSet::new();
        second.push(update(1, 1, 2)); // now matches
        let out = op.process(second).unwrap();
        assert_eq!(out[0].reason(), crate::change::Reason::Add);
    }

    #[test]
    fn non_matching_transitions_produce_no_output() {
        let mut op = FilterCache::new(|v: &i32| *v % 2 == 0);
        let mut set = ChangeSet::new();
        set.push(add(1, 1));
        assert!(op.process(set).is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn filter_on_observable_reevaluates_on_trigger() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (up_tx, up_rx) = mpsc::unbounded::<Notification<ChangeSet<i32, i32>, Rc<&'static str>>>();
                let (trig_tx, trig_rx) = mpsc::unbounded::<()>();
                let trig_rx = Rc::new(RefCell::new(Some(trig_rx)));

                let mut out = filter_on_observable(
                    Box::pin(up_rx),
                    move |_: &i32| {
                        let rx = trig_rx.borrow_mut().take();
                        match rx {
                            Some(rx) => Box::pin(rx.map(|_| ())) as LocalBoxStream<'static, ()>,
                            None => Box::pin(futures::stream::pending()),
                        }
                    },
                    |v: &i32| *v >= 10,
                );

                let mut first = ChangeSet::new();
                first.push(add(1, 1)); // below threshold, filtered out
                up_tx.unbounded_send(Notification::Next(first)).unwrap();
                tokio::task::yield_now().await;

                // externally bump the tracked value past the threshold and
                // pulse the trigger without any upstream Update.
                trig_tx.unbounded_send(()).unwrap();
                tokio::task::yield_now().await;
                // mirror still holds 1, so the re-evaluation still excludes it.
                assert!(out.next().now_or_never().flatten().is_none());

                let mut second = ChangeSet::new();
                second.push(update(1, 1, 20));
                up_tx.unbounded_send(Notification::Next(second)).unwrap();
                let emitted = out.next().await.unwrap().into_next().unwrap();
                assert_eq!(emitted[0].reason(), crate::change::Reason::Add);
            })
            .await;
    }
}
