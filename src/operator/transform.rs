//! The `transform` operator: maps each
//! item's value, preserving key and change shape. Both a pure selector
//! and an async selector (with a [`Concurrency`] knob) are provided.

use std::{collections::HashSet, hash::Hash};

use futures::{
    future,
    stream::{LocalBoxStream, StreamExt as _},
};

use crate::{
    change::Change,
    change_set::ChangeSet,
    operator::{drive, Concurrency, Operator},
    subject::Notification,
};

/// Maps every item's value through a pure `F`, keeping keys, reasons and
/// indices unchanged.
pub struct Transform<K, T, U, F> {
    selector: F,
    _marker: std::marker::PhantomData<(K, T, U)>,
}

impl<K, T, U, F> Transform<K, T, U, F>
where
    F: Fn(&T) -> U,
{
    /// Returns a new transform operator.
    #[must_use]
    pub fn new(selector: F) -> Self {
        Self {
            selector,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, U, F> Operator for Transform<K, T, U, F>
where
    F: Fn(&T) -> U,
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<U, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        if input.is_empty() {
            return None;
        }
        let mut out = ChangeSet::with_capacity(input.len());
        for change in input {
            out.push(change.map_value(&self.selector));
        }
        Some(out)
    }
}

/// Drives a [`Transform`] over a live notification stream.
pub fn transform_changes<K, T, U, F, E>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>,
    selector: F,
) -> LocalBoxStream<'static, Notification<ChangeSet<U, K>, E>>
where
    K: 'static,
    T: 'static,
    U: 'static,
    F: Fn(&T) -> U + 'static,
    E: 'static,
{
    drive(Transform::<K, T, U, F>::new(selector), upstream)
}

/// As [`transform_changes`], but `selector` returns a future — used when
/// deriving a projected value requires awaiting something (an external
/// lookup, a deferred computation result). `concurrency` governs whether
/// the futures for one batch's items are awaited one at a time or
/// concurrently; either way the output batch preserves input order.
pub fn transform_changes_async<K, T, U, F, Fut, E>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>,
    selector: F,
    concurrency: Concurrency,
) -> LocalBoxStream<'static, Notification<ChangeSet<U, K>, E>>
where
    K: Clone + 'static,
    T: 'static,
    U: 'static,
    F: Fn(&T) -> Fut + Clone + 'static,
    Fut: std::future::Future<Output = U> + 'static,
    E: 'static,
{
    Box::pin(upstream.then(move |notification| {
        let selector = selector.clone();
        async move {
            match notification {
                Notification::Next(input) => {
                    let changes: Vec<Change<T, K>> = input.into_vec();
                    let mapped: Vec<Change<U, K>> = match concurrency {
                        Concurrency::Ordered => {
                            let mut mapped = Vec::with_capacity(changes.len());
                            for change in changes {
                                let selector = selector.clone();
                                mapped.push(map_change_async(change, selector).await);
                            }
                            mapped
                        }
                        Concurrency::Parallel => {
                            let futures = changes
                                .into_iter()
                                .map(|change| map_change_async(change, selector.clone()));
                            future::join_all(futures).await
                        }
                    };
                    Notification::Next(ChangeSet::from_vec(mapped))
                }
                Notification::Error(error) => Notification::Error(error),
            }
        }
    }))
}

/// As [`Transform`], but `selector` may fail per item; a failing item is
/// routed to `on_error` instead of propagating an `UpstreamError` to every
/// subscriber, and is treated as a `Remove` if it was previously present
/// in the transformed output, never added otherwise.
pub struct TransformSafe<K, T, U, F, Err> {
    selector: F,
    on_error: Err,
    present: HashSet<K>,
    _marker: std::marker::PhantomData<(T, U)>,
}

impl<K, T, U, F, Err> TransformSafe<K, T, U, F, Err>
where
    K: Hash + Eq + Clone,
    F: Fn(&T) -> Result<U, String>,
    Err: FnMut(&K, String),
{
    /// Returns a new safe-transform operator.
    #[must_use]
    pub fn new(selector: F, on_error: Err) -> Self {
        Self {
            selector,
            on_error,
            present: HashSet::new(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, T, U, F, Err> Operator for TransformSafe<K, T, U, F, Err>
where
    K: Hash + Eq + Clone,
    T: Clone,
    F: Fn(&T) -> Result<U, String>,
    Err: FnMut(&K, String),
{
    type Input = ChangeSet<T, K>;
    type Output = ChangeSet<U, K>;

    fn process(&mut self, input: Self::Input) -> Option<Self::Output> {
        let mut out = ChangeSet::new();
        for change in input {
            match change {
                Change::Add { key, current, index } => match (self.selector)(&current) {
                    Ok(mapped) => {
                        self.present.insert(key.clone());
                        out.push(Change::Add { key, current: mapped, index });
                    }
                    Err(err) => (self.on_error)(&key, err),
                },
                Change::Update {
                    key,
                    current,
                    previous,
                    index,
                } => match (self.selector)(&current) {
                    Ok(mapped_current) => {
                        if self.present.contains(&key) {
                            // Re-running the selector on `previous` is the
                            // only way to get the matching downstream value
                            // to pair with an `Update`; if it now fails
                            // there is nothing valid to emit as `previous`,
                            // so fall back to treating this as an `Add`.
                            match (self.selector)(&previous) {
                                Ok(mapped_previous) => out.push(Change::Update {
                                    key,
                                    current: mapped_current,
                                    previous: mapped_previous,
                                    index,
                                }),
                                Err(_) => out.push(Change::Add {
                                    key,
                                    current: mapped_current,
                                    index,
                                }),
                            }
                        } else {
                            self.present.insert(key.clone());
                            out.push(Change::Add { key, current: mapped_current, index });
                        }
                    }
                    Err(err) => {
                        if self.present.remove(&key) {
                            // Downstream previously had a value for this
                            // key; evict it since the new one failed.
                            if let Ok(mapped_previous) = (self.selector)(&previous) {
                                out.push(Change::Remove {
                                    key: key.clone(),
                                    current: mapped_previous,
                                    index,
                                });
                            }
                        }
                        (self.on_error)(&key, err);
                    }
                },
                Change::Remove { key, current, index } => {
                    if self.present.remove(&key) {
                        if let Ok(mapped) = (self.selector)(&current) {
                            out.push(Change::Remove { key, current: mapped, index });
                        }
                    }
                }
                Change::Refresh { key, current, index } => {
                    if self.present.contains(&key) {
                        if let Ok(mapped) = (self.selector)(&current) {
                            out.push(Change::Refresh { key, current: mapped, index });
                        }
                    }
                }
                Change::Moved {
                    key,
                    current,
                    previous_index,
                    current_index,
                } => {
                    if self.present.contains(&key) {
                        if let Ok(mapped) = (self.selector)(&current) {
                            out.push(Change::Moved {
                                key,
                                current: mapped,
                                previous_index,
                                current_index,
                            });
                        }
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

/// Forces recomputation of `selector` for every key currently tracked by
/// `transform`, emitting an `Update` for each — even where the recomputed
/// value compares equal to the one it replaces, since `re_transform_all`
/// exists precisely to let a transform whose inputs changed out-of-band
/// recompute.
pub fn re_transform_all<K, T, U, F>(
    current: &std::collections::HashMap<K, T>,
    previous_outputs: &std::collections::HashMap<K, U>,
    selector: &F,
) -> ChangeSet<U, K>
where
    K: Hash + Eq + Clone,
    T: Clone,
    U: Clone,
    F: Fn(&T) -> U,
{
    re_transform_selected(current, previous_outputs, selector, current.keys().cloned())
}

/// As [`re_transform_all`], but only for the keys yielded by `keys`.
pub fn re_transform_selected<K, T, U, F>(
    current: &std::collections::HashMap<K, T>,
    previous_outputs: &std::collections::HashMap<K, U>,
    selector: &F,
    keys: impl IntoIterator<Item = K>,
) -> ChangeSet<U, K>
where
    K: Hash + Eq + Clone,
    T: Clone,
    U: Clone,
    F: Fn(&T) -> U,
{
    let mut out = ChangeSet::new();
    for key in keys {
        if let (Some(value), Some(previous)) = (current.get(&key), previous_outputs.get(&key)) {
            out.push(Change::Update {
                key,
                current: selector(value),
                previous: previous.clone(),
                index: None,
            });
        }
    }
    out
}

async fn map_change_async<K, T, U, F, Fut>(change: Change<T, K>, selector: F) -> Change<U, K>
where
    F: Fn(&T) -> Fut,
    Fut: std::future::Future<Output = U>,
{
    match change {
        Change::Add { key, current, index } => {
            let current = selector(&current).await;
            Change::Add { key, current, index }
        }
        Change::Update {
            key,
            current,
            previous,
            index,
        } => {
            let current = selector(&current).await;
            let previous = selector(&previous).await;
            Change::Update {
                key,
                current,
                previous,
                index,
            }
        }
        Change::Remove { key, current, index } => {
            let current = selector(&current).await;
            Change::Remove { key, current, index }
        }
        Change::Refresh { key, current, index } => {
            let current = selector(&current).await;
            Change::Refresh { key, current, index }
        }
        Change::Moved {
            key,
            current,
            previous_index,
            current_index,
        } => {
            let current = selector(&current).await;
            Change::Moved {
                key,
                current,
                previous_index,
                current_index,
            }
        }
    }
}
