//! The connection/subscription protocol:
//! ref-counted sharing of a single upstream subscription, and derived
//! connection-status monitoring.

use std::{
    cell::RefCell,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::{
    future,
    stream::{self, LocalBoxStream, Stream, StreamExt as _},
};

pub use crate::subject::Notification;

/// The lifecycle state of a connection, as reported by
/// [`monitor_status`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// No change set has arrived yet (not even an initial one).
    Pending,
    /// At least one change set (the initial snapshot or a live delta) has
    /// arrived.
    Loaded,
    /// The upstream faulted; no further change sets will arrive.
    Errored,
}

/// Derives a [`Status`] stream from a source's edit-pulse stream.
///
/// `edits` must emit one [`Notification::Next`] per completed edit
/// (including edits that produced no visible change, and the always-happens
/// "initial" pulse at subscribe time), and at most one terminal
/// [`Notification::Error`]. Sources expose this via their own
/// `edits()`/`monitor_status()` methods, which take care of synchronously
/// seeding the first pulse the way `connect()` does for
/// ordinary change sets.
pub fn monitor_status<E>(
    edits: LocalBoxStream<'static, Notification<(), E>>,
) -> LocalBoxStream<'static, Status>
where
    E: 'static,
{
    Box::pin(stream::once(future::ready(Status::Pending)).chain(edits.filter_map(|n| {
        future::ready(Some(match n {
            Notification::Next(()) => Status::Loaded,
            Notification::Error(_) => Status::Errored,
        }))
    })))
}

/// Shares a single upstream connection among any number of downstream
/// subscribers.
///
/// The upstream is (re)subscribed the moment the subscriber count
/// transitions 0→1, by spawning a local forwarding task onto the current
/// [`tokio::task::LocalSet`] (matching `medea-reactive`'s own
/// `LocalSet`-based test harness, since every type in this crate is
/// `!Send`). It is disposed — the task aborted — on the 1→0 transition. A
/// subscriber joining after a 1→0 transition causes a fresh upstream
/// subscription and therefore a fresh initial snapshot, per spec.
pub struct RefCount<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    connect: Rc<dyn Fn() -> LocalBoxStream<'static, Notification<T, E>>>,
    inner: Rc<RefCell<Inner<T, E>>>,
}

struct Inner<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    subject: crate::subject::Subject<T, E>,
    count: usize,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl<T, E> RefCount<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Wraps `connect`, a factory that produces a fresh upstream
    /// subscription stream each time it is called.
    pub fn new(connect: impl Fn() -> LocalBoxStream<'static, Notification<T, E>> + 'static) -> Self {
        Self {
            connect: Rc::new(connect),
            inner: Rc::new(RefCell::new(Inner {
                subject: crate::subject::Subject::new(),
                count: 0,
                task: None,
            })),
        }
    }

    /// Subscribes, subscribing the upstream first if this is the first
    /// live downstream subscriber.
    ///
    /// # Panics
    /// The forwarding task is spawned with [`tokio::task::spawn_local`],
    /// which panics outside a [`tokio::task::LocalSet`] context.
    pub fn subscribe(&self) -> RefCountSubscription<T, E> {
        let mut inner = self.inner.borrow_mut();
        inner.count += 1;
        if inner.count == 1 {
            // A fresh epoch gets a fresh `Subject`: reusing the previous
            // one would leave it permanently `errored` after an upstream
            // fault, silently swallowing every notification of the new
            // upstream subscription this transition is about to create.
            inner.subject = crate::subject::Subject::new();
            let upstream = (self.connect)();
            let inner_rc = Rc::clone(&self.inner);
            let task = tokio::task::spawn_local(async move {
                let mut upstream = upstream;
                while let Some(notification) = upstream.next().await {
                    let inner = inner_rc.borrow();
                    match notification {
                        Notification::Next(value) => inner.subject.publish(value),
                        Notification::Error(error) => {
                            inner.subject.error(error);
                            break;
                        }
                    }
                }
            });
            inner.task = Some(task);
        }
        drop(inner);
        RefCountSubscription {
            stream: self.inner.borrow().subject.subscribe(),
            inner: Rc::clone(&self.inner),
        }
    }

    /// Number of currently live downstream subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().count
    }
}

/// A live subscription created by [`RefCount::subscribe`].
///
/// Dropping it decrements the shared subscriber count and, if it reaches
/// zero, disposes the upstream subscription.
pub struct RefCountSubscription<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    stream: LocalBoxStream<'static, Notification<T, E>>,
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Stream for RefCountSubscription<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Item = Notification<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl<T, E> Drop for RefCountSubscription<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn drop(&mut self) {
        let mut inner = self.inner.borrow_mut();
        inner.count -= 1;
        if inner.count == 0 {
            if let Some(task) = inner.task.take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(flavor = "current_thread")]
    async fn status_starts_pending_then_loads() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Notification<(), ()>>();
        let mut status = monitor_status(Box::pin(rx));
        assert_eq!(status.next().await, Some(Status::Pending));
        tx.unbounded_send(Notification::Next(())).unwrap();
        assert_eq!(status.next().await, Some(Status::Loaded));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn status_reports_errored() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Notification<(), &'static str>>();
        let mut status = monitor_status(Box::pin(rx));
        let _ = status.next().await; // Pending
        tx.unbounded_send(Notification::Error("boom")).unwrap();
        assert_eq!(status.next().await, Some(Status::Errored));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn ref_count_subscribes_upstream_once_per_epoch() {
        let subscribe_calls = Rc::new(Cell::new(0));
        let calls = Rc::clone(&subscribe_calls);
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let ref_count: RefCount<i32, &'static str> = RefCount::new(move || {
                    calls.set(calls.get() + 1);
                    let (tx, rx) = futures::channel::mpsc::unbounded();
                    tx.unbounded_send(Notification::Next(1)).unwrap();
                    std::mem::forget(tx);
                    Box::pin(rx)
                });

                let mut sub1 = ref_count.subscribe();
                assert!(matches!(sub1.next().await, Some(Notification::Next(1))));
                let sub2 = ref_count.subscribe();
                assert_eq!(ref_count.subscriber_count(), 2);
                drop(sub1);
                drop(sub2);
                assert_eq!(ref_count.subscriber_count(), 0);

                let mut sub3 = ref_count.subscribe();
                assert!(matches!(sub3.next().await, Some(Notification::Next(1))));
            })
            .await;
        assert_eq!(subscribe_calls.get(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resubscribe_after_upstream_error_gets_fresh_connection() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let epoch = Rc::new(Cell::new(0));
                let epoch_for_connect = Rc::clone(&epoch);
                let ref_count: RefCount<i32, &'static str> = RefCount::new(move || {
                    let this_epoch = epoch_for_connect.get() + 1;
                    epoch_for_connect.set(this_epoch);
                    let (tx, rx) = futures::channel::mpsc::unbounded();
                    if this_epoch == 1 {
                        tx.unbounded_send(Notification::Error("boom")).unwrap();
                    } else {
                        tx.unbounded_send(Notification::Next(42)).unwrap();
                    }
                    std::mem::forget(tx);
                    Box::pin(rx)
                });

                let mut sub1 = ref_count.subscribe();
                assert!(matches!(sub1.next().await, Some(Notification::Error("boom"))));
                drop(sub1);
                assert_eq!(ref_count.subscriber_count(), 0);

                let mut sub2 = ref_count.subscribe();
                assert!(matches!(sub2.next().await, Some(Notification::Next(42))));
            })
            .await;
    }
}
