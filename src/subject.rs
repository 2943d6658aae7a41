//! The internal broadcaster used by every source to publish notifications
//! to its subscribers, realizing the push-observer contract with
//! [`futures::channel::mpsc`], exactly as `medea-reactive`'s
//! `SubscribersStore` does for its simpler, non-batched values.
//!
//! A [`Subject`] carries [`Notification::Next`] items until either it is
//! closed normally (dropped, no further items) or [`Subject::error`] is
//! called, after which every subscriber receives exactly one
//! [`Notification::Error`] and then its stream ends — a subscriber never
//! observes another `Next` after an `Error`.

use std::cell::RefCell;

use futures::{channel::mpsc, stream::LocalBoxStream};

/// A single item delivered to a [`Subject`]'s subscribers.
#[derive(Clone, Debug)]
pub enum Notification<T, E> {
    /// A regular published value.
    Next(T),
    /// A terminal error; no further [`Notification`]s follow for this
    /// subscriber.
    Error(E),
}

impl<T, E> Notification<T, E> {
    /// The carried value, if this is a `Next`.
    #[must_use]
    pub fn into_next(self) -> Option<T> {
        match self {
            Self::Next(value) => Some(value),
            Self::Error(_) => None,
        }
    }
}

/// Broadcasts [`Notification`]s to any number of subscribers.
///
/// Subscribing never replays past values by itself — callers that need an
/// "initial snapshot, then live deltas" sequencing must
/// build that snapshot and push it through the same subscription before
/// handing it to the caller; see [`crate::connect`].
pub struct Subject<T, E> {
    subscribers: RefCell<Vec<mpsc::UnboundedSender<Notification<T, E>>>>,
    errored: RefCell<Option<E>>,
}

impl<T, E> Subject<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Returns a new subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            errored: RefCell::new(None),
        }
    }

    /// True once [`Subject::error`] has been called; every subsequent
    /// [`Subject::publish`]/[`Subject::subscribe`] becomes a no-op, per the
    /// `DisposedAfterError` rule.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        self.errored.borrow().is_some()
    }

    /// Subscribes, returning the stream of [`Notification`]s this
    /// subscriber will receive from now on.
    pub fn subscribe(&self) -> LocalBoxStream<'static, Notification<T, E>> {
        let (tx, rx) = mpsc::unbounded();
        if let Some(error) = self.errored.borrow().clone() {
            let _ = tx.unbounded_send(Notification::Error(error));
        } else {
            self.subscribers.borrow_mut().push(tx);
        }
        Box::pin(rx)
    }

    /// Publishes a value to every live subscriber, dropping any whose
    /// receiver has gone away.
    pub fn publish(&self, value: T) {
        if self.is_errored() {
            return;
        }
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(Notification::Next(value.clone())).is_ok());
    }

    /// Delivers a terminal error to every live subscriber and marks the
    /// subject as errored; subsequent publishes are silently dropped.
    pub fn error(&self, error: E) {
        if self.is_errored() {
            return;
        }
        for tx in self.subscribers.borrow_mut().drain(..) {
            let _ = tx.unbounded_send(Notification::Error(error.clone()));
        }
        *self.errored.borrow_mut() = Some(error);
    }

    /// Number of currently live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T, E> Default for Subject<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
