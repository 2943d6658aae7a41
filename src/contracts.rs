//! External collaborator interfaces the core consumes but does not
//! implement: a cancellable deferred computation,
//! and a per-item property-change observable.

use futures::{future::AbortHandle, stream::LocalBoxStream};

/// A future-shaped value with cancellation, consumed by `transform_async`
/// and friends. Realized directly over
/// `futures::future::Future` rather than a bespoke trait: any `Future`
/// already satisfies it.
pub trait DeferredComputation<T>: std::future::Future<Output = T> {}

impl<T, F> DeferredComputation<T> for F where F: std::future::Future<Output = T> {}

/// Wraps `future` so in-flight work can be cancelled via the returned
/// [`AbortHandle`] without awaiting it to completion — used to drop
/// superseded per-key work when a newer change arrives before the
/// previous one finished.
pub fn abortable_computation<T>(
    future: impl std::future::Future<Output = T> + 'static,
) -> (impl std::future::Future<Output = Option<T>>, AbortHandle)
where
    T: 'static,
{
    let (fut, handle) = futures::future::abortable(future);
    (async move { fut.await.ok() }, handle)
}

/// A per-item observable of property-change pulses, used by
/// `filter_on_property`/`filter_on_observable`. A
/// hosting application's entity model implements this over whatever
/// property-change mechanism it already has (a setter that also pushes to
/// a channel, a `Cell`-like wrapper, ...); the core never implements it
/// beyond adapting the resulting stream.
pub trait PropertyObservable<T> {
    /// A stream of pulses, one per time the watched property changes.
    /// Does not replay the current value; callers needing "initial state,
    /// then changes" read the value separately before subscribing.
    fn observe(&self, item: &T) -> LocalBoxStream<'static, ()>;
}
