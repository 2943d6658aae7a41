//! The `batch_if` operator: a
//! `buffer_if` variant driven purely by a fixed time window rather than an
//! external pause signal — every change arriving within one window is
//! coalesced through a [`Reducer`] and released together at the window's
//! end. A window that received nothing produces no output.

use std::{hash::Hash, rc::Rc, time::Duration};

use futures::{
    channel::mpsc,
    stream::{LocalBoxStream, StreamExt as _},
};

use crate::{change_set::ChangeSet, reducer::Reducer, scheduler::Scheduler, subject::Notification};

/// Coalesces `upstream` into one batch per `window`, releasing only
/// windows that actually received changes.
pub fn batch_if<K, T, E, S>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>,
    scheduler: Rc<S>,
    window: Duration,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: 'static,
    S: Scheduler,
{
    let (tx, rx) = mpsc::unbounded();
    tokio::task::spawn_local(async move {
        let mut upstream = upstream;
        let (tick_tx, mut tick_rx) = mpsc::unbounded::<()>();
        let tick_tx_for_timer = tick_tx.clone();
        let _ticker = scheduler.schedule_periodic(
            window,
            Rc::new(move || {
                let _ = tick_tx_for_timer.unbounded_send(());
            }),
        );
        let mut reducer: Reducer<T, K> = Reducer::new();
        let mut has_pending = false;

        loop {
            futures::select_biased! {
                notification = upstream.next() => {
                    match notification {
                        Some(Notification::Next(changes)) => {
                            for change in changes {
                                reducer.apply(change);
                            }
                            has_pending = true;
                        }
                        Some(Notification::Error(error)) => {
                            let _ = tx.unbounded_send(Notification::Error(error));
                            break;
                        }
                        None => break,
                    }
                }
                tick = tick_rx.next() => {
                    if tick.is_none() {
                        break;
                    }
                    if has_pending {
                        let changes = std::mem::replace(&mut reducer, Reducer::new()).finish();
                        has_pending = false;
                        if !changes.is_empty() && tx.unbounded_send(Notification::Next(changes)).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });
    Box::pin(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{change::Change, scheduler::TokioScheduler};
    use futures::channel::mpsc as test_mpsc;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn coalesces_changes_within_one_window() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (upstream_tx, upstream_rx) = test_mpsc::unbounded();
                let mut out = batch_if::<i32, i32, &'static str, _>(
                    Box::pin(upstream_rx),
                    Rc::new(TokioScheduler),
                    Duration::from_secs(1),
                );
                let mut set1 = ChangeSet::new();
                set1.push(Change::Add { key: 1, current: 1, index: None });
                upstream_tx.unbounded_send(Notification::Next(set1)).unwrap();
                let mut set2 = ChangeSet::new();
                set2.push(Change::Add { key: 2, current: 2, index: None });
                upstream_tx.unbounded_send(Notification::Next(set2)).unwrap();
                tokio::task::yield_now().await;

                tokio::time::advance(Duration::from_secs(1)).await;
                let received = out.next().await.unwrap().into_next().unwrap();
                assert_eq!(received.len(), 2);
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn an_empty_window_produces_nothing() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let (_upstream_tx, upstream_rx) = test_mpsc::unbounded::<Notification<ChangeSet<i32, i32>, &'static str>>();
                let mut out = batch_if(Box::pin(upstream_rx), Rc::new(TokioScheduler), Duration::from_millis(100));
                tokio::time::advance(Duration::from_millis(100)).await;
                tokio::task::yield_now().await;
                tokio::time::advance(Duration::from_millis(100)).await;
                assert!(futures::poll!(out.next()).is_pending());
            })
            .await;
    }
}
