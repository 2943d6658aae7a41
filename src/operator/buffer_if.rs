//! The `buffer_if` operator: withholds
//! upstream change sets while a user-supplied pause signal is `true`,
//! coalescing everything that arrived during the pause through a
//! [`Reducer`] and releasing it as one batch the moment the signal goes
//! `false`. An optional maximum buffered duration, enforced through the
//! injected [`Scheduler`], forces a flush even if the pause signal never
//! clears, so a caller can bound staleness without giving up coalescing.

use std::{hash::Hash, rc::Rc, time::Duration};

use futures::{
    channel::mpsc,
    stream::{LocalBoxStream, StreamExt as _},
};

use crate::{
    change_set::ChangeSet,
    reducer::Reducer,
    scheduler::Scheduler,
    subject::Notification,
};

enum Event<T, K, E> {
    Upstream(Notification<ChangeSet<T, K>, E>),
    Pause(bool),
}

/// Buffers `upstream` while `pause` reports `true`, flushing the
/// coalesced backlog as one batch when `pause` reports `false` (or, if
/// `max_buffered` is set, after that much time has passed since the
/// oldest still-buffered change arrived).
pub fn buffer_if<K, T, E, S>(
    upstream: LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>,
    pause: LocalBoxStream<'static, bool>,
    scheduler: Rc<S>,
    max_buffered: Option<Duration>,
) -> LocalBoxStream<'static, Notification<ChangeSet<T, K>, E>>
where
    K: Hash + Eq + Clone + 'static,
    T: Clone + 'static,
    E: 'static,
    S: Scheduler,
{
    let (tx, rx) = mpsc::unbounded();
    tokio::task::spawn_local(async move {
        let mut events = futures::stream::select(
            upstream.map(Event::Upstream),
            pause.map(Event::Pause),
        );
        let mut paused = false;
        let mut reducer: Reducer<T, K> = Reducer::new();
        let mut buffering = false;
        let mut flush_timer = None::<crate::scheduler::ScheduleHandle>;
        let (timer_tx, mut timer_rx) = mpsc::unbounded::<()>();

        loop {
            futures::select_biased! {
                event = events.next() => {
                    let Some(event) = event else { break };
                    match event {
                        Event::Pause(now_paused) => {
                            paused = now_paused;
                            if !paused && buffering {
                                let changes = std::mem::replace(&mut reducer, Reducer::new()).finish();
                                buffering = false;
                                flush_timer = None;
                                if !changes.is_empty() && tx.unbounded_send(Notification::Next(changes)).is_err() {
                                    break;
                                }
                            }
                        }
                        Event::Upstream(Notification::Next(changes)) => {
                            if paused {
                                for change in changes {
                                    reducer.apply(change);
                                }
                                if !buffering {
                                    buffering = true;
                                    if let Some(window) = max_buffered {
                                        let timer_tx = timer_tx.clone();
                                        flush_timer = Some(scheduler.schedule_relative(
                                            window,
                                            Box::new(move || {
                                                let _ = timer_tx.unbounded_send(());
                                            }),
                                        ));
                                    }
                                }
                            } else if tx.unbounded_send(Notification::Next(changes)).is_err() {
                                break;
                            }
                        }
                        Event::Upstream(Notification::Error(error)) => {
                            let _ = tx.unbounded_send(Notification::Error(error));
                            break;
                        }
                    }
                }
                _ = timer_rx.next() => {
                    if buffering {
                        let changes = std::mem::replace(&mut reducer, Reducer::new()).finish();
                        buffering = false;
                        flush_timer = None;
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
