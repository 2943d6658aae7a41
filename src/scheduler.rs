//! The scheduler contract consumed by time-driven
//! operators (`expire_after`, `limit_size_to`, `buffer_if`). The core
//! never reads the wall clock directly; every "now" and every delay goes
//! through an injected [`Scheduler`], so tests can swap in paused virtual
//! time instead of sleeping in wall time.

use std::{rc::Rc, time::Duration};

use tokio::time::Instant;

/// A handle to a pending scheduled action. The action is aborted the
/// moment this handle is dropped; call [`ScheduleHandle::dispose`] for a
/// named early cancellation.
pub struct ScheduleHandle {
    task: tokio::task::JoinHandle<()>,
}

impl ScheduleHandle {
    fn new(task: tokio::task::JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Cancels the pending action. Equivalent to dropping the handle;
    /// spelled out for call sites where that reads more clearly.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The minimal scheduler surface time-driven operators depend on.
pub trait Scheduler: 'static {
    /// The current time, as this scheduler sees it.
    fn now(&self) -> Instant;

    /// Runs `action` once, at or after `at`.
    fn schedule(&self, at: Instant, action: Box<dyn FnOnce()>) -> ScheduleHandle;

    /// Runs `action` once, after `delay` elapses.
    fn schedule_relative(&self, delay: Duration, action: Box<dyn FnOnce()>) -> ScheduleHandle {
        self.schedule(self.now() + delay, action)
    }

    /// Runs `action` repeatedly, once per `interval`.
    fn schedule_periodic(&self, interval: Duration, action: Rc<dyn Fn()>) -> ScheduleHandle;
}

/// A [`Scheduler`] backed by `tokio::time`. Requires a `tokio::task::LocalSet`
/// in scope, since scheduled actions may be `!Send` like the rest of this
/// crate. Doubles as the crate's "manual" test scheduler: paired with
/// `tokio::time::{pause, advance}` in a `#[tokio::test]`, its `Instant`s
/// are the same paused virtual clock, so tests can deterministically
/// fast-forward a timer instead of sleeping in wall time.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule(&self, at: Instant, action: Box<dyn FnOnce()>) -> ScheduleHandle {
        let task = tokio::task::spawn_local(async move {
            tokio::time::sleep_until(at).await;
            action();
        });
        ScheduleHandle::new(task)
    }

    fn schedule_periodic(&self, interval: Duration, action: Rc<dyn Fn()>) -> ScheduleHandle {
        let task = tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                action();
            }
        });
        ScheduleHandle::new(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, time::Duration};

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn schedule_relative_fires_after_delay() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = TokioScheduler;
                let fired = Rc::new(RefCell::new(false));
                let fired_task = Rc::clone(&fired);
                let _handle = scheduler
                    .schedule_relative(Duration::from_secs(5), Box::new(move || *fired_task.borrow_mut() = true));
                tokio::time::advance(Duration::from_secs(4)).await;
                tokio::task::yield_now().await;
                assert!(!*fired.borrow());
                tokio::time::advance(Duration::from_secs(2)).await;
                tokio::task::yield_now().await;
                assert!(*fired.borrow());
            })
            .await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn dropping_handle_cancels_action() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = TokioScheduler;
                let fired = Rc::new(RefCell::new(false));
                let fired_task = Rc::clone(&fired);
                let handle = scheduler
                    .schedule_relative(Duration::from_secs(5), Box::new(move || *fired_task.borrow_mut() = true));
                drop(handle);
                tokio::time::advance(Duration::from_secs(10)).await;
                tokio::task::yield_now().await;
                assert!(!*fired.borrow());
            })
            .await;
    }
}
