//! `timeout`: fail the derived future with [`TimeoutFailure`] if the source
//! has not completed within `duration`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TimeoutFailure;
use crate::future::Future;
use crate::scheduler::{DelayedTask, Scheduler};

use super::{derived_promise, link_cancel, scheduler_or_source};

impl<T: Send + 'static> Future<T> {
    /// Derived future mirrors the source, unless `duration` elapses first, in
    /// which case it fails with [`TimeoutFailure`] and the source is left
    /// running (callers wanting the source cancelled too should chain
    /// `.on_cancelled` themselves, or rely on cancelling the derived future,
    /// which, like every combinator, cancels the source).
    pub fn timeout(&self, duration: Duration) -> Future<T>
    where
        T: Clone,
    {
        self.timeout_on(duration, None)
    }

    /// Like [`Self::timeout`], dispatching the timeout check on `scheduler`
    /// instead of the source's own scheduler.
    pub fn timeout_on(&self, duration: Duration, scheduler: Option<Arc<dyn Scheduler>>) -> Future<T>
    where
        T: Clone,
    {
        self.timeout_with(duration, scheduler, None::<fn(&crate::promise::Promise<T>)>)
    }

    /// Like [`Self::timeout_on`], but with a user-supplied `on_timeout` hook:
    /// when the deadline fires first, the hook runs
    /// with the still-incomplete derived promise *before* this combinator's
    /// own `TimeoutFailure` is applied, and may itself settle the promise
    /// (with `try_success`/`try_failure`) to override the default outcome.
    pub fn timeout_with<F>(
        &self,
        duration: Duration,
        scheduler: Option<Arc<dyn Scheduler>>,
        on_timeout: Option<F>,
    ) -> Future<T>
    where
        T: Clone,
        F: FnOnce(&crate::promise::Promise<T>) + Send + 'static,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);

        let scheduler = scheduler_or_source(self, scheduler);
        let timer_handle: Arc<Mutex<Option<Arc<dyn DelayedTask>>>> = Arc::new(Mutex::new(None));

        let promise_for_timeout = promise.clone();
        let handle = scheduler.schedule(
            Box::new(move || {
                if let Some(hook) = on_timeout {
                    hook(&promise_for_timeout);
                }
                promise_for_timeout.try_failure(crate::error::into_cause(TimeoutFailure(duration)));
            }),
            duration,
        );
        *timer_handle.lock() = Some(handle);

        self.on_completed(move |fut| {
            if let Some(handle) = timer_handle.lock().take() {
                handle.cancel();
            }
            if let Some(value) = fut.get_now() {
                promise.try_success(value);
            } else if let Some(cause) = fut.cause_arc() {
                promise.try_failure(cause);
            }
        });

        derived
    }
}

#[cfg(test)]
mod tests {
    use crate::future::Future;
    use crate::promise::Promise;
    use std::time::Duration;

    #[test]
    fn timeout_passes_through_fast_completion() {
        let source = Future::success(1);
        let timed = source.timeout(Duration::from_secs(5));
        assert!(timed.await_uninterruptibly(Some(Duration::from_secs(1))));
        assert_eq!(timed.get_now(), Some(1));
    }

    #[test]
    fn timeout_fires_when_source_is_slow() {
        let promise: Promise<i32> = Promise::new();
        let timed = promise.future().timeout(Duration::from_millis(20));
        assert!(timed.await_uninterruptibly(Some(Duration::from_secs(1))));
        assert!(timed.is_failed());
        assert!(!timed.is_cancelled());
    }

    #[test]
    fn on_timeout_hook_can_override_the_default_outcome() {
        let promise: Promise<i32> = Promise::new();
        let timed = promise
            .future()
            .timeout_with(Duration::from_millis(20), None, Some(|p: &Promise<i32>| {
                p.try_success(-1);
            }));
        assert!(timed.await_uninterruptibly(Some(Duration::from_secs(1))));
        assert_eq!(timed.get_now(), Some(-1));
    }

    #[test]
    fn timeout_does_not_fire_after_fast_completion() {
        let promise: Promise<i32> = Promise::new();
        let timed = promise.future().timeout(Duration::from_millis(200));
        promise.try_success(5);
        assert!(timed.await_uninterruptibly(Some(Duration::from_secs(1))));
        assert_eq!(timed.get_now(), Some(5));
        // give the (cancelled) timer a chance to fire if cancellation were
        // broken; the result should remain the original success.
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(timed.get_now(), Some(5));
    }
}
