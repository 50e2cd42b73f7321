//! `FutureCombiner`: the `whenAllComplete`/`whenAllSucceed` aggregator.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::combinators::panic_cause;
use crate::error::Cause;
use crate::future::Future;
use crate::promise::Promise;
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    AllComplete,
    AllSucceed,
}

/// Fixes a set of input futures and exposes the terminal `call`/`run`/
/// `combine` operations. Constructed via [`Self::when_all_complete`] or
/// [`Self::when_all_succeed`].
pub struct FutureCombiner<T> {
    futures: Vec<Future<T>>,
    mode: Mode,
}

impl<T: Send + 'static> FutureCombiner<T> {
    /// Waits for every input to reach *any* terminal state before running the
    /// combiner, regardless of whether any input failed. Accepts anything
    /// iterable (a fixed `vec![...]` of arguments or a lazily-produced
    /// stream); the stream is drained eagerly right here, so stream- and
    /// fixed-arity callers see the same semantics.
    pub fn when_all_complete(futures: impl IntoIterator<Item = Future<T>>) -> Self {
        FutureCombiner {
            futures: futures.into_iter().collect(),
            mode: Mode::AllComplete,
        }
    }

    /// Fails as soon as any input fails (without waiting for the rest, and
    /// without invoking the combiner); otherwise waits for all to succeed.
    /// Same eager-drain contract as [`Self::when_all_complete`].
    pub fn when_all_succeed(futures: impl IntoIterator<Item = Future<T>>) -> Self {
        FutureCombiner {
            futures: futures.into_iter().collect(),
            mode: Mode::AllSucceed,
        }
    }

    fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.futures
            .first()
            .map(Future::scheduler)
            .unwrap_or_else(crate::scheduler::default_scheduler)
    }

    /// Terminal operation with a combiner: runs `combiner(&inputs)` once the
    /// mode's readiness condition is met, on the aggregator's scheduler.
    /// Cancelling the returned future cancels all still-incomplete inputs;
    /// any input being cancelled cancels the returned future.
    pub fn call<R, F>(&self, combiner: F) -> Future<R>
    where
        F: FnOnce(&[Future<T>]) -> R + Send + 'static,
        R: Send + 'static,
    {
        let scheduler = self.scheduler();
        let promise: Promise<R> = Promise::new_on(scheduler.clone());
        let derived = promise.future();
        let futures = self.futures.clone();
        let mode = self.mode;

        if futures.is_empty() {
            let promise = promise.clone();
            crate::scheduler::run_or_fall_back(
                &scheduler,
                Box::new(move || {
                    run_combiner(&promise, &[], combiner);
                }),
            );
            return derived;
        }

        {
            let futures_for_cancel = futures.clone();
            derived.on_cancelled(move || {
                for f in &futures_for_cancel {
                    f.cancel(true);
                }
            });
        }

        let remaining = Arc::new(AtomicUsize::new(futures.len()));
        let settled = Arc::new(AtomicBool::new(false));
        let combiner_slot = Arc::new(Mutex::new(Some(combiner)));

        for input in &futures {
            let remaining = remaining.clone();
            let settled = settled.clone();
            let combiner_slot = combiner_slot.clone();
            let promise = promise.clone();
            let futures_for_combiner = futures.clone();
            let scheduler = scheduler.clone();
            input.on_completed(move |completed| {
                if completed.is_cancelled() {
                    if !settled.swap(true, Ordering::SeqCst) {
                        promise.cancel(true);
                    }
                    return;
                }
                if mode == Mode::AllSucceed {
                    if let Some(cause) = completed.cause_arc() {
                        if !settled.swap(true, Ordering::SeqCst) {
                            promise.try_failure(cause);
                        }
                        return;
                    }
                }
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    if settled.swap(true, Ordering::SeqCst) {
                        return;
                    }
                    if let Some(combiner) = combiner_slot.lock().take() {
                        crate::scheduler::run_or_fall_back(
                            &scheduler,
                            Box::new(move || {
                                run_combiner(&promise, &futures_for_combiner, combiner);
                            }),
                        );
                    }
                }
            });
        }

        derived
    }

    /// `run(...)`: identical to [`Self::call`] with a `void` combiner.
    pub fn run<F>(&self, runnable: F) -> Future<()>
    where
        F: FnOnce(&[Future<T>]) + Send + 'static,
    {
        self.call(move |futures| runnable(futures))
    }

    /// `combine()`: no user combiner. Succeeds with `()` once every input has
    /// reached a terminal state and none failed; otherwise fails with the
    /// first failure observed (or cancels, if any input was cancelled).
    pub fn combine(&self) -> Future<()> {
        let scheduler = self.scheduler();
        let promise: Promise<()> = Promise::new_on(scheduler);
        let derived = promise.future();
        let futures = self.futures.clone();
        let mode = self.mode;

        if futures.is_empty() {
            promise.try_success(());
            return derived;
        }

        {
            let futures_for_cancel = futures.clone();
            derived.on_cancelled(move || {
                for f in &futures_for_cancel {
                    f.cancel(true);
                }
            });
        }

        let remaining = Arc::new(AtomicUsize::new(futures.len()));
        let settled = Arc::new(AtomicBool::new(false));
        let first_failure: Arc<Mutex<Option<Cause>>> = Arc::new(Mutex::new(None));

        for input in &futures {
            let remaining = remaining.clone();
            let settled = settled.clone();
            let first_failure = first_failure.clone();
            let promise = promise.clone();
            input.on_completed(move |completed| {
                if completed.is_cancelled() {
                    if !settled.swap(true, Ordering::SeqCst) {
                        promise.cancel(true);
                    }
                    return;
                }
                if let Some(cause) = completed.cause_arc() {
                    if mode == Mode::AllSucceed {
                        if !settled.swap(true, Ordering::SeqCst) {
                            promise.try_failure(cause);
                        }
                        return;
                    }
                    let mut guard = first_failure.lock();
                    if guard.is_none() {
                        *guard = Some(cause);
                    }
                }
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    if settled.swap(true, Ordering::SeqCst) {
                        return;
                    }
                    match first_failure.lock().take() {
                        Some(cause) => promise.try_failure(cause),
                        None => promise.try_success(()),
                    };
                }
            });
        }

        derived
    }
}

fn run_combiner<T, R, F>(promise: &Promise<R>, futures: &[Future<T>], combiner: F)
where
    F: FnOnce(&[Future<T>]) -> R,
    R: Send + 'static,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| combiner(futures))) {
        Ok(value) => {
            promise.try_success(value);
        }
        Err(payload) => {
            promise.try_failure(panic_cause(payload));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FutureCombiner;
    use crate::error::into_cause;
    use crate::future::Future;
    use crate::promise::Promise;

    #[test]
    fn empty_when_all_complete_succeeds_immediately() {
        let combiner: FutureCombiner<i32> = FutureCombiner::when_all_complete(vec![]);
        let result = combiner.combine();
        assert!(result.await_uninterruptibly(None));
        assert!(result.is_success());
    }

    #[test]
    fn when_all_succeed_combines_values() {
        let f1 = Future::success(1);
        let f2 = Future::success(2);
        let combiner = FutureCombiner::when_all_succeed(vec![f1.clone(), f2.clone()]);
        let total = combiner.call(|futures| {
            futures.iter().map(|f| f.obtain().unwrap()).sum::<i32>()
        });
        assert!(total.await_uninterruptibly(None));
        assert_eq!(total.get_now(), Some(3));
    }

    #[test]
    fn when_all_succeed_fails_fast_without_running_combiner() {
        let p1: Promise<i32> = Promise::new();
        let p2: Promise<i32> = Promise::new();
        let combiner = FutureCombiner::when_all_succeed(vec![p1.future(), p2.future()]);
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_for_combiner = ran.clone();
        let result = combiner.call(move |_futures| {
            ran_for_combiner.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        p1.try_failure(into_cause(crate::error::ResultRequired::default()));
        assert!(result.await_uninterruptibly(None));
        assert!(result.is_failed());
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn when_all_complete_runs_combiner_even_with_a_failed_input() {
        let p1: Promise<i32> = Promise::new();
        let p2: Promise<i32> = Promise::new();
        let combiner = FutureCombiner::when_all_complete(vec![p1.future(), p2.future()]);
        let result = combiner.run(|futures| {
            assert_eq!(futures.len(), 2);
        });
        p1.try_failure(into_cause(crate::error::ResultRequired::default()));
        p2.try_success(5);
        assert!(result.await_uninterruptibly(None));
        assert!(result.is_success());
    }

    #[test]
    fn combine_fails_with_first_failure_when_any_input_failed() {
        let p1: Promise<i32> = Promise::new();
        let p2: Promise<i32> = Promise::new();
        let combiner = FutureCombiner::when_all_complete(vec![p1.future(), p2.future()]);
        let result = combiner.combine();
        p1.try_success(1);
        p2.try_failure(into_cause(crate::error::ResultRequired::default()));
        assert!(result.await_uninterruptibly(None));
        assert!(result.is_failed());
    }
}
