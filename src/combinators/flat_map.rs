//! `flatMap`.

use crate::future::Future;

use super::{derived_promise, panic_cause};

impl<T: Send + 'static> Future<T> {
    /// On source success, invoke `f(value)`; the derived future mirrors
    /// whichever future `f` returns. Cancelling the derived future cancels
    /// whichever of source/inner is currently outstanding.
    pub fn flat_map<U, F>(&self, f: F) -> Future<U>
    where
        F: FnOnce(T) -> Future<U> + Send + 'static,
        U: Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();

        // Cancelling the derived future should cancel whichever of
        // source/inner is the current upstream; track it so `on_cancelled`
        // always reaches the right one.
        let current_upstream: std::sync::Arc<parking_lot::Mutex<Box<dyn Fn(bool) + Send>>> = {
            let source_for_cancel = self.clone();
            std::sync::Arc::new(parking_lot::Mutex::new(Box::new(move |mi: bool| {
                source_for_cancel.cancel(mi);
            }) as Box<dyn Fn(bool) + Send>))
        };
        let cancel_target = current_upstream.clone();
        derived.on_cancelled(move || {
            (cancel_target.lock())(true);
        });

        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                let inner = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(value)))
                {
                    Ok(inner) => inner,
                    Err(payload) => {
                        promise.try_failure(panic_cause(payload));
                        return;
                    }
                };
                {
                    let inner_for_cancel = inner.clone();
                    *current_upstream.lock() =
                        Box::new(move |mi: bool| {
                            inner_for_cancel.cancel(mi);
                        });
                }
                let promise = promise.clone();
                inner.on_completed(move |inner_fut| {
                    if let Some(value) = inner_fut.get_now() {
                        promise.try_success(value);
                    } else if let Some(cause) = inner_fut.cause_arc() {
                        promise.try_failure(cause);
                    }
                });
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

    #[test]
    fn flat_map_chains_inner_future() {
        let source = Future::success(2);
        let chained = source.flat_map(|v| Future::success(v * 10));
        assert!(chained.await_uninterruptibly(None));
        assert_eq!(chained.get_now(), Some(20));
    }

    #[test]
    fn flat_map_propagates_inner_failure() {
        let source = Future::success(2);
        let chained: Future<i32> = source.flat_map(|_| {
            Future::failed(crate::error::into_cause(crate::error::ResultRequired::default()))
        });
        assert!(chained.await_uninterruptibly(None));
        assert!(chained.is_failed());
    }

    #[test]
    fn flat_map_cancel_reaches_inner_future() {
        use crate::scheduler::DirectScheduler;
        use std::sync::Arc;

        // DirectScheduler dispatches inline, so by the time `try_success`
        // returns, flat_map has already switched `current_upstream` to the
        // inner future and the cancel below is guaranteed to land on it.
        let outer: Promise<i32> = Promise::new_on(Arc::new(DirectScheduler));
        let inner: Promise<i32> = Promise::new_on(Arc::new(DirectScheduler));
        let inner_future = inner.future();
        let chained = outer.future().flat_map(move |_| inner_future.clone());
        outer.try_success(1);
        chained.cancel(true);
        assert!(inner.future().is_cancelled());
    }
}
