//! `map` and `mapNull`.

use crate::future::Future;

use super::{derived_promise, link_cancel, panic_cause};

impl<T: Send + 'static> Future<T> {
    /// On success, invoke `f(value)` on this future's scheduler; the derived
    /// future succeeds with `f`'s return or fails with `f`'s panic. Failure
    /// or cancellation of the source propagates verbatim.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(value))) {
                    Ok(mapped) => {
                        promise.try_success(mapped);
                    }
                    Err(payload) => {
                        promise.try_failure(panic_cause(payload));
                    }
                }
            } else if let Some(cause) = fut.cause_arc() {
                promise.try_failure(cause);
            }
        });
        derived
    }

    /// `mapNull`: run `consumer` on success (if supplied); the derived future
    /// always completes successfully with `()` regardless of whether a
    /// consumer was given, unless the consumer panics.
    pub fn map_null<F>(&self, consumer: Option<F>) -> Future<()>
    where
        F: FnOnce(T) + Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                if let Some(consumer) = consumer {
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| consumer(value)))
                    {
                        Ok(()) => {
                            promise.try_success(());
                        }
                        Err(payload) => {
                            promise.try_failure(panic_cause(payload));
                        }
                    }
                } else {
                    promise.try_success(());
                }
            } else if let Some(cause) = fut.cause_arc() {
                promise.try_failure(cause);
            }
        });
        derived
    }
}
