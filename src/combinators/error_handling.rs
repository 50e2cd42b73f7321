//! `errorHandling`, `onErrorResume`, `onErrorMap`, `onErrorComplete`,
//! `onErrorReturn`.

use crate::error::{is_cancellation, Cause};
use crate::future::Future;

use super::{derived_promise, link_cancel, panic_cause};

impl<T: Send + 'static> Future<T> {
    /// On failure, the derived future succeeds with `handler(cause)`; if
    /// `handler` panics, the derived future fails with that new cause.
    /// Cancellation propagates as cancellation: a cancelled source's cause
    /// downcasts to a cancellation cause and is never handed to `handler`,
    /// so cancelling a chain built on `error_handling` still cancels it
    /// rather than "recovering" it into a success.
    pub fn error_handling<F>(&self, handler: F) -> Future<T>
    where
        F: FnOnce(&(dyn std::error::Error + Send + Sync + 'static)) -> T + Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                promise.try_success(value);
                return;
            }
            let Some(cause) = fut.cause_arc() else {
                return;
            };
            if is_cancellation(&*cause) {
                promise.try_failure(cause);
                return;
            }
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(&*cause))) {
                Ok(recovered) => {
                    promise.try_success(recovered);
                }
                Err(payload) => {
                    promise.try_failure(panic_cause(payload));
                }
            }
        });
        derived
    }

    /// On failure matching `pred` (or unconditionally if `pred` is `None`),
    /// subscribe to `f(cause)` as a replacement future.
    pub fn on_error_resume<P, F>(&self, pred: Option<P>, f: F) -> Future<T>
    where
        P: Fn(&(dyn std::error::Error + Send + Sync + 'static)) -> bool + Send + 'static,
        F: FnOnce(Cause) -> Future<T> + Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                promise.try_success(value);
                return;
            }
            let Some(cause) = fut.cause_arc() else {
                return;
            };
            let matches = pred.as_ref().map_or(true, |p| p(&*cause));
            if !matches {
                promise.try_failure(cause);
                return;
            }
            let replacement = f(cause);
            let promise = promise.clone();
            replacement.on_completed(move |rep| {
                if let Some(value) = rep.get_now() {
                    promise.try_success(value);
                } else if let Some(cause) = rep.cause_arc() {
                    promise.try_failure(cause);
                }
            });
        });
        derived
    }

    /// On failure matching `pred` (or unconditionally), wrap the cause via
    /// `mapper`.
    pub fn on_error_map<P, F>(&self, pred: Option<P>, mapper: F) -> Future<T>
    where
        P: Fn(&(dyn std::error::Error + Send + Sync + 'static)) -> bool + Send + 'static,
        F: FnOnce(Cause) -> Cause + Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                promise.try_success(value);
                return;
            }
            let Some(cause) = fut.cause_arc() else {
                return;
            };
            let matches = pred.as_ref().map_or(true, |p| p(&*cause));
            if matches {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| mapper(cause))) {
                    Ok(mapped) => {
                        promise.try_failure(mapped);
                    }
                    Err(payload) => {
                        promise.try_failure(panic_cause(payload));
                    }
                }
            } else {
                promise.try_failure(cause);
            }
        });
        derived
    }

    /// On failure matching `pred` (or unconditionally), succeed with `None`;
    /// on source success, succeed with `Some(value)`. The value-free
    /// counterpart to [`Self::on_error_return`], for callers that just want
    /// the failure silenced rather than replaced with a particular value.
    pub fn on_error_complete<P>(&self, pred: Option<P>) -> Future<Option<T>>
    where
        P: Fn(&(dyn std::error::Error + Send + Sync + 'static)) -> bool + Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                promise.try_success(Some(value));
                return;
            }
            let Some(cause) = fut.cause_arc() else {
                return;
            };
            let matches = pred.as_ref().map_or(true, |p| p(&*cause));
            if matches {
                promise.try_success(None);
            } else {
                promise.try_failure(cause);
            }
        });
        derived
    }

    /// On failure matching `pred` (or unconditionally), succeed with
    /// `value`.
    pub fn on_error_return<P>(&self, pred: Option<P>, value: T) -> Future<T>
    where
        P: Fn(&(dyn std::error::Error + Send + Sync + 'static)) -> bool + Send + 'static,
        T: Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();
        link_cancel(self, &derived);
        self.on_completed(move |fut| {
            if let Some(v) = fut.get_now() {
                promise.try_success(v);
                return;
            }
            let Some(cause) = fut.cause_arc() else {
                return;
            };
            let matches = pred.as_ref().map_or(true, |p| p(&*cause));
            if matches {
                promise.try_success(value);
            } else {
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
    fn error_handling_recovers() {
        let promise: Promise<String> = Promise::new();
        let recovered = promise.future().error_handling(|_cause| "recover".to_string());
        promise.try_failure(crate::error::into_cause(crate::error::ResultRequired::default()));
        assert!(recovered.await_uninterruptibly(None));
        assert_eq!(recovered.get_now(), Some("recover".to_string()));
    }

    #[test]
    fn error_handling_lets_cancellation_propagate() {
        let promise: Promise<String> = Promise::new();
        let recovered = promise.future().error_handling(|_cause| "recover".to_string());
        promise.cancel(true);
        assert!(recovered.await_uninterruptibly(None));
        assert!(recovered.is_cancelled());
    }

    #[test]
    fn on_error_return_matches_predicate() {
        let promise: Promise<i32> = Promise::new();
        let recovered = promise.future().on_error_return(
            Some(|_: &(dyn std::error::Error + Send + Sync + 'static)| true),
            -1,
        );
        promise.try_failure(crate::error::into_cause(crate::error::ResultRequired::default()));
        assert!(recovered.await_uninterruptibly(None));
        assert_eq!(recovered.get_now(), Some(-1));
    }

    #[test]
    fn on_error_return_skips_when_predicate_false() {
        let promise: Promise<i32> = Promise::new();
        let recovered = promise.future().on_error_return(
            Some(|_: &(dyn std::error::Error + Send + Sync + 'static)| false),
            -1,
        );
        promise.try_failure(crate::error::into_cause(crate::error::ResultRequired::default()));
        assert!(recovered.await_uninterruptibly(None));
        assert!(recovered.is_failed());
    }

    #[test]
    fn on_error_complete_turns_a_matching_failure_into_none() {
        let promise: Promise<i32> = Promise::new();
        let completed =
            promise.future().on_error_complete(None::<fn(&(dyn std::error::Error + Send + Sync + 'static)) -> bool>);
        promise.try_failure(crate::error::into_cause(crate::error::ResultRequired::default()));
        assert!(completed.await_uninterruptibly(None));
        assert_eq!(completed.get_now(), Some(None));
    }

    #[test]
    fn on_error_complete_wraps_a_success_in_some() {
        let promise: Promise<i32> = Promise::new();
        let completed =
            promise.future().on_error_complete(None::<fn(&(dyn std::error::Error + Send + Sync + 'static)) -> bool>);
        promise.try_success(5);
        assert!(completed.await_uninterruptibly(None));
        assert_eq!(completed.get_now(), Some(Some(5)));
    }

    #[test]
    fn on_error_complete_skips_when_predicate_false() {
        let promise: Promise<i32> = Promise::new();
        let completed = promise.future().on_error_complete(Some(
            |_: &(dyn std::error::Error + Send + Sync + 'static)| false,
        ));
        promise.try_failure(crate::error::into_cause(crate::error::ResultRequired::default()));
        assert!(completed.await_uninterruptibly(None));
        assert!(completed.is_failed());
    }
}
