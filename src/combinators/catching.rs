//! `catching`, `catchSpecificCause`, `catchRootCause`.
//!
//! All three share the same shape: look for an `E` somewhere in the cause,
//! and if found, recover with `handler(&E)`; otherwise pass the failure
//! through unchanged. They differ only in *where* they look for `E`.

use std::marker::PhantomData;

use crate::error::{find_cause, root_cause_is};
use crate::future::Future;

use super::{derived_promise, link_cancel, panic_cause};

/// Where in the cause chain a recovery handler is allowed to match.
enum Locate<E> {
    /// Exact failure cause must itself downcast to `E`.
    Exact(PhantomData<E>),
    /// Any cause in the `source()` chain may downcast to `E`.
    Anywhere(PhantomData<E>),
    /// Only the root (deepest) cause may downcast to `E`.
    Root(PhantomData<E>),
}

impl<T: Send + 'static> Future<T> {
    /// On failure where the cause downcasts directly to `E`, recover with
    /// `handler(&E)`. Any other failure (or a cancellation, which is itself
    /// just a failure whose cause does not downcast to `E`) passes through
    /// unchanged.
    pub fn catching<E, F>(&self, handler: F) -> Future<T>
    where
        E: std::error::Error + 'static,
        F: FnOnce(&E) -> T + Send + 'static,
        T: Clone,
    {
        self.recover_with(Locate::Exact(PhantomData::<E>), handler)
    }

    /// On failure where some cause in the chain (the failure's cause, or any
    /// of its `source()`s) downcasts to `E`, recover with `handler(&E)`.
    pub fn catch_specific_cause<E, F>(&self, handler: F) -> Future<T>
    where
        E: std::error::Error + 'static,
        F: FnOnce(&E) -> T + Send + 'static,
        T: Clone,
    {
        self.recover_with(Locate::Anywhere(PhantomData::<E>), handler)
    }

    /// On failure where the deepest (`source()`-chain-terminal) cause
    /// downcasts to `E`, recover with `handler(&E)`.
    pub fn catch_root_cause<E, F>(&self, handler: F) -> Future<T>
    where
        E: std::error::Error + 'static,
        F: FnOnce(&E) -> T + Send + 'static,
        T: Clone,
    {
        self.recover_with(Locate::Root(PhantomData::<E>), handler)
    }

    fn recover_with<E, F>(&self, locate: Locate<E>, handler: F) -> Future<T>
    where
        E: std::error::Error + 'static,
        F: FnOnce(&E) -> T + Send + 'static,
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
            let matched = match &locate {
                Locate::Exact(_) => cause.downcast_ref::<E>(),
                Locate::Anywhere(_) => find_cause::<E>(&*cause),
                Locate::Root(_) => root_cause_is::<E>(&*cause),
            };
            match matched {
                Some(matched) => {
                    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        handler(matched)
                    })) {
                        Ok(recovered) => {
                            promise.try_success(recovered);
                        }
                        Err(payload) => {
                            promise.try_failure(panic_cause(payload));
                        }
                    }
                }
                None => {
                    promise.try_failure(cause);
                }
            }
        });
        derived
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{into_cause, ResultRequired, TimeoutFailure};
    use crate::future::Future;
    use crate::promise::Promise;
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("wrapped: {0}")]
    struct Wrapper(#[source] TimeoutFailure);

    #[test]
    fn catching_recovers_matching_type() {
        let promise: Promise<i32> = Promise::new();
        let recovered = promise
            .future()
            .catching::<ResultRequired, _>(|_e| -1);
        promise.try_failure(into_cause(ResultRequired::default()));
        assert!(recovered.await_uninterruptibly(None));
        assert_eq!(recovered.get_now(), Some(-1));
    }

    #[test]
    fn catching_passes_through_non_matching_type() {
        let promise: Promise<i32> = Promise::new();
        let recovered = promise
            .future()
            .catching::<TimeoutFailure, _>(|_e| -1);
        promise.try_failure(into_cause(ResultRequired::default()));
        assert!(recovered.await_uninterruptibly(None));
        assert!(recovered.is_failed());
    }

    #[test]
    fn catch_specific_cause_walks_chain() {
        let promise: Promise<i32> = Promise::new();
        let recovered = promise
            .future()
            .catch_specific_cause::<TimeoutFailure, _>(|_e| 7);
        promise.try_failure(into_cause(Wrapper(TimeoutFailure(Duration::from_secs(1)))));
        assert!(recovered.await_uninterruptibly(None));
        assert_eq!(recovered.get_now(), Some(7));
    }

    #[test]
    fn catch_root_cause_requires_deepest_match() {
        let promise: Promise<i32> = Promise::new();
        let recovered = promise
            .future()
            .catch_root_cause::<TimeoutFailure, _>(|_e| 9);
        promise.try_failure(into_cause(Wrapper(TimeoutFailure(Duration::from_secs(1)))));
        assert!(recovered.await_uninterruptibly(None));
        assert_eq!(recovered.get_now(), Some(9));
    }
}
