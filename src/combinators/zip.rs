//! `zip`, `zip3`, and `zipWith`.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::future::Future;

use super::{derived_promise, panic_cause};

/// Shared slot state for an N-way zip: each arm fills in its success value
/// once, and the first failure/cancellation wins.
struct ZipState<A, B> {
    a: Option<A>,
    b: Option<B>,
    settled: bool,
}

impl<T: Send + 'static> Future<T> {
    /// Succeed with a pair once both inputs succeed; fail with the first
    /// failure observed; cancelling the result cancels both upstreams, and
    /// cancelling either upstream cancels the other and the result.
    pub fn zip<U>(&self, other: &Future<U>) -> Future<(T, U)>
    where
        T: Clone,
        U: Send + 'static + Clone,
    {
        let promise = derived_promise(self);
        let derived = promise.future();

        let a_src = self.clone();
        let b_src = other.clone();
        derived.on_cancelled(move || {
            a_src.cancel(true);
            b_src.cancel(true);
        });

        let state = Arc::new(Mutex::new(ZipState::<T, U> {
            a: None,
            b: None,
            settled: false,
        }));

        let other_for_a = other.clone();
        let state_a = state.clone();
        let promise_a = promise.clone();
        self.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                let ready = {
                    let mut guard = state_a.lock();
                    if guard.settled {
                        return;
                    }
                    guard.a = Some(value);
                    guard.a.is_some() && guard.b.is_some()
                };
                if ready {
                    let mut guard = state_a.lock();
                    if !guard.settled {
                        guard.settled = true;
                        let a = guard.a.take().unwrap();
                        let b = guard.b.take().unwrap();
                        drop(guard);
                        promise_a.try_success((a, b));
                    }
                }
            } else if let Some(cause) = fut.cause_arc() {
                let mut guard = state_a.lock();
                if !guard.settled {
                    guard.settled = true;
                    drop(guard);
                    promise_a.try_failure(cause);
                    other_for_a.cancel(true);
                }
            }
        });

        let a_for_b = self.clone();
        let state_b = state.clone();
        other.on_completed(move |fut| {
            if let Some(value) = fut.get_now() {
                let ready = {
                    let mut guard = state_b.lock();
                    if guard.settled {
                        return;
                    }
                    guard.b = Some(value);
                    guard.a.is_some() && guard.b.is_some()
                };
                if ready {
                    let mut guard = state_b.lock();
                    if !guard.settled {
                        guard.settled = true;
                        let a = guard.a.take().unwrap();
                        let b = guard.b.take().unwrap();
                        drop(guard);
                        promise.try_success((a, b));
                    }
                }
            } else if let Some(cause) = fut.cause_arc() {
                let mut guard = state_b.lock();
                if !guard.settled {
                    guard.settled = true;
                    drop(guard);
                    promise.try_failure(cause);
                    a_for_b.cancel(true);
                }
            }
        });

        derived
    }

    /// Combine the outputs of `self.zip(other)` through `f`; same
    /// propagation rules as [`Self::zip`].
    pub fn zip_with<U, R, F>(&self, other: &Future<U>, f: F) -> Future<R>
    where
        T: Clone,
        U: Send + 'static + Clone,
        R: Send + 'static,
        F: FnOnce(T, U) -> R + Send + 'static,
    {
        let zipped = self.zip(other);
        zipped.map(move |(a, b)| f(a, b))
    }

    /// `zip3`: three-way variant of [`Self::zip`], implemented by nesting
    /// (`self.zip(b).zip(c)` flattened into a flat triple).
    pub fn zip3<U, V>(&self, other: &Future<U>, third: &Future<V>) -> Future<(T, U, V)>
    where
        T: Clone,
        U: Send + 'static + Clone,
        V: Send + 'static + Clone,
    {
        let pair = self.zip(other);
        pair.zip(third).map(|((a, b), c)| (a, b, c))
    }
}
