//! Small ergonomic helpers around the core contract: `forget` and the
//! `finished`/`failed`-style `Promise` constructors.
//!
//! There is no `boxed()`/`boxed_send()` here (erasing to
//! `Box<dyn Future<...>>`): this crate's `Future<T>` is already a concrete,
//! freely cloneable handle around a shared cell rather than a trait object,
//! so there is nothing left to erase to. See `DESIGN.md`.

use crate::error::Cause;
use crate::future::Future;
use crate::promise::Promise;

impl<T: Send + 'static> Future<T> {
    /// Let this future run to completion in the background without
    /// retaining a handle. The underlying cell is reference-counted and
    /// keeps running regardless of whether any handle is held, so this is
    /// equivalent to (and only exists to document the intent of) dropping
    /// the handle.
    pub fn forget(self) {
        drop(self);
    }
}

impl<T: Send + 'static> Promise<T> {
    /// An already-successful future, for call sites that read more naturally
    /// as a `Promise` constructor than `Future::success` (mirrors the host's
    /// `immediateFuture`/`finished`).
    pub fn immediate_success(value: T) -> Future<T> {
        Future::success(value)
    }

    /// An already-failed future (mirrors the host's
    /// `immediateFailedFuture`/`failed`).
    pub fn immediate_failure(cause: Cause) -> Future<T> {
        Future::failed(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forget_drops_the_handle_without_affecting_the_cell() {
        let f = Future::success(1);
        f.forget();
    }

    #[test]
    fn immediate_success_and_failure() {
        let ok: Future<i32> = Promise::immediate_success(5);
        assert_eq!(ok.get_now(), Some(5));

        let err: Future<i32> =
            Promise::immediate_failure(crate::error::into_cause(crate::error::ResultRequired::default()));
        assert!(err.is_failed());
    }
}
