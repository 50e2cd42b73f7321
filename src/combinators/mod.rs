//! Combinators: `map`/`flatMap`/`zip`/error-handling/`timeout`, plus
//! `cascadeTo` (exposed from [`crate::promise::Promise`]) and the aggregator
//! in [`crate::combiner`].
//!
//! Shared machinery lives here; each combinator's own semantics live in its
//! own submodule and is attached to [`crate::future::Future<T>`] as an
//! inherent method, so chains read naturally:
//! `source.map(f).flat_map(g).timeout(d)`.

mod catching;
mod error_handling;
mod flat_map;
mod map;
mod timeout;
mod zip;

use std::sync::Arc;

use crate::future::Future;
use crate::promise::Promise;
use crate::scheduler::Scheduler;

/// Build a fresh derived promise sharing `source`'s scheduler, the default
/// for every combinator: the derived future's scheduler is, by default, the
/// source's scheduler.
pub(crate) fn derived_promise<T: Send + 'static, U: Send + 'static>(
    source: &Future<T>,
) -> Promise<U> {
    Promise::new_on(source.scheduler())
}

/// Wire 1:1 cancellation propagation: cancelling `derived` cancels `source`.
/// Cancellation of `source` reaching `derived` is handled naturally by each
/// combinator's own completion listener, since a cancelled source is
/// observably just a failure with a cancellation cause.
pub(crate) fn link_cancel<T: Send + 'static, U: Send + 'static>(
    source: &Future<T>,
    derived: &Future<U>,
) {
    let upstream = source.clone();
    derived.on_cancelled(move || {
        upstream.cancel(true);
    });
}

/// A scheduler override for a combinator that asked for one explicitly
/// (e.g. `timeout(duration, scheduler)`), falling back to the source's
/// scheduler otherwise.
pub(crate) fn scheduler_or_source<T: Send + 'static>(
    source: &Future<T>,
    explicit: Option<Arc<dyn Scheduler>>,
) -> Arc<dyn Scheduler> {
    explicit.unwrap_or_else(|| source.scheduler())
}

/// Turn a caught `std::panic` payload into a [`crate::error::Cause`], used by
/// every combinator that invokes user-supplied closures: a panicking mapping
/// function translates into failure of the derived future, not the source.
pub(crate) fn panic_cause(payload: Box<dyn std::any::Any + Send>) -> crate::error::Cause {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "combinator closure panicked with a non-string payload".to_string()
    };
    crate::error::into_cause(PanicCause(message))
}

#[derive(Debug, thiserror::Error)]
#[error("combinator closure panicked: {0}")]
pub(crate) struct PanicCause(String);
