//! Error and cause types surfaced by the result core.
//!
//! The taxonomy mirrors the propagation policy described for the result
//! cell: a user exception is stored verbatim as the `Cause` of a failed
//! cell, `get`/`join`/`block` wrap it one level in [`ExecutionFailure`],
//! and `sync`/`getCause`-style accessors return it raw.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A type-erased cause of failure, stored verbatim in a failed result cell.
///
/// Anything implementing `std::error::Error + Send + Sync + 'static` can be
/// turned into a `Cause`; combinators, tasks and user closures all produce
/// causes this way. Backed by `Arc` rather than `Box` so that a terminal
/// cell's cause can be read out (cloned) any number of times, by multiple
/// blocking `get()` callers, multiple listeners, and combinators that need
/// to both inspect and re-propagate it, without requiring the underlying
/// user error type to implement `Clone`.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience for turning any error-like value into a [`Cause`].
pub fn into_cause<E>(err: E) -> Cause
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(err)
}

/// The cause stored on a cell whose `cancel()` transitioned it to failure.
///
/// `isCancelled` on a result cell is defined as "failed, and the cause
/// downcasts to `CancellationCause`".
#[derive(Debug, Default, Error)]
#[error("the future was cancelled")]
pub struct CancellationCause {
    _priv: (),
}

impl CancellationCause {
    /// Construct a fresh cancellation cause.
    pub fn new() -> Self {
        CancellationCause { _priv: () }
    }
}

/// Raised by `obtain()` when a cell has no success value (failed, cancelled,
/// or still incomplete). Distinct from `ExecutionFailure`: this is a
/// programmer error, not a propagated user exception.
#[derive(Debug, Default, Error)]
#[error("no success value is present on this future")]
pub struct ResultRequired {
    _priv: (),
}

/// Raised on the derived future of a `timeout(..)` combinator when the
/// deadline elapses before the source completes.
#[derive(Debug, Error)]
#[error("future timed out after {0:?}")]
pub struct TimeoutFailure(pub Duration);

/// The wrapper `get`/`join`/`block` apply around a raw cause, so that
/// blocking accessors always surface a single, stable error shape while
/// `sync`/`getCause` still expose the original cause directly.
///
/// If the cause being wrapped is *itself* an `ExecutionFailure` (as happens
/// when adapting from a host completable future whose exceptions are
/// already one level wrapped), `getCause` unwraps a single level so callers
/// never see a double-wrapped cause.
#[derive(Debug)]
pub struct ExecutionFailure {
    cause: Cause,
}

impl ExecutionFailure {
    /// Wrap `cause`, unwrapping one level if `cause` is already an
    /// `ExecutionFailure` (matches the adapter's "one level of unwrapping"
    /// contract).
    pub fn new(cause: Cause) -> Self {
        match cause.downcast_ref::<ExecutionFailure>() {
            Some(inner) => ExecutionFailure {
                cause: inner.cause.clone(),
            },
            None => ExecutionFailure { cause },
        }
    }

    /// Borrow the wrapped cause.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.cause
    }

    /// Clone out the wrapped cause as an owned, reference-counted handle.
    pub fn cause_arc(&self) -> Cause {
        self.cause.clone()
    }

    /// Consume this failure, returning the wrapped cause.
    pub fn into_cause(self) -> Cause {
        self.cause
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution failed: {}", self.cause)
    }
}

impl std::error::Error for ExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

/// True if `cause` is (or wraps, via `ExecutionFailure`) a [`CancellationCause`].
pub fn is_cancellation(cause: &(dyn std::error::Error + Send + Sync + 'static)) -> bool {
    if cause.downcast_ref::<CancellationCause>().is_some() {
        return true;
    }
    if let Some(exec) = cause.downcast_ref::<ExecutionFailure>() {
        return exec.cause().downcast_ref::<CancellationCause>().is_some();
    }
    false
}

/// Walk the `source()` chain of `cause` looking for a `T`. Backs
/// `catchSpecificCause`.
pub fn find_cause<T: std::error::Error + 'static>(
    mut cause: &(dyn std::error::Error + 'static),
) -> Option<&T> {
    loop {
        if let Some(found) = cause.downcast_ref::<T>() {
            return Some(found);
        }
        cause = cause.source()?;
    }
}

/// Walk to the end of the `source()` chain and test whether the root cause
/// is a `T`. Backs `catchRootCause`.
pub fn root_cause_is<T: std::error::Error + 'static>(
    mut cause: &(dyn std::error::Error + 'static),
) -> Option<&T> {
    loop {
        match cause.source() {
            Some(next) => cause = next,
            None => return cause.downcast_ref::<T>(),
        }
    }
}
