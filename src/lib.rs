//! An asynchronous result core: `Future`/`Promise`
//!
//! This crate is a composable `Future`/`Promise` system that models the
//! outcome of a computation that may complete later, together with the
//! combinators (`map`, `flat_map`, `zip`, error-handling, `timeout`,
//! `whenAllComplete`/`whenAllSucceed`) and the listener-dispatch machinery
//! that drives them. `Future<T>` is the read-only view; `Promise<T>` is the
//! write side; both are thin, cheaply cloneable handles around a shared
//! result cell.
//!
//! ## Examples
//!
//! ```
//! use promise_rs::{Future, Promise};
//!
//! let promise: Promise<i32> = Promise::new();
//! let doubled = promise.future().map(|v| v * 2);
//!
//! promise.try_success(21);
//! doubled.await_uninterruptibly(None);
//! assert_eq!(doubled.get_now(), Some(42));
//! ```
//!
//! Composition reads the same way regardless of whether the upstream is
//! already resolved or still pending:
//!
//! ```
//! use promise_rs::Future;
//!
//! let sum = Future::success(1)
//!     .zip(&Future::success(2))
//!     .map(|(a, b)| a + b);
//! sum.await_uninterruptibly(None);
//! assert_eq!(sum.get_now(), Some(3));
//! ```
//!
//! A result cell is never polled: combinators register listeners, and the
//! configured [`Scheduler`] drives everything (including reentrancy-safe
//! dispatch of long synchronous completion chains) without the caller ever
//! touching a poll loop.

mod cell;
mod combinators;
mod convenience;
mod error;
mod scheduler;
mod timer;
mod trampoline;

/// Bridges to and from the host's standard async future type.
pub mod adapter;
/// The `whenAllComplete`/`whenAllSucceed` aggregator.
pub mod combiner;
/// The read-only view of a result cell.
pub mod future;
/// The write-side handle to a result cell.
pub mod promise;
/// A synchronous callable wrapped to settle a promise on a scheduler.
pub mod task;

pub use adapter::{for_adaption, for_adaption_on, Completable};
pub use cell::{ListenerId, ProgressListener};
pub use combiner::FutureCombiner;
pub use error::{
    into_cause, is_cancellation, CancellationCause, Cause, ExecutionFailure, ResultRequired,
    TimeoutFailure,
};
pub use future::{Future, GetOutcome, JoinError, SyncOutcome};
pub use promise::Promise;
pub use scheduler::{
    default_scheduler, DelayedTask, DirectScheduler, ForkJoinScheduler, Job, RejectingScheduler,
    Scheduler,
};
pub use task::{FutureTask, InterruptFlag};
