//! The write-side handle to a result cell.

use std::sync::Arc;

use crate::cell::{Cell, Outcome};
use crate::error::Cause;
use crate::future::Future;
use crate::scheduler::Scheduler;

/// Write-side handle to a result cell. Shares identity with its
/// [`Future<T>`] counterpart: `promise.future()` and the original
/// `Future<T>` (if you keep one around) observe the same cell.
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Send + 'static> Promise<T> {
    /// A fresh, incomplete promise dispatching listeners on the default
    /// scheduler.
    pub fn new() -> Self {
        Self::new_on(crate::scheduler::default_scheduler())
    }

    /// Like [`Self::new`], but pinned to an explicit scheduler.
    pub fn new_on(scheduler: Arc<dyn Scheduler>) -> Self {
        Promise {
            cell: Cell::new(scheduler),
        }
    }

    /// The read-only view of this promise's result cell.
    pub fn future(&self) -> Future<T> {
        Future::from_cell(self.cell.clone())
    }

    /// Register the hook run by `cancel(mayInterrupt = true)`. Task-backed
    /// futures use this to interrupt the thread actually running the work;
    /// plain promises normally have nothing to hook here. Lives on the
    /// shared cell, so it fires regardless of whether cancellation was
    /// requested through this `Promise` or through a cloned `Future`.
    pub fn on_interrupt<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cell.set_interrupt_hook(Box::new(hook));
    }

    /// `trySuccess`: succeed iff not yet terminal. Returns whether it
    /// applied.
    pub fn try_success(&self, value: T) -> bool {
        self.cell.try_complete(Outcome::Success(value))
    }

    /// `tryFailure`: fail iff not yet terminal. Returns whether it applied.
    pub fn try_failure(&self, cause: Cause) -> bool {
        self.cell.try_complete(Outcome::Failure(cause))
    }

    /// `setSuccess`: like [`Self::try_success`] but panics if the cell was
    /// already terminal (mirrors the host's `IllegalStateException`).
    pub fn set_success(&self, value: T) {
        assert!(
            self.try_success(value),
            "promise already completed; setSuccess on a terminal cell is a usage error"
        );
    }

    /// `setFailure`: like [`Self::try_failure`] but panics if the cell was
    /// already terminal.
    pub fn set_failure(&self, cause: Cause) {
        assert!(
            self.try_failure(cause),
            "promise already completed; setFailure on a terminal cell is a usage error"
        );
    }

    /// `set`: historical alias for `trySuccess`, kept for older call sites
    /// that predate the `trySuccess`/`tryFailure` naming.
    pub fn set(&self, value: T) -> bool {
        self.try_success(value)
    }

    /// `setUncancellable`: latch the cell so `cancel()` can no longer
    /// succeed, while `trySuccess`/`tryFailure` remain functional.
    ///
    /// Returns `true` on transition, or if the cell is already uncancellable
    /// or already terminal-non-cancelled; `false` if already cancelled.
    pub fn set_uncancellable(&self) -> bool {
        self.cell.set_uncancellable()
    }

    /// `cancel(mayInterrupt)`: fail the cell with a cancellation cause,
    /// running the interrupt hook first if `mayInterrupt` and one is
    /// registered. Returns `true` iff the transition happened.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        self.cell.cancel(may_interrupt)
    }

    /// Report incremental progress to any progressive listeners, without
    /// completing the cell.
    pub fn set_progress(&self, progress: u64, total: Option<u64>) {
        self.cell.notify_progress(progress, total);
    }

    /// `cascadeTo`: mirror this promise's terminal state into `other`, and
    /// wire cancellation bidirectionally between them.
    pub fn cascade_to(&self, other: Promise<T>)
    where
        T: Clone,
    {
        let target = other.clone();
        self.future().on_completed(move |fut| {
            if let Some(cause) = fut.cause_arc() {
                target.try_failure(cause);
            } else if let Some(value) = fut.get_now() {
                target.try_success(value);
            }
        });
        let source = self.clone();
        other.future().on_cancelled(move || {
            source.cancel(true);
        });
    }
}

impl<T: Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}
