//! The read-only view of a result cell.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cell::{Cell, ListenerId, Outcome, ProgressListener};
use crate::error::{is_cancellation, Cause, ExecutionFailure, ResultRequired};
use crate::scheduler::Scheduler;

/// The eventual outcome of a computation that may complete later.
///
/// `Future<T>` is a read-only handle: cloning it clones the handle, not the
/// underlying result cell (the cell is reference-counted and shared with any
/// [`crate::promise::Promise<T>`] that can still write to it).
pub struct Future<T> {
    pub(crate) cell: Arc<Cell<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Send + 'static> Future<T> {
    pub(crate) fn from_cell(cell: Arc<Cell<T>>) -> Self {
        Future { cell }
    }

    /// A future that is already successfully completed with `value`,
    /// dispatched on the default scheduler.
    pub fn success(value: T) -> Self {
        Self::success_on(value, crate::scheduler::default_scheduler())
    }

    /// Like [`Self::success`], but pinned to an explicit scheduler.
    pub fn success_on(value: T, scheduler: Arc<dyn Scheduler>) -> Self {
        Future {
            cell: Cell::new_completed(scheduler, Outcome::Success(value)),
        }
    }

    /// A future that is already failed with `cause`, dispatched on the
    /// default scheduler.
    pub fn failed(cause: Cause) -> Self {
        Self::failed_on(cause, crate::scheduler::default_scheduler())
    }

    /// Like [`Self::failed`], but pinned to an explicit scheduler.
    pub fn failed_on(cause: Cause, scheduler: Arc<dyn Scheduler>) -> Self {
        Future {
            cell: Cell::new_completed(scheduler, Outcome::Failure(cause)),
        }
    }

    /// The scheduler this future (and any listener attached to it) dispatches
    /// on.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        self.cell.scheduler.clone()
    }

    /// Any terminal state reached: success, failure, or cancellation.
    pub fn is_done(&self) -> bool {
        self.cell.is_done()
    }

    /// `state = SUCCESS`.
    pub fn is_success(&self) -> bool {
        self.cell.is_success()
    }

    /// `state = FAILURE` (includes cancellation).
    pub fn is_failed(&self) -> bool {
        self.cell.is_failed()
    }

    /// `state = FAILURE` whose cause is a [`crate::error::CancellationCause`].
    pub fn is_cancelled(&self) -> bool {
        self.cell
            .with_outcome(|o| matches!(o, Outcome::Failure(c) if is_cancellation(c.as_ref())))
    }

    /// Whether `cancel()` could still succeed (state is `INCOMPLETE`, neither
    /// `UNCANCELLABLE` nor terminal).
    pub fn is_cancellable(&self) -> bool {
        self.cell.is_cancellable()
    }

    /// `cancel(mayInterrupt)`, available directly on the read view (mirrors
    /// the host's `java.util.concurrent.Future` convention that `cancel`
    /// lives on the read-only interface, not only on the writer). Shares the
    /// same cell-level transition `Promise::cancel` uses, so cancelling
    /// through either handle is observationally identical.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        self.cell.cancel(may_interrupt)
    }

    /// The success value, or `None` if not successfully completed. Never
    /// panics.
    pub fn get_now(&self) -> Option<T>
    where
        T: Clone,
    {
        self.cell.clone_success()
    }

    /// Like [`Self::get_now`] but raises [`ResultRequired`] instead of
    /// returning `None`.
    pub fn obtain(&self) -> Result<T, ResultRequired>
    where
        T: Clone,
    {
        self.get_now().ok_or_else(ResultRequired::default)
    }

    /// The raw failure cause, cloned out as a cheap `Arc` bump (or `None` if
    /// not failed). One level of `ExecutionFailure` is unwrapped, same as
    /// [`Self::with_cause`]. Useful when the cause needs to outlive the
    /// borrow the lock would otherwise impose, e.g. to re-propagate it into
    /// another promise (`cascadeTo`).
    pub fn cause_arc(&self) -> Option<Cause> {
        self.cell.with_outcome(|o| match o {
            Outcome::Failure(c) => match c.downcast_ref::<ExecutionFailure>() {
                Some(exec) => Some(exec.cause_arc()),
                None => Some(c.clone()),
            },
            _ => None,
        })
    }

    /// Invoke `f` with the raw failure cause, if any. The stored cause is
    /// borrowed behind the cell's lock, so it cannot escape by reference;
    /// this is `getCause`, with one level of `ExecutionFailure` unwrapped
    /// per the adapter contract.
    pub fn with_cause<R>(&self, f: impl FnOnce(Option<&(dyn std::error::Error + Send + Sync + 'static)>) -> R) -> R {
        self.cell.with_outcome(|o| match o {
            Outcome::Failure(c) => {
                if let Some(exec) = c.downcast_ref::<ExecutionFailure>() {
                    f(Some(exec.cause()))
                } else {
                    f(Some(c.as_ref()))
                }
            }
            _ => f(None),
        })
    }

    /// Block the calling thread until terminal or `deadline` elapses.
    pub fn await_uninterruptibly(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|d| Instant::now() + d);
        self.cell.await_done(deadline)
    }

    /// `get()`/`get(deadline)`: await, then extract. Success returns the
    /// value; failure (other than cancellation) is wrapped in
    /// [`ExecutionFailure`]; cancellation is re-raised directly as
    /// `GetOutcome::Cancelled`; running out of time yields
    /// `GetOutcome::TimedOut`.
    pub fn get(&self, timeout: Option<Duration>) -> GetOutcome<T>
    where
        T: Clone,
    {
        if !self.await_uninterruptibly(timeout) {
            return GetOutcome::TimedOut;
        }
        self.cell.with_outcome(|o| match o {
            Outcome::Success(v) => GetOutcome::Ready(v.clone()),
            Outcome::Failure(c) if is_cancellation(c.as_ref()) => GetOutcome::Cancelled,
            Outcome::Failure(c) => GetOutcome::Failed(ExecutionFailure::new(c.clone())),
            _ => unreachable!("await_uninterruptibly guarantees terminal state"),
        })
    }

    /// `sync()`: await, then re-raise the raw cause directly (no wrapping).
    pub fn sync(&self) -> SyncOutcome<T>
    where
        T: Clone,
    {
        self.await_uninterruptibly(None);
        self.cell.with_outcome(|o| match o {
            Outcome::Success(v) => SyncOutcome::Ready(v.clone()),
            Outcome::Failure(c) if is_cancellation(c.as_ref()) => SyncOutcome::Cancelled,
            Outcome::Failure(c) => SyncOutcome::Failed(c.clone()),
            _ => unreachable!(),
        })
    }

    /// `join()`/`join(duration)`: blocking extraction that raises the cause,
    /// expressed as a `Result` per Rust idiom rather than a thrown exception.
    pub fn join(&self, timeout: Option<Duration>) -> Result<T, JoinError>
    where
        T: Clone,
    {
        match self.get(timeout) {
            GetOutcome::Ready(v) => Ok(v),
            GetOutcome::Cancelled => Err(JoinError::Cancelled),
            GetOutcome::Failed(e) => Err(JoinError::Failed(e)),
            GetOutcome::TimedOut => Err(JoinError::TimedOut),
        }
    }

    /// `block()`/`block(duration)`: blocking extraction returning an
    /// `Option`, discarding the distinction between failure/cancel/timeout.
    pub fn block(&self, timeout: Option<Duration>) -> Option<T>
    where
        T: Clone,
    {
        self.join(timeout).ok()
    }

    /// Attach a listener invoked on any terminal state. Returns a
    /// [`ListenerId`] that can be passed to [`Self::remove_listener`] to
    /// cancel delivery before it runs.
    pub fn on_completed<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce(&Future<T>) + Send + 'static,
    {
        self.cell.add_listener(Box::new(f))
    }

    /// Remove a listener previously returned by [`Self::on_completed`] (or
    /// any of the convenience wrappers built on it, such as
    /// [`Self::on_success`]), provided it has not already fired. Mirrors
    /// `removeListener`: removes at most one pending registration and
    /// leaves any other listener untouched. Returns whether anything was
    /// actually removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.cell.remove_listener(id)
    }

    /// Attach a listener invoked only on success.
    pub fn on_success<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce(&T) + Send + 'static,
        T: Clone,
    {
        self.on_completed(move |fut| {
            if let Some(v) = fut.get_now() {
                f(&v);
            }
        })
    }

    /// Attach a listener invoked only on failure (including cancellation).
    pub fn on_failure<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce(&(dyn std::error::Error + Send + Sync + 'static)) + Send + 'static,
    {
        self.on_completed(move |fut| {
            fut.with_cause(|cause| {
                if let Some(c) = cause {
                    f(c);
                }
            });
        })
    }

    /// Attach a listener invoked only on failure that is *not* a
    /// cancellation.
    pub fn on_failed<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce(&(dyn std::error::Error + Send + Sync + 'static)) + Send + 'static,
    {
        self.on_completed(move |fut| {
            if fut.is_failed() && !fut.is_cancelled() {
                fut.with_cause(|cause| {
                    if let Some(c) = cause {
                        f(c);
                    }
                });
            }
        })
    }

    /// Attach a listener invoked only on cancellation.
    pub fn on_cancelled<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_completed(move |fut| {
            if fut.is_cancelled() {
                f();
            }
        })
    }

    /// Attach a listener invoked on any terminal state, regardless of
    /// outcome, ignoring the result entirely (useful for cleanup).
    pub fn on_finally<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_completed(move |_fut| f())
    }

    /// Register a progressive listener (receives incremental progress plus
    /// the eventual completion notification). Returns a [`ListenerId`] that
    /// can be passed to [`Self::remove_progress_listener`].
    pub fn on_progress(&self, listener: Arc<dyn ProgressListener<T>>) -> ListenerId {
        self.cell.add_progress_listener(listener)
    }

    /// Remove a progressive listener previously returned by
    /// [`Self::on_progress`], provided it has not already fired. Removal is
    /// consistent with [`Self::remove_listener`]'s contract on the general
    /// view: a removed progress listener observes neither further progress
    /// reports nor the eventual completion notification.
    pub fn remove_progress_listener(&self, id: ListenerId) -> bool {
        self.cell.remove_progress_listener(id)
    }
}

/// Outcome of a blocking [`Future::get`] call.
pub enum GetOutcome<T> {
    /// Completed successfully.
    Ready(T),
    /// Completed with a non-cancellation failure, wrapped.
    Failed(ExecutionFailure),
    /// Completed via cancellation.
    Cancelled,
    /// The deadline elapsed before the cell became terminal.
    TimedOut,
}

/// Outcome of a blocking [`Future::sync`] call (cause returned raw, not
/// wrapped).
pub enum SyncOutcome<T> {
    /// Completed successfully.
    Ready(T),
    /// Completed with a non-cancellation failure, raw.
    Failed(Cause),
    /// Completed via cancellation.
    Cancelled,
}

/// Error returned by [`Future::join`].
#[derive(Debug)]
pub enum JoinError {
    /// The source failed with a non-cancellation cause.
    Failed(ExecutionFailure),
    /// The source was cancelled.
    Cancelled,
    /// The deadline elapsed first.
    TimedOut,
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinError::Failed(e) => write!(f, "{e}"),
            JoinError::Cancelled => write!(f, "the future was cancelled"),
            JoinError::TimedOut => write!(f, "timed out waiting for the future"),
        }
    }
}

impl std::error::Error for JoinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JoinError::Failed(e) => Some(e),
            _ => None,
        }
    }
}
