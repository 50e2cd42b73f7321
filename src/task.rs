//! `FutureTask`: a synchronous callable wrapped so that `execute()` runs it
//! on a scheduler and settles a promise with the outcome.
//!
//! Rust has no safe API to force-interrupt another thread mid-instruction,
//! unlike the host's `Thread.interrupt()`. `interruptTask` is therefore
//! rendered cooperatively: `cancel(mayInterrupt = true)` flips an
//! [`InterruptFlag`] the running callable may poll; a callable that never
//! checks it simply runs to completion, whose result is then silently
//! discarded by `trySuccess`/`tryFailure` because the cell is already
//! terminal (cancelled).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::combinators::panic_cause;
use crate::error::Cause;
use crate::future::Future;
use crate::promise::Promise;
use crate::scheduler::Scheduler;

/// Cooperative cancellation signal handed to a running [`FutureTask`]
/// callable.
#[derive(Clone)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Whether `cancel(mayInterrupt = true)` has been requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

type Callable<T> = Box<dyn FnOnce(&InterruptFlag) -> Result<T, Cause> + Send>;

/// A callable run once on a scheduler, settling its own promise.
pub struct FutureTask<T> {
    promise: Promise<T>,
    callable: Mutex<Option<Callable<T>>>,
    interrupt_flag: Arc<AtomicBool>,
}

impl<T: Send + 'static> FutureTask<T> {
    /// Wrap `callable`, dispatching on the default scheduler when executed.
    pub fn new<F>(callable: F) -> Arc<Self>
    where
        F: FnOnce(&InterruptFlag) -> Result<T, Cause> + Send + 'static,
    {
        Self::new_on(crate::scheduler::default_scheduler(), callable)
    }

    /// Like [`Self::new`], pinned to an explicit scheduler.
    pub fn new_on<F>(scheduler: Arc<dyn Scheduler>, callable: F) -> Arc<Self>
    where
        F: FnOnce(&InterruptFlag) -> Result<T, Cause> + Send + 'static,
    {
        let promise = Promise::new_on(scheduler);
        let interrupt_flag = Arc::new(AtomicBool::new(false));
        let flag_for_hook = interrupt_flag.clone();
        promise.on_interrupt(move || {
            flag_for_hook.store(true, Ordering::SeqCst);
        });
        Arc::new(FutureTask {
            promise,
            callable: Mutex::new(Some(Box::new(callable))),
            interrupt_flag,
        })
    }

    /// The read-only view of this task's eventual outcome.
    pub fn future(&self) -> Future<T> {
        self.promise.future()
    }

    /// Cancel this task. Equivalent to `self.future().cancel(may_interrupt)`.
    pub fn cancel(&self, may_interrupt: bool) -> bool {
        self.promise.cancel(may_interrupt)
    }

    /// Arrange for the wrapped callable to run on the configured scheduler.
    /// A second call is a no-op: the callable only ever runs once.
    pub fn execute(self: &Arc<Self>) {
        let scheduler = self.promise.future().scheduler();
        let this = self.clone();
        crate::scheduler::run_or_fall_back(
            &scheduler,
            Box::new(move || {
                this.run();
            }),
        );
    }

    fn run(&self) {
        let Some(callable) = self.callable.lock().take() else {
            return;
        };
        let flag = InterruptFlag(self.interrupt_flag.clone());
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callable(&flag))) {
            Ok(Ok(value)) => {
                self.promise.try_success(value);
            }
            Ok(Err(cause)) => {
                self.promise.try_failure(cause);
            }
            Err(payload) => {
                self.promise.try_failure(panic_cause(payload));
            }
        }
    }
}
