//! The external collaborator this core consumes for listener dispatch and
//! delayed (timeout) scheduling.
//!
//! A `Scheduler` only needs to supply `execute` (run as soon as possible) and
//! `schedule` (run after a delay, returning a handle that can cancel the
//! delayed task). The library never implements its own work-stealing runtime;
//! it resolves a default scheduler once, lazily, and otherwise just calls
//! through to whatever `Scheduler` a `Promise` was created with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::trampoline::run_trampolined;

/// Anything that can run a boxed, `Send` closure.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A handle to a task scheduled with [`Scheduler::schedule`]. Dropping it has
/// no effect; call [`DelayedTask::cancel`] explicitly to stop the task from
/// running if it hasn't already.
pub trait DelayedTask: Send + Sync {
    /// Attempt to cancel the delayed task. Returns `true` if the task had not
    /// yet run and will not run now.
    fn cancel(&self) -> bool;
}

/// External dispatcher. Consumed, never implemented as a full runtime by this
/// crate beyond the bundled [`DirectScheduler`] (tests) and the process-wide
/// fork-join default (see [`default_scheduler`]).
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Run `job` as soon as possible. May run inline on the calling thread
    /// (the [`DirectScheduler`] always does) or hand off to a worker.
    ///
    /// Returns `Err(job)` if the scheduler refuses to accept it, handing the
    /// job back unrun so the caller can fall back to running it some other
    /// way instead of silently losing it.
    fn execute(&self, job: Job) -> Result<(), Job>;

    /// Run `job` after `delay` has elapsed, unless cancelled first.
    fn schedule(&self, job: Job, delay: Duration) -> Arc<dyn DelayedTask>;
}

/// Executes inline, on the calling thread, via the per-thread trampoline.
///
/// Intended for tests and for any caller that wants synchronous,
/// single-threaded listener dispatch. `schedule` is backed by a dedicated
/// timer thread since an inline scheduler has no other way to honor a delay
/// without blocking the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectScheduler;

impl Scheduler for DirectScheduler {
    fn execute(&self, job: Job) -> Result<(), Job> {
        run_trampolined(job);
        Ok(())
    }

    fn schedule(&self, job: Job, delay: Duration) -> Arc<dyn DelayedTask> {
        crate::timer::schedule(job, delay)
    }
}

/// A scheduler that always refuses a dispatch job, handing it straight back.
/// Exists purely to exercise the "scheduler rejects" contract on
/// [`Scheduler::execute`] itself in tests; when a `Promise` actually uses it,
/// the cell's own dispatch logic still runs the listener by falling back to
/// inline execution, so nothing is dropped in practice.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingScheduler;

impl Scheduler for RejectingScheduler {
    fn execute(&self, job: Job) -> Result<(), Job> {
        log::warn!("RejectingScheduler refused a dispatch job");
        Err(job)
    }

    fn schedule(&self, _job: Job, _delay: Duration) -> Arc<dyn DelayedTask> {
        struct NoopHandle;
        impl DelayedTask for NoopHandle {
            fn cancel(&self) -> bool {
                false
            }
        }
        Arc::new(NoopHandle)
    }
}

/// Fork-join-pool-backed default, used whenever a `Promise` is created
/// without an explicit scheduler. Backed by `rayon`'s global thread pool,
/// sized from `PROMISE_RS_WORKER_THREADS` (falling back to the number of
/// logical CPUs) the first time it is touched.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkJoinScheduler;

impl Scheduler for ForkJoinScheduler {
    fn execute(&self, job: Job) -> Result<(), Job> {
        rayon::spawn(move || run_trampolined(job));
        Ok(())
    }

    fn schedule(&self, job: Job, delay: Duration) -> Arc<dyn DelayedTask> {
        crate::timer::schedule(job, delay)
    }
}

fn configure_global_pool() {
    static CONFIGURED: OnceCell<()> = OnceCell::new();
    CONFIGURED.get_or_init(|| {
        let threads = std::env::var("PROMISE_RS_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(num_cpus::get);
        // `build_global` fails if a global pool already exists (e.g. because
        // the host application configured its own rayon pool first); that's
        // fine, we just use whatever is already installed.
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("promise-rs-worker-{i}"))
            .build_global();
    });
}

static DEFAULT: OnceCell<Arc<dyn Scheduler>> = OnceCell::new();

/// Resolve the process-wide default scheduler, lazily and exactly once.
///
/// This is the `GlobalScheduler`: it is what orphaned listeners (attached to
/// a promise created without an explicit scheduler) run on, and it is safe
/// to call concurrently from any thread. A real service-registry lookup (the
/// host's `ServiceLoader`-equivalent) is out of scope for this crate's
/// dependency surface; the single supported default is the `rayon`-backed
/// [`ForkJoinScheduler`].
pub fn default_scheduler() -> Arc<dyn Scheduler> {
    DEFAULT
        .get_or_init(|| {
            configure_global_pool();
            Arc::new(ForkJoinScheduler) as Arc<dyn Scheduler>
        })
        .clone()
}

/// Hand `job` to `scheduler`; if it is refused, run it inline right here
/// instead of dropping it. Every call site that dispatches a listener or a
/// task callable goes through this so a rejecting scheduler never silently
/// loses work, only ever the `RejectingScheduler` test sentinel's own
/// direct unit test observes a true rejection.
pub(crate) fn run_or_fall_back(scheduler: &Arc<dyn Scheduler>, job: Job) {
    if let Err(job) = scheduler.execute(job) {
        log::warn!("scheduler rejected a dispatch job; running it inline instead");
        run_trampolined(job);
    }
}
