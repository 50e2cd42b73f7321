//! The result cell: the four-state machine and its listener list.
//!
//! A cell's observable state is monotonic and every transition happens
//! under a single lock acquisition, a concrete rendition of "single
//! compare-and-swap on the state word": `parking_lot::Mutex` is itself a
//! spin-then-park hybrid, so the uncontended fast path really is a handful
//! of atomic operations, while the contended path parks instead of
//! busy-waiting forever. Listener dispatch never runs while this lock is
//! held: callers drain the pending listeners into a local `Vec` first, drop
//! the lock, and only then invoke anything.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::Cause;
use crate::scheduler::{run_or_fall_back, Job, Scheduler};

/// The four logical states of a result cell, plus the payload each carries.
pub(crate) enum Outcome<T> {
    Incomplete,
    Uncancellable,
    Success(T),
    Failure(Cause),
}

impl<T> Outcome<T> {
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success(_) | Outcome::Failure(_))
    }
}

type CompletionListener<T> = Box<dyn FnOnce(&crate::future::Future<T>) + Send>;

/// A listener that additionally wants incremental progress notifications.
pub trait ProgressListener<T>: Send + Sync {
    /// Called whenever the owning promise reports progress, strictly before
    /// any completion notification for this same listener.
    fn on_progress(&self, future: &crate::future::Future<T>, progress: u64, total: Option<u64>);

    /// Called once, when the owning promise completes.
    fn on_completed(&self, future: &crate::future::Future<T>);
}

/// Opaque handle returned by `Future::on_completed`/`on_progress`, usable to
/// remove a listener (`removeListener`) before it has fired. Rust closures
/// have no `equals()`, so removal is keyed by this per-cell monotonic token
/// rather than by listener identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Small-object-optimised storage for completion listeners: zero listeners
/// costs nothing, one listener needs no allocation beyond the boxed closure
/// itself, and two or more spill into a growable queue. Each entry carries
/// its [`ListenerId`] so a specific listener can be found and removed again
/// without scanning by identity.
pub(crate) enum ListenerSet<T> {
    None,
    One(ListenerId, CompletionListener<T>),
    Many(VecDeque<(ListenerId, CompletionListener<T>)>),
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        ListenerSet::None
    }
}

impl<T> ListenerSet<T> {
    fn push(&mut self, id: ListenerId, listener: CompletionListener<T>) {
        *self = match std::mem::take(self) {
            ListenerSet::None => ListenerSet::One(id, listener),
            ListenerSet::One(existing_id, existing) => {
                let mut queue = VecDeque::with_capacity(2);
                queue.push_back((existing_id, existing));
                queue.push_back((id, listener));
                ListenerSet::Many(queue)
            }
            ListenerSet::Many(mut queue) => {
                queue.push_back((id, listener));
                ListenerSet::Many(queue)
            }
        };
    }

    fn drain_all(&mut self) -> Vec<CompletionListener<T>> {
        match std::mem::take(self) {
            ListenerSet::None => Vec::new(),
            ListenerSet::One(_, l) => vec![l],
            ListenerSet::Many(queue) => queue.into_iter().map(|(_, l)| l).collect(),
        }
    }

    /// Remove the entry matching `id`, if any is still pending. Mirrors
    /// `removeListener`'s "removes the first match" contract: there can only
    /// ever be one entry per `id`, so "first" and "only" coincide here.
    fn remove(&mut self, id: ListenerId) -> bool {
        match std::mem::take(self) {
            ListenerSet::None => false,
            ListenerSet::One(existing_id, listener) => {
                if existing_id == id {
                    true
                } else {
                    *self = ListenerSet::One(existing_id, listener);
                    false
                }
            }
            ListenerSet::Many(mut queue) => {
                let before = queue.len();
                queue.retain(|(existing_id, _)| *existing_id != id);
                let removed = queue.len() != before;
                *self = if queue.is_empty() {
                    ListenerSet::None
                } else {
                    ListenerSet::Many(queue)
                };
                removed
            }
        }
    }

}

pub(crate) struct CellState<T> {
    pub(crate) outcome: Outcome<T>,
    listeners: ListenerSet<T>,
    progressive: Vec<(ListenerId, Arc<dyn ProgressListener<T> + 'static>)>,
    waiters: usize,
}

/// Per-cell FIFO of scheduler jobs (progress notifications, completion
/// dispatch, and post-terminal listener attachment), serialised so that
/// whichever external scheduler runs them, they still execute one at a
/// time, in submission order.
///
/// A pool-backed [`Scheduler`] like the default fork-join scheduler may run
/// independently-submitted jobs on arbitrary worker threads in arbitrary
/// order. Submitting one job per cell event (a progress update, then later
/// the completion dispatch) would let a slow progress job lose a race
/// against a fast completion job on such a scheduler, violating "progress
/// notifications precede the completion notification for any single
/// listener". Routing every job for a cell through this queue means the
/// scheduler is only ever asked to run *one* thing per cell at a time: the
/// drain loop below, which keeps servicing newly queued jobs inline (on
/// whichever thread is already running it) for as long as more keep
/// arriving, rather than racing a fresh submission against them.
struct DispatchQueue {
    state: Mutex<DispatchQueueState>,
}

#[derive(Default)]
struct DispatchQueueState {
    active: bool,
    pending: VecDeque<Job>,
}

impl DispatchQueue {
    fn new() -> Arc<Self> {
        Arc::new(DispatchQueue {
            state: Mutex::new(DispatchQueueState::default()),
        })
    }

    /// Enqueue `job` behind every job already queued for this cell. If no
    /// drain loop is currently running, hands one to `scheduler`; otherwise
    /// the already-running loop will pick this job up itself.
    fn enqueue(self: &Arc<Self>, scheduler: &Arc<dyn Scheduler>, job: Job) {
        let mut guard = self.state.lock();
        guard.pending.push_back(job);
        if guard.active {
            return;
        }
        guard.active = true;
        drop(guard);

        let this = self.clone();
        run_or_fall_back(scheduler, Box::new(move || this.drain()));
    }

    /// Run every pending job, in FIFO order, on whichever thread this was
    /// invoked on. Keeps looping for as long as jobs keep arriving (pushed
    /// by completions/progress reports happening concurrently), so a second
    /// call to [`Self::enqueue`] made while this loop is running never
    /// submits a competing job to the scheduler.
    fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut guard = self.state.lock();
                match guard.pending.pop_front() {
                    Some(job) => Some(job),
                    None => {
                        guard.active = false;
                        None
                    }
                }
            };
            match next {
                Some(job) => job(),
                None => break,
            }
        }
    }
}

/// A shared result cell. `Future<T>`/`Promise<T>` are both thin handles
/// around `Arc<Cell<T>>`; cloning a handle clones the `Arc`, never the cell.
pub(crate) struct Cell<T> {
    state: Mutex<CellState<T>>,
    condvar: Condvar,
    pub(crate) scheduler: Arc<dyn Scheduler>,
    /// Cooperative interrupt hook: lives on the cell, not the `Promise`, so
    /// that `Future::cancel` and `Promise::cancel` share one cancellation
    /// path regardless of which handle the caller holds.
    interrupt: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
    next_listener_id: AtomicU64,
    dispatch_queue: Arc<DispatchQueue>,
}

impl<T: Send + 'static> Cell<T> {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Arc<Self> {
        Arc::new(Cell {
            state: Mutex::new(CellState {
                outcome: Outcome::Incomplete,
                listeners: ListenerSet::None,
                progressive: Vec::new(),
                waiters: 0,
            }),
            condvar: Condvar::new(),
            scheduler,
            interrupt: Mutex::new(None),
            next_listener_id: AtomicU64::new(0),
            dispatch_queue: DispatchQueue::new(),
        })
    }

    pub(crate) fn new_completed(scheduler: Arc<dyn Scheduler>, outcome: Outcome<T>) -> Arc<Self> {
        debug_assert!(outcome.is_terminal());
        Arc::new(Cell {
            state: Mutex::new(CellState {
                outcome,
                listeners: ListenerSet::None,
                progressive: Vec::new(),
                waiters: 0,
            }),
            condvar: Condvar::new(),
            scheduler,
            interrupt: Mutex::new(None),
            next_listener_id: AtomicU64::new(0),
            dispatch_queue: DispatchQueue::new(),
        })
    }

    fn next_listener_id(&self) -> ListenerId {
        ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().outcome.is_terminal()
    }

    pub(crate) fn is_success(&self) -> bool {
        matches!(self.state.lock().outcome, Outcome::Success(_))
    }

    pub(crate) fn is_failed(&self) -> bool {
        matches!(self.state.lock().outcome, Outcome::Failure(_))
    }

    pub(crate) fn is_cancellable(&self) -> bool {
        !matches!(
            self.state.lock().outcome,
            Outcome::Uncancellable | Outcome::Success(_) | Outcome::Failure(_)
        )
    }

    /// `getNow`: never throws, returns `None` unless the cell is `Success`.
    pub(crate) fn clone_success(&self) -> Option<T>
    where
        T: Clone,
    {
        match &self.state.lock().outcome {
            Outcome::Success(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub(crate) fn with_outcome<R>(&self, f: impl FnOnce(&Outcome<T>) -> R) -> R {
        f(&self.state.lock().outcome)
    }

    /// `trySuccess` / `tryFailure`: apply iff not yet terminal. Returns
    /// whether it was applied, and drains + dispatches listeners on success.
    pub(crate) fn try_complete(self: &Arc<Self>, outcome: Outcome<T>) -> bool {
        debug_assert!(outcome.is_terminal());
        let (applied, listeners, progressive, should_notify) = {
            let mut guard = self.state.lock();
            if guard.outcome.is_terminal() {
                (false, Vec::new(), Vec::new(), false)
            } else {
                guard.outcome = outcome;
                let listeners = guard.listeners.drain_all();
                let progressive = std::mem::take(&mut guard.progressive);
                let should_notify = guard.waiters > 0;
                (true, listeners, progressive, should_notify)
            }
        };
        if should_notify {
            self.condvar.notify_all();
        }
        if applied {
            self.dispatch(listeners, progressive);
        }
        applied
    }

    pub(crate) fn set_interrupt_hook(&self, hook: Box<dyn Fn() + Send + Sync>) {
        *self.interrupt.lock() = Some(hook);
    }

    /// `cancel(mayInterrupt)`: fails the cell with a cancellation cause,
    /// running the interrupt hook first when requested and present. Returns
    /// `true` iff the transition happened.
    pub(crate) fn cancel(self: &Arc<Self>, may_interrupt: bool) -> bool {
        if !self.is_cancellable() {
            return false;
        }
        if may_interrupt {
            if let Some(hook) = self.interrupt.lock().as_ref() {
                hook();
            }
        }
        self.try_complete(Outcome::Failure(crate::error::into_cause(
            crate::error::CancellationCause::new(),
        )))
    }

    pub(crate) fn set_uncancellable(&self) -> bool {
        let mut guard = self.state.lock();
        match guard.outcome {
            Outcome::Incomplete => {
                guard.outcome = Outcome::Uncancellable;
                true
            }
            Outcome::Uncancellable => true,
            Outcome::Success(_) | Outcome::Failure(_) => {
                !matches!(&guard.outcome, Outcome::Failure(c) if crate::error::is_cancellation(c.as_ref()))
            }
        }
    }

    /// Run every progressive listener's `on_completed` and then every plain
    /// completion listener, in attachment order, from inside a single job
    /// handed to this cell's [`DispatchQueue`].
    ///
    /// Queuing one job rather than one per listener is what makes insertion
    /// order a library guarantee instead of an accident of whichever worker
    /// the pool happens to wake up first: a pool like the default fork-join
    /// scheduler may run independent jobs on arbitrary threads in arbitrary
    /// order, but everything inside a single job still runs sequentially,
    /// on whichever single thread picks it up. Routing through the
    /// `DispatchQueue` (rather than calling `run_or_fall_back` directly)
    /// additionally orders this job after any progress job still pending
    /// for this cell. Each listener's panic is caught individually so one
    /// bad listener does not stop the rest of the batch from running.
    fn dispatch(
        self: &Arc<Self>,
        listeners: Vec<CompletionListener<T>>,
        progressive: Vec<(ListenerId, Arc<dyn ProgressListener<T> + 'static>)>,
    ) {
        if listeners.is_empty() && progressive.is_empty() {
            return;
        }
        let future = crate::future::Future::from_cell(self.clone());
        let job: Job = Box::new(move || {
            for (_, p) in progressive {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    p.on_completed(&future);
                }));
                if let Err(payload) = result {
                    let message = panic_message(&payload);
                    log::warn!("a progress listener panicked on completion: {message}");
                }
            }
            for listener in listeners {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    listener(&future);
                }));
                if let Err(payload) = result {
                    let message = panic_message(&payload);
                    log::warn!("a future listener panicked: {message}");
                }
            }
        });
        self.dispatch_queue.enqueue(&self.scheduler, job);
    }

    /// Append a listener; if the cell is already terminal, it is scheduled
    /// immediately rather than invoked inline. Returns a [`ListenerId`] that
    /// can later be passed to [`Self::remove_listener`].
    pub(crate) fn add_listener(self: &Arc<Self>, listener: CompletionListener<T>) -> ListenerId {
        let id = self.next_listener_id();
        let mut guard = self.state.lock();
        if guard.outcome.is_terminal() {
            drop(guard);
            let future = crate::future::Future::from_cell(self.clone());
            let job: Job = Box::new(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    listener(&future);
                }));
                if let Err(payload) = result {
                    let message = panic_message(&payload);
                    log::warn!("a future listener panicked: {message}");
                }
            });
            self.dispatch_queue.enqueue(&self.scheduler, job);
        } else {
            guard.listeners.push(id, listener);
        }
        id
    }

    /// Remove a listener previously added via [`Self::add_listener`], if it
    /// has not already fired or been drained for dispatch. Returns whether
    /// anything was removed.
    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        self.state.lock().listeners.remove(id)
    }

    pub(crate) fn add_progress_listener(
        self: &Arc<Self>,
        listener: Arc<dyn ProgressListener<T>>,
    ) -> ListenerId {
        let id = self.next_listener_id();
        let mut guard = self.state.lock();
        if guard.outcome.is_terminal() {
            drop(guard);
            let future = crate::future::Future::from_cell(self.clone());
            let job: Job = Box::new(move || listener.on_completed(&future));
            self.dispatch_queue.enqueue(&self.scheduler, job);
        } else {
            guard.progressive.push((id, listener));
        }
        id
    }

    /// Remove a progressive listener previously added via
    /// [`Self::add_progress_listener`]; consistent with
    /// [`Self::remove_listener`]'s contract on the general view.
    pub(crate) fn remove_progress_listener(&self, id: ListenerId) -> bool {
        let mut guard = self.state.lock();
        let before = guard.progressive.len();
        guard.progressive.retain(|(existing_id, _)| *existing_id != id);
        guard.progressive.len() != before
    }

    /// Notify progressive listeners without completing the cell. Also
    /// routed through the [`DispatchQueue`], for the same ordering reason as
    /// [`Self::dispatch`]: progress for a later update must never be
    /// observed by one listener before an earlier update has reached
    /// another, and no progress job may still be draining when this cell's
    /// eventual completion job runs.
    pub(crate) fn notify_progress(self: &Arc<Self>, progress: u64, total: Option<u64>) {
        let snapshot: Vec<_> = {
            let guard = self.state.lock();
            if guard.outcome.is_terminal() {
                return;
            }
            guard.progressive.clone()
        };
        if snapshot.is_empty() {
            return;
        }
        let future = crate::future::Future::from_cell(self.clone());
        let job: Job = Box::new(move || {
            for (_, p) in snapshot {
                p.on_progress(&future, progress, total);
            }
        });
        self.dispatch_queue.enqueue(&self.scheduler, job);
    }

    /// Block the calling thread until terminal or `deadline` elapses.
    /// Returns `true` if terminal.
    pub(crate) fn await_done(&self, deadline: Option<std::time::Instant>) -> bool {
        let mut guard = self.state.lock();
        guard.waiters += 1;
        let result = loop {
            if guard.outcome.is_terminal() {
                break true;
            }
            match deadline {
                None => self.condvar.wait(&mut guard),
                Some(deadline) => {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        break false;
                    }
                    let timed_out = self
                        .condvar
                        .wait_for(&mut guard, deadline - now)
                        .timed_out();
                    if timed_out && !guard.outcome.is_terminal() {
                        break false;
                    }
                }
            }
        };
        guard.waiters -= 1;
        result
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::future::Future;
    use crate::promise::Promise;
    use crate::scheduler::RejectingScheduler;

    /// Listeners attached before completion still run in attachment order
    /// even when the dispatch job itself lands on a scheduler that would run
    /// arbitrary jobs in arbitrary order: the whole batch is one job.
    #[test]
    fn listeners_run_in_order_even_on_a_reordering_scheduler() {
        struct ShufflingScheduler;
        impl std::fmt::Debug for ShufflingScheduler {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("ShufflingScheduler")
            }
        }
        impl crate::scheduler::Scheduler for ShufflingScheduler {
            fn execute(&self, job: crate::scheduler::Job) -> Result<(), crate::scheduler::Job> {
                // Runs on a freshly spawned thread per job, rather than a
                // shared worker, so two jobs racing would almost certainly
                // interleave if dispatch ever produced more than one.
                let handle = std::thread::spawn(job);
                handle.join().unwrap();
                Ok(())
            }
            fn schedule(
                &self,
                job: crate::scheduler::Job,
                delay: std::time::Duration,
            ) -> Arc<dyn crate::scheduler::DelayedTask> {
                crate::timer::schedule(job, delay)
            }
        }

        let promise: Promise<()> = Promise::new_on(Arc::new(ShufflingScheduler));
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            promise.future().on_completed(move |_| order.lock().unwrap().push(i));
        }
        promise.try_success(());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    /// A scheduler that refuses the dispatch job still lets every listener
    /// run, because the cell falls back to inline execution on rejection.
    #[test]
    fn rejected_dispatch_falls_back_to_inline_execution() {
        let promise: Promise<i32> = Promise::new_on(Arc::new(RejectingScheduler));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_for_listener = ran.clone();
        promise.future().on_completed(move |fut| {
            if fut.get_now() == Some(7) {
                ran_for_listener.fetch_add(1, Ordering::SeqCst);
            }
        });
        promise.try_success(7);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    /// `removeListener`: a listener removed before completion never runs; a
    /// sibling listener attached around it is unaffected.
    #[test]
    fn removed_listener_does_not_run() {
        use crate::scheduler::DirectScheduler;

        let promise: Promise<i32> = Promise::new_on(Arc::new(DirectScheduler));
        let ran = Arc::new(Mutex::new(Vec::new()));

        let ran_first = ran.clone();
        promise.future().on_completed(move |_| ran_first.lock().unwrap().push("first"));
        let ran_removed = ran.clone();
        let removed_id = promise
            .future()
            .on_completed(move |_| ran_removed.lock().unwrap().push("removed"));
        let ran_last = ran.clone();
        promise.future().on_completed(move |_| ran_last.lock().unwrap().push("last"));

        assert!(promise.future().remove_listener(removed_id));
        // A second removal of the same id is a no-op: it is no longer present.
        assert!(!promise.future().remove_listener(removed_id));

        promise.try_success(1);
        assert_eq!(*ran.lock().unwrap(), vec!["first", "last"]);
    }

    /// Removing a listener after the cell is already terminal (and the
    /// listener already scheduled/run) is simply a no-op, not an error.
    #[test]
    fn removing_an_already_fired_listener_is_a_no_op() {
        use crate::scheduler::DirectScheduler;

        let promise: Promise<i32> = Promise::new_on(Arc::new(DirectScheduler));
        promise.try_success(1);
        let id = promise.future().on_completed(|_| {});
        assert!(!promise.future().remove_listener(id));
    }

    /// `removeListener`'s progressive-view counterpart: removing a progress
    /// listener before completion means it never observes either a progress
    /// report or the eventual completion.
    #[test]
    fn removed_progress_listener_receives_nothing() {
        use crate::cell::ProgressListener;
        use crate::scheduler::DirectScheduler;

        struct Recorder(Arc<Mutex<Vec<&'static str>>>);
        impl ProgressListener<i32> for Recorder {
            fn on_progress(&self, _future: &Future<i32>, _progress: u64, _total: Option<u64>) {
                self.0.lock().unwrap().push("progress");
            }
            fn on_completed(&self, _future: &Future<i32>) {
                self.0.lock().unwrap().push("completed");
            }
        }

        let promise: Promise<i32> = Promise::new_on(Arc::new(DirectScheduler));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = promise.future().on_progress(Arc::new(Recorder(seen.clone())));

        assert!(promise.future().remove_progress_listener(id));
        promise.set_progress(1, Some(2));
        promise.try_success(1);

        assert!(seen.lock().unwrap().is_empty());
    }

    /// §5/§8: progress notifications for a listener must precede that
    /// listener's completion notification, even when the scheduler runs
    /// independently-submitted jobs on detached threads with no ordering
    /// guarantee of its own (the shape a real work-stealing pool takes).
    #[test]
    fn progress_notifications_precede_completion_on_a_parallel_scheduler() {
        use crate::cell::ProgressListener;
        use crate::scheduler::{DelayedTask, Scheduler};

        #[derive(Debug)]
        struct SpawningScheduler;
        impl Scheduler for SpawningScheduler {
            fn execute(&self, job: crate::scheduler::Job) -> Result<(), crate::scheduler::Job> {
                // Fire-and-forget: unlike a joining scheduler, this genuinely
                // races independently-submitted jobs against each other.
                std::thread::spawn(job);
                Ok(())
            }
            fn schedule(
                &self,
                job: crate::scheduler::Job,
                delay: Duration,
            ) -> Arc<dyn DelayedTask> {
                crate::timer::schedule(job, delay)
            }
        }

        struct Recorder(Arc<Mutex<Vec<&'static str>>>);
        impl ProgressListener<i32> for Recorder {
            fn on_progress(&self, _future: &Future<i32>, _progress: u64, _total: Option<u64>) {
                // Widen the race window an unserialised implementation
                // would expose: a concurrently-submitted completion job
                // would very likely finish first.
                std::thread::sleep(Duration::from_millis(30));
                self.0.lock().unwrap().push("progress");
            }
            fn on_completed(&self, _future: &Future<i32>) {
                self.0.lock().unwrap().push("completed");
            }
        }

        let promise: Promise<i32> = Promise::new_on(Arc::new(SpawningScheduler));
        let seen = Arc::new(Mutex::new(Vec::new()));
        promise.future().on_progress(Arc::new(Recorder(seen.clone())));

        promise.set_progress(1, Some(2));
        // Give the progress job a moment to be picked up (and start
        // sleeping) before completion is submitted behind it.
        std::thread::sleep(Duration::from_millis(10));
        promise.try_success(7);

        for _ in 0..200 {
            if seen.lock().unwrap().len() >= 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*seen.lock().unwrap(), vec!["progress", "completed"]);
    }
}
