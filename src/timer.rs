//! A minimal delay queue backing `Scheduler::schedule`.
//!
//! Neither an inline test scheduler nor a fork-join pool has a native notion
//! of "run this later"; both route through a single background timer thread
//! that wakes for the next deadline, lazily spawned on first use.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::scheduler::{DelayedTask, Job};

struct Entry {
    deadline: Instant,
    seq: u64,
    job: Mutex<Option<Job>>,
    cancelled: AtomicBool,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap is a max-heap; we want the earliest deadline on top.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Handle(Arc<Entry>);

impl DelayedTask for Handle {
    fn cancel(&self) -> bool {
        let was_cancelled = self.0.cancelled.swap(true, Ordering::SeqCst);
        !was_cancelled && self.0.job.lock().unwrap().is_some()
    }
}

struct Timer {
    heap: Mutex<BinaryHeap<Arc<Entry>>>,
    wake: Condvar,
}

static SEQ: AtomicU64 = AtomicU64::new(0);
static TIMER: OnceCell<Arc<Timer>> = OnceCell::new();

fn timer() -> Arc<Timer> {
    TIMER
        .get_or_init(|| {
            let timer = Arc::new(Timer {
                heap: Mutex::new(BinaryHeap::new()),
                wake: Condvar::new(),
            });
            let background = timer.clone();
            std::thread::Builder::new()
                .name("promise-rs-timer".into())
                .spawn(move || run_timer_loop(background))
                .expect("failed to spawn promise-rs timer thread");
            timer
        })
        .clone()
}

fn run_timer_loop(timer: Arc<Timer>) {
    let mut guard = timer.heap.lock().unwrap();
    loop {
        match guard.peek() {
            None => {
                guard = timer.wake.wait(guard).unwrap();
            }
            Some(top) => {
                let now = Instant::now();
                if top.deadline <= now {
                    let entry = guard.pop().unwrap();
                    drop(guard);
                    fire(&entry);
                    guard = timer.heap.lock().unwrap();
                } else {
                    let wait_for = top.deadline - now;
                    let (g, _timeout) = timer.wake.wait_timeout(guard, wait_for).unwrap();
                    guard = g;
                }
            }
        }
    }
}

fn fire(entry: &Arc<Entry>) {
    if entry.cancelled.load(Ordering::SeqCst) {
        return;
    }
    if let Some(job) = entry.job.lock().unwrap().take() {
        // Run the timed-out job on its own thread rather than the timer
        // thread itself, so a slow listener can never delay other timers.
        std::thread::spawn(move || job());
    }
}

/// Schedule `job` to run after `delay`. Returns a handle that can cancel the
/// job before it fires.
pub(crate) fn schedule(job: Job, delay: Duration) -> Arc<dyn DelayedTask> {
    let timer = timer();
    let entry = Arc::new(Entry {
        deadline: Instant::now() + delay,
        seq: SEQ.fetch_add(1, Ordering::SeqCst),
        job: Mutex::new(Some(job)),
        cancelled: AtomicBool::new(false),
    });
    {
        let mut heap = timer.heap.lock().unwrap();
        heap.push(entry.clone());
    }
    timer.wake.notify_all();
    Arc::new(Handle(entry))
}
