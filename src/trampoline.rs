//! Per-thread trampoline used to flatten recursive listener dispatch.
//!
//! When a scheduler's `execute` runs a task inline on the calling thread (the
//! [`crate::scheduler::DirectScheduler`] always does this; a busy pool-backed
//! scheduler sometimes will), a listener that synchronously completes another
//! promise would otherwise recurse: `complete -> dispatch -> listener ->
//! complete -> dispatch -> ...`. Chaining enough of those blows the stack.
//!
//! [`run_trampolined`] turns that recursion into a loop: the first call on a
//! given thread becomes the "driver" and keeps popping work off a thread-local
//! queue until it's empty; any call made while a driver is already running
//! just appends to that queue instead of being invoked immediately.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce() + Send>;

thread_local! {
    static QUEUE: RefCell<Option<VecDeque<Task>>> = RefCell::new(None);
}

/// Run `task`, trampolining if it (directly or transitively, via further
/// calls to `run_trampolined` made by `task` itself) would otherwise recurse
/// on this thread.
pub(crate) fn run_trampolined(task: Task) {
    let is_driver = QUEUE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let first = slot.is_none();
        slot.get_or_insert_with(VecDeque::new).push_back(task);
        first
    });
    if !is_driver {
        return;
    }
    loop {
        let next = QUEUE.with(|cell| cell.borrow_mut().as_mut().and_then(VecDeque::pop_front));
        match next {
            Some(task) => task(),
            None => break,
        }
    }
    QUEUE.with(|cell| *cell.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn flattens_deep_synchronous_chains() {
        // Each level schedules the next via run_trampolined from inside the
        // currently running task; a naive recursive implementation would
        // overflow the stack well before 200_000 levels.
        let depth = 200_000usize;
        let completed = Arc::new(AtomicUsize::new(0));

        fn step(remaining: usize, completed: Arc<AtomicUsize>) {
            completed.fetch_add(1, Ordering::SeqCst);
            if remaining > 0 {
                run_trampolined(Box::new(move || step(remaining - 1, completed)));
            }
        }

        run_trampolined(Box::new(move || step(depth, completed.clone())));
    }

    #[test]
    fn nested_driver_runs_after_current_batch() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        run_trampolined(Box::new(move || {
            o1.lock().push(1);
            run_trampolined(Box::new(move || {
                o2.lock().push(2);
            }));
            order.lock().push(3);
        }));
        assert_eq!(*order.lock(), vec![1, 3, 2]);
    }
}
