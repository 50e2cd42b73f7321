//! Bridges to and from the host's standard async future type.
//!
//! Two directions:
//! - [`for_adaption`] drives an arbitrary `std::future::Future` to
//!   completion on a [`Scheduler`] and mirrors its outcome into one of
//!   ours, wrapped exceptions unwrapped one level the same way
//!   [`Future::cause_arc`] already does for every other source.
//! - [`Future::completable`] hands back a `std::future::Future` view of one
//!   of ours, for callers that want to `.await` it from an external async
//!   runtime. Dropping it (the Rust analogue of "cancelling" a standard
//!   future) does not touch the source, matching the host contract that
//!   cancelling the completable view must not cancel the original.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use parking_lot::Mutex;

use crate::error::Cause;
use crate::future::Future;
use crate::promise::Promise;
use crate::scheduler::Scheduler;

/// Drive `external` to completion on the default scheduler, mirroring its
/// outcome.
pub fn for_adaption<Fut, T>(external: Fut) -> Future<T>
where
    Fut: std::future::Future<Output = Result<T, Cause>> + Send + 'static,
    T: Send + 'static,
{
    for_adaption_on(external, crate::scheduler::default_scheduler())
}

/// Like [`for_adaption`], pinned to an explicit scheduler.
pub fn for_adaption_on<Fut, T>(external: Fut, scheduler: Arc<dyn Scheduler>) -> Future<T>
where
    Fut: std::future::Future<Output = Result<T, Cause>> + Send + 'static,
    T: Send + 'static,
{
    let promise = Promise::new_on(scheduler.clone());
    let derived = promise.future();
    let driver = Arc::new(Driver {
        slot: Mutex::new(Some(Box::pin(external))),
        promise,
        scheduler: scheduler.clone(),
    });
    let driver_for_first_poll = driver.clone();
    crate::scheduler::run_or_fall_back(
        &scheduler,
        Box::new(move || driver_for_first_poll.poll_once()),
    );
    derived
}

struct Driver<Fut, T> {
    slot: Mutex<Option<Pin<Box<Fut>>>>,
    promise: Promise<T>,
    scheduler: Arc<dyn Scheduler>,
}

impl<Fut, T> Driver<Fut, T>
where
    Fut: std::future::Future<Output = Result<T, Cause>> + Send + 'static,
    T: Send + 'static,
{
    fn poll_once(self: Arc<Self>) {
        let mut guard = self.slot.lock();
        let Some(pinned) = guard.as_mut() else {
            return;
        };
        let waker = self.clone().into_waker();
        let mut cx = Context::from_waker(&waker);
        match pinned.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                *guard = None;
                drop(guard);
                match result {
                    Ok(value) => {
                        self.promise.try_success(value);
                    }
                    Err(cause) => {
                        self.promise.try_failure(cause);
                    }
                }
            }
            Poll::Pending => {}
        }
    }

    fn into_waker(self: Arc<Self>) -> Waker {
        let notify: Arc<Notify> = Arc::new(Notify(Box::new(move || {
            let this = self.clone();
            let scheduler = this.scheduler.clone();
            crate::scheduler::run_or_fall_back(&scheduler, Box::new(move || this.poll_once()));
        })));
        make_waker(notify)
    }
}

/// A concrete (sized) wrapper around the wake callback, so its `Arc` pointer
/// is thin and can round-trip through [`RawWaker`]'s `*const ()` data slot.
struct Notify(Box<dyn Fn() + Send + Sync>);

fn make_waker(notify: Arc<Notify>) -> Waker {
    let ptr = Arc::into_raw(notify) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(ptr, &VTABLE)) }
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

unsafe fn clone_raw(ptr: *const ()) -> RawWaker {
    let arc = Arc::from_raw(ptr as *const Notify);
    let cloned = arc.clone();
    std::mem::forget(arc);
    RawWaker::new(Arc::into_raw(cloned) as *const (), &VTABLE)
}

unsafe fn wake_raw(ptr: *const ()) {
    let arc = Arc::from_raw(ptr as *const Notify);
    (arc.0)();
}

unsafe fn wake_by_ref_raw(ptr: *const ()) {
    let arc = Arc::from_raw(ptr as *const Notify);
    (arc.0)();
    std::mem::forget(arc);
}

unsafe fn drop_raw(ptr: *const ()) {
    drop(Arc::from_raw(ptr as *const Notify));
}

/// A `std::future::Future` view of one of ours. See the module doc for why
/// dropping this does not cancel the source.
pub struct Completable<T> {
    source: Future<T>,
    waker_slot: Arc<Mutex<Option<Waker>>>,
    registered: Arc<std::sync::atomic::AtomicBool>,
}

impl<T: Send + 'static + Clone> std::future::Future for Completable<T> {
    type Output = Result<T, Cause>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.source.is_done() {
            return Poll::Ready(match self.source.cause_arc() {
                Some(cause) => Err(cause),
                None => Ok(self
                    .source
                    .get_now()
                    .expect("a terminal non-failure future always has a success value")),
            });
        }
        *self.waker_slot.lock() = Some(cx.waker().clone());
        if !self
            .registered
            .swap(true, std::sync::atomic::Ordering::SeqCst)
        {
            let waker_slot = self.waker_slot.clone();
            self.source.on_completed(move |_fut| {
                if let Some(waker) = waker_slot.lock().take() {
                    waker.wake();
                }
            });
        }
        Poll::Pending
    }
}

impl<T: Send + 'static> Future<T> {
    /// `completable()`: a `std::future::Future` view of this future.
    pub fn completable(&self) -> Completable<T> {
        Completable {
            source: self.clone(),
            waker_slot: Arc::new(Mutex::new(None)),
            registered: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }
}
