use std::io;
use std::ptr::NonNull;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clownfish_sys::{cfish_dec_refcount, CfObj, NativeKind};
use crossbeam_queue::SegQueue;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::handle::Handle;

/// Process-wide queue behind [`Handle::release_later`] and [`collect`].
pub(crate) static RELEASE_QUEUE: Lazy<ReleaseQueue> = Lazy::new(ReleaseQueue::new);

struct Pending(NonNull<CfObj>);

// SAFETY: refcount operations on native objects are atomic, so a credit may
// be given back from any thread.
unsafe impl Send for Pending {}

/// Credits waiting to be given back, pushed from any thread and drained in
/// batches.
#[derive(Default)]
pub struct ReleaseQueue {
    pending: SegQueue<Pending>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        ReleaseQueue { pending: SegQueue::new() }
    }

    /// Queues `handle`'s credit. Already-released handles are ignored.
    pub fn defer<T: NativeKind>(&self, handle: Handle<T>) {
        if let Some(ptr) = NonNull::new(handle.into_raw().cast::<CfObj>()) {
            self.pending.push(Pending(ptr));
        }
    }

    /// Gives back every queued credit. Returns how many were released.
    pub fn drain(&self) -> usize {
        let mut released = 0;
        while let Some(Pending(ptr)) = self.pending.pop() {
            // SAFETY: each entry owns exactly one credit.
            unsafe {
                cfish_dec_refcount(ptr.as_ptr());
            }
            released += 1;
        }
        if released > 0 {
            log::trace!("Drained {} deferred releases", released);
        }
        released
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for ReleaseQueue {
    fn drop(&mut self) {
        self.drain();
    }
}

impl std::fmt::Debug for ReleaseQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseQueue").field("pending", &self.len()).finish()
    }
}

impl<T: NativeKind> Handle<T> {
    /// Moves the credit to the process-wide release queue instead of giving
    /// it back on this thread.
    pub fn release_later(self) {
        RELEASE_QUEUE.defer(self);
    }
}

/// Gives back every credit deferred with [`Handle::release_later`].
pub fn collect() -> usize {
    RELEASE_QUEUE.drain()
}

#[derive(Debug, Default)]
struct Shared {
    stopping: Mutex<bool>,
    wake: Condvar,
}

/// Background thread draining a [`ReleaseQueue`] on a fixed period.
#[derive(Debug)]
pub struct Finalizer {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Finalizer {
    pub fn spawn(queue: &'static ReleaseQueue, interval: Duration) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let thread = thread::Builder::new().name("clownfish-finalizer".into()).spawn({
            let shared = shared.clone();
            move || run(queue, &shared, interval)
        })?;
        log::debug!("Finalizer thread started (interval {:?})", interval);
        Ok(Finalizer {
            shared,
            thread: Some(thread),
        })
    }

    /// Asks for a drain now rather than at the next tick.
    pub fn wake(&self) {
        self.shared.wake.notify_one();
    }

    /// Stops the thread after a last drain and waits for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        *self.shared.stopping.lock() = true;
        self.shared.wake.notify_one();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Finalizer thread panicked");
            }
        }
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(queue: &ReleaseQueue, shared: &Shared, interval: Duration) {
    let mut stopping = shared.stopping.lock();
    while !*stopping {
        shared.wake.wait_for(&mut stopping, interval);
        MutexGuard::unlocked(&mut stopping, || {
            queue.drain();
        });
    }
    drop(stopping);
    queue.drain();
    log::debug!("Finalizer thread stopped");
}

#[cfg(test)]
mod tests {
    use clownfish_sys::CfString;

    use super::*;

    #[test]
    fn deferred_credit_waits_for_drain() {
        let queue = ReleaseQueue::new();
        let kept = Handle::<CfString>::from("deferred");
        queue.defer(kept.clone());
        assert_eq!(kept.refcount(), 2);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain(), 1);
        assert_eq!(kept.refcount(), 1);
        assert_eq!(queue.drain(), 0);
    }

    #[test]
    fn released_handles_are_skipped() {
        let queue = ReleaseQueue::new();
        let mut handle = Handle::<CfString>::from("gone");
        handle.release();
        queue.defer(handle);
        assert!(queue.is_empty());
    }

    #[test]
    fn finalizer_drains_in_the_background() {
        static QUEUE: Lazy<ReleaseQueue> = Lazy::new(ReleaseQueue::new);
        let kept = Handle::<CfString>::from("background");
        let finalizer = Finalizer::spawn(&QUEUE, Duration::from_millis(5)).unwrap();
        QUEUE.defer(kept.clone());
        finalizer.wake();
        finalizer.shutdown();
        assert!(QUEUE.is_empty());
        assert_eq!(kept.refcount(), 1);
    }
}
