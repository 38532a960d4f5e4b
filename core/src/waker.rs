use std::sync::{Arc, Weak};
use std::task::{RawWaker, RawWakerVTable, Wake, Waker};

use crate::trampoline;

/// Something that can be re-entered when a value it waits for arrives.
///
/// Implemented by task cells. Resumption happens inline on the waking
/// thread, bounded by the trampoline.
pub(crate) trait Resume: Send + Sync {
    fn resume(&self);
}

/// Waker that resumes its target inline instead of scheduling it.
///
/// Holds only a weak reference: a task whose owner has dropped it is never
/// resumed again.
struct ResumeWaker {
    target: Weak<dyn Resume>,
}

impl Wake for ResumeWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        match self.target.upgrade() {
            Some(target) => trampoline::resume(target),
            None => log::trace!("wake ignored: task was destroyed"),
        }
    }
}

/// Creates a waker that resumes `target` inline.
pub(crate) fn resume_waker(target: Weak<dyn Resume>) -> Waker {
    Waker::from(Arc::new(ResumeWaker { target }))
}

/// Creates a no-op waker for manual polling.
///
/// Useful when a host drives futures by hand, one poll per frame, and
/// learns about progress by polling rather than by wake-ups.
pub fn noop_waker() -> Waker {
    fn noop(_: *const ()) {}
    fn clone(p: *const ()) -> RawWaker {
        RawWaker::new(p, &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    impl Resume for Counter {
        fn resume(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn resume_waker_reaches_live_target() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let weak: Weak<dyn Resume> = Arc::downgrade(&counter) as Weak<dyn Resume>;
        let waker = resume_waker(weak);

        waker.wake_by_ref();
        waker.wake();

        assert_eq!(counter.0.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn resume_waker_ignores_dropped_target() {
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let weak: Weak<dyn Resume> = Arc::downgrade(&counter) as Weak<dyn Resume>;
        let waker = resume_waker(weak);
        drop(counter);

        // Must not panic or resurrect anything.
        waker.wake();
    }

    #[test]
    fn noop_waker_clones() {
        let waker = noop_waker();
        let clone = waker.clone();
        clone.wake();
        waker.wake_by_ref();
    }
}
