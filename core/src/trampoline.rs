//! Bounded inline resumption.
//!
//! Completing a task resumes its awaiter on the same call stack, which may
//! complete that awaiter and resume its own awaiter, and so on. Long await
//! chains would recurse without bound. The trampoline counts nested
//! resumptions per thread; beyond `max_inline_depth` further resumptions are
//! queued and drained by the outermost resumption before it returns.
//! Callers still observe completion before their outermost producer call
//! returns.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config;
use crate::waker::Resume;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    static DEFERRED: RefCell<VecDeque<Arc<dyn Resume>>> = const { RefCell::new(VecDeque::new()) };
}

/// Restores the depth counter on scope exit, including unwinding.
struct DepthGuard {
    previous: usize,
}

impl DepthGuard {
    fn enter(previous: usize) -> Self {
        DEPTH.set(previous + 1);
        Self { previous }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.set(self.previous);
    }
}

/// Resumes `target` inline, or queues it when the stack is already deep.
pub(crate) fn resume(target: Arc<dyn Resume>) {
    let depth = DEPTH.get();
    if depth >= config::max_inline_depth() {
        log::trace!("inline resume depth {depth} reached, deferring");
        DEFERRED.with_borrow_mut(|queue| queue.push_back(target));
        return;
    }

    {
        let _guard = DepthGuard::enter(depth);
        target.resume();
    }

    if depth == 0 {
        drain();
    }
}

fn drain() {
    while let Some(next) = DEFERRED.with_borrow_mut(|queue| queue.pop_front()) {
        let _guard = DepthGuard::enter(0);
        next.resume();
    }
}

/// Current nesting of inline resumptions on this thread.
#[cfg(test)]
pub(crate) fn depth() -> usize {
    DEPTH.get()
}
