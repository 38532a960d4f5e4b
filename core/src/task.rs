use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::contract::{self, ContractViolation};
use crate::error::{AsyncResult, report_unhandled};
use crate::promise::Promise;
use crate::trampoline;
use crate::waker::{Resume, resume_waker};

type Frame<R> = Pin<Box<dyn Future<Output = AsyncResult<R>> + Send>>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identifier, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Shared state behind a [`Task`] handle.
///
/// The owning handle keeps the only long-lived strong reference. Wakers
/// point back here weakly, so dropping the handle destroys the frame.
struct TaskCell<R> {
    id: TaskId,
    frame: Mutex<Option<Frame<R>>>,
    promise: Mutex<Promise<R>>,
    waker: Waker,
    launched: AtomicBool,
    /// Set by a wake that arrived while the frame was being polled.
    notified: AtomicBool,
    detached: AtomicBool,
    /// Self-reference held by detached tasks until they complete.
    keep_alive: Mutex<Option<Arc<TaskCell<R>>>>,
}

impl<R: Send + 'static> TaskCell<R> {
    fn new(frame: Frame<R>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let target: Weak<dyn Resume> = weak.clone();
            Self {
                id: TaskId::next(),
                frame: Mutex::new(Some(frame)),
                promise: Mutex::new(Promise::new()),
                waker: resume_waker(target),
                launched: AtomicBool::new(false),
                notified: AtomicBool::new(false),
                detached: AtomicBool::new(false),
                keep_alive: Mutex::new(None),
            }
        })
    }

    /// Launches the frame unless already launched. Returns whether this
    /// call did the launch.
    fn start(self: &Arc<Self>) -> bool {
        if self.launched.swap(true, Ordering::AcqRel) {
            return false;
        }
        log::trace!("{} launched", self.id);
        trampoline::resume(self.clone());
        true
    }
}

impl<R> TaskCell<R> {
    fn is_completed(&self) -> bool {
        self.promise.lock().is_completed()
    }

    fn complete(&self, result: AsyncResult<R>) {
        let continuation = self.promise.lock().complete(result);
        match continuation {
            Some(waker) => {
                log::trace!("{} completed, resuming awaiter", self.id);
                waker.wake();
            }
            None if self.detached.load(Ordering::Acquire) => {
                let error = self.promise.lock().take_unobserved_error();
                if let Some(error) = error {
                    report_unhandled(&self.id.to_string(), &error);
                }
            }
            None => log::trace!("{} completed", self.id),
        }

        let keep_alive = self.keep_alive.lock().take();
        drop(keep_alive);
    }
}

impl<R: Send + 'static> Resume for TaskCell<R> {
    fn resume(&self) {
        let Some(mut frame) = self.frame.try_lock() else {
            // Polled further up the stack; that poll loop runs again.
            self.notified.store(true, Ordering::Release);
            return;
        };

        let mut cx = Context::from_waker(&self.waker);
        loop {
            self.notified.store(false, Ordering::Release);
            let poll = match frame.as_mut() {
                Some(body) => body.as_mut().poll(&mut cx),
                None => return,
            };
            match poll {
                Poll::Ready(result) => {
                    let finished = frame.take();
                    drop(frame);
                    drop(finished);
                    self.complete(result);
                    return;
                }
                Poll::Pending => {
                    if !self.notified.swap(false, Ordering::AcqRel) {
                        return;
                    }
                }
            }
        }
    }
}

/// An owned, single-shot coroutine computation.
///
/// Created suspended: the body does not run until the task is launched or
/// awaited. Awaiting consumes the task, so it can have only one awaiter.
/// When the body returns, the awaiter is resumed inline on the same call
/// stack. An error returned by the body is stored and handed to the awaiter.
///
/// Dropping a task that is still suspended destroys its frame; it is never
/// resumed afterwards.
///
/// # Example
///
/// ```
/// use corotasks_core::{AsyncResult, Task};
///
/// fn helper() -> Task<i32> {
///     Task::new(async { Ok(123) })
/// }
///
/// let mut caller = Task::new(async {
///     let value = helper().await?;
///     assert_eq!(value, 123);
///     Ok(value)
/// });
///
/// assert!(caller.launch());
/// assert_eq!(caller.take_result().and_then(AsyncResult::ok), Some(123));
/// ```
pub struct Task<R> {
    cell: Arc<TaskCell<R>>,
}

impl<R: Send + 'static> Task<R> {
    /// Wraps `body` without polling it.
    pub fn new<F>(body: F) -> Self
    where
        F: Future<Output = AsyncResult<R>> + Send + 'static,
    {
        let cell = TaskCell::new(Box::pin(body));
        log::trace!("{} created", cell.id);
        Self { cell }
    }

    /// Starts running the body until its first suspension point.
    ///
    /// Returns `false`, reporting a contract violation, when the task was
    /// already launched. The body is never restarted.
    pub fn launch(&mut self) -> bool {
        contract::ensure(self.cell.start(), ContractViolation::AlreadyLaunched)
    }

    /// Launches the task if needed and lets it run to completion without an
    /// owner.
    ///
    /// The frame stays alive until the body returns. An error returned by a
    /// detached task has nobody to go to and is reported as unhandled. A
    /// detached task that never completes is never freed.
    pub fn detach(self) {
        let cell = self.cell.clone();
        cell.detached.store(true, Ordering::Release);

        if cell.is_completed() {
            let error = cell.promise.lock().take_unobserved_error();
            if let Some(error) = error {
                report_unhandled(&cell.id.to_string(), &error);
            }
            return;
        }

        *cell.keep_alive.lock() = Some(cell.clone());
        log::debug!("{} detached", cell.id);
        cell.start();
    }
}

impl<R> Task<R> {
    pub fn id(&self) -> TaskId {
        self.cell.id
    }

    pub fn is_launched(&self) -> bool {
        self.cell.launched.load(Ordering::Acquire)
    }

    pub fn is_completed(&self) -> bool {
        self.cell.is_completed()
    }

    /// Moves the result out of a completed task.
    ///
    /// Returns `None` and reports a contract violation when the task has not
    /// completed yet or its result was already taken.
    pub fn take_result(&mut self) -> Option<AsyncResult<R>> {
        match self.cell.promise.lock().take() {
            Ok(result) => Some(result),
            Err(violation) => {
                contract::violated(violation);
                None
            }
        }
    }
}

impl<R> Drop for Task<R> {
    fn drop(&mut self) {
        if self.cell.detached.load(Ordering::Acquire) {
            return;
        }

        let frame = self.cell.frame.try_lock().and_then(|mut frame| frame.take());
        if frame.is_some() && self.cell.launched.load(Ordering::Acquire) {
            log::debug!("{} destroyed while suspended", self.cell.id);
        }
        drop(frame);

        let error = self.cell.promise.lock().take_unobserved_error();
        if let Some(error) = error {
            report_unhandled(&self.cell.id.to_string(), &error);
        }
    }
}

impl<R> fmt::Debug for Task<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.cell.id)
            .field("launched", &self.is_launched())
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<R: Send + 'static> IntoFuture for Task<R> {
    type Output = AsyncResult<R>;
    type IntoFuture = TaskAwait<R>;

    fn into_future(self) -> TaskAwait<R> {
        TaskAwait { task: self }
    }
}

/// Future returned by awaiting a [`Task`].
///
/// Launches the task on first poll. A task that already holds its result
/// completes the await immediately.
#[must_use = "futures do nothing unless awaited"]
pub struct TaskAwait<R> {
    task: Task<R>,
}

impl<R: Send + 'static> Future for TaskAwait<R> {
    type Output = AsyncResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<AsyncResult<R>> {
        let cell = &self.task.cell;
        if !cell.is_completed() {
            cell.start();
        }

        let mut promise = cell.promise.lock();
        if promise.is_completed() {
            promise.detach();
            return match promise.take() {
                Ok(result) => Poll::Ready(result),
                Err(violation) => {
                    // Polled again after yielding its result.
                    drop(promise);
                    contract::violated(violation);
                    Poll::Pending
                }
            };
        }

        promise.attach(cx.waker());
        Poll::Pending
    }
}
