//! The generic await protocol.
//!
//! Anything that can report readiness, remember one waker and produce a
//! value on resumption can be awaited from a task body, without writing a
//! `std::future::Future` impl by hand. Implement [`Awaitable`] and wrap the
//! value with [`awaitable`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use crate::error::{AsyncError, AsyncResult};

/// A value a coroutine can suspend on.
pub trait Awaitable {
    type Output;

    /// Whether [`resume`](Self::resume) can produce the output right now.
    fn is_ready(&self) -> bool;

    /// Registers `waker` to be woken once the awaitable becomes ready.
    fn suspend(&self, waker: &Waker);

    /// Produces the output. Called once, after `is_ready` returned true.
    fn resume(&self) -> Self::Output;

    /// Forgets the waker registered by [`suspend`](Self::suspend).
    ///
    /// Called when the awaiter is dropped, resumed or not. Another awaiter
    /// may attach afterwards.
    fn abandon(&self) {}
}

impl<A: Awaitable + ?Sized> Awaitable for &A {
    type Output = A::Output;

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn suspend(&self, waker: &Waker) {
        (**self).suspend(waker)
    }

    fn resume(&self) -> A::Output {
        (**self).resume()
    }

    fn abandon(&self) {
        (**self).abandon()
    }
}

impl<A: Awaitable + ?Sized> Awaitable for Arc<A> {
    type Output = A::Output;

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn suspend(&self, waker: &Waker) {
        (**self).suspend(waker)
    }

    fn resume(&self) -> A::Output {
        (**self).resume()
    }

    fn abandon(&self) {
        (**self).abandon()
    }
}

/// A weak handle resumes with [`AsyncError::Destroyed`] once its target is
/// gone.
impl<T, A> Awaitable for Weak<A>
where
    A: Awaitable<Output = AsyncResult<T>> + ?Sized,
{
    type Output = AsyncResult<T>;

    fn is_ready(&self) -> bool {
        self.upgrade().is_none_or(|target| target.is_ready())
    }

    fn suspend(&self, waker: &Waker) {
        if let Some(target) = self.upgrade() {
            target.suspend(waker);
        }
    }

    fn resume(&self) -> AsyncResult<T> {
        match self.upgrade() {
            Some(target) => target.resume(),
            None => Err(AsyncError::Destroyed),
        }
    }

    fn abandon(&self) {
        if let Some(target) = self.upgrade() {
            target.abandon();
        }
    }
}

/// Adapts an [`Awaitable`] into a `std::future::Future`.
///
/// Dropping it abandons the target, so a task destroyed while suspended
/// leaves no waker behind.
#[must_use = "futures do nothing unless awaited"]
pub struct AwaitableFuture<A: Awaitable> {
    target: A,
}

impl<A: Awaitable> Future for AwaitableFuture<A> {
    type Output = A::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<A::Output> {
        poll_awaitable(&self.into_ref().get_ref().target, cx)
    }
}

impl<A: Awaitable> Drop for AwaitableFuture<A> {
    fn drop(&mut self) {
        self.target.abandon();
    }
}

/// Wraps `target` so it can be `.await`ed.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use corotasks_core::{CoroFuture, Task, awaitable};
///
/// let shared = Arc::new(CoroFuture::resolved("ready"));
/// let mut task = Task::new(async move { awaitable(shared).await });
/// task.launch();
/// assert!(task.is_completed());
/// ```
pub fn awaitable<A: Awaitable>(target: A) -> AwaitableFuture<A> {
    AwaitableFuture { target }
}

/// One step of the await protocol: resume if ready, otherwise suspend.
///
/// Readiness is checked again after suspending, in case the target became
/// ready while the waker was being registered.
pub fn poll_awaitable<A: Awaitable + ?Sized>(target: &A, cx: &mut Context<'_>) -> Poll<A::Output> {
    if target.is_ready() {
        return Poll::Ready(target.resume());
    }
    target.suspend(cx.waker());
    if target.is_ready() {
        return Poll::Ready(target.resume());
    }
    Poll::Pending
}
