use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Waker;

use parking_lot::Mutex;

use crate::awaitable::{Awaitable, AwaitableFuture, awaitable};
use crate::contract::{self, ContractViolation};
use crate::error::{AsyncError, AsyncResult};
use crate::promise::Outcome;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

type ResumePredicate = Box<dyn FnMut() -> bool + Send>;

struct FutureState<R> {
    outcome: Outcome<R>,
    /// Handle id of the awaiting clone, with its waker.
    continuation: Option<(u64, Waker)>,
    resumed: bool,
    was_suspended: bool,
    predicate: Option<ResumePredicate>,
}

/// A one-shot value cell resolved by a non-coroutine producer.
///
/// The producer keeps one clone and calls [`set_result`](Self::set_result)
/// or [`set_exception`](Self::set_exception) exactly once, typically from a
/// completion callback or a per-frame poll. The consumer awaits another
/// clone. Resolution resumes the awaiting task inline, before the producer's
/// call returns.
///
/// Resolving twice is tolerated: the first resolution wins and later ones
/// return `false`.
///
/// # Example
///
/// ```
/// use corotasks_core::{CoroFuture, Task};
///
/// let price = CoroFuture::<u32>::new();
/// let producer = price.clone();
///
/// let mut task = Task::new(async move { price.await });
/// task.launch();
/// assert!(!task.is_completed());
///
/// assert!(producer.set_result(250_000));
/// assert!(task.is_completed());
/// assert!(!producer.set_result(1));
/// ```
pub struct CoroFuture<R> {
    shared: Arc<Mutex<FutureState<R>>>,
    handle: u64,
}

impl<R> CoroFuture<R> {
    /// Creates an unresolved future.
    pub fn new() -> Self {
        Self::with_outcome(Outcome::Pending)
    }

    /// Creates a future that already holds `value`.
    pub fn resolved(value: R) -> Self {
        Self::with_outcome(Outcome::Ready(Ok(value)))
    }

    /// Creates a future that already holds `error`.
    pub fn failed(error: AsyncError) -> Self {
        Self::with_outcome(Outcome::Ready(Err(error)))
    }

    fn with_outcome(outcome: Outcome<R>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(FutureState {
                outcome,
                continuation: None,
                resumed: false,
                was_suspended: false,
                predicate: None,
            })),
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Whether a result or error has been set.
    pub fn is_ready(&self) -> bool {
        !self.shared.lock().outcome.is_pending()
    }

    /// Whether an awaiter ever had to suspend on this future.
    pub fn was_suspended(&self) -> bool {
        self.shared.lock().was_suspended
    }

    /// Whether the awaiting continuation has been resumed.
    pub fn is_resumed(&self) -> bool {
        self.shared.lock().resumed
    }

    /// Resolves the future with `value`.
    ///
    /// Returns `false` and leaves the stored result untouched if the future
    /// was already resolved.
    pub fn set_result(&self, value: R) -> bool {
        self.resolve(Ok(value))
    }

    /// Resolves the future with `error`, which the awaiter receives.
    pub fn set_exception(&self, error: AsyncError) -> bool {
        self.resolve(Err(error))
    }

    /// Resolves the future with a ready-made result.
    pub fn resolve(&self, result: AsyncResult<R>) -> bool {
        let continuation = {
            let mut state = self.shared.lock();
            if !state.outcome.is_pending() {
                drop(state);
                contract::tolerated(ContractViolation::AlreadyResolved);
                return false;
            }
            state.outcome = Outcome::Ready(result);
            let continuation = state.continuation.take();
            if continuation.is_some() {
                state.resumed = true;
            }
            continuation.map(|(_, waker)| waker)
        };

        if let Some(waker) = continuation {
            waker.wake();
        }
        true
    }

    /// Installs a predicate polling producers consult through
    /// [`should_resume`](Self::should_resume).
    pub fn set_resume_predicate<F>(&self, predicate: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.shared.lock().predicate = Some(Box::new(predicate));
    }

    /// Whether the awaiter can be resumed now.
    ///
    /// True once resolved. Otherwise evaluates the resume predicate, if one
    /// was installed. The predicate runs without any lock held.
    pub fn should_resume(&self) -> bool {
        let mut predicate = {
            let mut state = self.shared.lock();
            if !state.outcome.is_pending() {
                return true;
            }
            match state.predicate.take() {
                Some(predicate) => predicate,
                None => return false,
            }
        };

        let ready = predicate();

        let mut state = self.shared.lock();
        if state.predicate.is_none() {
            state.predicate = Some(predicate);
        }
        ready
    }

    fn take_outcome(&self) -> AsyncResult<R> {
        let mut state = self.shared.lock();
        self.release(&mut state);
        state.resumed = true;
        match state.outcome.take() {
            Ok(result) => result,
            Err(violation) => {
                drop(state);
                contract::fatal(violation)
            }
        }
    }

    /// Drops the continuation if this handle registered it.
    fn release(&self, state: &mut FutureState<R>) {
        if matches!(&state.continuation, Some((handle, _)) if *handle == self.handle) {
            state.continuation = None;
        }
    }
}

impl<R> Default for CoroFuture<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for CoroFuture<R> {
    /// Returns a new handle to the same cell, with its own awaiter identity.
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl<R> Drop for CoroFuture<R> {
    fn drop(&mut self) {
        self.release(&mut self.shared.lock());
    }
}

impl<R> fmt::Debug for CoroFuture<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("CoroFuture")
            .field("handle", &self.handle)
            .field("ready", &!state.outcome.is_pending())
            .field("resumed", &state.resumed)
            .finish()
    }
}

impl<R> Awaitable for CoroFuture<R> {
    type Output = AsyncResult<R>;

    /// Ready while an unconsumed result is stored.
    fn is_ready(&self) -> bool {
        self.shared.lock().outcome.is_ready()
    }

    /// Awaiting a result another awaiter already consumed is a violation;
    /// the awaiter is left suspended.
    fn suspend(&self, waker: &Waker) {
        let mut state = self.shared.lock();
        if state.outcome.is_taken() {
            drop(state);
            contract::violated(ContractViolation::ResultTaken);
            return;
        }
        state.was_suspended = true;
        match &mut state.continuation {
            Some((handle, existing)) if *handle == self.handle => {
                if !existing.will_wake(waker) {
                    *existing = waker.clone();
                }
                return;
            }
            Some(_) => {}
            slot => {
                *slot = Some((self.handle, waker.clone()));
                return;
            }
        }
        drop(state);
        contract::violated(ContractViolation::ContinuationAttached);
    }

    /// # Panics
    ///
    /// When no unconsumed result is stored.
    fn resume(&self) -> AsyncResult<R> {
        self.take_outcome()
    }

    fn abandon(&self) {
        self.release(&mut self.shared.lock());
    }
}

impl<R> IntoFuture for CoroFuture<R> {
    type Output = AsyncResult<R>;
    type IntoFuture = AwaitableFuture<CoroFuture<R>>;

    fn into_future(self) -> Self::IntoFuture {
        awaitable(self)
    }
}
