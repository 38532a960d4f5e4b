use std::task::Waker;

use crate::contract::ContractViolation;
use crate::error::{AsyncError, AsyncResult};

/// Result slot shared by tasks and futures.
#[derive(Debug)]
pub(crate) enum Outcome<R> {
    /// Nothing produced yet.
    Pending,
    /// Value or error waiting to be consumed.
    Ready(AsyncResult<R>),
    /// Consumed by an awaiter or `take_result`.
    Taken,
}

impl<R> Outcome<R> {
    pub(crate) fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub(crate) fn is_taken(&self) -> bool {
        matches!(self, Self::Taken)
    }

    /// Moves the result out, leaving [`Outcome::Taken`] behind.
    pub(crate) fn take(&mut self) -> Result<AsyncResult<R>, ContractViolation> {
        match std::mem::replace(self, Self::Taken) {
            Self::Ready(result) => Ok(result),
            Self::Pending => {
                *self = Self::Pending;
                Err(ContractViolation::NotCompleted)
            }
            Self::Taken => Err(ContractViolation::ResultTaken),
        }
    }

    /// Removes a stored error nobody looked at.
    pub(crate) fn take_unobserved_error(&mut self) -> Option<AsyncError> {
        if matches!(self, Self::Ready(Err(_))) {
            if let Self::Ready(Err(error)) = std::mem::replace(self, Self::Taken) {
                return Some(error);
            }
        }
        None
    }
}

/// Per-task completion state.
///
/// Captures the value or error returned by the task body and holds the
/// waker of the single awaiter. Completing the promise hands that waker back
/// to the caller, which wakes it after releasing its locks.
pub(crate) struct Promise<R> {
    outcome: Outcome<R>,
    continuation: Option<Waker>,
}

impl<R> Promise<R> {
    pub(crate) fn new() -> Self {
        Self {
            outcome: Outcome::Pending,
            continuation: None,
        }
    }

    pub(crate) fn is_completed(&self) -> bool {
        !self.outcome.is_pending()
    }

    /// Stores the final result and returns the continuation to resume.
    ///
    /// Only the first call stores anything.
    pub(crate) fn complete(&mut self, result: AsyncResult<R>) -> Option<Waker> {
        if !self.outcome.is_pending() {
            return None;
        }
        self.outcome = Outcome::Ready(result);
        self.continuation.take()
    }

    /// Registers the awaiter, replacing a stale waker from the same awaiter.
    pub(crate) fn attach(&mut self, waker: &Waker) {
        match &mut self.continuation {
            Some(existing) if existing.will_wake(waker) => {}
            slot => *slot = Some(waker.clone()),
        }
    }

    pub(crate) fn detach(&mut self) {
        self.continuation = None;
    }

    #[cfg(test)]
    pub(crate) fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    pub(crate) fn take(&mut self) -> Result<AsyncResult<R>, ContractViolation> {
        self.outcome.take()
    }

    pub(crate) fn take_unobserved_error(&mut self) -> Option<AsyncError> {
        self.outcome.take_unobserved_error()
    }
}
