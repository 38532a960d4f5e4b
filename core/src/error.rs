use std::sync::Arc;

use thiserror::Error;

use crate::config::{self, UnhandledErrorPolicy};

/// Result type produced by task bodies and externally resolved futures.
pub type AsyncResult<T> = Result<T, AsyncError>;

/// Domain error raised inside a coroutine body.
///
/// Errors are not propagated at the point where they are raised. A task
/// stores the error at its boundary and hands it to whoever awaits the task
/// next, so an error deep in an await chain surfaces at the nearest ancestor
/// that inspects the awaited result.
///
/// # Example
///
/// ```
/// use corotasks_core::{AsyncError, AsyncResult, Task};
///
/// async fn price_of(car: &str) -> AsyncResult<u32> {
///     match car {
///         "ferrari" => Ok(250_000),
///         other => Err(AsyncError::new(format!("unknown car: {other}"))),
///     }
/// }
///
/// let task = Task::new(async { price_of("lada").await });
/// # drop(task);
/// ```
#[derive(Debug, Clone, Error)]
pub enum AsyncError {
    /// Generic failure with a human-readable message.
    #[error("{0}")]
    Message(String),
    /// Designated failure kind for coroutine-driven tests.
    ///
    /// The test bridge catches this kind and turns it into a failure report
    /// instead of treating it as unhandled.
    #[error("test failure: {0}")]
    TestFailure(String),
    /// The awaited object was destroyed before it could produce a value.
    #[error("awaited object was destroyed")]
    Destroyed,
    /// Any other error type raised by application code.
    #[error("{0}")]
    Other(Arc<dyn std::error::Error + Send + Sync>),
}

impl AsyncError {
    /// Creates a [`AsyncError::Message`] error.
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Creates a [`AsyncError::TestFailure`] error.
    pub fn test_failure(message: impl Into<String>) -> Self {
        Self::TestFailure(message.into())
    }

    /// Wraps an arbitrary error type.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Arc::new(error))
    }

    /// Returns whether this error is the designated test-failure kind.
    pub fn is_test_failure(&self) -> bool {
        matches!(self, Self::TestFailure(_))
    }

    /// Returns a reference to the wrapped error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Other(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Reports a domain error that reached the outermost launch point.
///
/// Logs the error, then panics under [`UnhandledErrorPolicy::Panic`]. Never
/// panics while the thread is already unwinding.
pub fn report_unhandled(origin: &str, error: &AsyncError) {
    log::error!("unhandled error in {origin}: {error}");
    if config::unhandled_errors() == UnhandledErrorPolicy::Panic && !std::thread::panicking() {
        panic!("unhandled error in {origin}: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("car sell error: {0}")]
    struct CarSellError(u32);

    #[test]
    fn message_display() {
        let err = AsyncError::new("Car asset is null!");
        assert_eq!(err.to_string(), "Car asset is null!");
    }

    #[test]
    fn test_failure_kind() {
        let err = AsyncError::test_failure("Can't find asset");
        assert!(err.is_test_failure());
        assert_eq!(err.to_string(), "test failure: Can't find asset");
        assert!(!AsyncError::Destroyed.is_test_failure());
    }

    #[test]
    fn other_downcasts_to_source_error() {
        let err = AsyncError::other(CarSellError(7));
        assert_eq!(err.downcast_ref::<CarSellError>(), Some(&CarSellError(7)));
        assert_eq!(err.to_string(), "car sell error: 7");
    }

    #[test]
    #[should_panic(expected = "unhandled error in sell_car: Car asset is null!")]
    fn unhandled_error_panics_by_default() {
        report_unhandled("sell_car", &AsyncError::new("Car asset is null!"));
    }

    #[test]
    fn downcast_on_message_is_none() {
        let err = AsyncError::new("plain");
        assert!(err.downcast_ref::<CarSellError>().is_none());
    }
}
