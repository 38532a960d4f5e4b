//! # CoroTasks Core
//!
//! Single-shot coroutine tasks and externally resolved futures for hosts
//! that only expose callbacks and per-frame polling.
//!
//! - [`Task`] wraps an `async` body. It starts suspended, runs on
//!   [`launch`](Task::launch) or when awaited, and hands its result (or error)
//!   to its single awaiter.
//! - [`CoroFuture`] is a one-shot cell a callback or poll resolves with
//!   [`set_result`](CoroFuture::set_result).
//! - Resolution resumes the awaiting task inline, on the producer's call
//!   stack. There is no executor and no queue to pump.
//!
//! ```
//! use corotasks_core::{AsyncResult, CoroFuture, Task};
//!
//! let loaded = CoroFuture::<&'static str>::new();
//! let callback = loaded.clone();
//!
//! let mut task = Task::new(async move {
//!     let name = loaded.await?;
//!     Ok(name.len())
//! });
//! task.launch();
//!
//! // Later, from a completion callback:
//! callback.set_result("ferrari");
//! assert_eq!(task.take_result().and_then(AsyncResult::ok), Some(7));
//! ```

mod awaitable;
mod config;
pub mod contract;
mod error;
mod future;
mod promise;
mod task;
mod ticker;
mod trampoline;
mod waker;

pub use awaitable::{Awaitable, AwaitableFuture, awaitable, poll_awaitable};
pub use config::{CoroConfig, DEFAULT_MAX_INLINE_DEPTH, UnhandledErrorPolicy};
pub use contract::ContractViolation;
pub use error::{AsyncError, AsyncResult, report_unhandled};
pub use future::CoroFuture;
pub use task::{Task, TaskAwait, TaskId};
pub use ticker::{TickDelegate, TickSource, Ticker, TickerHandle};
pub use waker::noop_waker;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs the configuration found in the environment.
///
/// See [`CoroConfig::from_env`].
pub fn init() {
    CoroConfig::from_env().install();
    log::info!("CoroTasks Core v{} initialized", VERSION);
}
