//! # CoroTasks Runtime
//!
//! Host-facing pieces of CoroTasks: the tick-driven
//! [`PendingActionRegistry`] that resolves futures from per-frame polls,
//! the [`PlayAndWait`] event action, and the [`AsyncTestRunner`] bridge for
//! frame-polled test harnesses.

mod clock;
mod play_and_wait;
mod registry;
pub mod testing;

pub use clock::FrameClock;
pub use play_and_wait::{PlayAndWait, PlayOutcome};
pub use registry::{ActionId, PendingActionRegistry};
pub use testing::{AsyncTestRunner, TestReport};
