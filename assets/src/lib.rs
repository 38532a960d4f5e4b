//! # CoroTasks Assets
//!
//! Deferred asset references resolved through awaitable futures.
//!
//! A [`SoftRef`] names an asset that may not be loaded yet. An
//! [`AssetLoader`] asks a [`StreamingService`] for it and returns a
//! [`CoroFuture`](corotasks_core::CoroFuture) the service's completion
//! callback resolves. [`MemoryStreamer`] is an in-memory service for tests
//! and tools.

mod error;
mod load;
mod memory;
mod path;
mod priority;
mod reference;
mod streaming;

pub use error::AssetError;
pub use load::AssetLoader;
pub use memory::MemoryStreamer;
pub use path::AssetPath;
pub use priority::LoadPriority;
pub use reference::{AssetHandle, SoftRef};
pub use streaming::{LoadRequestId, LoadedCallback, LoadedObject, StreamingService};
