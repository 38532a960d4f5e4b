use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::path::AssetPath;
use crate::priority::LoadPriority;

/// A loaded object, type-erased.
pub type LoadedObject = Arc<dyn Any + Send + Sync>;

/// Completion callback for one batched load request.
pub type LoadedCallback = Box<dyn FnOnce() + Send>;

/// Identifies a load request issued to a [`StreamingService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadRequestId(pub u64);

impl fmt::Display for LoadRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "load#{}", self.0)
    }
}

/// The host's asynchronous asset streaming subsystem.
///
/// Only the callback contract matters to coroutines: every request delivers
/// `on_loaded` exactly once, after which [`resolve`](Self::resolve) returns
/// the loaded objects (or `None` for paths that could not be loaded).
/// `on_loaded` is never invoked from inside `request_async_load`, and never
/// with a service lock held.
pub trait StreamingService: Send + Sync {
    /// Queues a batched load of `paths`, calling `on_loaded` once all of them
    /// are resolved.
    fn request_async_load(
        &self,
        paths: Vec<AssetPath>,
        priority: LoadPriority,
        on_loaded: LoadedCallback,
    ) -> LoadRequestId;

    /// Returns the object loaded for `path`, if any.
    fn resolve(&self, path: &AssetPath) -> Option<LoadedObject>;
}
