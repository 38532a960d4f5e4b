use std::any::{Any, type_name};
use std::sync::{Arc, Weak};

use corotasks_core::CoroFuture;

use crate::error::AssetError;
use crate::path::AssetPath;
use crate::priority::LoadPriority;
use crate::reference::{AssetHandle, SoftRef};
use crate::streaming::{LoadedObject, StreamingService};

/// Turns streaming-service callbacks into awaitable futures.
///
/// Each load issues a single batched request. The returned future resolves
/// from the service's completion callback, which resumes the awaiting task
/// inline.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use corotasks_assets::{AssetLoader, MemoryStreamer, SoftRef};
/// use corotasks_core::Task;
///
/// let streamer = Arc::new(MemoryStreamer::new());
/// streamer.insert("cars/ferrari".parse().unwrap(), 250_000u32);
///
/// let loader = AssetLoader::new(streamer.clone());
/// let price = loader.load_single_object(&SoftRef::<u32>::parse("cars/ferrari").unwrap());
///
/// let mut task = Task::new(async move { price.await });
/// task.launch();
/// streamer.pump();
///
/// let price = task.take_result().and_then(Result::ok).flatten();
/// assert_eq!(price.as_deref(), Some(&250_000));
/// ```
#[derive(Clone)]
pub struct AssetLoader {
    service: Arc<dyn StreamingService>,
    priority: LoadPriority,
    context: Option<Weak<dyn Any + Send + Sync>>,
}

impl AssetLoader {
    pub fn new(service: Arc<dyn StreamingService>) -> Self {
        Self {
            service,
            priority: LoadPriority::default(),
            context: None,
        }
    }

    pub fn with_priority(mut self, priority: LoadPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Binds completions to `context`. Once the context is dropped, pending
    /// completions are discarded and their futures never resolve.
    pub fn with_context<C: Any + Send + Sync>(mut self, context: &Arc<C>) -> Self {
        let weak = Arc::downgrade(context);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        self.context = Some(weak);
        self
    }

    pub fn priority(&self) -> LoadPriority {
        self.priority
    }

    /// Loads the object behind `reference`.
    ///
    /// A null reference resolves immediately to `None` without a request. A
    /// path the service could not load also resolves to `None`.
    ///
    /// # Panics
    ///
    /// When the callback runs, if the loaded object is not a `T`.
    pub fn load_single_object<T>(&self, reference: &SoftRef<T>) -> CoroFuture<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let Some(path) = reference.path().cloned() else {
            return CoroFuture::resolved(None);
        };

        let future = CoroFuture::new();
        let producer = future.clone();
        self.request(vec![path.clone()], move |service| {
            let object = service.resolve(&path).map(|object| resolve_as::<T>(&path, object));
            producer.set_result(object);
        });
        future
    }

    /// Loads every reference with one batched request.
    ///
    /// The result has one slot per input, in input order. Null references
    /// and unloadable paths yield `None`.
    ///
    /// # Panics
    ///
    /// When the callback runs, if any loaded object is not a `T`.
    pub fn load_multiple_objects<T>(
        &self,
        references: &[SoftRef<T>],
    ) -> CoroFuture<Vec<Option<Arc<T>>>>
    where
        T: Any + Send + Sync,
    {
        let slots: Vec<Option<AssetPath>> =
            references.iter().map(|r| r.path().cloned()).collect();
        let paths: Vec<AssetPath> = slots.iter().flatten().cloned().collect();

        if paths.is_empty() {
            return CoroFuture::resolved(slots.iter().map(|_| None).collect());
        }

        let future = CoroFuture::new();
        let producer = future.clone();
        self.request(paths, move |service| {
            let objects = slots
                .iter()
                .map(|slot| {
                    let path = slot.as_ref()?;
                    service.resolve(path).map(|object| resolve_as::<T>(path, object))
                })
                .collect();
            producer.set_result(objects);
        });
        future
    }

    /// Like [`load_single_object`](Self::load_single_object), but keeps the
    /// path alongside the object.
    pub fn load_typed_handle<T>(&self, reference: &SoftRef<T>) -> CoroFuture<Option<AssetHandle<T>>>
    where
        T: Any + Send + Sync,
    {
        let Some(path) = reference.path().cloned() else {
            return CoroFuture::resolved(None);
        };

        let future = CoroFuture::new();
        let producer = future.clone();
        self.request(vec![path.clone()], move |service| {
            let handle = service
                .resolve(&path)
                .map(|object| AssetHandle::new(path.clone(), resolve_as::<T>(&path, object)));
            producer.set_result(handle);
        });
        future
    }

    fn request<F>(&self, paths: Vec<AssetPath>, complete: F)
    where
        F: FnOnce(&dyn StreamingService) + Send + 'static,
    {
        let service = Arc::downgrade(&self.service);
        let context = self.context.clone();
        let count = paths.len();

        let id = self.service.request_async_load(
            paths,
            self.priority,
            Box::new(move || {
                if context.as_ref().is_some_and(|c| c.strong_count() == 0) {
                    log::debug!("load completion dropped: context destroyed");
                    return;
                }
                match service.upgrade() {
                    Some(service) => complete(service.as_ref()),
                    None => log::debug!("load completion dropped: service destroyed"),
                }
            }),
        );
        log::trace!("{id}: requested {count} assets at {:?}", self.priority);
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("priority", &self.priority)
            .field("bound", &self.context.is_some())
            .finish_non_exhaustive()
    }
}

fn resolve_as<T: Any + Send + Sync>(path: &AssetPath, object: LoadedObject) -> Arc<T> {
    match object.downcast::<T>() {
        Ok(object) => object,
        Err(_) => panic!(
            "{}",
            AssetError::TypeMismatch {
                path: path.to_string(),
                expected: type_name::<T>(),
            }
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStreamer;
    use corotasks_core::Task;

    fn setup() -> (Arc<MemoryStreamer>, AssetLoader) {
        let streamer = Arc::new(MemoryStreamer::new());
        let loader = AssetLoader::new(streamer.clone());
        (streamer, loader)
    }

    fn reference<T>(path: &str) -> SoftRef<T> {
        SoftRef::parse(path).unwrap()
    }

    #[test]
    fn null_reference_needs_no_request() {
        let (streamer, loader) = setup();
        let future = loader.load_single_object(&SoftRef::<u32>::null());
        assert!(future.is_ready());
        assert_eq!(streamer.requests_issued(), 0);
    }

    #[test]
    fn single_object_resolves_on_delivery() {
        let (streamer, loader) = setup();
        streamer.insert(AssetPath::new("cars/ferrari").unwrap(), 250_000u32);

        let future = loader.load_single_object(&reference::<u32>("cars/ferrari"));
        assert!(!future.is_ready());
        streamer.pump();
        assert!(future.is_ready());

        let mut task = Task::new(async move { future.await });
        task.launch();
        let price = task.take_result().unwrap().unwrap();
        assert_eq!(price.as_deref(), Some(&250_000));
    }

    #[test]
    fn missing_object_resolves_to_none() {
        let (streamer, loader) = setup();
        let future = loader.load_single_object(&reference::<u32>("cars/lada"));
        streamer.pump();

        let mut task = Task::new(async move { future.await });
        task.launch();
        assert!(task.take_result().unwrap().unwrap().is_none());
    }

    #[test]
    fn batch_is_one_request() {
        let (streamer, loader) = setup();
        let refs = [
            reference::<u32>("a"),
            SoftRef::null(),
            reference::<u32>("b"),
        ];
        let _future = loader.load_multiple_objects(&refs);
        assert_eq!(streamer.requests_issued(), 1);
    }

    #[test]
    fn typed_handle_keeps_path() {
        let (streamer, loader) = setup();
        streamer.insert(AssetPath::new("cars/ferrari").unwrap(), String::from("Ferrari"));

        let future = loader.load_typed_handle(&reference::<String>("cars/ferrari"));
        streamer.pump();

        let mut task = Task::new(async move { future.await });
        task.launch();
        let handle = task.take_result().unwrap().unwrap().unwrap();
        assert_eq!(handle.path().as_str(), "cars/ferrari");
        assert_eq!(handle.as_str(), "Ferrari");
    }

    #[test]
    #[should_panic(expected = "asset cars/ferrari is not a u32")]
    fn type_mismatch_is_fatal() {
        let (streamer, loader) = setup();
        streamer.insert(AssetPath::new("cars/ferrari").unwrap(), String::from("Ferrari"));
        let _future = loader.load_single_object(&reference::<u32>("cars/ferrari"));
        streamer.pump();
    }

    #[test]
    fn live_context_keeps_completion() {
        let (streamer, loader) = setup();
        streamer.insert(AssetPath::new("cars/fiat").unwrap(), 15_000u32);
        let shop = Arc::new(String::from("shop"));
        let loader = loader.with_context(&shop);

        let future = loader.load_single_object(&reference::<u32>("cars/fiat"));
        streamer.pump();
        assert!(future.is_ready());
    }

    #[test]
    fn priority_is_forwarded() {
        let (_streamer, loader) = setup();
        let loader = loader.with_priority(LoadPriority::High);
        assert_eq!(loader.priority(), LoadPriority::High);
    }
}
