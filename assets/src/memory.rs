use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use corotasks_core::{TickSource, TickerHandle};
use parking_lot::{Mutex, RwLock};

use crate::error::AssetError;
use crate::path::AssetPath;
use crate::priority::LoadPriority;
use crate::streaming::{LoadRequestId, LoadedCallback, LoadedObject, StreamingService};

/// A queued load request.
struct PendingLoad {
    id: LoadRequestId,
    priority: LoadPriority,
    paths: Vec<AssetPath>,
    on_loaded: LoadedCallback,
}

/// In-memory streaming service for tests, tools and demos.
///
/// Objects are registered up front with [`insert`](Self::insert) but only
/// become resolvable once a request naming them has been delivered by
/// [`pump`](Self::pump). Requests are delivered highest priority first,
/// oldest first within a priority, at most `requests_per_pump` per pump.
///
/// # Example
///
/// ```
/// use corotasks_assets::{AssetPath, LoadPriority, MemoryStreamer, StreamingService};
///
/// let streamer = MemoryStreamer::new();
/// let path = AssetPath::new("cars/ferrari").unwrap();
/// streamer.insert(path.clone(), String::from("Ferrari"));
///
/// streamer.request_async_load(vec![path.clone()], LoadPriority::Normal, Box::new(|| {}));
/// assert!(streamer.resolve(&path).is_none());
///
/// streamer.pump();
/// assert!(streamer.resolve(&path).is_some());
/// ```
pub struct MemoryStreamer {
    available: RwLock<HashMap<AssetPath, LoadedObject>>,
    loaded: RwLock<HashSet<AssetPath>>,
    queue: Mutex<Vec<PendingLoad>>,
    next_id: AtomicU64,
    requests_per_pump: usize,
    issued: AtomicU64,
}

impl MemoryStreamer {
    pub fn new() -> Self {
        Self {
            available: RwLock::new(HashMap::new()),
            loaded: RwLock::new(HashSet::new()),
            queue: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            requests_per_pump: usize::MAX,
            issued: AtomicU64::new(0),
        }
    }

    /// Limits how many requests a single [`pump`](Self::pump) delivers.
    /// Zero is clamped to one.
    pub fn with_requests_per_pump(mut self, limit: usize) -> Self {
        self.requests_per_pump = limit.max(1);
        self
    }

    /// Makes `object` loadable at `path`, replacing any previous object.
    pub fn insert<T: Any + Send + Sync>(&self, path: AssetPath, object: T) {
        self.available.write().insert(path, Arc::new(object));
    }

    /// Removes the object at `path` and forgets that it was loaded.
    pub fn remove(&self, path: &AssetPath) -> Option<LoadedObject> {
        self.loaded.write().remove(path);
        self.available.write().remove(path)
    }

    /// Whether `path` has been delivered by a request.
    pub fn is_loaded(&self, path: &AssetPath) -> bool {
        self.loaded.read().contains(path)
    }

    /// Number of requests waiting for delivery.
    pub fn pending_requests(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of requests issued since creation.
    pub fn requests_issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    /// Delivers queued requests. Returns how many were delivered.
    ///
    /// Callbacks run after the service's locks are released. Requests they
    /// issue are delivered by a later pump.
    pub fn pump(&self) -> usize {
        let batch = {
            let mut queue = self.queue.lock();
            if queue.is_empty() {
                return 0;
            }
            queue.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
            let take = self.requests_per_pump.min(queue.len());
            queue.drain(..take).collect::<Vec<_>>()
        };

        let delivered = batch.len();
        for request in batch {
            self.mark_loaded(&request.paths);
            log::trace!(
                "{} delivered ({} paths, {:?})",
                request.id,
                request.paths.len(),
                request.priority
            );
            (request.on_loaded)();
        }
        delivered
    }

    /// Pumps once per tick of `source`. The source holds the streamer
    /// weakly and drops the delegate once the streamer is gone.
    pub fn attach(self: &Arc<Self>, source: &dyn TickSource) -> TickerHandle {
        let streamer: Weak<Self> = Arc::downgrade(self);
        source.add_ticker(Box::new(move |_delta_time| match streamer.upgrade() {
            Some(streamer) => {
                streamer.pump();
                true
            }
            None => false,
        }))
    }

    fn mark_loaded(&self, paths: &[AssetPath]) {
        let available = self.available.read();
        let mut loaded = self.loaded.write();
        for path in paths {
            if available.contains_key(path) {
                loaded.insert(path.clone());
            } else {
                log::warn!("{}", AssetError::NotFound(path.to_string()));
            }
        }
    }
}

impl Default for MemoryStreamer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingService for MemoryStreamer {
    fn request_async_load(
        &self,
        paths: Vec<AssetPath>,
        priority: LoadPriority,
        on_loaded: LoadedCallback,
    ) -> LoadRequestId {
        let id = LoadRequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.issued.fetch_add(1, Ordering::Relaxed);
        log::trace!("{id} queued ({} paths, {priority:?})", paths.len());
        self.queue.lock().push(PendingLoad {
            id,
            priority,
            paths,
            on_loaded,
        });
        id
    }

    fn resolve(&self, path: &AssetPath) -> Option<LoadedObject> {
        if !self.loaded.read().contains(path) {
            return None;
        }
        self.available.read().get(path).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corotasks_core::Ticker;

    fn path(s: &str) -> AssetPath {
        AssetPath::new(s).unwrap()
    }

    fn record(order: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> LoadedCallback {
        let order = order.clone();
        Box::new(move || order.lock().push(name))
    }

    #[test]
    fn resolves_only_after_delivery() {
        let streamer = MemoryStreamer::new();
        streamer.insert(path("cars/ferrari"), 250_000u32);

        streamer.request_async_load(vec![path("cars/ferrari")], LoadPriority::Normal, Box::new(|| {}));
        assert!(streamer.resolve(&path("cars/ferrari")).is_none());
        assert_eq!(streamer.pending_requests(), 1);

        assert_eq!(streamer.pump(), 1);
        assert!(streamer.is_loaded(&path("cars/ferrari")));
        let object = streamer.resolve(&path("cars/ferrari"));
        assert_eq!(object.and_then(|o| o.downcast_ref::<u32>().copied()), Some(250_000));
    }

    #[test]
    fn missing_paths_stay_unresolved() {
        let streamer = MemoryStreamer::new();
        streamer.request_async_load(vec![path("cars/lada")], LoadPriority::Normal, Box::new(|| {}));
        streamer.pump();
        assert!(streamer.resolve(&path("cars/lada")).is_none());
    }

    #[test]
    fn delivers_by_priority_then_age() {
        let streamer = MemoryStreamer::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        streamer.request_async_load(vec![path("a")], LoadPriority::Low, record(&order, "low"));
        streamer.request_async_load(vec![path("b")], LoadPriority::Normal, record(&order, "normal-1"));
        streamer.request_async_load(vec![path("c")], LoadPriority::High, record(&order, "high"));
        streamer.request_async_load(vec![path("d")], LoadPriority::Normal, record(&order, "normal-2"));

        assert_eq!(streamer.pump(), 4);
        assert_eq!(*order.lock(), vec!["high", "normal-1", "normal-2", "low"]);
    }

    #[test]
    fn pump_limit_spreads_requests_over_pumps() {
        let streamer = MemoryStreamer::new().with_requests_per_pump(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        streamer.request_async_load(vec![path("a")], LoadPriority::Low, record(&order, "low"));
        streamer.request_async_load(vec![path("b")], LoadPriority::High, record(&order, "high"));

        assert_eq!(streamer.pump(), 1);
        assert_eq!(*order.lock(), vec!["high"]);
        assert_eq!(streamer.pump(), 1);
        assert_eq!(streamer.pump(), 0);
        assert_eq!(*order.lock(), vec!["high", "low"]);
    }

    #[test]
    fn attached_streamer_pumps_on_tick() {
        let ticker = Ticker::new();
        let streamer = Arc::new(MemoryStreamer::new());
        streamer.attach(&ticker);

        streamer.insert(path("cars/ferrari"), "Ferrari");
        streamer.request_async_load(vec![path("cars/ferrari")], LoadPriority::High, Box::new(|| {}));
        ticker.tick(0.016);
        assert!(streamer.is_loaded(&path("cars/ferrari")));

        drop(streamer);
        ticker.tick(0.016);
        assert!(ticker.is_empty());
    }
}
