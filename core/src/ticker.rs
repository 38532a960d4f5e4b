use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Per-frame callback. Returning `false` unregisters it.
pub type TickDelegate = Box<dyn FnMut(f32) -> bool + Send>;

/// Identifies a registered tick delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerHandle(u64);

/// The host's per-frame tick source.
///
/// Anything that needs to run once per frame (the pending action registry,
/// streaming services) registers a delegate here instead of owning the frame
/// loop.
pub trait TickSource: Send + Sync {
    /// Registers `delegate` to be called once per frame with the frame's
    /// delta time in seconds.
    fn add_ticker(&self, delegate: TickDelegate) -> TickerHandle;

    /// Unregisters a delegate. Unknown handles are ignored.
    fn remove_ticker(&self, handle: TickerHandle);
}

/// A tick source driven by calling [`tick`](Ticker::tick) from a frame loop.
///
/// Delegates may add or remove delegates (including themselves) while being
/// ticked. Additions take effect on the next frame.
///
/// # Example
///
/// ```
/// use corotasks_core::{TickSource, Ticker};
///
/// let ticker = Ticker::new();
/// let mut frames = 0;
/// ticker.add_ticker(Box::new(move |_dt| {
///     frames += 1;
///     frames < 3
/// }));
///
/// for _ in 0..5 {
///     ticker.tick(1.0 / 60.0);
/// }
/// assert!(ticker.is_empty());
/// ```
#[derive(Default)]
pub struct Ticker {
    next_handle: AtomicU64,
    delegates: Mutex<Vec<(TickerHandle, TickDelegate)>>,
    /// Handles removed while their delegate was taken out for a tick.
    removed: Mutex<HashSet<TickerHandle>>,
    ticking: AtomicBool,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every registered delegate once.
    pub fn tick(&self, delta_time: f32) {
        if self.ticking.swap(true, Ordering::AcqRel) {
            log::warn!("Ticker::tick called re-entrantly, ignoring");
            return;
        }

        let mut current = std::mem::take(&mut *self.delegates.lock());
        current.retain_mut(|(handle, delegate)| {
            if self.removed.lock().contains(handle) {
                return false;
            }
            delegate(delta_time)
        });

        let mut removed = self.removed.lock();
        current.retain(|(handle, _)| !removed.contains(handle));
        removed.clear();
        drop(removed);

        let mut delegates = self.delegates.lock();
        let added = std::mem::replace(&mut *delegates, current);
        delegates.extend(added);
        drop(delegates);

        self.ticking.store(false, Ordering::Release);
    }

    /// Number of registered delegates.
    pub fn len(&self) -> usize {
        self.delegates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TickSource for Ticker {
    fn add_ticker(&self, delegate: TickDelegate) -> TickerHandle {
        let handle = TickerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.delegates.lock().push((handle, delegate));
        handle
    }

    fn remove_ticker(&self, handle: TickerHandle) {
        self.delegates.lock().retain(|(h, _)| *h != handle);
        if self.ticking.load(Ordering::Acquire) {
            self.removed.lock().insert(handle);
        }
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker").field("delegates", &self.len()).finish()
    }
}
