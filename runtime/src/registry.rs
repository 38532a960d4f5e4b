use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use corotasks_core::{CoroFuture, TickSource, TickerHandle};
use parking_lot::Mutex;

use crate::clock::FrameClock;

/// Identifier of a registered latent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action#{}", self.0)
    }
}

/// Result of evaluating a predicate once.
enum Check<T> {
    Ready(T),
    Pending,
    OwnerGone,
}

type Predicate<T> = Box<dyn FnMut() -> Check<T> + Send>;

/// What a sweep learned about an entry.
enum Progress {
    Finished,
    Pending,
    Abandoned,
}

/// Type-erased registry entry.
trait LatentEntry: Send {
    fn is_resolved(&self) -> bool;

    /// Runs the predicate once, resolving the future when it yields.
    fn poll(&mut self) -> Progress;
}

struct LatentAction<T> {
    future: CoroFuture<T>,
    predicate: Option<Predicate<T>>,
}

impl<T: Send + 'static> LatentEntry for LatentAction<T> {
    fn is_resolved(&self) -> bool {
        self.future.is_ready()
    }

    fn poll(&mut self) -> Progress {
        let Some(predicate) = self.predicate.as_mut() else {
            return Progress::Pending;
        };
        match predicate() {
            Check::Ready(value) => {
                self.future.set_result(value);
                Progress::Finished
            }
            Check::Pending => Progress::Pending,
            Check::OwnerGone => {
                self.predicate = None;
                Progress::Abandoned
            }
        }
    }
}

struct LatentActionInfo {
    id: ActionId,
    action: Box<dyn LatentEntry>,
    polling: bool,
    finished: bool,
}

/// Tick-driven collection of futures waiting on the host.
///
/// Each entry holds a [`CoroFuture`] shared with the code awaiting it. An
/// entry is either resolved by an external producer (a callback holding
/// another clone of the future) or by a polling predicate evaluated once per
/// [`tick`](Self::tick). Finished entries are reclaimed at the end of the
/// tick that observes them.
///
/// Predicates and the coroutines they resume run without any registry lock
/// held, so a resumed coroutine may register new actions. Those are picked up
/// at the end of the sweep and polled from the next tick on.
///
/// # Example
///
/// ```
/// use corotasks_core::Task;
/// use corotasks_runtime::PendingActionRegistry;
///
/// let registry = PendingActionRegistry::new();
/// let wait = registry.delay(0.5);
///
/// let mut task = Task::new(async move { wait.await });
/// task.launch();
///
/// registry.tick(0.25);
/// assert!(!task.is_completed());
/// registry.tick(0.25);
/// assert!(task.is_completed());
/// assert_eq!(registry.pending_count(), 0);
/// ```
pub struct PendingActionRegistry {
    entries: Mutex<Vec<LatentActionInfo>>,
    /// Registrations not yet merged into `entries`.
    incoming: Mutex<Vec<LatentActionInfo>>,
    next_id: AtomicU64,
    /// Bumped by `deinitialize`; a tick that sees it change discards its sweep.
    generation: AtomicU64,
    clock: Arc<FrameClock>,
    ticker: Mutex<Option<TickerHandle>>,
}

impl PendingActionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            incoming: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            generation: AtomicU64::new(0),
            clock: Arc::new(FrameClock::new()),
            ticker: Mutex::new(None),
        }
    }

    /// Attaches the registry to the host's per-frame tick.
    ///
    /// The tick source only holds a weak reference; dropping the registry
    /// unregisters it on the following frame.
    pub fn initialize(self: &Arc<Self>, source: &dyn TickSource) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            log::warn!("PendingActionRegistry already initialized");
            return;
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        let handle = source.add_ticker(Box::new(move |delta_time| {
            registry
                .upgrade()
                .is_some_and(|registry| registry.tick(delta_time))
        }));
        *ticker = Some(handle);
        log::info!("PendingActionRegistry initialized");
    }

    /// Detaches from the tick source and discards every pending action.
    ///
    /// Also valid from inside a tick, e.g. from a coroutine the tick resumed:
    /// the entries that tick is sweeping are discarded when it ends.
    ///
    /// Discarded futures are never resolved; coroutines awaiting them stay
    /// suspended until their owners drop them.
    pub fn deinitialize(&self, source: &dyn TickSource) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(handle) = self.ticker.lock().take() {
            source.remove_ticker(handle);
        }

        let mut discarded = std::mem::take(&mut *self.entries.lock());
        discarded.append(&mut self.incoming.lock());
        let pending = discarded.iter().filter(|info| !info.finished).count();
        drop(discarded);

        log::info!("PendingActionRegistry deinitialized, discarded {pending} pending actions");
    }

    /// Registers a future resolved by an external producer.
    ///
    /// The producer resolves a clone of the returned future. The registry
    /// reclaims the entry on the first tick after resolution.
    pub fn create_latent_action<T: Send + 'static>(&self) -> CoroFuture<T> {
        let future = CoroFuture::new();
        self.register(future.clone(), None);
        future
    }

    /// Registers a future resolved by `predicate`, evaluated once per tick.
    ///
    /// The predicate borrows `owner`, which the registry only holds weakly.
    /// Once the owner is dropped the predicate is discarded without being
    /// called again and the future is never resolved.
    pub fn create_latent_polling_action<T, O, F>(&self, owner: &Arc<O>, mut predicate: F) -> CoroFuture<T>
    where
        T: Send + 'static,
        O: Send + Sync + 'static,
        F: FnMut(&O) -> Option<T> + Send + 'static,
    {
        let owner: Weak<O> = Arc::downgrade(owner);
        self.register_polling(Box::new(move || match owner.upgrade() {
            Some(owner) => predicate(&owner).map_or(Check::Pending, Check::Ready),
            None => Check::OwnerGone,
        }))
    }

    /// Registers a future resolved by `predicate`, with no owner.
    pub fn create_latent_polling_action_unowned<T, F>(&self, mut predicate: F) -> CoroFuture<T>
    where
        T: Send + 'static,
        F: FnMut() -> Option<T> + Send + 'static,
    {
        self.register_polling(Box::new(move || predicate().map_or(Check::Pending, Check::Ready)))
    }

    /// Resolves once `condition` returns true on a tick.
    pub fn wait_until<F>(&self, mut condition: F) -> CoroFuture<()>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.create_latent_polling_action_unowned(move || condition().then_some(()))
    }

    /// Resolves on the first tick at which `seconds` of tick time have passed.
    pub fn delay(&self, seconds: f64) -> CoroFuture<()> {
        let clock = self.clock.clone();
        let deadline = clock.elapsed() + seconds;
        self.wait_until(move || clock.elapsed() >= deadline)
    }

    /// Resolves on the next tick.
    pub fn yield_frame(&self) -> CoroFuture<()> {
        self.wait_until(|| true)
    }

    /// Advances the clock, evaluates every polling predicate once and
    /// reclaims finished entries.
    ///
    /// Always returns `true`, so a tick source keeps the registry registered.
    pub fn tick(&self, delta_time: f32) -> bool {
        self.clock.advance(delta_time);
        let generation = self.generation.load(Ordering::Acquire);

        let mut entries = std::mem::take(&mut *self.entries.lock());
        entries.append(&mut self.incoming.lock());
        if entries.is_empty() {
            return true;
        }

        for info in entries.iter_mut().filter(|info| !info.finished) {
            if info.action.is_resolved() {
                info.finished = true;
                continue;
            }
            if !info.polling {
                continue;
            }
            match info.action.poll() {
                Progress::Finished => info.finished = true,
                Progress::Pending => {}
                Progress::Abandoned => {
                    log::debug!("{} owner destroyed, dropping its predicate", info.id);
                    info.polling = false;
                    info.finished = true;
                }
            }
        }

        let before = entries.len();
        entries.retain(|info| !info.finished);
        let reaped = before - entries.len();
        if reaped > 0 {
            log::trace!("reclaimed {reaped} latent actions, {} pending", entries.len());
        }

        if self.generation.load(Ordering::Acquire) != generation {
            log::debug!("deinitialized during tick, discarding {} latent actions", entries.len());
            return true;
        }

        let mut guard = self.entries.lock();
        let added = std::mem::replace(&mut *guard, entries);
        guard.extend(added);
        guard.append(&mut self.incoming.lock());
        true
    }

    /// Number of registered actions not yet reclaimed.
    pub fn pending_count(&self) -> usize {
        self.entries.lock().len() + self.incoming.lock().len()
    }

    /// Tick time accumulated since creation, in seconds.
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    /// The clock advanced by [`tick`](Self::tick).
    pub fn clock(&self) -> &Arc<FrameClock> {
        &self.clock
    }

    fn register_polling<T: Send + 'static>(&self, predicate: Predicate<T>) -> CoroFuture<T> {
        let future = CoroFuture::new();
        self.register(future.clone(), Some(predicate));
        future
    }

    fn register<T: Send + 'static>(&self, future: CoroFuture<T>, predicate: Option<Predicate<T>>) -> ActionId {
        let id = ActionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let polling = predicate.is_some();
        self.incoming.lock().push(LatentActionInfo {
            id,
            action: Box::new(LatentAction { future, predicate }),
            polling,
            finished: false,
        });
        log::trace!("registered {id} (polling: {polling})");
        id
    }
}

impl Default for PendingActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PendingActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingActionRegistry")
            .field("pending", &self.pending_count())
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corotasks_core::{Task, Ticker};
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[test]
    fn deinitialize_from_a_resumed_coroutine_discards_entries() {
        let ticker = Arc::new(Ticker::new());
        let registry = Arc::new(PendingActionRegistry::new());
        registry.initialize(&*ticker);

        let inner = registry.clone();
        let source = ticker.clone();
        let mut task = Task::new(async move {
            let _later = inner.delay(100.0);
            inner.yield_frame().await?;
            inner.deinitialize(&*source);
            Ok(())
        });
        task.launch();
        assert_eq!(registry.pending_count(), 2);

        ticker.tick(0.1);
        assert!(task.is_completed());
        assert_eq!(registry.pending_count(), 0);

        ticker.tick(0.1);
        assert_eq!(registry.pending_count(), 0);
        assert!(ticker.is_empty());
    }

    #[test]
    fn tick_on_empty_registry_is_a_noop() {
        let registry = PendingActionRegistry::new();
        assert!(registry.tick(0.016));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn external_action_is_reclaimed_after_resolution() {
        let registry = PendingActionRegistry::new();
        let future = registry.create_latent_action::<u32>();
        let producer = future.clone();

        let mut task = Task::new(async move { future.await });
        task.launch();

        registry.tick(0.016);
        assert_eq!(registry.pending_count(), 1);

        producer.set_result(5);
        assert!(task.is_completed());

        registry.tick(0.016);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn polling_action_resumes_inline_during_tick() {
        let registry = PendingActionRegistry::new();
        let ready = Arc::new(AtomicBool::new(false));
        let flag = ready.clone();
        let future = registry.create_latent_polling_action_unowned(move || {
            flag.load(Ordering::Relaxed).then_some("ok")
        });

        let mut task = Task::new(async move { future.await });
        task.launch();

        registry.tick(0.016);
        assert!(!task.is_completed());

        ready.store(true, Ordering::Relaxed);
        registry.tick(0.016);
        assert!(task.is_completed());
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(task.take_result().and_then(Result::ok), Some("ok"));
    }

    #[test]
    fn predicate_runs_once_per_tick() {
        let registry = PendingActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _future = registry.wait_until(move || {
            counter.fetch_add(1, Ordering::Relaxed);
            false
        });

        for _ in 0..3 {
            registry.tick(0.016);
        }
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn owner_bound_predicate_stops_after_owner_drop() {
        struct Owner {
            calls: AtomicUsize,
        }

        let registry = PendingActionRegistry::new();
        let owner = Arc::new(Owner {
            calls: AtomicUsize::new(0),
        });
        let future = registry.create_latent_polling_action(&owner, |owner: &Owner| {
            owner.calls.fetch_add(1, Ordering::Relaxed);
            None::<()>
        });

        registry.tick(0.016);
        assert_eq!(owner.calls.load(Ordering::Relaxed), 1);

        drop(owner);
        registry.tick(0.016);
        registry.tick(0.016);

        assert!(!future.is_ready());
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn registration_during_sweep_is_polled_next_tick() {
        let registry = Arc::new(PendingActionRegistry::new());
        let frames = Arc::new(AtomicUsize::new(0));

        let inner = registry.clone();
        let counter = frames.clone();
        let mut task = Task::new(async move {
            inner.yield_frame().await?;
            counter.fetch_add(1, Ordering::Relaxed);
            inner.yield_frame().await?;
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        task.launch();

        registry.tick(0.016);
        assert_eq!(frames.load(Ordering::Relaxed), 1);
        assert_eq!(registry.pending_count(), 1);

        registry.tick(0.016);
        assert_eq!(frames.load(Ordering::Relaxed), 2);
        assert!(task.is_completed());
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn delay_waits_for_tick_time() {
        let registry = PendingActionRegistry::new();
        let wait = registry.delay(1.0);

        for _ in 0..3 {
            registry.tick(0.3);
        }
        assert!(!wait.is_ready());
        registry.tick(0.3);
        assert!(wait.is_ready());
    }

    #[test]
    fn ticker_drives_registry_until_deinitialized() {
        let ticker = Ticker::new();
        let registry = Arc::new(PendingActionRegistry::new());
        registry.initialize(&ticker);

        let wait = registry.yield_frame();
        ticker.tick(0.016);
        assert!(wait.is_ready());

        let never = registry.wait_until(|| false);
        registry.deinitialize(&ticker);
        assert!(ticker.is_empty());
        assert_eq!(registry.pending_count(), 0);
        assert!(!never.is_ready());
    }

    #[test]
    fn dropped_registry_unregisters_from_ticker() {
        let ticker = Ticker::new();
        let registry = Arc::new(PendingActionRegistry::new());
        registry.initialize(&ticker);
        drop(registry);

        ticker.tick(0.016);
        assert!(ticker.is_empty());
    }
}
