use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;

use corotasks_core::{AsyncResult, Awaitable, CoroFuture};

use crate::registry::PendingActionRegistry;

/// Slack added to the expected play length before the timeout fires.
const TIMEOUT_SLACK: f64 = 0.1;

/// How a played animation or ability ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayOutcome {
    Completed,
    BlendOut,
    Interrupted,
    Cancelled,
    Timeout,
    Destroyed,
}

struct PlayState {
    name: String,
    future: CoroFuture<PlayOutcome>,
    finished: AtomicBool,
}

impl PlayState {
    fn finish(&self, outcome: PlayOutcome) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            log::trace!("{}: ignoring {outcome:?}, already finished", self.name);
            return false;
        }
        log::debug!("{}: finished with {outcome:?}", self.name);
        self.future.set_result(outcome)
    }
}

/// Event-driven action with several competing completion events.
///
/// The host reports whichever event happens first through the `on_*`
/// methods. A timeout registered with the [`PendingActionRegistry`] races
/// the events so an awaiter is resumed even if the host never reports
/// anything. The first outcome wins; every later report is a no-op.
/// Dropping the action reports [`PlayOutcome::Destroyed`] if nothing was
/// reported yet.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use corotasks_core::{Task, awaitable};
/// use corotasks_runtime::{PendingActionRegistry, PlayAndWait, PlayOutcome};
///
/// let registry = PendingActionRegistry::new();
/// let montage = Arc::new(PlayAndWait::new(&registry, "SellCar", 2.0, 1.0));
///
/// let waiting = montage.clone();
/// let mut task = Task::new(async move { awaitable(waiting).await });
/// task.launch();
///
/// montage.on_blend_out();
/// montage.on_completed();
/// assert_eq!(task.take_result().and_then(Result::ok), Some(PlayOutcome::BlendOut));
/// ```
pub struct PlayAndWait {
    state: Arc<PlayState>,
}

impl PlayAndWait {
    /// Starts waiting for an action expected to run `play_length` seconds at
    /// `rate`.
    ///
    /// The timeout fires `play_length * rate + 0.1` seconds of registry tick
    /// time from now. A negative rate counts as `1.0`.
    pub fn new(registry: &PendingActionRegistry, name: impl Into<String>, play_length: f32, rate: f32) -> Self {
        let state = Arc::new(PlayState {
            name: name.into(),
            future: registry.create_latent_action(),
            finished: AtomicBool::new(false),
        });

        let scale = if rate >= 0.0 { rate } else { 1.0 };
        let deadline = registry.elapsed() + f64::from(play_length * scale) + TIMEOUT_SLACK;
        let clock = registry.clock().clone();
        let _timeout = registry.create_latent_polling_action(&state, move |state: &PlayState| {
            if clock.elapsed() < deadline {
                return None;
            }
            state.finish(PlayOutcome::Timeout);
            Some(())
        });

        log::debug!("{}: waiting, timeout at {deadline:.3}s", state.name);
        Self { state }
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Whether an outcome has been decided.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Another handle to the outcome, for awaiting after the action itself
    /// was handed to the host.
    pub fn outcome(&self) -> CoroFuture<PlayOutcome> {
        self.state.future.clone()
    }

    pub fn on_completed(&self) -> bool {
        self.finish_with_result_if_nothing(PlayOutcome::Completed)
    }

    pub fn on_blend_out(&self) -> bool {
        self.finish_with_result_if_nothing(PlayOutcome::BlendOut)
    }

    pub fn on_interrupted(&self) -> bool {
        self.finish_with_result_if_nothing(PlayOutcome::Interrupted)
    }

    pub fn on_cancelled(&self) -> bool {
        self.finish_with_result_if_nothing(PlayOutcome::Cancelled)
    }

    pub fn on_timeout(&self) -> bool {
        self.finish_with_result_if_nothing(PlayOutcome::Timeout)
    }

    /// Reports `outcome` unless another outcome was already reported.
    /// Returns whether this call decided the outcome.
    pub fn finish_with_result_if_nothing(&self, outcome: PlayOutcome) -> bool {
        self.state.finish(outcome)
    }
}

impl Drop for PlayAndWait {
    fn drop(&mut self) {
        self.state.finish(PlayOutcome::Destroyed);
    }
}

impl Awaitable for PlayAndWait {
    type Output = AsyncResult<PlayOutcome>;

    fn is_ready(&self) -> bool {
        self.state.future.is_ready()
    }

    fn suspend(&self, waker: &Waker) {
        self.state.future.suspend(waker);
    }

    fn resume(&self) -> AsyncResult<PlayOutcome> {
        self.state.future.resume()
    }

    fn abandon(&self) {
        self.state.future.abandon();
    }
}
