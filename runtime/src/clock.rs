use std::sync::atomic::{AtomicU64, Ordering};

/// Accumulated tick time.
///
/// Advanced once per registry tick. Timers compare against
/// [`elapsed`](FrameClock::elapsed) instead of wall-clock time, so tests can
/// drive time with arbitrary delta values.
#[derive(Debug, Default)]
pub struct FrameClock {
    /// `f64` seconds stored as raw bits.
    elapsed_bits: AtomicU64,
    frames: AtomicU64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one frame of `delta_time` seconds. Negative deltas count as zero.
    pub fn advance(&self, delta_time: f32) {
        let delta = f64::from(delta_time.max(0.0));
        let elapsed = f64::from_bits(self.elapsed_bits.load(Ordering::Acquire)) + delta;
        self.elapsed_bits.store(elapsed.to_bits(), Ordering::Release);
        self.frames.fetch_add(1, Ordering::AcqRel);
    }

    /// Seconds accumulated so far.
    pub fn elapsed(&self) -> f64 {
        f64::from_bits(self.elapsed_bits.load(Ordering::Acquire))
    }

    /// Number of frames advanced so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }
}
