use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Default number of nested inline resumptions before the trampoline
/// starts queueing.
pub const DEFAULT_MAX_INLINE_DEPTH: usize = 64;

static MAX_INLINE_DEPTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_INLINE_DEPTH);
static STRICT_CONTRACTS: AtomicBool = AtomicBool::new(cfg!(feature = "strict-contracts"));
static UNHANDLED_ERRORS: AtomicU8 = AtomicU8::new(UnhandledErrorPolicy::Panic as u8);

/// What happens when a domain error reaches the outermost launch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum UnhandledErrorPolicy {
    /// Log the error, then panic. There is no ancestor left to catch it.
    #[default]
    Panic = 0,
    /// Log the error and continue.
    Log = 1,
}

impl UnhandledErrorPolicy {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Log,
            _ => Self::Panic,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "panic" => Some(Self::Panic),
            "log" => Some(Self::Log),
            _ => None,
        }
    }
}

/// Process-wide settings for the task machinery.
///
/// Tasks and futures are free-standing objects without a runtime handle, so
/// their settings live in process-wide atomics. Build a config, then call
/// [`install`](CoroConfig::install) once during startup.
///
/// # Example
///
/// ```
/// use corotasks_core::{CoroConfig, UnhandledErrorPolicy};
///
/// CoroConfig::new()
///     .with_max_inline_depth(128)
///     .with_unhandled_errors(UnhandledErrorPolicy::Panic)
///     .install();
///
/// assert_eq!(CoroConfig::current().max_inline_depth, 128);
/// # CoroConfig::default().install();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoroConfig {
    /// Nested inline resumptions allowed on one thread before further
    /// resumptions are queued and drained by the outermost one.
    pub max_inline_depth: usize,
    /// Whether contract violations panic instead of only being logged.
    pub strict_contracts: bool,
    /// Policy for errors nobody awaited.
    pub unhandled_errors: UnhandledErrorPolicy,
}

impl Default for CoroConfig {
    fn default() -> Self {
        Self {
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
            strict_contracts: cfg!(feature = "strict-contracts"),
            unhandled_errors: UnhandledErrorPolicy::Panic,
        }
    }
}

impl CoroConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the inline resumption depth. Zero is clamped to one.
    pub fn with_max_inline_depth(mut self, depth: usize) -> Self {
        self.max_inline_depth = depth.max(1);
        self
    }

    /// Sets whether contract violations are fatal.
    pub fn with_strict_contracts(mut self, strict: bool) -> Self {
        self.strict_contracts = strict;
        self
    }

    /// Sets the unhandled error policy.
    pub fn with_unhandled_errors(mut self, policy: UnhandledErrorPolicy) -> Self {
        self.unhandled_errors = policy;
        self
    }

    /// Builds a configuration from the defaults overridden by environment
    /// variables.
    ///
    /// - `COROTASKS_MAX_INLINE_DEPTH`: positive integer
    /// - `COROTASKS_STRICT_CONTRACTS`: `1`/`true` or `0`/`false`
    /// - `COROTASKS_UNHANDLED_ERRORS`: `panic` or `log`
    ///
    /// Unparseable values are reported and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("COROTASKS_MAX_INLINE_DEPTH") {
            match raw.trim().parse::<usize>() {
                Ok(depth) => config = config.with_max_inline_depth(depth),
                Err(_) => log::warn!("ignoring COROTASKS_MAX_INLINE_DEPTH={raw:?}"),
            }
        }

        if let Some(raw) = lookup("COROTASKS_STRICT_CONTRACTS") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.strict_contracts = true,
                "0" | "false" | "no" => config.strict_contracts = false,
                _ => log::warn!("ignoring COROTASKS_STRICT_CONTRACTS={raw:?}"),
            }
        }

        if let Some(raw) = lookup("COROTASKS_UNHANDLED_ERRORS") {
            match UnhandledErrorPolicy::parse(&raw) {
                Some(policy) => config.unhandled_errors = policy,
                None => log::warn!("ignoring COROTASKS_UNHANDLED_ERRORS={raw:?}"),
            }
        }

        config
    }

    /// Makes this configuration the active one for the whole process.
    pub fn install(self) {
        MAX_INLINE_DEPTH.store(self.max_inline_depth.max(1), Ordering::Relaxed);
        STRICT_CONTRACTS.store(self.strict_contracts, Ordering::Relaxed);
        UNHANDLED_ERRORS.store(self.unhandled_errors as u8, Ordering::Relaxed);
        log::debug!("corotasks configured: {self:?}");
    }

    /// Returns the active configuration.
    pub fn current() -> Self {
        Self {
            max_inline_depth: max_inline_depth(),
            strict_contracts: strict_contracts(),
            unhandled_errors: unhandled_errors(),
        }
    }
}

#[inline]
pub(crate) fn max_inline_depth() -> usize {
    MAX_INLINE_DEPTH.load(Ordering::Relaxed)
}

#[inline]
pub(crate) fn strict_contracts() -> bool {
    STRICT_CONTRACTS.load(Ordering::Relaxed)
}

#[inline]
pub(crate) fn unhandled_errors() -> UnhandledErrorPolicy {
    UnhandledErrorPolicy::from_u8(UNHANDLED_ERRORS.load(Ordering::Relaxed))
}
