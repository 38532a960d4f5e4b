//! Diagnostics for programmer-contract violations.
//!
//! A contract violation is a logic bug in the calling code: launching a task
//! twice, resolving a future twice, reading a result that does not exist yet.
//! These are never handed back as recoverable error values. They are logged,
//! counted per thread, and escalated to a panic when strict contracts are
//! enabled (see [`CoroConfig`](crate::CoroConfig)).

use std::cell::Cell;

use thiserror::Error;

use crate::config;

thread_local! {
    static VIOLATIONS: Cell<u64> = const { Cell::new(0) };
}

/// A misuse of the task or future API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractViolation {
    /// `launch()` called on a task that was already launched.
    #[error("task already launched")]
    AlreadyLaunched,
    /// A future was resolved a second time.
    #[error("future result already set")]
    AlreadyResolved,
    /// A continuation was resumed a second time.
    #[error("future already resumed")]
    AlreadyResumed,
    /// A result was requested before the computation completed.
    #[error("result requested before completion")]
    NotCompleted,
    /// A result was requested after it had already been consumed.
    #[error("result already taken")]
    ResultTaken,
    /// A second awaiter tried to attach while another one was suspended.
    #[error("another continuation is already attached")]
    ContinuationAttached,
}

/// Reports `violation` unless `condition` holds. Returns `condition`.
#[inline]
pub(crate) fn ensure(condition: bool, violation: ContractViolation) -> bool {
    if !condition {
        violated(violation);
    }
    condition
}

/// Reports a contract violation.
///
/// Panics when strict contracts are enabled, logs otherwise.
pub fn violated(violation: ContractViolation) {
    VIOLATIONS.set(VIOLATIONS.get() + 1);
    if config::strict_contracts() {
        panic!("contract violation: {violation}");
    }
    log::error!("contract violation: {violation}");
}

/// Reports a violation the caller cannot continue from. Always panics.
pub(crate) fn fatal(violation: ContractViolation) -> ! {
    VIOLATIONS.set(VIOLATIONS.get() + 1);
    panic!("contract violation: {violation}");
}

/// Reports a violation that is logged but never fatal.
///
/// Duplicate completions from noisy event sources land here: the first
/// resolution wins and later ones are dropped. Never panics.
pub fn tolerated(violation: ContractViolation) {
    VIOLATIONS.set(VIOLATIONS.get() + 1);
    log::warn!("ignored: {violation}");
}

/// Number of violations reported on the current thread.
pub fn violation_count() -> u64 {
    VIOLATIONS.get()
}
