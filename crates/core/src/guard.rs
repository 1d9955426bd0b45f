//! Execution guard: bounded retry and safe-execute combinators.
//!
//! Every file-system call made by the resolver and the projectors runs through
//! [`with_retry`]. Only transient I/O conditions are retried; a missing path or a
//! permission problem fails on the first attempt.

use crate::error::{Error, ErrorRecord, Result, log_error};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

/// EMFILE / ENFILE on unix-likes.
const TOO_MANY_OPEN_FILES: [i32; 2] = [24, 23];

/// Bounded retry policy: fixed initial delay, geometric backoff, fixed attempt cap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay_ms: 50, backoff_multiplier: 2.0 }
    }
}

impl RetryPolicy {
    /// Single attempt, no sleeping
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, initial_delay_ms: 0, backoff_multiplier: 1.0 }
    }

    /// Delay before the given attempt (0-indexed; the first attempt never waits)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        Duration::from_millis(delay as u64)
    }

    /// Check if another attempt is allowed after `attempt` attempts
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. The last error is returned unchanged.
pub fn with_retry<T, E, F, P>(policy: &RetryPolicy, is_retryable: P, mut operation: F) -> std::result::Result<T, E>
where
    F: FnMut() -> std::result::Result<T, E>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        attempt += 1;

        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && policy.should_retry(attempt) => {
                tracing::debug!(attempt, max_attempts = policy.max_attempts, "transient failure, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Transient I/O conditions worth another attempt
pub fn is_transient_io(err: &io::Error) -> bool {
    if let Some(code) = err.raw_os_error()
        && TOO_MANY_OPEN_FILES.contains(&code)
    {
        return true;
    }

    matches!(
        err.kind(),
        io::ErrorKind::ResourceBusy | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

/// Retry predicate for crate errors: only file operations wrapping transient I/O
pub fn is_retryable(err: &Error) -> bool {
    match err {
        Error::FileOperation(e) => is_transient_io(&e.source),
        _ => false,
    }
}

/// Outcome of a guarded operation that degraded to its fallback
#[derive(Debug)]
pub enum Guarded<T> {
    Done(T),
    Skipped(ErrorRecord),
}

impl<T> Guarded<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            Guarded::Done(value) => Some(value),
            Guarded::Skipped(_) => None,
        }
    }
}

/// Run `operation`; recoverable failures are logged and reported as [`Guarded::Skipped`],
/// anything else is logged and propagated.
pub fn guard<T, F>(operation: F) -> Result<Guarded<T>>
where
    F: FnOnce() -> Result<T>,
{
    match operation() {
        Ok(value) => Ok(Guarded::Done(value)),
        Err(err) => {
            let record = log_error(&err);
            if err.is_recoverable() { Ok(Guarded::Skipped(record)) } else { Err(err) }
        }
    }
}

/// Run `operation`, substituting `fallback` when it fails recoverably.
pub fn safe_execute<T, F>(operation: F, fallback: T) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match guard(operation)? {
        Guarded::Done(value) => Ok(value),
        Guarded::Skipped(_) => Ok(fallback),
    }
}
