//! Bounded polling.
//!
//! Every wait in the gate is a predicate evaluated repeatedly until it yields
//! a value or the deadline passes. Nothing blocks indefinitely.

use std::{
    thread,
    time::{Duration, Instant},
};

use crate::error::{GateError, Result};

/// Evaluate `probe` every `interval` until it returns `Some`, or `timeout` elapses.
///
/// The predicate always runs at least once, even with a zero timeout.
/// Errors from the predicate abort the wait immediately.
pub fn poll_until<T>(
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> Result<Option<T>>,
) -> Result<Option<T>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(v) = probe()? {
            return Ok(Some(v));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(interval.min(deadline - now));
    }
}

/// Like [`poll_until`], but an expired deadline becomes `GateError::Timeout`.
pub fn poll_or_timeout<T>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    probe: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    poll_until(timeout, interval, probe)?.ok_or_else(|| GateError::timeout(what, timeout))
}
