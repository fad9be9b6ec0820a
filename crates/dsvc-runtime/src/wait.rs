//! Bounded polling against a monotonic deadline.

use std::time::{Duration, Instant};

use dsvc_common::error::{Result, ServicesError};

use crate::cancel::CancellationToken;

/// What a poll loop is waiting for, used in timeout errors.
#[derive(Debug, Clone, Copy)]
pub struct WaitTarget<'a> {
    /// Service being started.
    pub service: &'a str,
    /// Awaited state (`running`, `healthy`).
    pub state: &'static str,
}

/// Calls `probe` every `interval` until it yields a value.
///
/// `probe` returns `Ok(None)` to keep waiting and `Err` to give up early.
///
/// # Errors
///
/// Returns [`ServicesError::StartupTimeout`] once `timeout` has elapsed,
/// [`ServicesError::Cancelled`] if `cancel` trips, or the probe's error.
pub fn poll_until<T>(
    target: WaitTarget<'_>,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
    mut probe: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        cancel.check()?;
        if let Some(value) = probe()? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(service = target.service, state = target.state, ?timeout, "wait timed out");
            return Err(ServicesError::StartupTimeout {
                service: target.service.to_string(),
                state: target.state,
                timeout,
            });
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}
