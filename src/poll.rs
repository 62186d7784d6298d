//! Readiness polling.
//!
//! A provisioned resource reports "created" long before it can serve
//! requests, and how much earlier varies too much to guess a constant.
//! Instead of a fixed sleep, [`wait_ready`] retries a cheap probe with
//! capped-exponential backoff until the resource answers, the deadline
//! passes, or the caller cancels.

use crate::error::ProvisionError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{sleep, Duration, Instant};

/// Outcome of one probe attempt.
///
/// A terminal condition (resource deleted, permanent fault) is reported by
/// returning `Err` from the probe; it propagates immediately without
/// further polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Ready,
    NotReady,
}

/// Polling parameters.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Give up with `ReadinessTimeout` once this much time has elapsed.
    pub max_wait: Duration,
    /// Delay before the second probe.
    pub interval: Duration,
    /// Backoff doubles up to this cap.
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(30),
        }
    }
}

/// Cooperative cancellation signal.
///
/// Clone freely; `cancel()` on any clone wakes every waiter. Once
/// cancelled, always cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a cancel
            // between the check and the await cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Poll `probe` until it reports ready.
///
/// - `Ok(Probe::Ready)` resolves the wait.
/// - `Ok(Probe::NotReady)` sleeps and retries, doubling the delay up to
///   `max_interval`.
/// - `Err(_)` from the probe is terminal and propagates immediately.
/// - Elapsed time at or past `max_wait` fails with
///   [`ProvisionError::ReadinessTimeout`] — never before the deadline.
/// - Cancellation aborts the wait with [`ProvisionError::Cancelled`],
///   distinct from the timeout.
pub async fn wait_ready<F, Fut>(
    target: &str,
    mut probe: F,
    config: &PollConfig,
    cancel: &CancelToken,
) -> Result<(), ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Probe, ProvisionError>>,
{
    let start = Instant::now();
    let mut delay = config.interval;

    loop {
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        if probe().await? == Probe::Ready {
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= config.max_wait {
            return Err(ProvisionError::ReadinessTimeout(format!(
                "{} not ready after {:?}",
                target, elapsed
            )));
        }

        // Never sleep past the deadline; the final probe happens right
        // at max_wait rather than some interval beyond it.
        let nap = delay.min(config.max_wait - elapsed);
        tokio::select! {
            _ = cancel.cancelled() => return Err(ProvisionError::Cancelled),
            _ = sleep(nap) => {}
        }

        delay = (delay * 2).min(config.max_interval);
    }
}
