//! Poll observable page state until a condition holds or a deadline passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::ports::ScrapeError;

/// Deadline and cadence of a bounded wait.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Longest time to keep polling.
    pub timeout: Duration,
    /// Pause between two probes.
    pub interval: Duration,
}

impl WaitPolicy {
    /// Build a policy from millisecond values.
    #[must_use]
    pub fn from_millis(timeout_ms: u64, interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }
}

/// Run `probe` until it yields a value.
///
/// The probe decides between three outcomes: `Ok(Some(_))` ends the wait,
/// `Ok(None)` keeps polling, and `Err(_)` aborts immediately. Racing
/// conditions are expressed by checking all of them inside one probe.
///
/// # Errors
///
/// Returns the probe's error, or [`ScrapeError::Timeout`] naming `stage`
/// once the policy's timeout has elapsed.
pub async fn poll_until<T, F, Fut>(
    stage: &str,
    policy: WaitPolicy,
    mut probe: F,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ScrapeError>>,
{
    let deadline = Instant::now() + policy.timeout;

    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(ScrapeError::Timeout {
                stage: stage.to_owned(),
                waited: policy.timeout,
            });
        }
        sleep(policy.interval).await;
    }
}
