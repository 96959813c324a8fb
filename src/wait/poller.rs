//! The polling loop.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::api::ApiError;

use super::{Observed, Settled, WaitError, WaitPolicy, WaitSpec, WaitState};

/// Deadline offset used when the configured timeout does not fit an
/// `Instant`. Roughly thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Polls `refresh` until `spec` reports a terminal state or its timeout
/// elapses.
///
/// `refresh` performs one read and returns the observed status. A
/// [`ApiError::NotFound`] result is interpreted through [`WaitSpec::policy`];
/// any other error aborts the wait immediately. Refresh runs at least once,
/// and a tick in progress always completes before the deadline is checked.
///
/// # Errors
///
/// Returns [`WaitError::Failed`] on a failure status,
/// [`WaitError::Timeout`] when the deadline passes, [`WaitError::Refresh`]
/// on a transport error, and [`WaitError::Spec`] for an invalid spec.
pub async fn wait_for<T, F, Fut>(
    spec: &WaitSpec,
    subject: &str,
    mut refresh: F,
) -> Result<Settled<T>, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observed<T>, ApiError>>,
{
    spec.validate()?;
    let deadline = deadline_after(Instant::now(), spec.timeout);
    if !spec.delay.is_zero() {
        sleep(spec.delay).await;
    }

    let mut last_status: Option<String> = None;
    let mut ticks: u32 = 0;
    loop {
        ticks = ticks.saturating_add(1);
        match refresh().await {
            Ok(observed) => match spec.classify(&observed.status) {
                WaitState::Target => {
                    debug!(subject, status = %observed.status, ticks, "wait reached target");
                    return Ok(Settled::Reached(observed));
                }
                WaitState::Failure => {
                    if !spec.failure.contains(&observed.status) {
                        warn!(subject, status = %observed.status, "unexpected status while waiting");
                    }
                    return Err(WaitError::Failed {
                        status: observed.status,
                    });
                }
                WaitState::Pending => {
                    debug!(subject, status = %observed.status, ticks, "still pending");
                    last_status = Some(observed.status);
                }
            },
            Err(err) if err.is_not_found() => match spec.policy {
                WaitPolicy::Drain => {
                    debug!(subject, ticks, "resource gone");
                    return Ok(Settled::Gone);
                }
                WaitPolicy::Settle => {
                    debug!(subject, ticks, "not visible yet");
                }
            },
            Err(err) => return Err(WaitError::Refresh(Box::new(err))),
        }

        // The deadline is only checked between ticks.
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::Timeout {
                timeout: spec.timeout,
                last_status,
            });
        }
        sleep(spec.interval().min(deadline - now)).await;
    }
}

fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}
