//! Per-phase wait timings.

use std::time::Duration;

/// Default time allowed for a creation to settle.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default time allowed for an update to settle.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default time allowed for a deletion to drain.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Default pause between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Default floor on the pause between polls.
pub const DEFAULT_MIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Wait timings applied by a [`super::Reconciler`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timeouts {
    /// Deadline for creation (including any job).
    pub create: Duration,
    /// Deadline for an update to settle.
    pub update: Duration,
    /// Deadline for deletion to drain.
    pub delete: Duration,
    /// Pause between polls.
    pub poll_interval: Duration,
    /// Floor on the pause between polls.
    pub min_timeout: Duration,
    /// Pause before the first poll.
    pub delay: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_CREATE_TIMEOUT,
            update: DEFAULT_UPDATE_TIMEOUT,
            delete: DEFAULT_DELETE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_timeout: DEFAULT_MIN_TIMEOUT,
            delay: Duration::ZERO,
        }
    }
}
