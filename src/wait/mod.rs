//! Bounded polling against eventually-consistent APIs.
//!
//! A [`WaitSpec`] describes which observed statuses are still pending, which
//! are the goal and which are terminal failures. [`wait_for`] drives a
//! refresh function until one of those terminal outcomes is observed or the
//! deadline passes. Polls are fixed-interval; there is no backoff.

mod poller;

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;

pub use poller::wait_for;

/// How a not-found refresh result is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitPolicy {
    /// Waiting for availability: absence means "not yet visible", so it is
    /// pending.
    Settle,
    /// Waiting for deletion: absence is the goal.
    Drain,
}

/// Classification of one observed status.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitState {
    /// Keep polling.
    Pending,
    /// Goal reached.
    Target,
    /// Terminal failure.
    Failure,
}

/// One successful refresh: the status string and the value it came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Observed<T> {
    /// Status reported by the API.
    pub status: String,
    /// Value read from the API.
    pub value: T,
}

impl<T> Observed<T> {
    /// Pairs a status with its value.
    pub fn new(status: impl Into<String>, value: T) -> Self {
        Self {
            status: status.into(),
            value,
        }
    }
}

/// Successful end of a wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Settled<T> {
    /// A target status was observed.
    Reached(Observed<T>),
    /// The resource disappeared while draining.
    Gone,
}

impl<T> Settled<T> {
    /// Returns the observed value, if the wait ended on a status.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Reached(observed) => Some(observed.value),
            Self::Gone => None,
        }
    }
}

/// Reasons a [`WaitSpec`] is rejected before polling starts.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WaitSpecError {
    /// The timeout is zero.
    #[error("wait timeout must be greater than zero")]
    ZeroTimeout,
    /// Neither the poll interval nor the minimum timeout is positive.
    #[error("poll interval and minimum timeout must not both be zero")]
    ZeroInterval,
    /// A status appears in more than one set.
    #[error("status {status:?} appears in more than one status set")]
    OverlappingStatus {
        /// Offending status.
        status: String,
    },
}

/// Errors returned by [`wait_for`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WaitError {
    /// A failure status (or an empty or unexpected status) was observed.
    #[error("entered failure state {status:?}")]
    Failed {
        /// Last observed status.
        status: String,
    },
    /// The deadline passed before a terminal status was observed.
    #[error("timed out after {}s (last status: {})", .timeout.as_secs(), LastStatus(.last_status.as_deref()))]
    Timeout {
        /// Configured timeout.
        timeout: Duration,
        /// Last observed status; `None` when nothing was visible yet.
        last_status: Option<String>,
    },
    /// The refresh function failed with something other than not-found.
    #[error("refresh failed: {0}")]
    Refresh(Box<ApiError>),
    /// The [`WaitSpec`] was rejected by [`WaitSpec::validate`].
    #[error("invalid wait specification: {0}")]
    Spec(#[from] WaitSpecError),
}

impl WaitError {
    /// Last status observed before the wait ended, if any.
    #[must_use]
    pub fn last_status(&self) -> Option<&str> {
        match self {
            Self::Failed { status } => Some(status),
            Self::Timeout { last_status, .. } => last_status.as_deref(),
            Self::Refresh(_) | Self::Spec(_) => None,
        }
    }
}

struct LastStatus<'a>(Option<&'a str>);

impl fmt::Display for LastStatus<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(status) => write!(f, "{status:?}"),
            None => f.write_str("not found"),
        }
    }
}

/// Parameters for one wait.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WaitSpec {
    /// Statuses that mean "keep polling".
    pub pending: BTreeSet<String>,
    /// Statuses that end the wait successfully.
    pub target: BTreeSet<String>,
    /// Statuses that end the wait with [`WaitError::Failed`].
    pub failure: BTreeSet<String>,
    /// Not-found interpretation.
    pub policy: WaitPolicy,
    /// Overall deadline, measured from the start of the wait.
    pub timeout: Duration,
    /// Pause between polls.
    pub poll_interval: Duration,
    /// Floor applied to the pause between polls.
    pub min_timeout: Duration,
    /// Pause before the first poll.
    pub delay: Duration,
}

impl WaitSpec {
    /// Starts a builder with the given policy.
    #[must_use]
    pub fn builder(policy: WaitPolicy) -> WaitSpecBuilder {
        WaitSpecBuilder::new(policy)
    }

    /// Checks the invariants: positive timeout, a positive pause between
    /// polls, and pairwise disjoint status sets.
    ///
    /// # Errors
    ///
    /// Returns the first [`WaitSpecError`] found.
    pub fn validate(&self) -> Result<(), WaitSpecError> {
        if self.timeout.is_zero() {
            return Err(WaitSpecError::ZeroTimeout);
        }
        if self.interval().is_zero() {
            return Err(WaitSpecError::ZeroInterval);
        }
        let overlap = self
            .pending
            .intersection(&self.target)
            .chain(self.pending.intersection(&self.failure))
            .chain(self.target.intersection(&self.failure))
            .next();
        if let Some(status) = overlap {
            return Err(WaitSpecError::OverlappingStatus {
                status: status.clone(),
            });
        }
        Ok(())
    }

    /// Effective pause between polls.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.poll_interval.max(self.min_timeout)
    }

    /// Classifies an observed status. Empty and unrecognised statuses are
    /// failures.
    #[must_use]
    pub fn classify(&self, status: &str) -> WaitState {
        if status.is_empty() || self.failure.contains(status) {
            WaitState::Failure
        } else if self.target.contains(status) {
            WaitState::Target
        } else if self.pending.contains(status) {
            WaitState::Pending
        } else {
            WaitState::Failure
        }
    }
}

/// Builder for [`WaitSpec`].
#[derive(Clone, Debug)]
pub struct WaitSpecBuilder {
    spec: WaitSpec,
}

impl WaitSpecBuilder {
    /// Creates a builder with empty status sets and the default timings of
    /// [`crate::reconciler::Timeouts`] for creation.
    #[must_use]
    pub fn new(policy: WaitPolicy) -> Self {
        let timeouts = crate::reconciler::Timeouts::default();
        Self {
            spec: WaitSpec {
                pending: BTreeSet::new(),
                target: BTreeSet::new(),
                failure: BTreeSet::new(),
                policy,
                timeout: timeouts.create,
                poll_interval: timeouts.poll_interval,
                min_timeout: timeouts.min_timeout,
                delay: timeouts.delay,
            },
        }
    }

    /// Adds pending statuses.
    #[must_use]
    pub fn pending<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.pending.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Adds target statuses.
    #[must_use]
    pub fn target<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.target.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Adds failure statuses.
    #[must_use]
    pub fn failure<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.failure.extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Sets the overall timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = timeout;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.spec.poll_interval = interval;
        self
    }

    /// Sets the minimum pause between polls.
    #[must_use]
    pub const fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.spec.min_timeout = min_timeout;
        self
    }

    /// Sets the pause before the first poll.
    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.spec.delay = delay;
        self
    }

    /// Validates and returns the [`WaitSpec`].
    ///
    /// # Errors
    ///
    /// See [`WaitSpec::validate`].
    pub fn build(self) -> Result<WaitSpec, WaitSpecError> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}

#[cfg(test)]
mod tests;
