//! Unit tests for the wait module.

use super::*;
use rstest::{fixture, rstest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted = Arc<Mutex<VecDeque<Result<Observed<u32>, ApiError>>>>;

/// Refresh double that replays a fixed sequence and counts calls. Once the
/// script is exhausted the last status keeps repeating.
#[derive(Clone, Default)]
struct ScriptedRefresh {
    script: Scripted,
    calls: Arc<Mutex<u32>>,
}

impl ScriptedRefresh {
    fn new(outcomes: Vec<Result<Observed<u32>, ApiError>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(outcomes.into())),
            calls: Arc::default(),
        }
    }

    async fn tick(&self) -> Result<Observed<u32>, ApiError> {
        *self.calls.lock().expect("calls lock") += 1;
        let mut script = self.script.lock().expect("script lock");
        if script.len() > 1 {
            return script.pop_front().expect("non-empty script");
        }
        script.front().cloned().expect("script must not be empty")
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().expect("calls lock")
    }
}

fn status(value: &str) -> Result<Observed<u32>, ApiError> {
    Ok(Observed::new(value, 7))
}

fn not_found() -> Result<Observed<u32>, ApiError> {
    Err(ApiError::NotFound {
        resource: String::from("/things/1"),
    })
}

#[fixture]
fn settle() -> WaitSpec {
    WaitSpec::builder(WaitPolicy::Settle)
        .pending(["pending"])
        .target(["available"])
        .failure(["failed"])
        .timeout(Duration::from_secs(60))
        .poll_interval(Duration::from_secs(10))
        .min_timeout(Duration::from_secs(10))
        .delay(Duration::ZERO)
        .build()
        .expect("valid settle spec")
}

#[fixture]
fn drain() -> WaitSpec {
    WaitSpec::builder(WaitPolicy::Drain)
        .pending(["deleting"])
        .target(["deleted"])
        .failure(["failed"])
        .timeout(Duration::from_secs(60))
        .poll_interval(Duration::from_secs(10))
        .min_timeout(Duration::from_secs(10))
        .delay(Duration::ZERO)
        .build()
        .expect("valid drain spec")
}

#[rstest]
#[case("available", WaitState::Target)]
#[case("pending", WaitState::Pending)]
#[case("failed", WaitState::Failure)]
#[case("", WaitState::Failure)]
#[case("rebooting", WaitState::Failure)]
fn classify_maps_statuses(settle: WaitSpec, #[case] observed: &str, #[case] expected: WaitState) {
    assert_eq!(settle.classify(observed), expected);
}

#[rstest]
fn validate_rejects_zero_timeout(settle: WaitSpec) {
    let spec = WaitSpec {
        timeout: Duration::ZERO,
        ..settle
    };
    assert_eq!(spec.validate(), Err(WaitSpecError::ZeroTimeout));
}

#[rstest]
fn validate_rejects_zero_interval(settle: WaitSpec) {
    let spec = WaitSpec {
        poll_interval: Duration::ZERO,
        min_timeout: Duration::ZERO,
        ..settle
    };
    assert_eq!(spec.validate(), Err(WaitSpecError::ZeroInterval));
}

#[test]
fn validate_rejects_overlapping_sets() {
    let err = WaitSpec::builder(WaitPolicy::Settle)
        .pending(["available"])
        .target(["available"])
        .build()
        .expect_err("overlap must be rejected");
    assert_eq!(
        err,
        WaitSpecError::OverlappingStatus {
            status: String::from("available"),
        }
    );
}

#[test]
fn interval_uses_min_timeout_as_floor() {
    let spec = WaitSpec::builder(WaitPolicy::Settle)
        .target(["ok"])
        .poll_interval(Duration::from_secs(2))
        .min_timeout(Duration::from_secs(5))
        .build()
        .expect("valid spec");
    assert_eq!(spec.interval(), Duration::from_secs(5));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn settle_polls_until_target(settle: WaitSpec) {
    let refresh = ScriptedRefresh::new(vec![
        not_found(),
        status("pending"),
        status("pending"),
        status("available"),
    ]);
    let started = tokio::time::Instant::now();

    let settled = wait_for(&settle, "thing 1", || refresh.tick())
        .await
        .expect("wait should settle");

    assert_eq!(settled, Settled::Reached(Observed::new("available", 7)));
    assert_eq!(refresh.calls(), 4);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn unbounded_timeout_still_polls_to_target() {
    let spec = WaitSpec::builder(WaitPolicy::Settle)
        .pending(["pending"])
        .target(["available"])
        .timeout(Duration::from_secs(u64::MAX))
        .poll_interval(Duration::from_secs(10))
        .min_timeout(Duration::from_secs(10))
        .build()
        .expect("huge timeouts are valid");
    let refresh = ScriptedRefresh::new(vec![status("pending"), status("available")]);
    let started = tokio::time::Instant::now();

    let settled = wait_for(&spec, "thing 1", || refresh.tick())
        .await
        .expect("wait should settle");

    assert_eq!(settled, Settled::Reached(Observed::new("available", 7)));
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn drain_returns_on_first_not_found(drain: WaitSpec) {
    let refresh = ScriptedRefresh::new(vec![not_found()]);

    let settled = wait_for(&drain, "thing 1", || refresh.tick())
        .await
        .expect("wait should drain");

    assert_eq!(settled, Settled::Gone);
    assert_eq!(refresh.calls(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn drain_accepts_deleted_status(drain: WaitSpec) {
    let refresh = ScriptedRefresh::new(vec![status("deleting"), status("deleted")]);

    let settled = wait_for(&drain, "thing 1", || refresh.tick())
        .await
        .expect("wait should drain");

    assert_eq!(settled.into_value(), Some(7));
    assert_eq!(refresh.calls(), 2);
}

#[rstest]
#[case::declared_failure("failed")]
#[case::empty_status("")]
#[case::unexpected_status("rebooting")]
#[tokio::test(start_paused = true)]
async fn failure_statuses_abort(settle: WaitSpec, #[case] observed: &str) {
    let refresh = ScriptedRefresh::new(vec![status("pending"), status(observed)]);

    let err = wait_for(&settle, "thing 1", || refresh.tick())
        .await
        .expect_err("wait should fail");

    assert_eq!(
        err,
        WaitError::Failed {
            status: observed.to_owned(),
        }
    );
    assert_eq!(refresh.calls(), 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timeout_reports_last_status(settle: WaitSpec) {
    let refresh = ScriptedRefresh::new(vec![status("pending")]);
    let started = tokio::time::Instant::now();

    let err = wait_for(&settle, "thing 1", || refresh.tick())
        .await
        .expect_err("wait should time out");

    assert_eq!(err.last_status(), Some("pending"));
    assert!(matches!(err, WaitError::Timeout { timeout, .. } if timeout == Duration::from_secs(60)));
    assert_eq!(started.elapsed(), Duration::from_secs(60));
    assert_eq!(refresh.calls(), 7);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timeout_without_any_status_reports_not_found(settle: WaitSpec) {
    let refresh = ScriptedRefresh::new(vec![not_found()]);

    let err = wait_for(&settle, "thing 1", || refresh.tick())
        .await
        .expect_err("wait should time out");

    assert_eq!(err.last_status(), None);
    assert!(err.to_string().contains("last status: not found"), "{err}");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn transport_error_aborts_without_retry(settle: WaitSpec) {
    let refresh = ScriptedRefresh::new(vec![
        Err(ApiError::Transport {
            message: String::from("connection reset"),
        }),
        status("available"),
    ]);

    let err = wait_for(&settle, "thing 1", || refresh.tick())
        .await
        .expect_err("transport error should abort");

    assert!(matches!(err, WaitError::Refresh(ref source) if matches!(**source, ApiError::Transport { .. })));
    assert_eq!(refresh.calls(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn delay_defers_first_poll(settle: WaitSpec) {
    let spec = WaitSpec {
        delay: Duration::from_secs(5),
        ..settle
    };
    let refresh = ScriptedRefresh::new(vec![status("available")]);
    let started = tokio::time::Instant::now();

    wait_for(&spec, "thing 1", || refresh.tick())
        .await
        .expect("wait should settle");

    assert_eq!(started.elapsed(), Duration::from_secs(5));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn invalid_spec_never_refreshes(settle: WaitSpec) {
    let spec = WaitSpec {
        timeout: Duration::ZERO,
        ..settle
    };
    let refresh = ScriptedRefresh::new(vec![status("available")]);

    let err = wait_for(&spec, "thing 1", || refresh.tick())
        .await
        .expect_err("invalid spec");

    assert_eq!(err, WaitError::Spec(WaitSpecError::ZeroTimeout));
    assert_eq!(refresh.calls(), 0);
}
