//! BDD step definitions for reconciliation scenarios.

use converge::{FieldValue, ResourceSpec, TRIGGER_KIND};
use rstest_bdd_macros::{given, then, when};
use serde_json::json;

use super::test_helpers::{FEED, ReconcileWorld, block_on, nic_json, trigger_json};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a trigger with an alarm feed")]
fn trigger_with_feed(reconcile_world: &ReconcileWorld) {
    let spec = ResourceSpec::new(TRIGGER_KIND)
        .with_field("name", "ticker")
        .with_field("feed", FEED)
        .with_field(
            "feed_parameters",
            FieldValue::key_values(r#"[{"key":"cron","value":"*/5 * * * *"}]"#),
        );
    reconcile_world.spec.replace(Some(spec));
}

#[given("the trigger store accepts the trigger")]
fn trigger_store_accepts(reconcile_world: &ReconcileWorld) {
    reconcile_world
        .transport
        .push_ok(&trigger_json(json!([{"key": "feed", "value": FEED}])));
}

#[given("the trigger store holds the trigger with its feed")]
fn trigger_store_holds_trigger(reconcile_world: &ReconcileWorld) {
    trigger_store_accepts(reconcile_world);
}

#[given("the trigger store accepts the deletion")]
fn trigger_store_accepts_deletion(reconcile_world: &ReconcileWorld) {
    reconcile_world.transport.push_ok(&json!({}));
}

#[given("the feed action accepts the lifecycle event")]
fn feed_accepts(reconcile_world: &ReconcileWorld) {
    reconcile_world
        .transport
        .push_ok(&json!({"activationId": "0123456789abcdef"}));
}

#[given("the feed action fails with status \"{status}\"")]
fn feed_fails(reconcile_world: &ReconcileWorld, status: u16) {
    reconcile_world
        .transport
        .push_json(status, &json!({"error": "feed provider unavailable"}));
}

#[given("the interface reports \"{status}\"")]
fn interface_reports(reconcile_world: &ReconcileWorld, status: String) {
    reconcile_world.transport.push_ok(&nic_json(&status));
}

#[given("the interface keeps reporting \"{status}\"")]
fn interface_keeps_reporting(reconcile_world: &ReconcileWorld, status: String) {
    for _ in 0..10 {
        reconcile_world.transport.push_ok(&nic_json(&status));
    }
}

#[given("the interface is not found")]
fn interface_not_found(reconcile_world: &ReconcileWorld) {
    reconcile_world.transport.push_not_found();
}

#[given("the interface deletion is accepted")]
fn interface_deletion_accepted(reconcile_world: &ReconcileWorld) {
    reconcile_world.transport.push_status(204);
}

#[when("I create the trigger")]
fn create_trigger(reconcile_world: &ReconcileWorld) -> Result<(), StepError> {
    let spec = reconcile_world
        .spec
        .borrow()
        .clone()
        .ok_or_else(|| StepError::Assertion(String::from("no trigger spec given")))?;
    let reconciler = reconcile_world.triggers();
    let outcome = block_on(async { reconciler.create(&spec).await.map(|_| ()) });
    reconcile_world.record(outcome);
    Ok(())
}

#[when("I delete the trigger")]
fn delete_trigger(reconcile_world: &ReconcileWorld) {
    let reconciler = reconcile_world.triggers();
    let outcome = block_on(async {
        let id = reconciler.parse_id("_/ticker")?;
        reconciler.delete(&id).await
    });
    reconcile_world.record(outcome);
}

#[when("I delete interface \"{id}\"")]
fn delete_interface(reconcile_world: &ReconcileWorld, id: String) {
    let reconciler = reconcile_world.interfaces();
    let outcome = block_on(async {
        let parsed = reconciler.parse_id(&id)?;
        reconciler.delete(&parsed).await
    });
    reconcile_world.record(outcome);
}

#[then("the operation succeeds")]
fn operation_succeeds(reconcile_world: &ReconcileWorld) -> Result<(), StepError> {
    match &*reconcile_world.outcome.borrow() {
        Some(Ok(())) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the operation fails in phase \"{phase}\"")]
fn operation_fails_in_phase(reconcile_world: &ReconcileWorld, phase: String) -> Result<(), StepError> {
    let outcome = reconcile_world.outcome.borrow();
    let Some(Err(err)) = &*outcome else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if err.phase() == phase {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected phase {phase}, got {} ({err})",
            err.phase()
        )))
    }
}

#[then("the last status is \"{status}\"")]
fn last_status_is(reconcile_world: &ReconcileWorld, status: String) -> Result<(), StepError> {
    let outcome = reconcile_world.outcome.borrow();
    let observed = match &*outcome {
        Some(Err(err)) => err.last_status().map(str::to_owned),
        _ => None,
    };
    if observed.as_deref() == Some(status.as_str()) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected last status {status}, got {observed:?}"
        )))
    }
}

#[then("the requests are \"{lines}\"")]
fn requests_are(reconcile_world: &ReconcileWorld, lines: String) -> Result<(), StepError> {
    let expected: Vec<&str> = lines.split(", ").collect();
    let observed = reconcile_world.transport.request_lines();
    if observed == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected requests {expected:?}, got {observed:?}"
        )))
    }
}

#[then("\"{count}\" requests were sent")]
fn request_count(reconcile_world: &ReconcileWorld, count: usize) -> Result<(), StepError> {
    let observed = reconcile_world.transport.requests().len();
    if observed == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} requests, got {observed}"
        )))
    }
}
