//! BDD scenarios for trigger feeds and interface deletion.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ReconcileWorld, reconcile_world};

#[scenario(
    path = "tests/features/trigger_feed.feature",
    name = "Register the feed after creating the trigger"
)]
fn scenario_register_feed(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/trigger_feed.feature",
    name = "Remove the trigger when feed registration fails"
)]
fn scenario_feed_rollback(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/trigger_feed.feature",
    name = "Deregister the feed before deleting the trigger"
)]
fn scenario_feed_deregistration(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/interface_deletion.feature",
    name = "Deleting an absent interface is a no-op"
)]
fn scenario_absent_interface(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/interface_deletion.feature",
    name = "Deletion drains until the interface disappears"
)]
fn scenario_drain(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/interface_deletion.feature",
    name = "Deletion times out while the interface keeps deleting"
)]
fn scenario_drain_timeout(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/interface_deletion.feature",
    name = "A failed interface aborts the deletion"
)]
fn scenario_failed_interface(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}

#[scenario(
    path = "tests/features/interface_deletion.feature",
    name = "A malformed identifier fails before any request"
)]
fn scenario_malformed_identifier(reconcile_world: ReconcileWorld) {
    drop(reconcile_world);
}
