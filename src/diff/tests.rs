//! Unit tests for the diff engine.

use std::collections::BTreeSet;

use rstest::{fixture, rstest};
use serde_json::json;

use super::{changed_fields, is_semantic_json_equal, normalize_key_values};
use crate::resource::{FieldValue, ResourceSpec};

#[fixture]
fn trigger_spec() -> ResourceSpec {
    ResourceSpec::new("function_trigger")
        .with_field("name", "mytrigger")
        .with_field(
            "annotations",
            FieldValue::key_values(r#"[{"key":"a","value":1},{"key":"b","value":2}]"#),
        )
        .with_field("publish", false)
}

#[test]
fn reordered_key_values_are_equal() {
    assert!(is_semantic_json_equal(
        r#"[{"key":"a","value":1},{"key":"b","value":2}]"#,
        r#"[{"key":"b","value":2},{"key":"a","value":1}]"#,
    ));
}

#[rstest]
#[case(r#"[{"key":"b","value":3},{"key":"a","value":1}]"#)]
#[case(r#"[{"key":"a","value":1}]"#)]
#[case(r#"[{"key":"a","value":"1"},{"key":"b","value":2}]"#)]
fn value_changes_break_equality(#[case] changed: &str) {
    assert!(!is_semantic_json_equal(
        r#"[{"key":"a","value":1},{"key":"b","value":2}]"#,
        changed,
    ));
}

#[rstest]
#[case("not json", "[]")]
#[case("[]", r#"{"key":"a"}"#)]
fn undecodable_input_counts_as_changed(#[case] old: &str, #[case] new: &str) {
    assert!(!is_semantic_json_equal(old, new));
}

#[rstest]
fn identical_specs_have_no_changes(trigger_spec: ResourceSpec) {
    assert!(changed_fields(&trigger_spec, &trigger_spec.clone()).is_empty());
}

#[rstest]
fn reordered_annotations_are_not_a_change(trigger_spec: ResourceSpec) {
    let reordered = trigger_spec.clone().with_field(
        "annotations",
        FieldValue::key_values(r#"[{"key":"b","value":2},{"key":"a","value":1}]"#),
    );
    assert!(changed_fields(&trigger_spec, &reordered).is_empty());
}

#[rstest]
fn reports_changed_added_and_removed_fields(trigger_spec: ResourceSpec) {
    let new = ResourceSpec::new("function_trigger")
        .with_field("name", "renamed")
        .with_field(
            "annotations",
            FieldValue::key_values(r#"[{"key":"a","value":1},{"key":"b","value":2}]"#),
        )
        .with_field("parameters", FieldValue::key_values("[]"));

    let expected: BTreeSet<String> = ["name", "parameters", "publish"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    assert_eq!(changed_fields(&trigger_spec, &new), expected);
}

#[test]
fn list_order_matters_for_plain_values() {
    let old = ResourceSpec::new("nic").with_field("security_groups", json!(["sg-1", "sg-2"]));
    let new = ResourceSpec::new("nic").with_field("security_groups", json!(["sg-2", "sg-1"]));
    assert_eq!(
        changed_fields(&old, &new),
        BTreeSet::from([String::from("security_groups")])
    );
}

#[test]
fn normalize_sorts_entries_by_key() {
    let normalized = normalize_key_values(r#"[{"key":"z","value":true},{"key":"a","value":null}]"#)
        .unwrap_or_else(|err| panic!("valid input should normalise: {err}"));
    assert_eq!(
        normalized,
        r#"[{"key":"a","value":null},{"key":"z","value":true}]"#
    );
}
