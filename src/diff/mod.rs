//! Change detection between desired and last-known resource state.
//!
//! Scalars and lists compare structurally. Key/value collections compare as
//! maps so a provider that reorders annotations does not trigger an update.
//! A collection that fails to decode counts as changed.

mod key_value;

use std::collections::BTreeSet;

use tracing::warn;

use crate::resource::{FieldValue, ResourceSpec};

pub use key_value::{
    KeyValue, decode_key_values, encode_key_values, key_value_map, normalize_key_values,
    without_key,
};

/// Returns the names of fields whose values differ between `old` and `new`.
///
/// A field present on only one side is reported as changed.
#[must_use]
pub fn changed_fields(old: &ResourceSpec, new: &ResourceSpec) -> BTreeSet<String> {
    let names: BTreeSet<&String> = old.fields().keys().chain(new.fields().keys()).collect();
    names
        .into_iter()
        .filter(|name| !field_equal(old.field(name), new.field(name)))
        .cloned()
        .collect()
}

fn field_equal(old: Option<&FieldValue>, new: Option<&FieldValue>) -> bool {
    match (old, new) {
        (None, None) => true,
        (Some(FieldValue::KeyValues(before)), Some(FieldValue::KeyValues(after))) => {
            is_semantic_json_equal(before, after)
        }
        (Some(before), Some(after)) => before == after,
        _ => false,
    }
}

/// Compares two JSON-encoded key/value arrays as key → value maps.
///
/// Decoding failures are logged and reported as "not equal".
#[must_use]
pub fn is_semantic_json_equal(old_encoded: &str, new_encoded: &str) -> bool {
    if old_encoded == new_encoded {
        return true;
    }
    let decoded = decode_key_values(old_encoded).and_then(|before| {
        decode_key_values(new_encoded).map(|after| (key_value_map(before), key_value_map(after)))
    });
    match decoded {
        Ok((before, after)) => before == after,
        Err(err) => {
            warn!(error = %err, "key/value collection failed to decode; treating as changed");
            false
        }
    }
}

#[cfg(test)]
mod tests;
