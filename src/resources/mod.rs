//! Resource kinds driven by the [`crate::reconciler::Reconciler`].
//!
//! Each kind owns a [`crate::api::Transport`] for its control plane and maps
//! [`ResourceSpec`] fields onto wire requests.

mod cloud_connection;
mod nic;
mod trigger;

use serde::Deserialize;

use crate::diff::{KeyValue, decode_key_values, encode_key_values};
use crate::reconciler::ResourceError;
use crate::resource::{FieldValue, ResourceSpec};

pub use cloud_connection::{CLOUD_CONNECTION_KIND, CloudConnectionApi};
pub use nic::{BARE_METAL_NIC_KIND, BareMetalNicApi, NetworkInterface, NicCommon, SERVER_IDENTITY};
pub use trigger::{FEED_ANNOTATION, FEED_HOOK, TRIGGER_KIND, TriggerApi};

/// `{"id": ...}` reference used by the VPC and Power APIs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Reference {
    /// Referenced resource identifier.
    pub id: String,
}

fn required_str<'a>(spec: &'a ResourceSpec, field: &str) -> Result<&'a str, ResourceError> {
    match spec.str_field(field) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        Some(_) => Err(ResourceError::invalid(field, "must not be empty")),
        None => Err(ResourceError::missing(field)),
    }
}

fn optional_bool(spec: &ResourceSpec, field: &str) -> Result<Option<bool>, ResourceError> {
    spec.field(field)
        .map(|value| {
            value
                .as_bool()
                .ok_or_else(|| ResourceError::invalid(field, "expected a boolean"))
        })
        .transpose()
}

fn key_values(spec: &ResourceSpec, field: &str) -> Result<Vec<KeyValue>, ResourceError> {
    let Some(value) = spec.field(field) else {
        return Ok(Vec::new());
    };
    let encoded = value
        .as_str()
        .ok_or_else(|| ResourceError::invalid(field, "expected a JSON-encoded key/value array"))?;
    decode_key_values(encoded).map_err(|err| ResourceError::invalid(field, err.to_string()))
}

fn encoded_key_values(field: &str, entries: &[KeyValue]) -> Result<FieldValue, ResourceError> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|left, right| left.key.cmp(&right.key));
    encode_key_values(&sorted)
        .map(FieldValue::key_values)
        .map_err(|err| ResourceError::invalid(field, err.to_string()))
}

fn sorted_ids(references: &[Reference]) -> Vec<String> {
    let mut ids: Vec<String> = references.iter().map(|reference| reference.id.clone()).collect();
    ids.sort();
    ids
}
