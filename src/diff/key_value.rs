//! Wire format for key/value collections (annotations and parameters).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `{"key": string, "value": any}` entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyValue {
    /// Entry key.
    pub key: String,
    /// Arbitrary JSON value.
    pub value: Value,
}

impl KeyValue {
    /// Creates an entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Decodes a JSON array of key/value entries. An empty string decodes to an
/// empty collection.
///
/// # Errors
///
/// Returns the `serde_json` error when the input is not such an array.
pub fn decode_key_values(encoded: &str) -> Result<Vec<KeyValue>, serde_json::Error> {
    if encoded.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(encoded)
}

/// Encodes entries as a JSON array.
///
/// # Errors
///
/// Returns the `serde_json` error when serialisation fails.
pub fn encode_key_values(entries: &[KeyValue]) -> Result<String, serde_json::Error> {
    serde_json::to_string(entries)
}

/// Collapses entries into a key → value map; later duplicates win.
#[must_use]
pub fn key_value_map(entries: Vec<KeyValue>) -> BTreeMap<String, Value> {
    entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect()
}

/// Re-encodes `encoded` with entries sorted by key so equal collections
/// serialise identically.
///
/// # Errors
///
/// Returns the `serde_json` error when the input cannot be decoded.
pub fn normalize_key_values(encoded: &str) -> Result<String, serde_json::Error> {
    let entries: Vec<KeyValue> = key_value_map(decode_key_values(encoded)?)
        .into_iter()
        .map(|(key, value)| KeyValue { key, value })
        .collect();
    encode_key_values(&entries)
}

/// Returns the entries whose key differs from `key`.
#[must_use]
pub fn without_key(entries: Vec<KeyValue>, key: &str) -> Vec<KeyValue> {
    entries.into_iter().filter(|entry| entry.key != key).collect()
}
