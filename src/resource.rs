//! Desired and observed resource models shared by every resource kind.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::identifier::ResourceId;

/// A single attribute value.
///
/// Key/value collections (annotations, parameters) travel as JSON-encoded
/// arrays of `{"key", "value"}` objects and are compared semantically by the
/// diff engine; everything else compares structurally.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Plain JSON value (scalar or list).
    Value(Value),
    /// JSON-encoded array of `{"key": string, "value": any}` objects.
    KeyValues(String),
}

impl FieldValue {
    /// Wraps an encoded key/value array.
    #[must_use]
    pub fn key_values(encoded: impl Into<String>) -> Self {
        Self::KeyValues(encoded.into())
    }

    /// Returns the string content of a string value or an encoded array.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(Value::String(text)) | Self::KeyValues(text) => Some(text.as_str()),
            Self::Value(_) => None,
        }
    }

    /// Returns the boolean content, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Value(Value::Bool(flag)) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the integer content, if any.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Value(value) => value.as_u64(),
            Self::KeyValues(_) => None,
        }
    }

    /// Returns the string items of a list value; non-strings are skipped.
    #[must_use]
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            Self::Value(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns the value as plain JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::KeyValues(text) => Value::String(text.clone()),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_owned()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Value(Value::String(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Value(Value::Bool(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Value(Value::from(value))
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::Value(Value::from(value))
    }
}

/// Desired state submitted by the caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceSpec {
    kind: String,
    fields: BTreeMap<String, FieldValue>,
    identity: Vec<(String, String)>,
}

impl ResourceSpec {
    /// Starts an empty spec for `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
            identity: Vec::new(),
        }
    }

    /// Sets a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Adds an identity field, such as the parent server of a child resource.
    #[must_use]
    pub fn with_identity(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.identity.push((name.into(), value.into()));
        self
    }

    /// Resource kind tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// String content of a field.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }

    /// All fields, ordered by name.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Identity field by name.
    #[must_use]
    pub fn identity(&self, name: &str) -> Option<&str> {
        self.identity
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Last observed state of a resource.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ResourceState {
    /// External identifier, possibly composite.
    pub id: ResourceId,
    /// Kind-specific status string (`pending`, `available`, ...).
    pub status: String,
    /// Observed attributes used to repopulate a spec on read.
    pub attributes: BTreeMap<String, FieldValue>,
}

impl ResourceState {
    /// Creates a state with no attributes.
    #[must_use]
    pub fn new(id: ResourceId, status: impl Into<String>) -> Self {
        Self {
            id,
            status: status.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Sets an observed attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builds a spec mirroring the observed attributes.
    #[must_use]
    pub fn to_spec(&self, kind: &str) -> ResourceSpec {
        ResourceSpec {
            kind: kind.to_owned(),
            fields: self.attributes.clone(),
            identity: Vec::new(),
        }
    }
}
