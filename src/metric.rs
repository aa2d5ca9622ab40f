use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Tag set of a metric. Keys are unique; order carries no meaning.
pub type Tags = BTreeMap<String, String>;

/// Field (value) set of a metric.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single field value as understood by the time-series database.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

/// One timestamped observation, ready for the writer.
/// This is what the builder produces and the tags middleware rewrites.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    /// Measurement name, e.g. "axum"
    pub name: String,
    pub tags: Tags,
    pub fields: Fields,
    /// Epoch time in the configured write precision
    pub timestamp: i64,
}

impl Metric {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

impl FieldValue {
    /// Converts a JSON payload value. Arrays, objects and nulls have no
    /// field representation and yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_u64().map(|u| Self::Integer(u.min(i64::MAX as u64) as i64)))
                .or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Integer(v.min(i64::MAX as u64) as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

/// Renders a JSON scalar as a tag value. Non-scalars are rejected.
pub(crate) fn tag_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
