use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the field free-text conditions are matched against
pub const MESSAGE_FIELD: &str = "message";

/// A single value stored in a log entry
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A string value
    Text(String),
    /// A numeric value, kept in its original textual form
    Number(Number),
    /// A nested mapping of the same shape as the entry itself
    Nested(LogEntry),
}

impl FieldValue {
    /// Textual form used for exact and wildcard matching.
    ///
    /// Nested mappings have no textual form and never match a string value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(n) => Some(n.as_str()),
            FieldValue::Nested(_) => None,
        }
    }

    /// Numeric form used for range matching
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            FieldValue::Text(s) => s.parse::<f64>().ok().filter(|n| n.is_finite()),
            FieldValue::Nested(_) => None,
        }
    }

    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(FieldValue::Text(s)),
            Value::Number(n) => Some(FieldValue::Number(n)),
            Value::Object(map) => Some(FieldValue::Nested(LogEntry::from_map(map))),
            Value::Null | Value::Bool(_) | Value::Array(_) => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Nested(entry) => entry.to_json(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<LogEntry> for FieldValue {
    fn from(entry: LogEntry) -> Self {
        FieldValue::Nested(entry)
    }
}

/// An event under test: a dynamically shaped mapping of field names to values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry {
    fields: BTreeMap<String, FieldValue>,
}

impl LogEntry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for assembling entries by hand
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Walk a dotted path through nested mappings.
    ///
    /// Returns `None` if any segment is missing or an intermediate value is
    /// not itself a mapping.
    pub fn resolve(&self, path: &FieldPath) -> Option<&FieldValue> {
        let (last, parents) = path.segments.split_last()?;
        let mut current = self;
        for segment in parents {
            match current.get(segment)? {
                FieldValue::Nested(inner) => current = inner,
                _ => return None,
            }
        }
        current.get(last)
    }

    /// The `message` field, if it is present and textual
    pub fn message(&self) -> Option<&str> {
        match self.get(MESSAGE_FIELD)? {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Build an entry from a JSON value. Only objects qualify.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from_map(map)),
            _ => None,
        }
    }

    fn from_map(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .filter_map(|(k, v)| FieldValue::from_json(v).map(|v| (k, v)))
            .collect();
        Self { fields }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A dotted field name split into its segments once, ahead of matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(name: &str) -> Self {
        Self {
            segments: name.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
