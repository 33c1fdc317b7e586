// Record - one backend row as an ordered field map
//
// Rows are kept as JSON maps rather than per-collection structs: every
// collection is read-only here and views address fields by name through
// their descriptors.

use crate::error::{LoadError, LoadResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one JSON row, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> LoadResult<Self> {
        match value {
            Value::Object(fields) => Ok(Record { fields }),
            other => Err(LoadError::shape(format!(
                "Row is not an object: {}",
                type_name(&other)
            ))),
        }
    }

    /// Builder used by backends and tests.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// String value of a field; `None` for missing, null or non-string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Boolean value of a field. SQLite-style 0/1 integers count as booleans.
    pub fn flag(&self, field: &str) -> Option<bool> {
        match self.fields.get(field)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// True when the field holds something worth displaying.
    pub fn is_present(&self, field: &str) -> bool {
        match self.fields.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    /// Field value as a display key: strings as-is, other scalars via JSON.
    pub fn key(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Turn a backend payload into records.
///
/// Accepts a bare row array or a `{ "data": [...] }` envelope (the shape the
/// query function returns). `null` means "no rows".
pub fn records_from_payload(payload: Value) -> LoadResult<Vec<Record>> {
    let rows = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        Value::Object(mut envelope) if envelope.contains_key("data") => {
            match envelope.remove("data").unwrap_or(Value::Null) {
                Value::Null => return Ok(Vec::new()),
                Value::Array(rows) => rows,
                _ => return Err(LoadError::shape("Response is not an array")),
            }
        }
        _ => return Err(LoadError::shape("Response is not an array")),
    };

    rows.into_iter().map(Record::from_value).collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
