use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Results accumulated by a context, keyed by step name
pub type StepSets = HashMap<String, DataPacket>;

/// Represents a packet of data flowing through the system
///
/// This is a wrapper around a JSON value: a step result, a row set, or an
/// error payload reported by a backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DataPacket {
    /// The inner JSON value
    pub value: Value,
}

impl DataPacket {
    /// Create a new data packet from a JSON value
    #[inline]
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Create a null data packet
    #[inline]
    pub fn null() -> Self {
        Self { value: Value::Null }
    }

    /// Get the inner JSON value
    #[inline]
    pub fn as_value(&self) -> &Value {
        &self.value
    }

    /// Take ownership of the inner JSON value
    #[inline]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Check if the data packet is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Try to convert the data packet to a string
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// First row of a row set.
    ///
    /// Arrays yield their first element (or null when empty); any other value
    /// is returned as is.
    pub fn first_row(&self) -> DataPacket {
        match &self.value {
            Value::Array(rows) => rows.first().cloned().map(Self::new).unwrap_or_else(Self::null),
            other => Self::new(other.clone()),
        }
    }

    /// Create a data packet from a string or string reference
    #[inline]
    pub fn from_string(s: &str) -> Self {
        Self::new(Value::String(s.to_string()))
    }
}

impl From<Value> for DataPacket {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Invocation options for a single step
///
/// A step is identified by name and carries at most one of a literal query,
/// a prepared statement or a stored procedure, plus its parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOptions {
    /// Literal query text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Prepared statement text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepared_sql: Option<String>,

    /// Stored procedure name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,

    /// Statement parameters
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl StepOptions {
    /// Options without any statement
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a literal query
    pub fn query(sql: impl Into<String>) -> Self {
        Self {
            query: Some(sql.into()),
            ..Self::default()
        }
    }

    /// Options for a prepared statement
    pub fn prepared(sql: impl Into<String>) -> Self {
        Self {
            prepared_sql: Some(sql.into()),
            ..Self::default()
        }
    }

    /// Options for a stored procedure call
    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            procedure: Some(name.into()),
            ..Self::default()
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, name: &str, value: Value) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Statement texts in lookup order: query, prepared statement, procedure
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        [&self.query, &self.prepared_sql, &self.procedure]
            .into_iter()
            .filter_map(|s| s.as_deref())
    }
}
