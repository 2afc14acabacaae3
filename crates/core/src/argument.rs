//! Structured argument values.
//!
//! [`ArgumentValue`] is the canonical representation for tool-call arguments
//! and tool schemas. It is a closed union: there is no `null` and no opaque
//! variant, so every value a tool receives has a known shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ArgumentError;

/// A JSON-shaped value without `null`.
///
/// Serializes untagged, so an `ArgumentValue` reads and writes as plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Boolean(bool),
    Integer(i64),
    /// Always finite when built through the provided conversions. A NaN or
    /// infinity placed here directly serializes as `null` and will not read
    /// back.
    Float(f64),
    String(String),
    Array(Vec<ArgumentValue>),
    Object(BTreeMap<String, ArgumentValue>),
}

impl ArgumentValue {
    /// Build an object from key/value pairs.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<ArgumentValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// An empty object, the usual shape for "no arguments".
    pub fn empty_object() -> Self {
        Self::Object(BTreeMap::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ArgumentValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, ArgumentValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is an object.
    pub fn get(&self, key: &str) -> Option<&ArgumentValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    fn from_json(value: serde_json::Value, path: &str) -> Result<Self, ArgumentError> {
        use serde_json::Value;

        match value {
            Value::Null => Err(ArgumentError::Null {
                path: path.to_string(),
            }),
            Value::Bool(b) => Ok(Self::Boolean(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Integer(i))
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() => Ok(Self::Float(f)),
                        _ => Err(ArgumentError::UnrepresentableNumber(n.to_string())),
                    }
                }
            }
            Value::String(s) => Ok(Self::String(s)),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Self::from_json(item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let child = Self::from_json(v, &format!("{path}.{k}"))?;
                    Ok((k, child))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Object),
        }
    }
}

impl TryFrom<serde_json::Value> for ArgumentValue {
    type Error = ArgumentError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json(value, "$")
    }
}

impl From<ArgumentValue> for serde_json::Value {
    fn from(value: ArgumentValue) -> Self {
        match value {
            ArgumentValue::Boolean(b) => Self::Bool(b),
            ArgumentValue::Integer(i) => Self::from(i),
            // Non-finite floats have no JSON form
            ArgumentValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Self::Number)
                .unwrap_or(Self::Null),
            ArgumentValue::String(s) => Self::String(s),
            ArgumentValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            ArgumentValue::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<bool> for ArgumentValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ArgumentValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ArgumentValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl TryFrom<f64> for ArgumentValue {
    type Error = ArgumentError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() {
            Ok(Self::Float(value))
        } else {
            Err(ArgumentError::UnrepresentableNumber(value.to_string()))
        }
    }
}

impl From<&str> for ArgumentValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ArgumentValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<ArgumentValue>> for ArgumentValue {
    fn from(value: Vec<ArgumentValue>) -> Self {
        Self::Array(value)
    }
}

impl std::fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::Value::from(self.clone());
        write!(f, "{json}")
    }
}
