//! Attribute values and the lenient comparison rules between them.
//!
//! Device payloads and automation records come from different authors:
//! a sensor may report `22.0`, a user may have typed `22` or `"22"`.
//! [`equal`], [`AttributeValue::to_number`] and [`AttributeValue::to_bool`]
//! coerce between representations instead of failing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A flat attribute map, e.g. a device state payload.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single dynamically-typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Arrays and objects, kept verbatim.
    Structured(serde_json::Value),
}

impl AttributeValue {
    /// Whether this value stands for "absent".
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Structured(serde_json::Value::Null))
    }

    /// Coerce to a number.
    ///
    /// Integers, floats and numeric strings succeed; everything else
    /// returns `None`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.parse().ok(),
            Self::Structured(serde_json::Value::Number(n)) => n.as_f64(),
            Self::Null | Self::Bool(_) | Self::Structured(_) => None,
        }
    }

    /// Coerce to a boolean.
    ///
    /// Booleans pass through, numbers are `true` when non-zero, and the
    /// textual forms `true`/`false` (plus `1`/`0`/`t`/`f`) are accepted.
    #[must_use]
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Text(s) => parse_bool(s),
            Self::Null | Self::Structured(_) => None,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Structured(serde_json::Value::Number(n)), Self::Float),
            },
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Lenient equality between two possibly-absent values.
///
/// In order: both absent → equal; one absent → not equal; structurally
/// equal; same textual rendering; same number; same boolean.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn equal(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> bool {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let (a, b) = match (a, b) {
        (None, None) => return true,
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };

    if a == b || a.to_string() == b.to_string() {
        return true;
    }
    if let (Some(x), Some(y)) = (a.to_number(), b.to_number()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.to_bool(), b.to_bool()) {
        return x == y;
    }
    false
}
