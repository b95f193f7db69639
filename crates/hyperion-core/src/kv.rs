//! Typed key-value attributes shared by log fields, span attributes,
//! and metric attributes.

use std::borrow::Cow;
use std::fmt;

use derive_more::Display;

/// A typed attribute value.
///
/// Attribute values are restricted to the four types every exporter in the
/// ecosystem understands; anything richer is rendered to a string by the
/// caller before attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 string value.
    Str(Cow<'static, str>),
    /// Signed 64-bit integer value.
    I64(i64),
    /// 64-bit floating point value.
    F64(f64),
    /// Boolean value.
    Bool(bool),
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Self::Str(Cow::Borrowed(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Cow::Owned(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::I64(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::I64(i) => write!(f, "{i}"),
            Self::F64(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A key paired with a typed [`Value`].
///
/// Used as a log field, a span attribute, and a metric attribute. The
/// constructors mirror the conventional attribute helpers:
///
/// ```
/// use hyperion_core::kv::KeyValue;
///
/// let attrs = [
///     KeyValue::string("component", "user-service"),
///     KeyValue::int("attempt", 2),
///     KeyValue::float("elapsed_ms", 3.5),
///     KeyValue::bool("cache_hit", false),
/// ];
/// ```
#[must_use]
#[derive(Debug, Clone, PartialEq, Display)]
#[display("{key}={value}")]
pub struct KeyValue {
    /// Attribute key.
    pub key: Cow<'static, str>,
    /// Attribute value.
    pub value: Value,
}

impl KeyValue {
    /// Creates a new [`KeyValue`] from any supported value type.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a string-valued attribute.
    pub fn string(key: impl Into<Cow<'static, str>>, value: impl Into<String>) -> Self {
        Self::new(key, value.into())
    }

    /// Creates an integer-valued attribute.
    pub fn int(key: impl Into<Cow<'static, str>>, value: i64) -> Self {
        Self::new(key, value)
    }

    /// Creates a float-valued attribute.
    pub fn float(key: impl Into<Cow<'static, str>>, value: f64) -> Self {
        Self::new(key, value)
    }

    /// Creates a boolean-valued attribute.
    pub fn bool(key: impl Into<Cow<'static, str>>, value: bool) -> Self {
        Self::new(key, value)
    }
}

#[cfg(test)]
mod test {
    use crate::kv::{KeyValue, Value};

    #[test]
    fn constructors() {
        assert_eq!(KeyValue::int("n", 7).value, Value::I64(7));
        assert_eq!(KeyValue::bool("b", true).value, Value::Bool(true));
        assert_eq!(
            KeyValue::string("s", "x").value,
            Value::Str("x".to_owned().into())
        );
    }

    #[test]
    fn display() {
        let kv = KeyValue::new("component", "user-service");
        assert_eq!(kv.to_string(), "component=user-service");
    }
}
