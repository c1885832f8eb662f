//! Converter options.
//!
//! Converters take a flat bag of scalar options alongside the input
//! bytes. Unknown keys are ignored by convention.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A scalar option value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

/// Options handed to a converter invocation.
pub type Properties = IndexMap<String, Value>;

/// Extension trait for building Properties ergonomically.
pub trait PropertiesExt {
    fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self;
}

impl PropertiesExt for Properties {
    fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from(3.15f64), Value::Float(3.15));
        assert_eq!(Value::from("pretty"), Value::String("pretty".into()));
    }

    #[test]
    fn test_properties_builder() {
        let props = Properties::new()
            .with("pretty", false)
            .with("indent", 2i64);

        assert_eq!(props.get("pretty").and_then(Value::as_bool), Some(false));
        assert_eq!(props.get("indent").and_then(Value::as_i64), Some(2));
    }

    #[test]
    fn test_value_accessors() {
        let v = Value::Int(42);
        assert_eq!(v.as_i64(), Some(42));
        assert_eq!(v.as_f64(), Some(42.0));
        assert_eq!(v.as_str(), None);
    }
}
