//! Host-side value representation
//!
//! This module defines the value domain shared with the embedded engine
//! (integer, float, text, blob, null), parameter payloads for binding,
//! and literal escaping for the unescaped SQL-building path.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// A single typed cell value.
///
/// The engine types values dynamically per cell, not per declared column,
/// so a column may yield different variants on different rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value
    Null,
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Text value
    Text(String),
    /// Binary data
    Blob(Vec<u8>),
}

impl Value {
    /// Render this value as a SQL literal, doubling every quote character.
    ///
    /// This is unsafe against adversarial input: a crafted literal can
    /// still change the meaning of surrounding SQL. Callers needing
    /// injection safety must use parameter binding instead.
    pub fn escape_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(bytes) => {
                let mut hex = String::with_capacity(bytes.len() * 2 + 3);
                hex.push_str("X'");
                for b in bytes {
                    hex.push_str(&format!("{:02X}", b));
                }
                hex.push('\'');
                hex
            }
        }
    }

    /// Check for the NULL variant
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "<blob {} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(if v { 1 } else { 0 })
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    /// Convert a JSON value into the engine's value domain.
    ///
    /// Arrays and objects have no engine representation and fail with
    /// `UnsupportedType`.
    fn try_from(v: serde_json::Value) -> Result<Self> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Integer(if b { 1 } else { 0 })),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(Error::UnsupportedType(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Array(_) => Err(Error::UnsupportedType("array".to_string())),
            serde_json::Value::Object(_) => Err(Error::UnsupportedType("object".to_string())),
        }
    }
}

/// Parameters for a statement: positional (`?1`, `?2`, ...) or named
/// (`:name`, `@name`, `$name`).
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl Params {
    /// An empty positional parameter list
    pub fn empty() -> Self {
        Params::Positional(Vec::new())
    }

    /// Build a positional parameter list
    pub fn positional(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }

    /// Build a named parameter list
    pub fn named(pairs: Vec<(String, Value)>) -> Self {
        Params::Named(pairs)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(v) => v.is_empty(),
            Params::Named(v) => v.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(v) => v.len(),
            Params::Named(v) => v.len(),
        }
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::empty()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

/// Build positional [`Params`] from a list of expressions convertible
/// into [`Value`].
#[macro_export]
macro_rules! params {
    () => {
        $crate::value::Params::empty()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::value::Params::positional(vec![$($crate::value::Value::from($value)),+])
    };
}
