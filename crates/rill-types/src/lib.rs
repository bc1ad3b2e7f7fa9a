#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of a column. Every column holds exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Int64,
    Float64,
    Utf8,
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Utf8 => "utf8",
            Self::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Runtime value as seen on the evaluation stack. `Null` is a first-class
/// case distinct from every typed value; it originates from empty input
/// cells and propagates through arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Bool(bool),
}

impl Value {
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Null => None,
            Self::Int64(_) => Some(DType::Int64),
            Self::Float64(_) => Some(DType::Float64),
            Self::Utf8(_) => Some(DType::Utf8),
            Self::Bool(_) => Some(DType::Bool),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Widen to `f64` for mixed-width numeric operations. `None` for
    /// null and non-numeric values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{DType, Value};

    #[test]
    fn null_has_no_dtype() {
        assert_eq!(Value::Null.dtype(), None);
        assert!(Value::Null.is_null());
        assert!(!Value::Int64(0).is_null());
    }

    #[test]
    fn numeric_widening_covers_both_widths() {
        assert_eq!(Value::Int64(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float64(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::Utf8("3".to_owned()).as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn dtype_display_matches_column_vocabulary() {
        assert_eq!(DType::Int64.to_string(), "int64");
        assert_eq!(DType::Utf8.to_string(), "utf8");
    }
}
