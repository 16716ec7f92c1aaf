//! Data model for the cleaning pipeline.
//!
//! - [`Value`] - Nullable scalar cell
//! - [`DataType`] - Declared type of a column
//! - [`ValueKey`] - Hashable projection used for dedup and lookups
//! - [`Table`] / [`Column`] - Column-oriented in-memory table

pub mod table;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub use table::{Column, Table};

/// Format used when a timestamp is rendered as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Data Types
// =============================================================================

/// Declared type of a column.
///
/// Deserialization also accepts the dtype names common in dataframe
/// tooling (`Int64`, `object`, `datetime64[ns]`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "boolean", alias = "Bool", alias = "Boolean")]
    Bool,
    #[serde(alias = "int", alias = "integer", alias = "Int64", alias = "bigint")]
    Int64,
    #[serde(alias = "float", alias = "double", alias = "Float64", alias = "numeric")]
    Float64,
    #[serde(alias = "str", alias = "string", alias = "text", alias = "object", alias = "varchar")]
    Utf8,
    #[serde(alias = "datetime", alias = "date", alias = "datetime64[ns]", alias = "Timestamp")]
    Timestamp,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
            DataType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bool" | "boolean" => Ok(DataType::Bool),
            "int64" | "int" | "integer" | "bigint" => Ok(DataType::Int64),
            "float64" | "float" | "double" | "numeric" => Ok(DataType::Float64),
            "utf8" | "str" | "string" | "text" | "object" | "varchar" => Ok(DataType::Utf8),
            "timestamp" | "datetime" | "date" | "datetime64[ns]" => Ok(DataType::Timestamp),
            other => Err(format!("unknown data type '{}'", other)),
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// A single nullable cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// True for `Null` and for a float `NaN`.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The type this value naturally belongs to, `None` when missing.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            _ if self.is_null() => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int64),
            Value::Float(_) => Some(DataType::Float64),
            Value::Str(_) => Some(DataType::Utf8),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::Null => None,
        }
    }

    /// Hashable key for equality-based operations.
    pub fn key(&self) -> ValueKey {
        match self {
            _ if self.is_null() => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Int(i) => ValueKey::Int(*i),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    ValueKey::Int(*f as i64)
                } else {
                    ValueKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => ValueKey::Str(s.clone()),
            Value::Timestamp(t) => ValueKey::Timestamp(*t),
            Value::Null => ValueKey::Null,
        }
    }

    /// Ascending order between two non-null values.
    ///
    /// Numbers compare numerically across int/float, other mixes fall
    /// back to their rendered text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            _ if self.is_null() => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1.0e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{}", x)
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Hashable projection of a [`Value`].
///
/// Missing values share one key, integral floats collapse onto the
/// matching integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
    Timestamp(NaiveDateTime),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_is_null() {
        assert!(Value::Float(f64::NAN).is_null());
        assert!(Value::Null.is_null());
        assert!(!Value::str("").is_null());
    }

    #[test]
    fn test_integral_float_key_matches_int() {
        assert_eq!(Value::Float(3.0).key(), Value::Int(3).key());
        assert_ne!(Value::Float(3.5).key(), Value::Int(3).key());
        assert_eq!(Value::Float(f64::NAN).key(), Value::Null.key());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Null.to_string(), "");
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-01-02 03:04:05");
    }

    #[test]
    fn test_data_type_aliases() {
        let parsed: DataType = serde_json::from_str("\"Int64\"").unwrap();
        assert_eq!(parsed, DataType::Int64);
        let parsed: DataType = serde_json::from_str("\"object\"").unwrap();
        assert_eq!(parsed, DataType::Utf8);
        assert_eq!("datetime".parse::<DataType>().unwrap(), DataType::Timestamp);
        assert!("decimal128".parse::<DataType>().is_err());
    }

    #[test]
    fn test_sort_cmp_mixed_numbers() {
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::str("b").sort_cmp(&Value::str("a")), Ordering::Greater);
    }
}
