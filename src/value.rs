use std::cmp::Ordering;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A scalar cell value used throughout the pipeline engine.
///
/// Records are schema-less: every cell is one of these variants, with a
/// distinction between integers and floats (unlike standard JSON which
/// only has "number"). Collections never appear inside a record; nested
/// JSON arriving at the boundary is flattened to its string rendering.
///
/// # Examples
///
/// ```
/// use rowpipe::Value;
///
/// let null = Value::Null;
/// let boolean = Value::Boolean(true);
/// let integer = Value::Integer(42);
/// let float = Value::Float(3.14);
/// let string = Value::String("hello".to_string());
///
/// assert_eq!(integer.as_numeric(), Some(42.0));
/// assert!(null.is_null());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing or explicit null
    Null,

    /// Boolean (true/false)
    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),
}

/// A hashable grouping key derived from a [`Value`].
///
/// Integral floats collapse onto the integer variant so `1` and `1.0`
/// land in the same group; other floats key on their bit pattern with
/// `-0.0` normalized to `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(u64),
    Text(String),
}

impl Value {
    /// Check whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce to a number the way a dataframe's numeric coercion would:
    /// integers, floats, booleans (1/0), and numeric strings succeed;
    /// everything else yields `None`. Strings that parse to a non-finite
    /// number ("NaN", "inf") coerce to `None` rather than poisoning
    /// downstream statistics.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Value::Null => None,
        }
    }

    /// String rendering used by text operators (contains, uppercase, ...).
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
        }
    }

    /// Scalar equality with numeric cross-kind tolerance:
    /// `Integer(1)` equals `Float(1.0)`, but `"1"` does not equal `1`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Grouping key for aggregation (see [`GroupKey`]).
    pub fn group_key(&self) -> GroupKey {
        match self {
            Value::Null => GroupKey::Null,
            Value::Boolean(b) => GroupKey::Boolean(*b),
            Value::Integer(n) => GroupKey::Integer(*n),
            Value::Float(n) => {
                if n.fract() == 0.0
                    && n.is_finite()
                    && *n >= i64::MIN as f64
                    && *n <= i64::MAX as f64
                {
                    GroupKey::Integer(*n as i64)
                } else {
                    let normalized = if *n == 0.0 { 0.0 } else { *n };
                    GroupKey::Float(normalized.to_bits())
                }
            }
            Value::String(s) => GroupKey::Text(s.clone()),
        }
    }

    /// Total ordering over scalars for sorting.
    ///
    /// Same-kind values compare naturally (numbers as f64, strings
    /// lexicographically). Mixed kinds fall back to a fixed kind rank
    /// (Boolean < numeric < String < Null) so the order stays
    /// deterministic on heterogeneous columns. Null-last placement
    /// regardless of direction is handled by the sort operator itself.
    pub fn cmp_scalars(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) => match (a.as_number_for_cmp(), b.as_number_for_cmp()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.kind_rank().cmp(&b.kind_rank()),
            },
        }
    }

    /// Build a float-valued cell, collapsing integral results back to
    /// `Integer` so whole numbers survive numeric pipelines intact.
    pub fn from_f64_preserving(n: f64) -> Value {
        if n.fract() == 0.0 && n.is_finite() && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
            Value::Integer(n as i64)
        } else {
            Value::Float(n)
        }
    }

    /// Convert from a JSON value at the boundary. Nested arrays and
    /// objects are flattened to their compact JSON string rendering.
    pub fn from_json(raw: serde_json::Value) -> Value {
        match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            nested => Value::String(nested.to_string()),
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Value::from(*n),
            Value::String(s) => serde_json::Value::from(s.clone()),
        }
    }

    fn as_number_for_cmp(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Boolean(_) => 0,
            Value::Integer(_) | Value::Float(_) => 1,
            Value::String(_) => 2,
            Value::Null => 3,
        }
    }
}

/// Returns a human-readable type name for a Value
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::Float(_) => "float",
        Value::String(_) => "string",
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(raw))
    }
}
