//! Index key values
//!
//! A single total order over document field values, shared by index
//! entries and merge sort keys.
//!
//! Ordering: MinKey < Null < Bool < Number < String < Structured < MaxKey.

use std::fmt;

use serde_json::Value;

/// Index key representing one extracted field value.
///
/// Numbers are kept as order-preserving bits so integers and floats
/// compare numerically with each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Sorts before every other key
    MinKey,
    /// Null or missing field
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// Number stored as total-ordering bits
    Number(u64),
    /// String value
    String(String),
    /// Array or object, compared by canonical JSON text
    Structured(String),
    /// Sorts after every other key
    MaxKey,
}

impl IndexKey {
    /// Create a key from an integer
    pub fn from_int(v: i64) -> Self {
        Self::from_float(v as f64)
    }

    /// Create a key from a float
    ///
    /// Uses bit representation for total ordering. `-0.0` is folded into `0.0`.
    pub fn from_float(v: f64) -> Self {
        let v = if v == 0.0 { 0.0 } else { v };
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits // Negative: flip all bits
        } else {
            bits ^ (1 << 63) // Positive: flip sign bit
        };
        IndexKey::Number(ordered)
    }

    /// Create a key from a string
    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Create a key from a JSON value
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => IndexKey::Null,
            Value::Bool(b) => IndexKey::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => IndexKey::from_int(i),
                None => IndexKey::from_float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => IndexKey::from_string(s.as_str()),
            Value::Array(_) | Value::Object(_) => IndexKey::Structured(value.to_string()),
        }
    }

    /// Extract the key for a dotted field path. Missing fields yield `Null`.
    pub fn for_path(doc: &Value, path: &str) -> Self {
        lookup_path(doc, path)
            .map(IndexKey::from_json)
            .unwrap_or(IndexKey::Null)
    }

    /// Returns the numeric value if this is a number key
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            IndexKey::Number(ordered) => {
                let bits = if (ordered >> 63) == 1 {
                    ordered ^ (1 << 63)
                } else {
                    !ordered
                };
                Some(f64::from_bits(bits))
            }
            _ => None,
        }
    }

    /// Converts the key back to a JSON value.
    ///
    /// Sentinels have no JSON form and map to `Null`.
    pub fn to_json(&self) -> Value {
        match self {
            IndexKey::MinKey | IndexKey::MaxKey | IndexKey::Null => Value::Null,
            IndexKey::Bool(b) => Value::Bool(*b),
            IndexKey::Number(_) => {
                let f = self.as_f64().unwrap_or(0.0);
                if f.fract() == 0.0 && f.abs() < (1u64 << 53) as f64 {
                    Value::from(f as i64)
                } else {
                    serde_json::Number::from_f64(f)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            IndexKey::String(s) => Value::String(s.clone()),
            IndexKey::Structured(text) => serde_json::from_str(text).unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::MinKey => write!(f, "MinKey"),
            IndexKey::MaxKey => write!(f, "MaxKey"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// Resolve a dotted path (`"a.b.0"`) inside a document.
///
/// Numeric components index into arrays.
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for component in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(component)?,
            Value::Array(items) => items.get(component.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
