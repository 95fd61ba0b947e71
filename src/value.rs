//! Dynamic Value: the format-agnostic currency between the codec and the matcher.
//!
//! No `serde_json::Value` leaks past the codec; everything else speaks this.

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    /// Insertion order is kept; the encoder decides key order.
    Map(IndexMap<String, Value>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Number {
    Int(i64),
    /// Only for integers above `i64::MAX`.
    UInt(u64),
    Float(OrderedFloat<f64>),
}

impl Number {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Int(i) => Some(i),
            Number::UInt(u) => i64::try_from(u).ok(),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::UInt(u) => u as f64,
            Number::Float(f) => f.0,
        }
    }
}

impl Value {
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSIONS
// ————————————————————————————————————————————————————————————————————————————

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Number(Number::Int(i)) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Number(Number::Float(OrderedFloat(f))) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                let n = if let Some(i) = n.as_i64() {
                    Number::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Number::UInt(u)
                } else {
                    Number::Float(OrderedFloat(n.as_f64().unwrap_or(f64::NAN)))
                };
                Value::Number(n)
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(xs) => Value::List(xs.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Non-finite floats have no JSON spelling and become `null`; the encoder
/// rejects them before they get this far.
impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(Number::Int(i)) => serde_json::Value::from(i),
            Value::Number(Number::UInt(u)) => serde_json::Value::from(u),
            Value::Number(Number::Float(f)) => serde_json::Number::from_f64(f.0)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(xs) => serde_json::Value::Array(xs.into_iter().map(Into::into).collect()),
            Value::Map(m) => serde_json::Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => s.serialize_unit(),
            Value::Bool(b) => s.serialize_bool(*b),
            Value::Number(Number::Int(i)) => s.serialize_i64(*i),
            Value::Number(Number::UInt(u)) => s.serialize_u64(*u),
            Value::Number(Number::Float(f)) => s.serialize_f64(f.0),
            Value::String(v) => s.serialize_str(v),
            Value::List(xs) => s.collect_seq(xs),
            Value::Map(m) => s.collect_map(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_their_class() {
        assert_eq!(Value::from(json!(30)), Value::Number(Number::Int(30)));
        assert_eq!(Value::from(json!(-5)), Value::Number(Number::Int(-5)));
        assert_eq!(Value::from(json!(u64::MAX)), Value::Number(Number::UInt(u64::MAX)));
        assert_eq!(Value::from(json!(1.5)), Value::from(1.5));
    }

    #[test]
    fn maps_keep_source_order() {
        let v = Value::from(json!({"b": 1, "a": 2, "c": 3}));
        let keys: Vec<_> = v.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["b", "a", "c"]);
        let back = serde_json::Value::from(v);
        assert_eq!(back.to_string(), r#"{"b":1,"a":2,"c":3}"#);
    }

    #[test]
    fn number_conversions() {
        assert_eq!(Number::UInt(u64::MAX).as_i64(), None);
        assert_eq!(Number::UInt(7).as_i64(), Some(7));
        assert_eq!(Number::Float(OrderedFloat(2.0)).as_i64(), None);
        assert_eq!(Number::Int(-3).as_f64(), -3.0);
    }

    #[test]
    fn values_compare_structurally() {
        // Float payloads are ordered, so a whole Value tree is `Eq`.
        fn assert_eq_impl<T: Eq>() {}
        assert_eq_impl::<Value>();
        assert_ne!(Value::from(json!({"a": [1.0]})), Value::from(json!({"a": [1]})));
    }
}
