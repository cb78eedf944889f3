//! The runtime value model.
//!
//! A closed variant: integers, decimals, strings, lists, string-keyed
//! ordered maps, opaque host callables, and null. There is deliberately no
//! boolean tag; the formula language uses integers for truth, comparisons
//! produce `Int(1)` or `Int(0)`, and [`Value::is_true`] defines truthiness
//! in one place. All numerics are `i64` or `rust_decimal::Decimal` -- never
//! `f64`.
//!
//! Values are immutable snapshots. Composite values own their contents;
//! nothing in a `Value` aliases mutable host state.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::host::HostHandle;

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    Decimal(Decimal),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Callable(HostHandle),
}

impl Value {
    /// Human-readable tag name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Int(_) => "Int",
            Value::Decimal(_) => "Decimal",
            Value::Str(_) => "Str",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Callable(_) => "Callable",
        }
    }

    /// The one truthiness rule: null, zero, the empty string, and the
    /// empty list are false; everything else (including an empty map and
    /// any callable) is true.
    pub fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(n) => *n != 0,
            Value::Decimal(d) => !d.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(_) => true,
            Value::Callable(_) => true,
        }
    }

    /// Checked integer conversion. Decimals truncate toward zero; that is
    /// defined behavior, not an error. Everything else fails.
    pub fn as_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(n) => Ok(*n),
            Value::Decimal(d) => d.trunc().to_i64().ok_or(EvalError::Conversion {
                expected: "Int",
                got: "Decimal",
            }),
            other => Err(EvalError::Conversion {
                expected: "Int",
                got: other.type_name(),
            }),
        }
    }

    /// Checked decimal conversion; integers promote exactly.
    pub fn as_decimal(&self) -> Result<Decimal, EvalError> {
        match self {
            Value::Int(n) => Ok(Decimal::from(*n)),
            Value::Decimal(d) => Ok(*d),
            other => Err(EvalError::Conversion {
                expected: "Decimal",
                got: other.type_name(),
            }),
        }
    }

    pub fn as_str(&self) -> Result<&str, EvalError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(EvalError::Conversion {
                expected: "Str",
                got: other.type_name(),
            }),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], EvalError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(EvalError::Conversion {
                expected: "List",
                got: other.type_name(),
            }),
        }
    }

    pub fn as_handle(&self) -> Result<&HostHandle, EvalError> {
        match self {
            Value::Callable(h) => Ok(h),
            other => Err(EvalError::Conversion {
                expected: "Callable",
                got: other.type_name(),
            }),
        }
    }

    fn numeric(&self) -> Option<Decimal> {
        match self {
            Value::Int(n) => Some(Decimal::from(*n)),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Tag rank for cross-tag ordering. Int and Decimal share a rank; the
    /// numeric compare below handles that pair, and no other tag sorts
    /// between them, so the order stays total.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Decimal(_) => 1,
            Value::Str(_) => 2,
            Value::List(_) => 3,
            Value::Map(_) => 4,
            Value::Callable(_) => 5,
        }
    }
}

// ──────────────────────────────────────────────
// Equality and ordering
// ──────────────────────────────────────────────

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return a == b;
        }
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return a.cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Map(a), Value::Map(b)) => a.cmp(b),
            (Value::Callable(a), Value::Callable(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

// ──────────────────────────────────────────────
// JSON bridge
// ──────────────────────────────────────────────

impl Value {
    /// Convert a plain JSON value. Booleans become `Int(1)`/`Int(0)`;
    /// non-integer numbers become decimals.
    pub fn from_json(v: &serde_json::Value) -> Result<Value, EvalError> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else {
                    let f = n.as_f64().ok_or(EvalError::Conversion {
                        expected: "Decimal",
                        got: "number",
                    })?;
                    Decimal::from_f64_retain(f)
                        .map(Value::Decimal)
                        .ok_or(EvalError::Conversion {
                            expected: "Decimal",
                            got: "number",
                        })
                }
            }
            serde_json::Value::String(s) => Ok(Value::Str(s.clone())),
            serde_json::Value::Array(items) => {
                let converted: Result<Vec<Value>, _> =
                    items.iter().map(Value::from_json).collect();
                Ok(Value::List(converted?))
            }
            serde_json::Value::Object(obj) => {
                let mut map = BTreeMap::new();
                for (k, item) in obj {
                    map.insert(k.clone(), Value::from_json(item)?);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Render for JSON output. Decimals render as strings so no precision
    /// is lost; callables render as tagged objects of their members.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(n) => serde_json::json!(n),
            Value::Decimal(d) => serde_json::json!(d.to_string()),
            Value::Str(s) => serde_json::json!(s),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
            Value::Callable(h) => {
                let mut obj = serde_json::Map::new();
                obj.insert("kind".to_string(), serde_json::json!(h.kind()));
                for (k, v) in h.members() {
                    obj.insert(k.to_string(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

// ──────────────────────────────────────────────
// Text rendering
// ──────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Callable(h) => write!(f, "{}", h),
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Location, SideView};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn truthiness_table() {
        assert!(!Value::Null.is_true());
        assert!(!Value::Int(0).is_true());
        assert!(Value::Int(-1).is_true());
        assert!(!Value::Decimal(Decimal::ZERO).is_true());
        assert!(Value::Decimal(dec("0.1")).is_true());
        assert!(!Value::Str(String::new()).is_true());
        assert!(Value::Str("x".to_string()).is_true());
        assert!(!Value::List(vec![]).is_true());
        assert!(Value::List(vec![Value::Null]).is_true());
        assert!(Value::Map(BTreeMap::new()).is_true());
        assert!(Value::Callable(HostHandle::Location(Location::new(0, 0))).is_true());
    }

    #[test]
    fn numeric_promotion_in_equality() {
        assert_eq!(Value::Int(1), Value::Decimal(dec("1.0")));
        assert_ne!(Value::Int(1), Value::Decimal(dec("1.5")));
        assert_ne!(Value::Int(1), Value::Str("1".to_string()));
    }

    #[test]
    fn ordering_is_numeric_within_numbers() {
        assert!(Value::Int(2) > Value::Decimal(dec("1.9")));
        assert!(Value::Decimal(dec("2.1")) > Value::Int(2));
        assert_eq!(
            Value::Int(3).cmp(&Value::Decimal(dec("3.0"))),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn ordering_across_tags_is_by_rank() {
        assert!(Value::Null < Value::Int(i64::MIN));
        assert!(Value::Int(i64::MAX) < Value::Str(String::new()));
        assert!(Value::Str("zzz".to_string()) < Value::List(vec![]));
    }

    #[test]
    fn as_int_truncates_decimals() {
        assert_eq!(Value::Decimal(dec("7.9")).as_int().unwrap(), 7);
        assert_eq!(Value::Decimal(dec("-7.9")).as_int().unwrap(), -7);
        assert!(Value::Str("7".to_string()).as_int().is_err());
        assert!(Value::Null.as_int().is_err());
    }

    #[test]
    fn from_json_maps_booleans_to_ints() {
        let v = Value::from_json(&serde_json::json!({"a": true, "b": [1, "x", null]})).unwrap();
        let Value::Map(m) = v else { panic!("expected map") };
        assert_eq!(m["a"], Value::Int(1));
        assert_eq!(
            m["b"],
            Value::List(vec![
                Value::Int(1),
                Value::Str("x".to_string()),
                Value::Null
            ])
        );
    }

    #[test]
    fn to_json_renders_decimals_as_strings() {
        assert_eq!(
            Value::Decimal(dec("2.50")).to_json(),
            serde_json::json!("2.50")
        );
    }

    #[test]
    fn to_json_tags_callables() {
        let v = Value::Callable(HostHandle::Side(SideView { id: 1, gold: 40 }));
        let j = v.to_json();
        assert_eq!(j["kind"], "side");
        assert_eq!(j["gold"], 40);
    }

    #[test]
    fn display_reads_like_formula_syntax() {
        let v = Value::List(vec![Value::Int(1), Value::Str("a".to_string())]);
        assert_eq!(v.to_string(), "[1, 'a']");
    }
}
